use crate::core::FrameIndex;

/// Zero-padded width of the frame number in resolved file names.
pub const FRAME_DIGITS: usize = 5;

/// A fetchable resource locator for one frame (a relative path, optionally
/// carrying a cache-busting query suffix).
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Locator(String);

impl Locator {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path portion, with any query suffix stripped.
    pub fn path(&self) -> &str {
        self.0.split('?').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageExt {
    Webp,
    Png,
}

impl ImageExt {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Png => "png",
        }
    }
}

/// Deterministic frame-index -> locator mapping. Pure and total: range
/// validation is the caller's job.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct FramePattern {
    pub base_path: String,
    pub ext: ImageExt,
    /// Cache-busting token appended as `?v=<token>` (needed on some
    /// browsers to dodge stale error responses).
    pub cache_bust: Option<String>,
}

impl FramePattern {
    pub fn resolve(&self, index: FrameIndex) -> Locator {
        let mut s = if self.base_path.is_empty() {
            format!("frame_{:0width$}.{}", index.0, self.ext.as_str(), width = FRAME_DIGITS)
        } else {
            format!(
                "{}/frame_{:0width$}.{}",
                self.base_path,
                index.0,
                self.ext.as_str(),
                width = FRAME_DIGITS
            )
        };
        if let Some(bust) = &self.cache_bust {
            s.push_str("?v=");
            s.push_str(bust);
        }
        Locator(s)
    }
}
