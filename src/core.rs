use crate::error::{ScrubError, ScrubResult};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u32);

impl FrameIndex {
    pub fn distance_to(self, other: FrameIndex) -> u32 {
        self.0.abs_diff(other.0)
    }

    /// Shift by a signed delta, saturating at the ends of `u32`.
    pub fn offset(self, delta: i64) -> FrameIndex {
        if delta >= 0 {
            let d = u32::try_from(delta).unwrap_or(u32::MAX);
            FrameIndex(self.0.saturating_add(d))
        } else {
            let d = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
            FrameIndex(self.0.saturating_sub(d))
        }
    }
}

impl std::fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Length of the frame sequence. Runtime-adjustable: the probe may shrink it
/// when trailing frames turn out to be missing on the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameCount(pub u32);

impl FrameCount {
    pub fn new(n: u32) -> ScrubResult<Self> {
        if n == 0 {
            return Err(ScrubError::validation("FrameCount must be > 0"));
        }
        Ok(Self(n))
    }

    pub fn last(self) -> FrameIndex {
        FrameIndex(self.0.saturating_sub(1))
    }

    pub fn contains(self, f: FrameIndex) -> bool {
        f.0 < self.0
    }

    pub fn clamp(self, f: FrameIndex) -> FrameIndex {
        FrameIndex(f.0.min(self.last().0))
    }
}

/// Clamp to [0,1], mapping non-finite input to 0.
pub fn clamp_progress(p: f64) -> f64 {
    if p.is_finite() { p.clamp(0.0, 1.0) } else { 0.0 }
}

/// `floor(progress * total)`, clamped to the valid index range.
pub fn frame_for_progress(progress: f64, total: FrameCount) -> FrameIndex {
    let p = clamp_progress(progress);
    let idx = (p * f64::from(total.0)).floor() as u32;
    total.clamp(FrameIndex(idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_rejects_zero() {
        assert!(FrameCount::new(0).is_err());
        assert!(FrameCount::new(1).is_ok());
    }

    #[test]
    fn progress_maps_to_frames() {
        let total = FrameCount(1051);
        assert_eq!(frame_for_progress(0.0, total), FrameIndex(0));
        assert_eq!(frame_for_progress(0.95, total), FrameIndex(998));
        assert_eq!(frame_for_progress(1.0, total), FrameIndex(1050));
        assert_eq!(frame_for_progress(2.0, total), FrameIndex(1050));
        assert_eq!(frame_for_progress(-1.0, total), FrameIndex(0));
    }

    #[test]
    fn non_finite_progress_is_zero() {
        assert_eq!(clamp_progress(f64::NAN), 0.0);
        assert_eq!(clamp_progress(f64::INFINITY), 0.0);
        assert_eq!(clamp_progress(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn offset_saturates() {
        assert_eq!(FrameIndex(3).offset(-10), FrameIndex(0));
        assert_eq!(FrameIndex(3).offset(4), FrameIndex(7));
        assert_eq!(FrameIndex(5).distance_to(FrameIndex(2)), 3);
    }
}
