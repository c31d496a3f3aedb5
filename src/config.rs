use crate::error::{ScrubError, ScrubResult};
use crate::resolve::{FramePattern, ImageExt};
use crate::section::SectionSpec;

/// Every engine tunable, with the deployed defaults. Loaded from JSON by the
/// CLI (missing fields fall back to these defaults) or built in code.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Initial estimate of the sequence length; the probe corrects it
    /// downward against real 404s.
    pub total_frames: u32,
    pub base_path: String,
    pub ext: ImageExt,
    /// Cache-busting token appended to every resolved locator.
    pub cache_bust: Option<String>,
    /// Scrollable height driving progress; hosts update it on resize.
    pub max_scroll_px: f64,

    /// Concurrency ceiling for image fetches (browsers allow 6-8 connections
    /// per origin).
    pub max_concurrent: usize,
    /// In-flight loads older than this are treated as failed.
    pub load_timeout_ms: u64,

    pub max_buffer_size: usize,
    pub preload_range: u32,
    /// Frames further than this from the current one are not worth loading.
    pub max_load_distance: u32,
    pub error_cooldown_ms: u64,
    /// How far to search outward for a stand-in when the target frame is
    /// not displayable.
    pub fallback_radius: u32,

    /// IIR blend factor: higher is smoother but less responsive.
    pub damping: f64,
    pub sample_window_ms: u64,
    pub min_sample_interval_ms: u64,
    /// Time constant of the exponential recency weighting.
    pub recency_tau_ms: f64,
    pub idle_after_ms: u64,
    pub settle_epsilon_px: f64,
    pub min_velocity_px_per_ms: f64,
    pub slow_scroll_nudge_px: f64,

    /// Preload/eviction run this long after a frame change, not every tick.
    pub preload_debounce_ms: u64,
    pub probe_interval_frames: u32,
    pub probe_tail_fraction: f64,
    /// The completion latch fires within this many frames of the end
    /// (bounded by 1% of the sequence).
    pub completion_tail_frames: u32,

    pub cycle_interval_ms: u64,
    pub cycle_resume_idle_ms: u64,
    pub sections: Vec<SectionSpec>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            total_frames: 1000,
            base_path: "frames".to_string(),
            ext: ImageExt::Png,
            cache_bust: None,
            max_scroll_px: 0.0,
            max_concurrent: 6,
            load_timeout_ms: 5000,
            max_buffer_size: 100,
            preload_range: 40,
            max_load_distance: 100,
            error_cooldown_ms: 5000,
            fallback_radius: 10,
            damping: 0.85,
            sample_window_ms: 300,
            min_sample_interval_ms: 5,
            recency_tau_ms: 100.0,
            idle_after_ms: 150,
            settle_epsilon_px: 0.5,
            min_velocity_px_per_ms: 0.5,
            slow_scroll_nudge_px: 2.0,
            preload_debounce_ms: 50,
            probe_interval_frames: 50,
            probe_tail_fraction: 0.9,
            completion_tail_frames: 10,
            cycle_interval_ms: 2000,
            cycle_resume_idle_ms: 4000,
            sections: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> ScrubResult<()> {
        if self.total_frames == 0 {
            return Err(ScrubError::validation("total_frames must be > 0"));
        }
        if self.max_concurrent == 0 {
            return Err(ScrubError::validation("max_concurrent must be >= 1"));
        }
        if self.max_buffer_size == 0 {
            return Err(ScrubError::validation("max_buffer_size must be >= 1"));
        }
        if self.load_timeout_ms == 0 {
            return Err(ScrubError::validation("load_timeout_ms must be > 0"));
        }
        if !(0.0..1.0).contains(&self.damping) {
            return Err(ScrubError::validation("damping must be in [0,1)"));
        }
        if self.sample_window_ms == 0 {
            return Err(ScrubError::validation("sample_window_ms must be > 0"));
        }
        if !(self.recency_tau_ms > 0.0) {
            return Err(ScrubError::validation("recency_tau_ms must be > 0"));
        }
        if !(self.probe_tail_fraction > 0.0 && self.probe_tail_fraction <= 1.0) {
            return Err(ScrubError::validation(
                "probe_tail_fraction must be in (0,1]",
            ));
        }
        if self.preload_range == 0 {
            return Err(ScrubError::validation("preload_range must be >= 1"));
        }
        if !self.settle_epsilon_px.is_finite() || self.settle_epsilon_px < 0.0 {
            return Err(ScrubError::validation("settle_epsilon_px must be >= 0"));
        }
        for (i, section) in self.sections.iter().enumerate() {
            if !(0.0..=1.0).contains(&section.target) {
                return Err(ScrubError::validation(format!(
                    "section {i}: target must be in [0,1]"
                )));
            }
            if !(section.threshold > 0.0) {
                return Err(ScrubError::validation(format!(
                    "section {i}: threshold must be > 0"
                )));
            }
            if section.items == 0 {
                return Err(ScrubError::validation(format!(
                    "section {i}: items must be >= 1"
                )));
            }
        }
        Ok(())
    }

    pub fn pattern(&self) -> FramePattern {
        FramePattern {
            base_path: self.base_path.clone(),
            ext: self.ext,
            cache_bust: self.cache_bust.clone(),
        }
    }
}
