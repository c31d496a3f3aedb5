use std::collections::VecDeque;

use crate::config::EngineConfig;
use crate::core::clamp_progress;

#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct ScrollSample {
    pub time_ms: u64,
    pub position_px: f64,
}

/// Converts raw, bursty scroll events into a damped progress value.
///
/// Two stages: an exponential-recency weighted average over a trailing
/// sample window (robust to event bursts), then a first-order IIR low-pass
/// across ticks. Higher damping is smoother but less responsive.
#[derive(Debug)]
pub struct ScrollSmoother {
    window_ms: u64,
    tau_ms: f64,
    min_sample_interval_ms: u64,
    idle_after_ms: u64,
    settle_epsilon_px: f64,
    min_velocity_px_per_ms: f64,
    nudge_px: f64,
    damping: f64,
    samples: VecDeque<ScrollSample>,
    last_sample_ms: Option<u64>,
    last_event_ms: Option<u64>,
    damped: f64,
}

impl ScrollSmoother {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            window_ms: config.sample_window_ms,
            tau_ms: config.recency_tau_ms,
            min_sample_interval_ms: config.min_sample_interval_ms,
            idle_after_ms: config.idle_after_ms,
            settle_epsilon_px: config.settle_epsilon_px,
            min_velocity_px_per_ms: config.min_velocity_px_per_ms,
            nudge_px: config.slow_scroll_nudge_px,
            damping: config.damping,
            samples: VecDeque::new(),
            last_sample_ms: None,
            last_event_ms: None,
            damped: 0.0,
        }
    }

    /// Record one raw scroll event. Samples arriving faster than the minimum
    /// interval are not recorded (caps sample density under event floods).
    pub fn record(&mut self, now_ms: u64, position_px: f64) {
        self.last_event_ms = Some(now_ms);
        if let Some(last) = self.last_sample_ms {
            if now_ms.saturating_sub(last) < self.min_sample_interval_ms {
                return;
            }
        }
        self.push_sample(now_ms, position_px);
    }

    fn push_sample(&mut self, now_ms: u64, position_px: f64) {
        self.samples.push_back(ScrollSample {
            time_ms: now_ms,
            position_px,
        });
        self.last_sample_ms = Some(now_ms);
        self.prune(now_ms);
    }

    fn prune(&mut self, now_ms: u64) {
        while let Some(front) = self.samples.front() {
            if now_ms.saturating_sub(front.time_ms) > self.window_ms {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Exponential-recency weighted average of the sample window.
    pub fn weighted_position(&self, now_ms: u64) -> Option<f64> {
        let latest = self.samples.back()?;
        let mut total_weight = 0.0;
        let mut weighted_sum = 0.0;
        for sample in &self.samples {
            let age = now_ms.saturating_sub(sample.time_ms) as f64;
            let weight = (-age / self.tau_ms).exp();
            total_weight += weight;
            weighted_sum += sample.position_px * weight;
        }
        if total_weight <= f64::EPSILON {
            // Every sample is far older than tau; only the latest matters.
            return Some(latest.position_px);
        }
        let mut position = weighted_sum / total_weight;

        // Very slow scrolling gets a constant bias toward the latest raw
        // position so the animation keeps creeping instead of stalling.
        if !self.is_idle(now_ms) {
            if let Some(velocity) = self.velocity() {
                if velocity < self.min_velocity_px_per_ms {
                    let direction = if latest.position_px >= position { 1.0 } else { -1.0 };
                    position += self.nudge_px * direction;
                }
            }
        }
        Some(position)
    }

    fn velocity(&self) -> Option<f64> {
        let len = self.samples.len();
        if len < 2 {
            return None;
        }
        let newest = self.samples[len - 1];
        let previous = self.samples[len - 2];
        let dt = newest.time_ms.saturating_sub(previous.time_ms);
        if dt == 0 {
            return None;
        }
        Some((newest.position_px - previous.position_px).abs() / dt as f64)
    }

    /// Advance the damped progress by one tick. Called exactly once per
    /// engine tick; this is the only place the canonical progress mutates.
    pub fn damped_progress(&mut self, now_ms: u64, max_scroll_px: f64) -> f64 {
        let Some(position) = self.weighted_position(now_ms) else {
            return self.damped;
        };
        let raw = if max_scroll_px > 0.0 {
            clamp_progress(position / max_scroll_px)
        } else {
            0.0
        };
        self.damped = self.damped * self.damping + raw * (1.0 - self.damping);
        self.damped
    }

    pub fn damped(&self) -> f64 {
        self.damped
    }

    pub fn is_idle(&self, now_ms: u64) -> bool {
        match self.last_event_ms {
            Some(t) => now_ms.saturating_sub(t) >= self.idle_after_ms,
            None => true,
        }
    }

    /// While the scroll signal is idle, keep feeding the last known target
    /// position through the same weighted-average formula so the
    /// interpolated position settles onto it.
    pub fn settle_tick(&mut self, now_ms: u64) {
        if !self.is_idle(now_ms) {
            return;
        }
        let Some(latest) = self.samples.back().map(|s| s.position_px) else {
            return;
        };
        if let Some(last) = self.last_sample_ms {
            if now_ms.saturating_sub(last) < self.min_sample_interval_ms {
                return;
            }
        }
        self.push_sample(now_ms, latest);
    }

    /// Idle, and both smoothing stages within epsilon of the target.
    pub fn is_settled(&self, now_ms: u64, max_scroll_px: f64) -> bool {
        if !self.is_idle(now_ms) {
            return false;
        }
        let Some(latest) = self.samples.back() else {
            return true;
        };
        let Some(weighted) = self.weighted_position(now_ms) else {
            return true;
        };
        if (latest.position_px - weighted).abs() >= self.settle_epsilon_px {
            return false;
        }
        if max_scroll_px > 0.0 {
            let raw = clamp_progress(weighted / max_scroll_px);
            let epsilon = self.settle_epsilon_px / max_scroll_px;
            if (raw - self.damped).abs() >= epsilon {
                return false;
            }
        }
        true
    }

    /// Jump-to-target path (menu buttons): replace the window with a few
    /// staggered samples at the target so the next ticks move straight
    /// toward it.
    pub fn retarget(&mut self, now_ms: u64, position_px: f64) {
        self.samples.clear();
        for i in (0..5u64).rev() {
            self.samples.push_back(ScrollSample {
                time_ms: now_ms.saturating_sub(i * 10),
                position_px,
            });
        }
        self.last_sample_ms = Some(now_ms);
        self.last_event_ms = Some(now_ms);
    }

    /// Full reset (visibility restore): zero the damped progress and reseed
    /// the window at the current position.
    pub fn reset(&mut self, now_ms: u64, position_px: f64) {
        self.samples.clear();
        self.damped = 0.0;
        for i in (0..3u64).rev() {
            self.samples.push_back(ScrollSample {
                time_ms: now_ms.saturating_sub(i * 10),
                position_px,
            });
        }
        self.last_sample_ms = Some(now_ms);
        self.last_event_ms = None;
    }
}
