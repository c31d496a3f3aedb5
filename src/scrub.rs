use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use crate::cache::{FrameCache, FrameState};
use crate::config::EngineConfig;
use crate::core::{FrameCount, FrameIndex, clamp_progress, frame_for_progress};
use crate::error::ScrubResult;
use crate::loader::{ImageLoader, LoadTicket, PreparedFrame};
use crate::probe::{ProbeAction, TotalProbe};
use crate::queue::LoadQueue;
use crate::resolve::{FramePattern, Locator};
use crate::section::{SectionSet, SectionState};
use crate::smooth::ScrollSmoother;

/// Where a settled ticket's result goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Frame(FrameIndex),
    Probe(FrameIndex),
}

/// A change the host should apply to its visible image element.
#[derive(Clone, Debug)]
pub struct DisplayChange {
    pub index: FrameIndex,
    pub locator: Locator,
    pub frame: Arc<PreparedFrame>,
}

#[derive(Clone, Debug, Default)]
pub struct TickUpdate {
    pub display: Option<DisplayChange>,
    /// True exactly once, on the tick the completion latch fires.
    pub completed_now: bool,
    /// True when the smoothed signal has settled; hosts may stop ticking
    /// until the next scroll event arrives.
    pub settled: bool,
    pub sections: Vec<SectionState>,
}

#[derive(Clone, Copy, Debug, Default, serde::Serialize)]
pub struct ScrubStats {
    pub loads_started: u64,
    pub loads_completed: u64,
    pub loads_failed: u64,
    pub loads_timed_out: u64,
    pub display_changes: u64,
    pub frames_evicted: u64,
    pub probe_runs: u64,
    pub cache_peak: usize,
}

enum Disposition {
    Show(Arc<PreparedFrame>),
    Wait,
    Missing,
}

/// The per-tick animation driver. Owns all mutable engine state; hosts call
/// `on_scroll` from their scroll events and `tick` from a display-refresh
/// callback, so the visual update rate is decoupled from the event rate.
pub struct Scrubber {
    config: EngineConfig,
    pattern: FramePattern,
    smoother: ScrollSmoother,
    queue: LoadQueue,
    cache: FrameCache,
    probe: TotalProbe,
    sections: SectionSet,
    routes: HashMap<LoadTicket, Route>,
    total: FrameCount,
    max_scroll_px: f64,
    last_target: Option<FrameIndex>,
    displayed: Option<FrameIndex>,
    completed: bool,
    preload_due_ms: Option<u64>,
    paused: bool,
    stats: ScrubStats,
}

impl Scrubber {
    pub fn new(config: EngineConfig) -> ScrubResult<Self> {
        config.validate()?;
        let total = FrameCount::new(config.total_frames)?;
        let pattern = config.pattern();
        let smoother = ScrollSmoother::new(&config);
        let queue = LoadQueue::new(config.max_concurrent, config.load_timeout_ms);
        let probe = TotalProbe::new(config.probe_interval_frames, config.probe_tail_fraction);
        let sections = SectionSet::new(
            &config.sections,
            config.cycle_interval_ms,
            config.cycle_resume_idle_ms,
        );
        let max_scroll_px = config.max_scroll_px;
        Ok(Self {
            config,
            pattern,
            smoother,
            queue,
            cache: FrameCache::default(),
            probe,
            sections,
            routes: HashMap::new(),
            total,
            max_scroll_px,
            last_target: None,
            displayed: None,
            completed: false,
            preload_due_ms: None,
            paused: false,
            stats: ScrubStats::default(),
        })
    }

    /// Feed one raw scroll event. Sampling density is capped downstream.
    pub fn on_scroll(&mut self, now_ms: u64, position_px: f64) {
        if self.paused || !position_px.is_finite() {
            return;
        }
        self.smoother.record(now_ms, position_px.max(0.0));
    }

    /// Programmatic jump (menu buttons): retarget the smoother so the next
    /// ticks move straight toward the requested progress.
    pub fn jump_to(&mut self, now_ms: u64, target_progress: f64) {
        if self.paused {
            return;
        }
        let target = clamp_progress(target_progress);
        self.smoother.retarget(now_ms, target * self.max_scroll_px);
    }

    /// Host geometry update (container resize).
    pub fn set_max_scroll(&mut self, px: f64) {
        if px.is_finite() && px >= 0.0 {
            self.max_scroll_px = px;
        }
    }

    /// One animation tick. Drives loads, progress, frame display, the
    /// total-frames probe, preload/eviction, and section activation.
    pub fn tick(&mut self, now_ms: u64, loader: &mut dyn ImageLoader) -> TickUpdate {
        if self.paused {
            return TickUpdate::default();
        }

        self.service_loads(now_ms, loader);
        self.cache.purge_expired_errors(now_ms);
        self.smoother.settle_tick(now_ms);

        let progress = self.smoother.damped_progress(now_ms, self.max_scroll_px);
        let target = frame_for_progress(progress, self.total);

        let mut update = TickUpdate::default();

        if Some(target) != self.last_target {
            self.last_target = Some(target);
            update.display = self.resolve_display(target, now_ms);
            self.preload_due_ms = Some(now_ms + self.config.preload_debounce_ms);

            if self.probe.should_start(target, self.total) {
                let low = self.cache.highest_loaded().unwrap_or(FrameIndex(0));
                self.probe.begin(low, FrameIndex(self.total.0));
                self.stats.probe_runs += 1;
                debug!(target = target.0, total = self.total.0, "starting frame-count probe");
            }
        } else if self.displayed != Some(target) {
            // The target was pending last time we looked; show it the tick
            // its load lands, and re-request it if its error cooled down.
            if let Some(frame) = self.cache.loaded(target) {
                let frame = frame.clone();
                update.display = Some(self.display_change(target, frame));
            } else if !self.cache.contains(target) {
                self.ensure_loading(target, now_ms);
            }
        }

        self.drive_probe(now_ms);

        if let Some(due) = self.preload_due_ms {
            if now_ms >= due {
                self.preload_due_ms = None;
                self.preload_and_evict(target, now_ms);
            }
        }

        // Start anything the work above enqueued.
        for (ticket, locator) in self.queue.start_ready(now_ms) {
            self.stats.loads_started += 1;
            loader.start(ticket, &locator);
        }

        self.sections.update(now_ms, progress);
        update.sections = self.sections.states();

        if !self.completed && target.0 >= self.completion_threshold() {
            self.completed = true;
            update.completed_now = true;
            info!(frame = target.0, "animation complete");
        }

        self.stats.cache_peak = self.stats.cache_peak.max(self.cache.len());
        update.settled = self.smoother.is_settled(now_ms, self.max_scroll_px);
        if let Some(display) = &update.display {
            self.stats.display_changes += 1;
            self.displayed = Some(display.index);
        }
        update
    }

    /// Backgrounding: stop consuming input and doing work until reset.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Full reset, for tab re-visibility or back-forward-cache restores:
    /// drops every timer and in-flight marker, zeroes the damped progress
    /// and frame markers, and reseeds the smoother at the given position.
    /// Loaded cache entries survive; pending ones are abandoned.
    pub fn reset(&mut self, now_ms: u64, position_px: f64) {
        self.queue.clear();
        self.routes.clear();
        self.cache.drop_pending();
        self.probe.cancel();
        self.smoother.reset(now_ms, position_px.max(0.0));
        self.sections.reset();
        self.last_target = None;
        self.displayed = None;
        self.completed = false;
        self.preload_due_ms = None;
        self.paused = false;
        debug!(position_px, "animation state reset");
    }

    /// User interaction with a cycling section (pauses its timer).
    pub fn interact_section(&mut self, now_ms: u64, index: usize) {
        self.sections.interact(now_ms, index);
    }

    pub fn progress(&self) -> f64 {
        self.smoother.damped()
    }

    pub fn total_frames(&self) -> u32 {
        self.total.0
    }

    pub fn displayed(&self) -> Option<FrameIndex> {
        self.displayed
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn loads_in_flight(&self) -> usize {
        self.queue.in_flight_len()
    }

    pub fn loads_idle(&self) -> bool {
        self.queue.is_idle()
    }

    pub fn stats(&self) -> ScrubStats {
        self.stats
    }

    fn completion_threshold(&self) -> u32 {
        // Within ~1% of the end, capped by the configured tail. The ceil
        // keeps the tail at least one frame on short sequences.
        let tail = self
            .config
            .completion_tail_frames
            .min((f64::from(self.total.0) * 0.01).ceil() as u32);
        self.total.0.saturating_sub(tail)
    }

    fn display_change(&self, index: FrameIndex, frame: Arc<PreparedFrame>) -> DisplayChange {
        DisplayChange {
            index,
            locator: self.pattern.resolve(index),
            frame,
        }
    }

    /// Resolve a new target frame against the cache: show it if loaded,
    /// otherwise start loading it and keep the previous frame on screen if
    /// it is still valid, else stand in with the nearest loaded neighbor.
    /// With no substitute in radius the display is left untouched (never a
    /// broken image).
    fn resolve_display(&mut self, target: FrameIndex, now_ms: u64) -> Option<DisplayChange> {
        let disposition = match self.cache.get(target) {
            Some(FrameState::Loaded(frame)) => Disposition::Show(frame.clone()),
            Some(_) => Disposition::Wait,
            None => Disposition::Missing,
        };
        match disposition {
            Disposition::Show(frame) => return Some(self.display_change(target, frame)),
            Disposition::Missing => self.ensure_loading(target, now_ms),
            Disposition::Wait => {}
        }

        let previous_still_valid = self
            .displayed
            .map(|index| self.cache.loaded(index).is_some())
            .unwrap_or(false);
        if previous_still_valid {
            return None;
        }
        let substitute = self.cache.nearest_loaded(target, self.config.fallback_radius)?;
        let frame = self.cache.loaded(substitute)?.clone();
        trace!(target = target.0, substitute = substitute.0, "showing stand-in frame");
        Some(self.display_change(substitute, frame))
    }

    /// Create a Pending record and queue a fetch, unless a record already
    /// exists (idempotent while Pending) or the frame is too far from the
    /// current position to be worth loading.
    fn ensure_loading(&mut self, index: FrameIndex, _now_ms: u64) {
        if !self.total.contains(index) || self.cache.contains(index) {
            return;
        }
        if let Some(current) = self.last_target.or(self.displayed) {
            let distance = current.distance_to(index);
            if distance > self.config.max_load_distance {
                debug!(
                    index = index.0,
                    current = current.0,
                    distance,
                    "skipping load, too far from current frame"
                );
                return;
            }
        }
        let locator = self.pattern.resolve(index);
        let ticket = self.queue.enqueue(locator);
        self.routes.insert(ticket, Route::Frame(index));
        self.cache.insert_pending(index, ticket);
    }

    /// Drain loader completions and expire stalled requests, routing each
    /// outcome to the cache or the probe. Completions for abandoned tickets
    /// (timed out or reset) are dropped.
    fn service_loads(&mut self, now_ms: u64, loader: &mut dyn ImageLoader) {
        for completion in loader.drain() {
            if !self.queue.settle(completion.ticket) {
                continue;
            }
            let Some(route) = self.routes.remove(&completion.ticket) else {
                continue;
            };
            match (route, completion.outcome) {
                (Route::Frame(index), Ok(frame)) => {
                    self.stats.loads_completed += 1;
                    self.cache.mark_loaded(index, frame);
                }
                (Route::Frame(index), Err(err)) => {
                    self.stats.loads_failed += 1;
                    warn!(index = index.0, error = %err, "frame load failed");
                    self.cache
                        .mark_error(index, now_ms + self.config.error_cooldown_ms);
                }
                (Route::Probe(index), outcome) => {
                    trace!(index = index.0, exists = outcome.is_ok(), "probe result");
                    self.probe.on_result(outcome.is_ok());
                }
            }
        }

        for ticket in self.queue.timed_out(now_ms) {
            self.stats.loads_timed_out += 1;
            let Some(route) = self.routes.remove(&ticket) else {
                continue;
            };
            match route {
                Route::Frame(index) => {
                    warn!(index = index.0, "frame load timed out");
                    self.cache
                        .mark_error(index, now_ms + self.config.error_cooldown_ms);
                }
                Route::Probe(_) => self.probe.on_result(false),
            }
        }

        for (ticket, locator) in self.queue.start_ready(now_ms) {
            self.stats.loads_started += 1;
            loader.start(ticket, &locator);
        }
    }

    /// Advance the frame-count probe by at most one existence check per
    /// tick, shrinking the total when the search lands short of it.
    fn drive_probe(&mut self, _now_ms: u64) {
        match self.probe.poll() {
            ProbeAction::Request(index) => {
                let locator = self.pattern.resolve(index);
                let ticket = self.queue.enqueue(locator);
                self.routes.insert(ticket, Route::Probe(index));
            }
            ProbeAction::Done { last_valid } => {
                let new_total = last_valid.map(|f| f.0 + 1).unwrap_or(1).max(1);
                if new_total < self.total.0 {
                    info!(from = self.total.0, to = new_total, "adjusting total frames");
                    self.total = FrameCount(new_total);
                }
            }
            ProbeAction::Idle | ProbeAction::Wait => {}
        }
    }

    /// Queue the preload window around `center` (ahead frames before behind
    /// frames, since scrolling is more often forward), then evict whatever
    /// the buffer bound no longer has room for.
    fn preload_and_evict(&mut self, center: FrameIndex, now_ms: u64) {
        let range = self.config.preload_range;
        let ahead = (f64::from(range) * 0.7).ceil() as u32;
        let behind = (f64::from(range) * 0.3).floor() as u32;
        let last = self.total.last();

        let ahead_end = center.0.saturating_add(ahead).min(last.0);
        for i in center.0.saturating_add(1)..=ahead_end {
            self.ensure_loading(FrameIndex(i), now_ms);
        }
        let behind_start = center.0.saturating_sub(behind);
        for i in (behind_start..center.0).rev() {
            self.ensure_loading(FrameIndex(i), now_ms);
        }

        let protect_lo = FrameIndex(behind_start);
        let protect_hi = FrameIndex(ahead_end.max(center.0));
        let evicted =
            self.cache
                .evict_excess(center, self.config.max_buffer_size, protect_lo, protect_hi);
        if evicted > 0 {
            self.stats.frames_evicted += evicted as u64;
            debug!(
                center = center.0,
                evicted,
                cached = self.cache.len(),
                "evicted distant frames"
            );
        }
    }
}
