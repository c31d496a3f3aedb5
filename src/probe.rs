use crate::core::{FrameCount, FrameIndex};

/// Iterative binary search over real image-existence checks, used to refine
/// the total frame count downward when trailing frames are missing at
/// deploy time. One check is outstanding at a time; results arrive through
/// the same load path as ordinary frames.
#[derive(Debug)]
pub struct TotalProbe {
    interval_frames: u32,
    tail_fraction: f64,
    state: State,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Running {
        low: i64,
        high: i64,
        awaiting: Option<i64>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeAction {
    /// No probe running.
    Idle,
    /// Waiting on an outstanding existence check.
    Wait,
    /// Issue an existence check for this frame.
    Request(FrameIndex),
    /// Search finished; `last_valid` is the highest existing frame, or
    /// `None` when not even frame 0 exists.
    Done { last_valid: Option<FrameIndex> },
}

impl TotalProbe {
    pub fn new(interval_frames: u32, tail_fraction: f64) -> Self {
        Self {
            interval_frames: interval_frames.max(1),
            tail_fraction,
            state: State::Idle,
        }
    }

    /// Probe on round-number frames (frame 0 excluded, nothing is known
    /// yet at the start) and near the expected end, and only when no
    /// search is already running.
    pub fn should_start(&self, target: FrameIndex, total: FrameCount) -> bool {
        matches!(self.state, State::Idle)
            && ((target.0 > 0 && target.0 % self.interval_frames == 0)
                || f64::from(target.0) > f64::from(total.0) * self.tail_fraction)
    }

    /// Start a search over `[low, high_inclusive]`. `low` seeds from the
    /// highest frame already known valid so repeat probes stay cheap.
    pub fn begin(&mut self, low: FrameIndex, high_inclusive: FrameIndex) {
        self.state = State::Running {
            low: i64::from(low.0),
            high: i64::from(high_inclusive.0),
            awaiting: None,
        };
    }

    pub fn poll(&mut self) -> ProbeAction {
        match self.state {
            State::Idle => ProbeAction::Idle,
            State::Running {
                awaiting: Some(_), ..
            } => ProbeAction::Wait,
            State::Running {
                low,
                high,
                awaiting: None,
            } => {
                if low > high {
                    self.state = State::Idle;
                    let last = low - 1;
                    let last_valid = if last >= 0 {
                        Some(FrameIndex(last as u32))
                    } else {
                        None
                    };
                    ProbeAction::Done { last_valid }
                } else {
                    let mid = (low + high) / 2;
                    self.state = State::Running {
                        low,
                        high,
                        awaiting: Some(mid),
                    };
                    ProbeAction::Request(FrameIndex(mid as u32))
                }
            }
        }
    }

    pub fn on_result(&mut self, exists: bool) {
        if let State::Running {
            low,
            high,
            awaiting: Some(mid),
        } = self.state
        {
            self.state = if exists {
                State::Running {
                    low: mid + 1,
                    high,
                    awaiting: None,
                }
            } else {
                State::Running {
                    low,
                    high: mid - 1,
                    awaiting: None,
                }
            };
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    pub fn cancel(&mut self) {
        self.state = State::Idle;
    }
}
