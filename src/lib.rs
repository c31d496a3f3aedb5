#![forbid(unsafe_code)]

pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod loader;
pub mod probe;
pub mod queue;
pub mod resolve;
pub mod scrub;
pub mod section;
pub mod smooth;
pub mod trace;

pub use cache::{FrameCache, FrameState};
pub use config::EngineConfig;
pub use core::{FrameCount, FrameIndex, clamp_progress, frame_for_progress};
pub use error::{ScrubError, ScrubResult};
pub use loader::{FsLoader, ImageLoader, LoadCompletion, LoadTicket, PreparedFrame};
pub use probe::{ProbeAction, TotalProbe};
pub use queue::LoadQueue;
pub use resolve::{FramePattern, ImageExt, Locator};
pub use scrub::{DisplayChange, ScrubStats, Scrubber, TickUpdate};
pub use section::{SectionSpec, SectionState};
pub use smooth::{ScrollSample, ScrollSmoother};
pub use trace::{ScrollTrace, TraceEvent};
