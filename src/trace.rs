use crate::error::{ScrubError, ScrubResult};

/// One recorded scroll event for replay.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct TraceEvent {
    pub at_ms: u64,
    pub position_px: f64,
}

/// A recorded scroll session: the container geometry plus the raw event
/// stream, in the order it was produced.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ScrollTrace {
    pub max_scroll_px: f64,
    pub events: Vec<TraceEvent>,
}

impl ScrollTrace {
    pub fn from_reader(reader: impl std::io::Read) -> ScrubResult<Self> {
        let trace: ScrollTrace =
            serde_json::from_reader(reader).map_err(|e| ScrubError::trace(e.to_string()))?;
        trace.validate()?;
        Ok(trace)
    }

    pub fn validate(&self) -> ScrubResult<()> {
        if !(self.max_scroll_px > 0.0) || !self.max_scroll_px.is_finite() {
            return Err(ScrubError::trace("max_scroll_px must be finite and > 0"));
        }
        let mut prev = 0u64;
        for (i, event) in self.events.iter().enumerate() {
            if !event.position_px.is_finite() {
                return Err(ScrubError::trace(format!("event {i}: non-finite position")));
            }
            if event.at_ms < prev {
                return Err(ScrubError::trace(format!(
                    "event {i}: timestamps must be non-decreasing"
                )));
            }
            prev = event.at_ms;
        }
        Ok(())
    }

    pub fn end_ms(&self) -> u64 {
        self.events.last().map(|e| e.at_ms).unwrap_or(0)
    }
}
