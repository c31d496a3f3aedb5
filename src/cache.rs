use std::collections::HashMap;
use std::sync::Arc;

use crate::core::FrameIndex;
use crate::loader::{LoadTicket, PreparedFrame};

#[derive(Clone, Debug)]
pub enum FrameState {
    Pending { ticket: LoadTicket },
    Loaded(Arc<PreparedFrame>),
    Error { retry_at_ms: u64 },
}

/// Bounded mapping from frame index to load state. Eviction is
/// distance-based: entries furthest from the current frame go first, and the
/// current frame plus the active preload window always survive.
#[derive(Debug, Default)]
pub struct FrameCache {
    entries: HashMap<FrameIndex, FrameState>,
}

impl FrameCache {
    pub fn get(&self, index: FrameIndex) -> Option<&FrameState> {
        self.entries.get(&index)
    }

    pub fn contains(&self, index: FrameIndex) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn loaded(&self, index: FrameIndex) -> Option<&Arc<PreparedFrame>> {
        match self.entries.get(&index) {
            Some(FrameState::Loaded(frame)) => Some(frame),
            _ => None,
        }
    }

    /// Create a Pending record unless one already exists for this index.
    /// Returns false when a record (any state) is already present.
    pub fn insert_pending(&mut self, index: FrameIndex, ticket: LoadTicket) -> bool {
        if self.entries.contains_key(&index) {
            return false;
        }
        self.entries.insert(index, FrameState::Pending { ticket });
        true
    }

    /// Pending -> Loaded. Any other state is left alone so late settles
    /// (after eviction or reset) are harmless.
    pub fn mark_loaded(&mut self, index: FrameIndex, frame: Arc<PreparedFrame>) -> bool {
        match self.entries.get_mut(&index) {
            Some(state @ FrameState::Pending { .. }) => {
                *state = FrameState::Loaded(frame);
                true
            }
            _ => false,
        }
    }

    /// Pending -> Error, scheduled for deletion once the cooldown passes.
    pub fn mark_error(&mut self, index: FrameIndex, retry_at_ms: u64) -> bool {
        match self.entries.get_mut(&index) {
            Some(state @ FrameState::Pending { .. }) => {
                *state = FrameState::Error { retry_at_ms };
                true
            }
            _ => false,
        }
    }

    /// Delete Error records whose cooldown has elapsed so a later load
    /// attempt retries them.
    pub fn purge_expired_errors(&mut self, now_ms: u64) {
        self.entries
            .retain(|_, state| !matches!(state, FrameState::Error { retry_at_ms } if *retry_at_ms <= now_ms));
    }

    /// Nearest Loaded frame within `radius` of `center`, scanning outward
    /// one step at a time and preferring the lower index on ties.
    pub fn nearest_loaded(&self, center: FrameIndex, radius: u32) -> Option<FrameIndex> {
        for d in 1..=radius {
            if center.0 >= d {
                let below = FrameIndex(center.0 - d);
                if self.loaded(below).is_some() {
                    return Some(below);
                }
            }
            let above = FrameIndex(center.0.saturating_add(d));
            if self.loaded(above).is_some() {
                return Some(above);
            }
        }
        None
    }

    /// When over `max_size`, drop entries furthest from `center` until the
    /// bound holds again. Never drops `center`, anything inside the
    /// protected window, or Pending records (their settle routing is live).
    /// Returns the number of evicted entries.
    pub fn evict_excess(
        &mut self,
        center: FrameIndex,
        max_size: usize,
        protect_lo: FrameIndex,
        protect_hi: FrameIndex,
    ) -> usize {
        if self.entries.len() <= max_size {
            return 0;
        }
        let mut victims: Vec<FrameIndex> = self
            .entries
            .iter()
            .filter(|(index, state)| {
                **index != center
                    && !(protect_lo..=protect_hi).contains(*index)
                    && !matches!(state, FrameState::Pending { .. })
            })
            .map(|(index, _)| *index)
            .collect();
        victims.sort_by_key(|index| std::cmp::Reverse(index.distance_to(center)));

        let mut evicted = 0;
        for victim in victims {
            if self.entries.len() <= max_size {
                break;
            }
            self.entries.remove(&victim);
            evicted += 1;
        }
        evicted
    }

    pub fn highest_loaded(&self) -> Option<FrameIndex> {
        self.entries
            .iter()
            .filter(|(_, state)| matches!(state, FrameState::Loaded(_)))
            .map(|(index, _)| *index)
            .max()
    }

    /// Drop Pending records. Used on reset, when their tickets have been
    /// abandoned and no settle will ever arrive.
    pub fn drop_pending(&mut self) {
        self.entries
            .retain(|_, state| !matches!(state, FrameState::Pending { .. }));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
