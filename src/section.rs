/// Widened activation band for `extended` sections once progress has
/// reached their target.
const EXTENDED_THRESHOLD: f64 = 0.1;

/// One narrative text/list section, activated around a target progress.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SectionSpec {
    /// Progress value at which this section is centered, in [0,1].
    pub target: f64,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Stays active longer: the band widens once progress passes the target.
    #[serde(default)]
    pub extended: bool,
    /// Never deactivates once shown (list sections stay visible to the end).
    #[serde(default)]
    pub sticky: bool,
    /// Number of cyclable sub-items; 1 means no cycling.
    #[serde(default = "default_items")]
    pub items: usize,
}

fn default_threshold() -> f64 {
    0.05
}

fn default_items() -> usize {
    1
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct SectionState {
    pub active: bool,
    /// Currently displayed sub-item for overflow content.
    pub item: usize,
}

#[derive(Debug)]
struct SectionCell {
    spec: SectionSpec,
    active: bool,
    item: usize,
    next_cycle_ms: Option<u64>,
    paused_until_ms: Option<u64>,
}

/// Pure per-tick projection of progress onto section activation, plus a
/// cycling timer for overflow content. Holds no cache and does no IO.
#[derive(Debug)]
pub struct SectionSet {
    cells: Vec<SectionCell>,
    cycle_interval_ms: u64,
    resume_idle_ms: u64,
}

impl SectionSet {
    pub fn new(specs: &[SectionSpec], cycle_interval_ms: u64, resume_idle_ms: u64) -> Self {
        let cells = specs
            .iter()
            .map(|spec| SectionCell {
                spec: spec.clone(),
                active: false,
                item: 0,
                next_cycle_ms: None,
                paused_until_ms: None,
            })
            .collect();
        Self {
            cells,
            cycle_interval_ms,
            resume_idle_ms,
        }
    }

    /// Re-derive every `active` flag from the current progress and advance
    /// cycling timers. Runs every tick, whether or not the frame changed.
    pub fn update(&mut self, now_ms: u64, progress: f64) {
        for cell in &mut self.cells {
            let threshold = if cell.spec.extended && progress >= cell.spec.target {
                EXTENDED_THRESHOLD
            } else {
                cell.spec.threshold
            };
            let within = (progress - cell.spec.target).abs() < threshold;
            cell.active = if cell.spec.sticky {
                cell.active || within
            } else {
                within
            };

            if !cell.active || cell.spec.items <= 1 {
                cell.next_cycle_ms = None;
                continue;
            }

            if let Some(paused_until) = cell.paused_until_ms {
                if now_ms < paused_until {
                    continue;
                }
                cell.paused_until_ms = None;
            }

            match cell.next_cycle_ms {
                None => cell.next_cycle_ms = Some(now_ms + self.cycle_interval_ms),
                Some(due) if now_ms >= due => {
                    cell.item = (cell.item + 1) % cell.spec.items;
                    cell.next_cycle_ms = Some(now_ms + self.cycle_interval_ms);
                }
                Some(_) => {}
            }
        }
    }

    /// User interaction with a section pauses its cycling; it resumes after
    /// an idle delay.
    pub fn interact(&mut self, now_ms: u64, index: usize) {
        if let Some(cell) = self.cells.get_mut(index) {
            cell.paused_until_ms = Some(now_ms + self.resume_idle_ms);
            cell.next_cycle_ms = None;
        }
    }

    pub fn states(&self) -> Vec<SectionState> {
        self.cells
            .iter()
            .map(|cell| SectionState {
                active: cell.active,
                item: cell.item,
            })
            .collect()
    }

    pub fn reset(&mut self) {
        for cell in &mut self.cells {
            cell.active = false;
            cell.item = 0;
            cell.next_cycle_ms = None;
            cell.paused_until_ms = None;
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
