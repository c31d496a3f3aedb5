use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, mpsc},
    thread,
};

use tracing::debug;

use crate::resolve::Locator;

/// Decoded raster frame in straight RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedFrame {
    pub width: u32,
    pub height: u32,
    /// Pixel bytes, row-major, tightly packed.
    pub rgba8: Arc<Vec<u8>>,
}

/// Identifies one load request across the queue/loader boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoadTicket(pub u64);

#[derive(Debug)]
pub struct LoadCompletion {
    pub ticket: LoadTicket,
    pub outcome: Result<Arc<PreparedFrame>, String>,
}

/// Injected load boundary. `start` must never block; completions arrive
/// later via `drain`, possibly out of the order they were started.
pub trait ImageLoader {
    fn start(&mut self, ticket: LoadTicket, locator: &Locator);
    fn drain(&mut self) -> Vec<LoadCompletion>;
}

struct Job {
    ticket: LoadTicket,
    locator: Locator,
}

/// Filesystem-backed loader: a small worker pool reads and decodes frames
/// relative to a root directory. Used by the CLI replay harness and by
/// fixture tests; a browser host would supply its own `ImageLoader`.
pub struct FsLoader {
    jobs: mpsc::Sender<Job>,
    done: mpsc::Receiver<LoadCompletion>,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>, workers: usize) -> Self {
        let root: PathBuf = root.into();
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (done_tx, done_rx) = mpsc::channel();
        let job_rx = Arc::new(Mutex::new(job_rx));
        for _ in 0..workers.max(1) {
            let rx = Arc::clone(&job_rx);
            let tx = done_tx.clone();
            let root = root.clone();
            thread::spawn(move || {
                loop {
                    let job = {
                        let Ok(guard) = rx.lock() else { return };
                        match guard.recv() {
                            Ok(job) => job,
                            Err(_) => return,
                        }
                    };
                    let outcome = decode_file(&root, &job.locator);
                    if tx
                        .send(LoadCompletion {
                            ticket: job.ticket,
                            outcome,
                        })
                        .is_err()
                    {
                        return;
                    }
                }
            });
        }
        Self {
            jobs: job_tx,
            done: done_rx,
        }
    }
}

fn decode_file(root: &Path, locator: &Locator) -> Result<Arc<PreparedFrame>, String> {
    let path = root.join(locator.path());
    let bytes = std::fs::read(&path).map_err(|e| format!("read {}: {e}", path.display()))?;
    let img =
        image::load_from_memory(&bytes).map_err(|e| format!("decode {}: {e}", path.display()))?;
    let rgba = img.to_rgba8();
    debug!(locator = %locator, width = rgba.width(), height = rgba.height(), "decoded frame");
    Ok(Arc::new(PreparedFrame {
        width: rgba.width(),
        height: rgba.height(),
        rgba8: Arc::new(rgba.into_raw()),
    }))
}

impl ImageLoader for FsLoader {
    fn start(&mut self, ticket: LoadTicket, locator: &Locator) {
        // Send only fails once the workers are gone, i.e. during teardown.
        let _ = self.jobs.send(Job {
            ticket,
            locator: locator.clone(),
        });
    }

    fn drain(&mut self) -> Vec<LoadCompletion> {
        self.done.try_iter().collect()
    }
}
