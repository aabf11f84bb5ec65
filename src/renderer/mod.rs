mod machinery;
mod post_process;
mod worker;

use std::num::NonZeroUsize;

use thiserror::Error;

pub use machinery::{RenderProgress, render_all, render_frame};
pub use post_process::{EDGE_THRESHOLD, PostProcess};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum WorkerCount {
    /// One worker per core reported by the OS
    #[default]
    Auto,
    Manual(NonZeroUsize),
}

#[derive(Clone, Debug, Default)]
pub struct RenderSettings {
    pub worker_count: WorkerCount,
    /// Applied in order once all rows are written
    pub post_process: Vec<PostProcess>,
    /// Pin each worker thread to its own core
    pub pin_threads: bool,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Unable to detect the number of CPU cores")]
    UnknownConcurrency,
    #[error("Failed to spawn a render worker")]
    ThreadSpawn(#[from] std::io::Error),
}
