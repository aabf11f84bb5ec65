use std::{
    panic,
    sync::{Mutex, PoisonError},
    thread,
    time::Instant,
};

use core_affinity::CoreId;

use crate::{
    camera::Camera,
    geometry::ScreenPoint,
    render_target::{FrameBuffer, RenderTarget},
    renderer::{RenderError, RenderSettings, WorkerCount, worker::Worker},
    scene::{Object, Scene},
    util::Rgba,
};

/// Snapshot of how far a render pass got.
/// Counts claimed rows, some of which may still be in progress.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RenderProgress {
    pub claimed: u32,
    pub total: u32,
}

impl RenderProgress {
    pub fn percent(&self) -> f32 {
        if self.total == 0 {
            100.0
        } else {
            100.0 * (self.claimed as f32) / (self.total as f32)
        }
    }
}

/// Row counter shared by the workers of one render pass.
struct RowCursor {
    next_row: Mutex<u32>,
    height: u32,
}

impl RowCursor {
    fn new(height: u32) -> Self {
        RowCursor {
            next_row: Mutex::new(0),
            height,
        }
    }

    /// Claims the next unrendered row, None once all rows are handed out.
    fn claim(&self) -> Option<(u32, RenderProgress)> {
        let mut next_row = self.next_row.lock().unwrap_or_else(PoisonError::into_inner);
        let row = *next_row;
        if row >= self.height {
            return None;
        }
        *next_row += 1;

        Some((
            row,
            RenderProgress {
                claimed: row + 1,
                total: self.height,
            },
        ))
    }
}

/// Renders every pixel of `target` exactly once by calling `per_pixel`,
/// distributing rows over worker threads.
/// Returns after all workers have finished. Panics in workers are propagated.
#[tracing::instrument(skip_all, fields(width = target.size().x, height = target.size().y))]
pub fn render_all<T, F, P>(
    target: &T,
    settings: &RenderSettings,
    per_pixel: F,
    progress: P,
) -> Result<(), RenderError>
where
    T: RenderTarget + ?Sized,
    F: Fn(ScreenPoint) -> Rgba + Sync,
    P: Fn(RenderProgress) + Sync,
{
    let cores = worker_cores(settings, core_affinity::get_core_ids())?;
    tracing::debug!(workers = cores.len(), pinned = settings.pin_threads, "starting workers");

    let started = Instant::now();
    let cursor = RowCursor::new(target.size().y);
    let width = target.size().x;

    let (cursor, per_pixel, progress) = (&cursor, &per_pixel, &progress);

    thread::scope(|scope| -> Result<(), RenderError> {
        let threads = cores
            .into_iter()
            .enumerate()
            .map(|(worker_id, core)| {
                thread::Builder::new()
                    .name(format!("worker{worker_id}"))
                    .spawn_scoped(scope, move || {
                        if let Some(core) = core {
                            core_affinity::set_for_current(core);
                        }

                        let mut worker = Worker::new(worker_id, width);
                        while let Some((row, row_progress)) = cursor.claim() {
                            tracing::debug!(
                                "{:.0}% rows claimed",
                                row_progress.percent()
                            );
                            progress(row_progress);
                            worker.render_row(target, row, per_pixel);
                        }

                        tracing::trace!(
                            worker = worker.id(),
                            rows = worker.rendered_rows(),
                            "worker finished"
                        );
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for handle in threads {
            if let Err(payload) = handle.join() {
                panic::resume_unwind(payload);
            }
        }
        Ok(())
    })?;

    tracing::info!(elapsed = ?started.elapsed(), "render finished");
    Ok(())
}

/// Renders the scene as seen by the camera into a new buffer,
/// then runs the configured post processing.
pub fn render_frame<O, P>(
    scene: &Scene<O>,
    camera: &Camera,
    settings: &RenderSettings,
    progress: P,
) -> Result<FrameBuffer, RenderError>
where
    O: Object + Send + Sync + ?Sized,
    P: Fn(RenderProgress) + Sync,
{
    let mut buffer = FrameBuffer::new(camera.get_resolution());
    render_all(
        &buffer,
        settings,
        |point| scene.color_for(&camera.ray(&point)),
        progress,
    )?;

    for step in &settings.post_process {
        step.apply(&mut buffer);
    }

    Ok(buffer)
}

/// One entry per worker, with the core to pin it to.
/// `available` is the core list reported by the OS, if any.
fn worker_cores(
    settings: &RenderSettings,
    available: Option<Vec<CoreId>>,
) -> Result<Vec<Option<CoreId>>, RenderError> {
    let available = available.filter(|cores| !cores.is_empty());

    match settings.worker_count {
        WorkerCount::Auto => {
            let cores = available.ok_or(RenderError::UnknownConcurrency)?;
            Ok(cores
                .into_iter()
                .map(|core| settings.pin_threads.then_some(core))
                .collect())
        }
        WorkerCount::Manual(count) => {
            let count = count.get();
            match available {
                Some(cores) if settings.pin_threads => {
                    Ok(cores.into_iter().cycle().take(count).map(Some).collect())
                }
                None if settings.pin_threads => {
                    tracing::warn!("CPU list is not available, workers will not be pinned");
                    Ok(vec![None; count])
                }
                _ => Ok(vec![None; count]),
            }
        }
    }
}
