/// Fork/join recording of thread-local command buffers

use std::thread;
use crate::command::{CommandBuffer, CommandBufferState};
use crate::device::{CommandBufferKind, Framebuffer};
use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use crate::{rhi_bail_warn, rhi_debug};

/// Record `items` on worker threads, then merge into `primary`
///
/// `items` is split into contiguous chunks, one per worker buffer. Each
/// worker records its chunk into its own ThreadLocal buffer on a scoped
/// thread; `primary` is never touched concurrently. After every thread has
/// joined, the worker buffers are merged into `primary` in worker index
/// order, so the merged stream is deterministic regardless of scheduling.
///
/// `primary` must be a `Written` Executable buffer recorded for
/// `framebuffer`. Every worker is checked before the first merge, so a
/// failure while recording or validating resets the workers and leaves
/// `primary` unchanged. Only a backend failure in the middle of the merge
/// can leave `primary` holding the streams of the workers merged before it;
/// the remaining workers are reset in that case too.
pub fn record_in_parallel<T, F>(
    primary: &mut CommandBuffer,
    workers: &mut [CommandBuffer],
    items: &[T],
    framebuffer: &dyn Framebuffer,
    pipeline: &Pipeline,
    record: F,
) -> Result<()>
where
    T: Sync,
    F: Fn(usize, &mut CommandBuffer, &[T]) -> Result<()> + Sync,
{
    if primary.kind() != CommandBufferKind::Executable || primary.state() != CommandBufferState::Written {
        rhi_bail_warn!("lumen::CommandBuffer",
            "Parallel recording needs a Written Executable primary (got {:?} {:?})",
            primary.state(), primary.kind());
    }
    if !primary.targets(framebuffer) {
        rhi_bail_warn!("lumen::CommandBuffer", "Parallel recording targets another framebuffer than the primary");
    }
    if workers.iter().any(|w| w.kind() != CommandBufferKind::ThreadLocal || w.state() != CommandBufferState::Idle) {
        rhi_bail_warn!("lumen::CommandBuffer", "Parallel recording needs Idle ThreadLocal worker buffers");
    }
    if items.is_empty() {
        return Ok(());
    }
    if workers.is_empty() {
        rhi_bail_warn!("lumen::CommandBuffer", "Parallel recording of {} items with no worker buffers", items.len());
    }

    let chunk_size = items.len().div_ceil(workers.len());
    let used = items.len().div_ceil(chunk_size);
    let record = &record;

    let results: Vec<Result<()>> = thread::scope(|scope| {
        let handles: Vec<_> = workers
            .iter_mut()
            .zip(items.chunks(chunk_size))
            .enumerate()
            .map(|(index, (worker, chunk))| {
                scope.spawn(move || -> Result<()> {
                    worker.begin_writing(framebuffer, pipeline)?;
                    record(index, worker, chunk)?;
                    worker.end_writing()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .unwrap_or_else(|_| Err(Error::BackendError("Recording thread panicked".to_string())))
            })
            .collect()
    });

    let failure = results
        .into_iter()
        .find_map(|r| r.err())
        .or_else(|| workers.iter().take(used).find_map(|w| primary.check_mergeable(w).err()));
    if let Some(err) = failure {
        for worker in workers.iter_mut().take(used) {
            worker.reset()?;
        }
        return Err(err);
    }

    for index in 0..used {
        if let Err(err) = primary.add_commands(&mut workers[index]) {
            for worker in workers.iter_mut().take(used).skip(index) {
                worker.reset()?;
            }
            return Err(err);
        }
    }

    rhi_debug!("lumen::CommandBuffer", "Merged {} thread-local buffers ({} items)", used, items.len());
    Ok(())
}
