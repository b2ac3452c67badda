use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::frame_processor::{FrameError, FrameProcessor, ProcessedFrame};
use crate::pipeline::job_state::JobState;
use crate::pipeline::pipeline_executor::{
    PipelineConfig, PipelineError, PipelineExecutor, PipelineOutcome, PipelineStats,
};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::ordered_worker_pool::{OrderedWorkerPool, WorkerPoolError};

type SendError = Box<dyn std::error::Error + Send + Sync>;

type Pool = OrderedWorkerPool<Frame, Result<ProcessedFrame, FrameError>>;

/// How the main loop ended when it did not fail.
enum LoopEnd {
    Exhausted { written: usize },
    Cancelled,
}

/// Executes the pipeline with a reader thread, a worker pool and a writer
/// thread.
///
/// Layout: `reader → main [dispatch/reorder] ⇄ workers, main → writer`
///
/// Frames are dispatched to the pool as they are read and collected in
/// batches of `batch_size`, strictly in read order. A unit whose
/// processing fails is replaced by its original frame, or dropped when the
/// original itself is malformed.
pub struct BatchedPipelineExecutor;

impl BatchedPipelineExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BatchedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for BatchedPipelineExecutor {
    fn execute(
        &self,
        reader: Box<dyn VideoReader>,
        mut writer: Box<dyn VideoWriter>,
        processor: Arc<FrameProcessor>,
        metadata: &VideoMetadata,
        output_path: &Path,
        mut config: PipelineConfig,
    ) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let batch_size = config.batch_size.max(1);
        let total = config
            .max_units
            .or((metadata.total_frames > 0).then_some(metadata.total_frames));

        writer
            .open(output_path, metadata)
            .map_err(|e| PipelineError::SinkOpen {
                path: output_path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.logger.info(&format!(
            "Processing {} frames with {} workers (batch {batch_size})",
            total.map_or("an unknown number of".to_string(), |t| t.to_string()),
            config.workers.max(1)
        ));

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Frame>(batch_size);
        let (write_tx, write_rx) = crossbeam_channel::bounded::<Frame>(batch_size);

        let reader_handle = spawn_reader(reader, frame_tx, config.job.clone(), config.max_units);
        let writer_handle = spawn_writer(writer, write_rx);

        let mut pool: Pool =
            OrderedWorkerPool::new(config.workers, batch_size, move |frame: Frame| {
                processor.process(frame)
            });

        let result = run_main_loop(&frame_rx, &write_tx, &mut pool, batch_size, total, &mut config);

        match &result {
            Ok(LoopEnd::Exhausted { .. }) => pool.shutdown(),
            _ => pool.abandon(),
        }
        drop(frame_rx);
        drop(write_tx);

        let joined = join_threads(reader_handle, writer_handle);

        let outcome = match result {
            Ok(LoopEnd::Cancelled) => {
                discard(output_path);
                config.logger.info("Cancelled; partial output removed");
                return Ok(PipelineOutcome::Cancelled);
            }
            Ok(LoopEnd::Exhausted { written }) => joined.map(|()| written),
            // the writer's own error explains a closed write channel better
            Err(PipelineError::SinkWrite(closed)) => {
                joined.and(Err(PipelineError::SinkWrite(closed)))
            }
            Err(e) => Err(e),
        };
        let written = match outcome {
            Ok(written) => written,
            Err(e) => {
                discard(output_path);
                return Err(e);
            }
        };

        check_artifact(output_path, config.min_artifact_bytes)?;

        let stats = PipelineStats {
            elapsed: started.elapsed(),
            units_written: written,
            faces_detected: config.job.faces_detected(),
            failed_units: config.job.failed_units(),
        };
        config.logger.summary(&stats);
        Ok(PipelineOutcome::Completed(stats))
    }
}

/// Reads frames until the source ends, `max_units` is reached or the job is
/// cancelled; cancellation is checked before every read.
fn spawn_reader(
    mut reader: Box<dyn VideoReader>,
    frame_tx: Sender<Frame>,
    job: Arc<JobState>,
    max_units: Option<usize>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        {
            let mut frames = reader.frames();
            let mut sent = 0usize;
            while !job.is_cancelled() && max_units.map_or(true, |max| sent < max) {
                match frames.next() {
                    Some(Ok(frame)) => {
                        if frame_tx.send(frame).is_err() {
                            break;
                        }
                        sent += 1;
                    }
                    Some(Err(e)) => {
                        log::warn!("Stopped reading after {sent} frames: {e}");
                        break;
                    }
                    None => break,
                }
            }
        }
        reader.close();
    })
}

fn spawn_writer(
    mut writer: Box<dyn VideoWriter>,
    write_rx: Receiver<Frame>,
) -> JoinHandle<Result<(), SendError>> {
    std::thread::spawn(move || {
        let written: Result<(), SendError> = write_rx.iter().try_for_each(|frame| {
            writer
                .write(&frame)
                .map_err(|e| -> SendError { e.to_string().into() })
        });
        let closed = writer
            .close()
            .map_err(|e| -> SendError { e.to_string().into() });
        written.and(closed)
    })
}

/// Dispatches frames to the pool and flushes them to the writer batch by
/// batch, checking for cancellation before each dispatch and each flush.
fn run_main_loop(
    frame_rx: &Receiver<Frame>,
    write_tx: &Sender<Frame>,
    pool: &mut Pool,
    batch_size: usize,
    total: Option<usize>,
    config: &mut PipelineConfig,
) -> Result<LoopEnd, PipelineError> {
    let mut batch: Vec<Frame> = Vec::with_capacity(batch_size);
    let mut next_index = 0usize;
    let mut written = 0usize;

    loop {
        if config.job.is_cancelled() {
            return Ok(LoopEnd::Cancelled);
        }
        let Ok(frame) = frame_rx.recv() else {
            break;
        };
        pool.submit(next_index, frame.clone())?;
        batch.push(frame);
        next_index += 1;

        if batch.len() == batch_size {
            let first = next_index - batch.len();
            if !flush_batch(&mut batch, first, pool, write_tx, &mut written, total, config)? {
                return Ok(LoopEnd::Cancelled);
            }
        }
    }

    // the source may have ended because of the cancellation
    if config.job.is_cancelled() {
        return Ok(LoopEnd::Cancelled);
    }
    if !batch.is_empty() {
        let first = next_index - batch.len();
        if !flush_batch(&mut batch, first, pool, write_tx, &mut written, total, config)? {
            return Ok(LoopEnd::Cancelled);
        }
    }
    Ok(LoopEnd::Exhausted { written })
}

/// Waits for every unit of the batch in index order, then writes them.
/// Returns `false` if the job was cancelled before the flush.
fn flush_batch(
    originals: &mut Vec<Frame>,
    first_index: usize,
    pool: &mut Pool,
    write_tx: &Sender<Frame>,
    written: &mut usize,
    total: Option<usize>,
    config: &mut PipelineConfig,
) -> Result<bool, PipelineError> {
    if config.job.is_cancelled() {
        return Ok(false);
    }

    let mut ready = Vec::with_capacity(originals.len());
    for (offset, original) in originals.drain(..).enumerate() {
        let index = first_index + offset;
        let frame = match pool.wait_for(index) {
            Ok(Ok(processed)) => {
                config.job.add_faces(processed.face_count);
                Some(processed.frame)
            }
            Ok(Err(e)) => substitute(&config.job, index, &e, original),
            Err(e @ WorkerPoolError::Panicked { .. }) => {
                substitute(&config.job, index, &e, original)
            }
            Err(e @ WorkerPoolError::Disconnected) => return Err(e.into()),
        };
        ready.extend(frame);
    }

    for frame in ready {
        write_tx
            .send(frame)
            .map_err(|_| PipelineError::SinkWrite("writer stopped accepting frames".to_string()))?;
        *written += 1;
        report_progress(&config.job, config.logger.as_mut(), *written, total);
    }
    Ok(true)
}

/// The original frame to write in place of a failed unit. `None` when the
/// original cannot be encoded either.
fn substitute(
    job: &JobState,
    index: usize,
    error: &dyn std::fmt::Display,
    original: Frame,
) -> Option<Frame> {
    job.record_failure();
    if !original.is_well_formed() {
        log::warn!("Frame {index} failed ({error}); skipping it");
        return None;
    }
    log::warn!("Frame {index} failed ({error}); writing it unprocessed");
    Some(original)
}

fn report_progress(
    job: &JobState,
    logger: &mut dyn PipelineLogger,
    written: usize,
    total: Option<usize>,
) {
    if let Some(percent) = total.and_then(|t| job.record_progress(written, t)) {
        logger.progress(percent);
    }
}

/// Joins both I/O threads, preferring a writer error over a reader panic.
fn join_threads(
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<Result<(), SendError>>,
) -> Result<(), PipelineError> {
    let reader = reader_handle
        .join()
        .map_err(|_| PipelineError::ThreadPanicked("reader"));
    let writer = match writer_handle.join() {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PipelineError::SinkWrite(e.to_string())),
        Err(_) => Err(PipelineError::ThreadPanicked("writer")),
    };
    writer.and(reader)
}

/// Rejects outputs below `minimum` bytes, deleting them. 0 disables the check.
fn check_artifact(path: &Path, minimum: u64) -> Result<(), PipelineError> {
    if minimum == 0 {
        return Ok(());
    }
    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if size < minimum {
        discard(path);
        return Err(PipelineError::ArtifactTooSmall {
            path: path.to_path_buf(),
            size,
            minimum,
        });
    }
    Ok(())
}

fn discard(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Could not remove {}: {e}", path.display()),
    }
}
