use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::assembly::domain::media_assembler::AssemblyError;
use crate::pipeline::frame_processor::{FrameError, FrameProcessor};
use crate::pipeline::infrastructure::ordered_worker_pool::WorkerPoolError;
use crate::pipeline::job_state::JobState;
use crate::pipeline::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use crate::shared::constants::{default_worker_count, DEFAULT_BATCH_SIZE, MIN_ARTIFACT_BYTES};
use crate::shared::time_range::TimeRangeError;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("cannot open {}: {reason}", path.display())]
    SourceOpen { path: PathBuf, reason: String },
    #[error("cannot open output {}: {reason}", path.display())]
    SinkOpen { path: PathBuf, reason: String },
    #[error(transparent)]
    InvalidRange(#[from] TimeRangeError),
    #[error("seek failed: {0}")]
    Seek(String),
    #[error("writing output failed: {0}")]
    SinkWrite(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    WorkerPool(#[from] WorkerPoolError),
    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),
    #[error("output {} is only {size} bytes (minimum {minimum}); the encoder probably failed", path.display())]
    ArtifactTooSmall {
        path: PathBuf,
        size: u64,
        minimum: u64,
    },
    #[error("pipeline already executed")]
    AlreadyExecuted,
    #[error("document error: {0}")]
    Document(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// Aggregate numbers for a completed run.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineStats {
    pub elapsed: Duration,
    pub units_written: usize,
    pub faces_detected: usize,
    pub failed_units: usize,
}

impl PipelineStats {
    /// Units per second, if any time elapsed.
    pub fn throughput(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.units_written as f64 / secs)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PipelineOutcome {
    Completed(PipelineStats),
    /// Stopped on request; no output artifact was left behind.
    Cancelled,
}

/// Configuration for a pipeline execution run.
pub struct PipelineConfig {
    /// Units awaited together, in index order, before any is written.
    pub batch_size: usize,
    pub workers: usize,
    /// Stop after this many units (bounded time ranges).
    pub max_units: Option<usize>,
    /// Outputs smaller than this are rejected; 0 disables the check.
    pub min_artifact_bytes: u64,
    pub job: Arc<JobState>,
    pub logger: Box<dyn PipelineLogger>,
}

impl PipelineConfig {
    pub fn new(job: Arc<JobState>) -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            workers: default_worker_count(),
            max_units: None,
            min_artifact_bytes: MIN_ARTIFACT_BYTES,
            job,
            logger: Box::new(NullPipelineLogger),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(Arc::new(JobState::new()))
    }
}

/// Abstracts how the read → process → write pipeline is executed.
///
/// This is a port (application-layer interface). Infrastructure provides
/// concrete implementations. The reader must already be opened (and
/// positioned); the executor opens the writer itself.
pub trait PipelineExecutor: Send {
    fn execute(
        &self,
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        processor: Arc<FrameProcessor>,
        metadata: &VideoMetadata,
        output_path: &Path,
        config: PipelineConfig,
    ) -> Result<PipelineOutcome, PipelineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_throughput() {
        let stats = PipelineStats {
            elapsed: Duration::from_millis(2500),
            units_written: 100,
            faces_detected: 0,
            failed_units: 0,
        };
        assert_relative_eq!(stats.throughput().unwrap(), 40.0);
    }

    #[test]
    fn test_throughput_unknown_without_elapsed_time() {
        let stats = PipelineStats {
            elapsed: Duration::ZERO,
            units_written: 3,
            faces_detected: 0,
            failed_units: 0,
        };
        assert!(stats.throughput().is_none());
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.batch_size, 15);
        assert!((1..=4).contains(&config.workers));
        assert_eq!(config.max_units, None);
        assert_eq!(config.min_artifact_bytes, 1024);
        assert!(!config.job.is_cancelled());
    }

    #[test]
    fn test_artifact_error_message() {
        let err = PipelineError::ArtifactTooSmall {
            path: PathBuf::from("/tmp/out.mp4"),
            size: 10,
            minimum: 1024,
        };
        assert!(err.to_string().contains("10 bytes (minimum 1024)"));
    }
}
