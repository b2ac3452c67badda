use std::path::Path;
use std::sync::Arc;

use crate::assembly::domain::media_assembler::{AssemblyOutcome, MediaAssembler};
use crate::shared::constants::SEEK_DRIFT_TOLERANCE;
use crate::shared::time_range::TimeRange;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::frame_processor::FrameProcessor;
use super::pipeline_executor::{
    PipelineConfig, PipelineError, PipelineExecutor, PipelineOutcome, PipelineStats,
};

/// Container used for the intermediate video when the output has no extension.
const FALLBACK_CONTAINER: &str = "mp4";

#[derive(Clone, Debug, PartialEq)]
pub enum VideoJobOutcome {
    Completed {
        stats: PipelineStats,
        assembly: AssemblyOutcome,
    },
    Cancelled,
}

/// Orchestrates a video job: open, seek to the requested range, run the
/// frame pipeline into a temporary video, then restore the audio.
///
/// This is a single-use struct: `execute` consumes the owned components,
/// so calling it twice fails with [`PipelineError::AlreadyExecuted`].
pub struct ConcealVideoUseCase {
    reader: Option<Box<dyn VideoReader>>,
    writer: Option<Box<dyn VideoWriter>>,
    processor: Arc<FrameProcessor>,
    executor: Box<dyn PipelineExecutor>,
    assembler: MediaAssembler,
    config: Option<PipelineConfig>,
}

impl ConcealVideoUseCase {
    pub fn new(
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        processor: Arc<FrameProcessor>,
        executor: Box<dyn PipelineExecutor>,
        assembler: MediaAssembler,
        config: PipelineConfig,
    ) -> Self {
        Self {
            reader: Some(reader),
            writer: Some(writer),
            processor,
            executor,
            assembler,
            config: Some(config),
        }
    }

    pub fn execute(
        &mut self,
        source: &Path,
        output: &Path,
        range: &TimeRange,
    ) -> Result<VideoJobOutcome, PipelineError> {
        let mut reader = self.reader.take().ok_or(PipelineError::AlreadyExecuted)?;
        let writer = self.writer.take().ok_or(PipelineError::AlreadyExecuted)?;
        let mut config = self.config.take().ok_or(PipelineError::AlreadyExecuted)?;

        let metadata = reader
            .open(source)
            .map_err(|e| PipelineError::SourceOpen {
                path: source.to_path_buf(),
                reason: e.to_string(),
            })?;
        log::info!(
            "Opened {} ({}x{}, {:.2} fps, {} frames, {})",
            source.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.total_frames,
            metadata.codec
        );

        let span = match range.unit_span(metadata.fps, metadata.total_frames) {
            Ok(span) => span,
            Err(e) => {
                reader.close();
                return Err(e.into());
            }
        };
        if span.start > 0 {
            let landed = match reader.seek(span.start) {
                Ok(landed) => landed,
                Err(e) => {
                    reader.close();
                    return Err(PipelineError::Seek(e.to_string()));
                }
            };
            if landed.abs_diff(span.start) > SEEK_DRIFT_TOLERANCE {
                log::warn!(
                    "Seek landed on frame {landed}, {} frames from requested frame {}",
                    landed.abs_diff(span.start),
                    span.start
                );
            }
        }
        config.max_units = span.len;

        let temp = tempfile::Builder::new().prefix("faceveil").tempdir()?;
        let extension = output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or(FALLBACK_CONTAINER);
        let processed = temp.path().join(format!("processed.{extension}"));

        let outcome = self.executor.execute(
            reader,
            writer,
            self.processor.clone(),
            &metadata,
            &processed,
            config,
        )?;
        let stats = match outcome {
            PipelineOutcome::Completed(stats) => stats,
            PipelineOutcome::Cancelled => {
                log::info!("Job cancelled; no output written");
                return Ok(VideoJobOutcome::Cancelled);
            }
        };

        let slice = range.audio_slice(metadata.duration_secs());
        let assembly = self.assembler.assemble(&processed, source, output, &slice)?;
        Ok(VideoJobOutcome::Completed { stats, assembly })
    }
}
