use std::path::Path;
use std::sync::Arc;

use crate::pipeline::frame_processor::FrameProcessor;
use crate::pipeline::pipeline_executor::PipelineError;
use crate::video::domain::image_reader::ImageReader;
use crate::video::domain::image_writer::ImageWriter;

/// Single-image pipeline: read → process → write.
pub struct ConcealImageUseCase {
    reader: Box<dyn ImageReader>,
    writer: Box<dyn ImageWriter>,
    processor: Arc<FrameProcessor>,
}

impl ConcealImageUseCase {
    pub fn new(
        reader: Box<dyn ImageReader>,
        writer: Box<dyn ImageWriter>,
        processor: Arc<FrameProcessor>,
    ) -> Self {
        Self {
            reader,
            writer,
            processor,
        }
    }

    /// Conceals faces in `input_path` and writes the result to `output_path`.
    /// Returns the number of faces detected.
    pub fn execute(&self, input_path: &Path, output_path: &Path) -> Result<usize, PipelineError> {
        let frame = self
            .reader
            .read(input_path)
            .map_err(|e| PipelineError::SourceOpen {
                path: input_path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let processed = self.processor.process(frame)?;
        log::info!(
            "{}: {} face(s) detected",
            input_path.display(),
            processed.face_count
        );

        self.writer
            .write(output_path, &processed.frame)
            .map_err(|e| PipelineError::SinkWrite(format!("{}: {e}", output_path.display())))?;
        Ok(processed.face_count)
    }
}
