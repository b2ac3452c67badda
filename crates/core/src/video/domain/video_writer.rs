use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Sequential frame sink producing a video-only file.
pub trait VideoWriter: Send {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered packets and finalizes the container.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
