use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;

/// Sequential frame source.
///
/// Decoding is assumed to be sequential-only: `frames` yields frames in
/// presentation order starting from wherever the reader is positioned.
pub trait VideoReader: Send {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>>;

    /// Positions the reader so the next frame yielded is as close to
    /// `frame_index` as the container allows, and returns the index it
    /// actually landed on. Callers must tolerate drift.
    fn seek(&mut self, frame_index: usize) -> Result<usize, Box<dyn std::error::Error>>;

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    fn close(&mut self);
}
