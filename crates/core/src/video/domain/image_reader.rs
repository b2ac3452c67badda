use std::path::Path;

use crate::shared::frame::Frame;

/// Decodes still images into RGB frames.
pub trait ImageReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>>;

    /// Decodes an in-memory image (e.g. one embedded in a document).
    fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>>;
}
