use std::path::Path;

use crate::shared::frame::Frame;

/// Encodes RGB frames as still images.
pub trait ImageWriter: Send + Sync {
    /// Writes `frame` to `path`, picking the format from the extension.
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    /// Encodes `frame` in the format named by `extension` (e.g. `"png"`).
    fn encode(&self, frame: &Frame, extension: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>>;
}
