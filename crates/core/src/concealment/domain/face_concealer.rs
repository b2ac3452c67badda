use crate::shared::face::BoundingBox;
use crate::shared::frame::Frame;

/// Conceals one face region of a frame in place.
///
/// Implementations must leave every pixel outside `bbox` untouched. The box
/// is already clamped to the frame; zero-area boxes are a no-op.
pub trait FaceConcealer: Send + Sync {
    fn conceal(
        &self,
        frame: &mut Frame,
        bbox: &BoundingBox,
    ) -> Result<(), Box<dyn std::error::Error>>;
}
