use crate::shared::face::FaceRecord;
use crate::shared::frame::Frame;

/// Finds faces in a frame and describes each one with an identity embedding.
///
/// Shared by every pipeline worker, so implementations synchronize any
/// internal session state themselves. Faces come back in detector order.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceRecord>, Box<dyn std::error::Error>>;
}
