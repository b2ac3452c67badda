use std::sync::Arc;

use thiserror::Error;

use crate::concealment::domain::face_concealer::FaceConcealer;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::whitelist::domain::whitelist::{SimilarityThreshold, Whitelist};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("frame {index} is unusable: {reason}")]
    Unusable { index: usize, reason: String },
}

/// A frame after concealment, with the number of faces the detector saw
/// (whitelisted ones included).
#[derive(Clone, Debug, PartialEq)]
pub struct ProcessedFrame {
    pub frame: Frame,
    pub face_count: usize,
}

/// Detect, filter by whitelist, conceal; one frame at a time.
///
/// Immutable after construction and shared by every pipeline worker.
pub struct FrameProcessor {
    detector: Arc<dyn FaceDetector>,
    whitelist: Arc<Whitelist>,
    threshold: SimilarityThreshold,
    concealer: Arc<dyn FaceConcealer>,
}

impl FrameProcessor {
    pub fn new(
        detector: Arc<dyn FaceDetector>,
        whitelist: Arc<Whitelist>,
        threshold: SimilarityThreshold,
        concealer: Arc<dyn FaceConcealer>,
    ) -> Self {
        Self {
            detector,
            whitelist,
            threshold,
            concealer,
        }
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    /// Conceals every non-whitelisted face in `frame`.
    ///
    /// Only a malformed frame is an error. A detector failure returns the
    /// frame untouched with a count of 0; a failure on one face leaves that
    /// face as is and moves on.
    pub fn process(&self, mut frame: Frame) -> Result<ProcessedFrame, FrameError> {
        if !frame.is_well_formed() {
            return Err(FrameError::Unusable {
                index: frame.index(),
                reason: format!(
                    "{}x{}x{} with {} bytes",
                    frame.width(),
                    frame.height(),
                    frame.channels(),
                    frame.data().len()
                ),
            });
        }

        let faces = match self.detector.detect(&frame) {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Face detection failed on frame {}: {e}", frame.index());
                return Ok(ProcessedFrame {
                    frame,
                    face_count: 0,
                });
            }
        };

        for (i, face) in faces.iter().enumerate() {
            let bbox = face.bbox.clamp_to(frame.width(), frame.height());
            if bbox.is_empty() {
                continue;
            }
            if self.whitelist.is_whitelisted(&face.embedding, self.threshold) {
                log::debug!("Frame {}: face {i} is whitelisted", frame.index());
                continue;
            }
            if let Err(e) = self.concealer.conceal(&mut frame, &bbox) {
                log::warn!("Frame {}: could not conceal face {i}: {e}", frame.index());
            }
        }

        Ok(ProcessedFrame {
            face_count: faces.len(),
            frame,
        })
    }
}
