use std::path::Path;
use std::sync::Arc;

use crate::document::domain::document_container::{
    DocumentContainer, EmbeddedImage, ReplacementMode,
};
use crate::video::domain::image_reader::ImageReader;
use crate::video::domain::image_writer::ImageWriter;

use super::frame_processor::FrameProcessor;
use super::job_state::JobState;
use super::pipeline_executor::PipelineError;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DocumentReport {
    pub images_seen: usize,
    pub images_modified: usize,
    pub faces_detected: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DocumentJobOutcome {
    Completed(DocumentReport),
    /// Stopped between images; nothing was saved.
    Cancelled,
}

/// Conceals faces in every image embedded in a document.
///
/// Images are processed one at a time in container order. An image that
/// cannot be extracted, decoded or re-encoded is left untouched; only
/// images in which at least one face was found are replaced.
pub struct ConcealDocumentUseCase {
    reader: Box<dyn ImageReader>,
    writer: Box<dyn ImageWriter>,
    processor: Arc<FrameProcessor>,
}

impl ConcealDocumentUseCase {
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

    pub fn execute(
        &self,
        container: &mut dyn DocumentContainer,
        output: &Path,
        job: &JobState,
    ) -> Result<DocumentJobOutcome, PipelineError> {
        let images = container
            .images()
            .map_err(|e| PipelineError::Document(e.to_string()))?;
        let mode = container.replacement_mode();
        log::info!("Document has {} embedded image(s)", images.len());

        let mut report = DocumentReport {
            images_seen: images.len(),
            ..Default::default()
        };
        for (done, image) in images.iter().enumerate() {
            if job.is_cancelled() {
                log::info!("Document job cancelled after {done} image(s)");
                return Ok(DocumentJobOutcome::Cancelled);
            }
            if mode == ReplacementMode::CoverAndInsert && image.rect.is_none() {
                log::warn!("Image {} has no known placement; skipping", image.id);
            } else if let Some(faces) = self.conceal_one(container, image) {
                report.faces_detected += faces;
                if faces > 0 {
                    report.images_modified += 1;
                }
            }
            job.record_progress(done + 1, images.len());
        }

        container
            .save(output)
            .map_err(|e| PipelineError::SinkWrite(format!("{}: {e}", output.display())))?;
        job.add_faces(report.faces_detected);
        log::info!(
            "Document saved to {}: {} of {} image(s) modified, {} face(s)",
            output.display(),
            report.images_modified,
            report.images_seen,
            report.faces_detected
        );
        Ok(DocumentJobOutcome::Completed(report))
    }

    /// Face count of a replaced image, `Some(0)` when it had none, `None`
    /// when it was left as is because a step failed.
    fn conceal_one(
        &self,
        container: &mut dyn DocumentContainer,
        image: &EmbeddedImage,
    ) -> Option<usize> {
        let frame = match container
            .extract(&image.id)
            .and_then(|bytes| self.reader.decode(&bytes))
        {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Keeping image {} unchanged: {e}", image.id);
                return None;
            }
        };

        let processed = match self.processor.process(frame) {
            Ok(processed) => processed,
            Err(e) => {
                log::warn!("Keeping image {} unchanged: {e}", image.id);
                return None;
            }
        };
        if processed.face_count == 0 {
            return Some(0);
        }

        let replaced = self
            .writer
            .encode(&processed.frame, &image.extension)
            .and_then(|bytes| container.replace(image, bytes));
        match replaced {
            Ok(()) => {
                log::debug!("Replaced image {} ({} face(s))", image.id, processed.face_count);
                Some(processed.face_count)
            }
            Err(e) => {
                log::warn!("Could not replace image {}: {e}", image.id);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concealment::domain::face_concealer::FaceConcealer;
    use crate::detection::domain::face_detector::FaceDetector;
    use crate::document::domain::document_container::PlacementRect;
    use crate::shared::face::{BoundingBox, FaceRecord};
    use crate::shared::frame::Frame;
    use crate::whitelist::domain::whitelist::{SimilarityThreshold, Whitelist};
    use std::collections::HashMap;
    use std::path::PathBuf;

    // --- Stubs ---

    /// Stored bytes are `[faces, fill]`; a single byte is undecodable.
    struct StubContainer {
        mode: ReplacementMode,
        images: Vec<EmbeddedImage>,
        bytes: HashMap<String, Vec<u8>>,
        replaced: Vec<(String, Vec<u8>)>,
        saved: Option<PathBuf>,
        save_fails: bool,
    }

    impl StubContainer {
        fn new(mode: ReplacementMode) -> Self {
            Self {
                mode,
                images: Vec::new(),
                bytes: HashMap::new(),
                replaced: Vec::new(),
                saved: None,
                save_fails: false,
            }
        }

        fn with_image(mut self, id: &str, bytes: &[u8], rect: Option<PlacementRect>) -> Self {
            self.images.push(EmbeddedImage {
                id: id.to_string(),
                page: Some(0),
                rect,
                extension: "png".to_string(),
            });
            self.bytes.insert(id.to_string(), bytes.to_vec());
            self
        }
    }

    impl DocumentContainer for StubContainer {
        fn replacement_mode(&self) -> ReplacementMode {
            self.mode
        }

        fn images(&self) -> Result<Vec<EmbeddedImage>, Box<dyn std::error::Error>> {
            Ok(self.images.clone())
        }

        fn extract(&self, id: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
            self.bytes
                .get(id)
                .cloned()
                .ok_or_else(|| format!("no image {id}").into())
        }

        fn replace(
            &mut self,
            image: &EmbeddedImage,
            bytes: Vec<u8>,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.replaced.push((image.id.clone(), bytes));
            Ok(())
        }

        fn save(&mut self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
            if self.save_fails {
                return Err("disk full".into());
            }
            self.saved = Some(path.to_path_buf());
            Ok(())
        }
    }

    /// Decodes `[faces, fill]` into a 2x2 frame whose first byte is the face count.
    struct StubDecoder;

    impl ImageReader for StubDecoder {
        fn read(&self, _path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
            Err("unused".into())
        }

        fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>> {
            let [faces, fill] = bytes else {
                return Err("not an image".into());
            };
            let mut data = vec![*fill; 2 * 2 * 3];
            data[0] = *faces;
            Ok(Frame::new(data, 2, 2, 3, 0))
        }
    }

    /// Encodes a frame as its raw bytes, tagged with the extension length.
    struct StubEncoder;

    impl ImageWriter for StubEncoder {
        fn write(&self, _path: &Path, _frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            Err("unused".into())
        }

        fn encode(&self, frame: &Frame, extension: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
            let mut out = vec![extension.len() as u8];
            out.extend_from_slice(frame.data());
            Ok(out)
        }
    }

    /// Reports as many faces as the frame's first byte says.
    struct CountingDetector;

    impl FaceDetector for CountingDetector {
        fn detect(&self, frame: &Frame) -> Result<Vec<FaceRecord>, Box<dyn std::error::Error>> {
            let n = frame.data()[0] as usize;
            Ok((0..n)
                .map(|_| FaceRecord::new(BoundingBox::new(0, 0, 2, 2), vec![1.0]))
                .collect())
        }
    }

    /// Blanks every pixel except the first byte.
    struct BlankingConcealer;

    impl FaceConcealer for BlankingConcealer {
        fn conceal(
            &self,
            frame: &mut Frame,
            _bbox: &BoundingBox,
        ) -> Result<(), Box<dyn std::error::Error>> {
            frame.data_mut()[1..].fill(0);
            Ok(())
        }
    }

    fn use_case() -> ConcealDocumentUseCase {
        ConcealDocumentUseCase::new(
            Box::new(StubDecoder),
            Box::new(StubEncoder),
            Arc::new(FrameProcessor::new(
                Arc::new(CountingDetector),
                Arc::new(Whitelist::Empty),
                SimilarityThreshold::default(),
                Arc::new(BlankingConcealer),
            )),
        )
    }

    fn rect() -> Option<PlacementRect> {
        Some(PlacementRect {
            x: 10.0,
            y: 20.0,
            width: 100.0,
            height: 80.0,
        })
    }

    #[test]
    fn test_only_images_with_faces_are_replaced() {
        let mut container = StubContainer::new(ReplacementMode::InPlace)
            .with_image("a", &[2, 9], None)
            .with_image("b", &[0, 9], None)
            .with_image("c", &[1, 9], None);
        let job = JobState::new();

        let outcome = use_case()
            .execute(&mut container, Path::new("out.docx"), &job)
            .unwrap();

        assert_eq!(
            outcome,
            DocumentJobOutcome::Completed(DocumentReport {
                images_seen: 3,
                images_modified: 2,
                faces_detected: 3,
            })
        );
        let ids: Vec<&str> = container.replaced.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        // re-encoded in the image's own format, with the concealed pixels
        let (_, bytes) = &container.replaced[0];
        assert_eq!(bytes[0], 3);
        assert_eq!(bytes[1], 2);
        assert!(bytes[2..].iter().all(|&v| v == 0));
        assert_eq!(container.saved, Some(PathBuf::from("out.docx")));
        assert_eq!(job.progress(), 100);
        assert_eq!(job.faces_detected(), 3);
    }

    #[test]
    fn test_undecodable_image_is_kept() {
        let mut container = StubContainer::new(ReplacementMode::InPlace)
            .with_image("broken", &[7], None)
            .with_image("ok", &[1, 5], None);

        let outcome = use_case()
            .execute(&mut container, Path::new("out.docx"), &JobState::new())
            .unwrap();

        let DocumentJobOutcome::Completed(report) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(report.images_seen, 2);
        assert_eq!(report.images_modified, 1);
        assert_eq!(container.replaced.len(), 1);
        assert_eq!(container.replaced[0].0, "ok");
    }

    #[test]
    fn test_cover_and_insert_skips_images_without_placement() {
        let mut container = StubContainer::new(ReplacementMode::CoverAndInsert)
            .with_image("placed", &[1, 5], rect())
            .with_image("floating", &[1, 5], None);

        use_case()
            .execute(&mut container, Path::new("out.pdf"), &JobState::new())
            .unwrap();

        assert_eq!(container.replaced.len(), 1);
        assert_eq!(container.replaced[0].0, "placed");
    }

    #[test]
    fn test_cancelled_job_does_not_save() {
        let mut container =
            StubContainer::new(ReplacementMode::InPlace).with_image("a", &[1, 5], None);
        let job = JobState::new();
        job.cancel();

        let outcome = use_case()
            .execute(&mut container, Path::new("out.docx"), &job)
            .unwrap();

        assert_eq!(outcome, DocumentJobOutcome::Cancelled);
        assert!(container.saved.is_none());
        assert!(container.replaced.is_empty());
    }

    #[test]
    fn test_save_failure_is_sink_error() {
        let mut container = StubContainer::new(ReplacementMode::InPlace);
        container.save_fails = true;
        assert!(matches!(
            use_case().execute(&mut container, Path::new("out.docx"), &JobState::new()),
            Err(PipelineError::SinkWrite(_))
        ));
    }

    #[test]
    fn test_document_without_images_is_saved_unchanged() {
        let mut container = StubContainer::new(ReplacementMode::InPlace);
        let outcome = use_case()
            .execute(&mut container, Path::new("out.docx"), &JobState::new())
            .unwrap();
        assert_eq!(
            outcome,
            DocumentJobOutcome::Completed(DocumentReport::default())
        );
        assert!(container.saved.is_some());
    }
}
