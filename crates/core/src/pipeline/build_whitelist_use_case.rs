use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::constants::WHITELIST_EXTENSIONS;
use crate::video::domain::image_reader::ImageReader;
use crate::whitelist::domain::whitelist::{Whitelist, WhitelistEntry, WhitelistError};

/// Builds a [`Whitelist`] from reference photos, one identity per photo.
///
/// Photos that cannot be read or contain no face are logged and skipped.
/// When none yields a face the whitelist is empty and every face in the
/// job gets concealed.
pub struct BuildWhitelistUseCase {
    reader: Box<dyn ImageReader>,
    detector: Arc<dyn FaceDetector>,
}

impl BuildWhitelistUseCase {
    pub fn new(reader: Box<dyn ImageReader>, detector: Arc<dyn FaceDetector>) -> Self {
        Self { reader, detector }
    }

    /// Uses the first face the detector reports in each image.
    pub fn build(&self, images: &[PathBuf]) -> Result<Whitelist, WhitelistError> {
        let mut entries = Vec::new();
        for path in images {
            if let Some(entry) = self.entry_for(path) {
                entries.push(entry);
            }
        }

        let whitelist = Whitelist::from_entries(entries)?;
        if whitelist.is_empty() {
            log::warn!("No whitelist faces loaded; all faces will be concealed");
        } else {
            log::info!("Whitelist ready with {} face(s)", whitelist.len());
        }
        Ok(whitelist)
    }

    /// [`Self::build`] over the reference images in `dir`, in name order.
    pub fn build_from_dir(&self, dir: &Path) -> Result<Whitelist, WhitelistError> {
        match reference_images(dir) {
            Ok(images) => self.build(&images),
            Err(e) => {
                log::warn!("Cannot list whitelist directory {}: {e}", dir.display());
                Ok(Whitelist::Empty)
            }
        }
    }

    fn entry_for(&self, path: &Path) -> Option<WhitelistEntry> {
        let label = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let frame = match self.reader.read(path) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Skipping whitelist image {label}: {e}");
                return None;
            }
        };
        let faces = match self.detector.detect(&frame) {
            Ok(faces) => faces,
            Err(e) => {
                log::warn!("Skipping whitelist image {label}: detection failed: {e}");
                return None;
            }
        };
        let Some(face) = faces.into_iter().next() else {
            log::warn!("No face found in whitelist image {label}");
            return None;
        };
        log::info!("Loaded whitelist face from {label}");
        Some(WhitelistEntry::new(face.embedding, label))
    }
}

/// Files in `dir` with a reference-image extension (case-insensitive), sorted.
pub fn reference_images(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_reference_extension(path))
        .collect();
    images.sort();
    Ok(images)
}

fn has_reference_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            WHITELIST_EXTENSIONS
                .iter()
                .any(|allowed| e.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::face::{BoundingBox, FaceRecord};
    use crate::shared::frame::Frame;
    use crate::whitelist::domain::whitelist::SimilarityThreshold;
    use tempfile::TempDir;

    // --- Stubs ---

    /// Reads a file's first byte as the gray level of a 1x1 frame.
    struct ByteImageReader;

    impl ImageReader for ByteImageReader {
        fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
            let bytes = std::fs::read(path)?;
            let value = *bytes.first().ok_or("empty file")?;
            Ok(Frame::new(vec![value; 3], 1, 1, 3, 0))
        }

        fn decode(&self, _bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>> {
            Err("unused".into())
        }
    }

    /// Gray 0 has no face; otherwise the gray level picks the identity axis.
    struct GrayDetector;

    impl FaceDetector for GrayDetector {
        fn detect(&self, frame: &Frame) -> Result<Vec<FaceRecord>, Box<dyn std::error::Error>> {
            let value = frame.data()[0];
            if value == 0 {
                return Ok(vec![]);
            }
            let mut embedding = vec![0.0; 3];
            embedding[value as usize % 3] = 1.0;
            // a second face that must be ignored
            let mut other = vec![0.0; 3];
            other[(value as usize + 1) % 3] = 1.0;
            Ok(vec![
                FaceRecord::new(BoundingBox::new(0, 0, 1, 1), embedding),
                FaceRecord::new(BoundingBox::new(0, 0, 1, 1), other),
            ])
        }
    }

    fn use_case() -> BuildWhitelistUseCase {
        BuildWhitelistUseCase::new(Box::new(ByteImageReader), Arc::new(GrayDetector))
    }

    fn axis(i: usize) -> Vec<f32> {
        let mut v = vec![0.0; 3];
        v[i] = 1.0;
        v
    }

    #[test]
    fn test_builds_from_first_face_of_each_image() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.png"), [3u8]).unwrap();
        std::fs::write(dir.path().join("b.JPG"), [1u8]).unwrap();

        let whitelist = use_case().build_from_dir(dir.path()).unwrap();
        assert_eq!(whitelist.len(), 2);
        let t = SimilarityThreshold::default();
        assert!(whitelist.is_whitelisted(&axis(0), t));
        assert!(whitelist.is_whitelisted(&axis(1), t));
        assert!(!whitelist.is_whitelisted(&axis(2), t));
    }

    #[test]
    fn test_skips_faceless_unreadable_and_foreign_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blank.png"), [0u8]).unwrap();
        std::fs::write(dir.path().join("broken.jpeg"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), [1u8]).unwrap();
        std::fs::write(dir.path().join("me.jpg"), [2u8]).unwrap();

        let whitelist = use_case().build_from_dir(dir.path()).unwrap();
        assert_eq!(whitelist.len(), 1);
        match whitelist {
            Whitelist::Indexed(index) => assert_eq!(index.labels(), ["me.jpg"]),
            Whitelist::Empty => panic!("expected one entry"),
        }
    }

    #[test]
    fn test_no_faces_gives_empty_whitelist() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("blank.png"), [0u8]).unwrap();
        let whitelist = use_case().build_from_dir(dir.path()).unwrap();
        assert!(matches!(whitelist, Whitelist::Empty));
    }

    #[test]
    fn test_missing_directory_gives_empty_whitelist() {
        let whitelist = use_case()
            .build_from_dir(Path::new("/nonexistent/whitelist"))
            .unwrap();
        assert!(whitelist.is_empty());
    }

    #[test]
    fn test_reference_images_are_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        for name in ["c.jpeg", "a.PNG", "b.gif", "d.jpg"] {
            std::fs::write(dir.path().join(name), [1u8]).unwrap();
        }
        std::fs::create_dir(dir.path().join("e.png")).unwrap();

        let names: Vec<String> = reference_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PNG", "c.jpeg", "d.jpg"]);
    }
}
