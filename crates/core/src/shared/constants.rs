pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Frames awaited together, in index order, before any is written.
pub const DEFAULT_BATCH_SIZE: usize = 15;

/// Each in-flight unit is a full decoded frame, so the pool stays small.
pub const MAX_WORKERS: usize = 4;

/// Encoded outputs below this size are treated as a silent encoder failure.
pub const MIN_ARTIFACT_BYTES: u64 = 1024;

/// Seek drift (in frames) tolerated before a warning is logged.
pub const SEEK_DRIFT_TOLERANCE: usize = 10;

pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.5;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Reference photos accepted when building a whitelist from a directory.
pub const WHITELIST_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

pub const DOCUMENT_EXTENSIONS: &[&str] = &["docx", "pdf"];

/// `min(available_parallelism, MAX_WORKERS)`, at least 1.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, MAX_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_worker_count_is_bounded() {
        let n = default_worker_count();
        assert!((1..=MAX_WORKERS).contains(&n));
    }

    #[test]
    fn test_whitelist_extensions_are_image_extensions() {
        for ext in WHITELIST_EXTENSIONS {
            assert!(IMAGE_EXTENSIONS.contains(ext));
        }
    }
}
