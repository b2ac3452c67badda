use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::image_reader::ImageReader;

/// Decodes still images with the `image` crate, converting to RGB8.
pub struct ImageFileReader;

impl ImageFileReader {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageReader for ImageFileReader {
    fn read(&self, path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
        let img = image::open(path)
            .map_err(|e| format!("cannot read image {}: {e}", path.display()))?;
        Ok(to_frame(img))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Frame, Box<dyn std::error::Error>> {
        Ok(to_frame(image::load_from_memory(bytes)?))
    }
}

fn to_frame(img: image::DynamicImage) -> Frame {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    Frame::new(rgb.into_raw(), width, height, 3, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, width: u32, height: u32, rgb: [u8; 3]) {
        image::RgbImage::from_pixel(width, height, image::Rgb(rgb))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_read_returns_rgb_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.png");
        write_png(&path, 12, 8, [10, 20, 30]);

        let frame = ImageFileReader::new().read(&path).unwrap();
        assert_eq!((frame.width(), frame.height(), frame.channels()), (12, 8, 3));
        assert_eq!(&frame.data()[..3], &[10, 20, 30]);
    }

    #[test]
    fn test_read_missing_file_is_error() {
        assert!(ImageFileReader::new()
            .read(Path::new("/nonexistent/face.png"))
            .is_err());
    }

    #[test]
    fn test_read_garbage_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(ImageFileReader::new().read(&path).is_err());
    }

    #[test]
    fn test_decode_in_memory_png() {
        let mut bytes = Vec::new();
        image::RgbImage::from_pixel(3, 2, image::Rgb([1, 2, 3]))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let frame = ImageFileReader::new().decode(&bytes).unwrap();
        assert_eq!((frame.width(), frame.height()), (3, 2));
        assert_eq!(&frame.data()[3..6], &[1, 2, 3]);
    }
}
