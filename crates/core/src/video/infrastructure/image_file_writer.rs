use std::io::Cursor;
use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::image_writer::ImageWriter;

/// Encodes frames with the `image` crate.
pub struct ImageFileWriter;

impl ImageFileWriter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ImageFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageWriter for ImageFileWriter {
    fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        to_rgb_image(frame)?.save(path)?;
        Ok(())
    }

    fn encode(&self, frame: &Frame, extension: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
        let format = image::ImageFormat::from_extension(extension)
            .ok_or_else(|| format!("unsupported image format '{extension}'"))?;
        let mut bytes = Vec::new();
        to_rgb_image(frame)?.write_to(&mut Cursor::new(&mut bytes), format)?;
        Ok(bytes)
    }
}

fn to_rgb_image(frame: &Frame) -> Result<image::RgbImage, Box<dyn std::error::Error>> {
    if frame.channels() != 3 {
        return Err(format!("expected an RGB frame, got {} channels", frame.channels()).into());
    }
    image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
        .ok_or_else(|| "frame buffer does not match its dimensions".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        Frame::new(rgb.repeat((width * height) as usize), width, height, 3, 0)
    }

    #[test]
    fn test_write_creates_parent_dirs_and_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.png");
        ImageFileWriter::new()
            .write(&path, &solid(9, 5, [50, 100, 200]))
            .unwrap();

        let img = image::open(&path).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (9, 5));
        assert_eq!(img.get_pixel(4, 2).0, [50, 100, 200]);
    }

    #[test]
    fn test_encode_uses_requested_format() {
        let bytes = ImageFileWriter::new()
            .encode(&solid(4, 4, [0, 0, 0]), "png")
            .unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);

        let bytes = ImageFileWriter::new()
            .encode(&solid(4, 4, [0, 0, 0]), "JPEG")
            .unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
    }

    #[test]
    fn test_encode_unknown_format_is_error() {
        assert!(ImageFileWriter::new()
            .encode(&solid(2, 2, [0, 0, 0]), "xyz")
            .is_err());
    }

    #[test]
    fn test_non_rgb_frame_is_error() {
        let gray = Frame::new(vec![0u8; 4], 2, 2, 1, 0);
        assert!(ImageFileWriter::new().encode(&gray, "png").is_err());
    }
}
