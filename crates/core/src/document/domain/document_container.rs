use std::path::Path;

/// Where an image is drawn on its page, in page units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// An image embedded in a document.
#[derive(Clone, Debug, PartialEq)]
pub struct EmbeddedImage {
    /// Stable identifier within the container.
    pub id: String,
    /// Zero-based page, for paginated formats.
    pub page: Option<usize>,
    /// Known for formats that place images by rectangle.
    pub rect: Option<PlacementRect>,
    /// Encoding of the stored bytes (`png`, `jpeg`, ...), used to re-encode.
    pub extension: String,
}

/// How a container accepts a modified image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplacementMode {
    /// The stored bytes are swapped by id (Word packages).
    InPlace,
    /// An opaque cover is drawn over the image's rectangle and the new image
    /// is inserted on top (PDF pages). Needs [`EmbeddedImage::rect`].
    CoverAndInsert,
}

/// A Word- or PDF-like document whose embedded images can be rewritten.
pub trait DocumentContainer {
    fn replacement_mode(&self) -> ReplacementMode;

    fn images(&self) -> Result<Vec<EmbeddedImage>, Box<dyn std::error::Error>>;

    fn extract(&self, id: &str) -> Result<Vec<u8>, Box<dyn std::error::Error>>;

    /// Swaps in `bytes` for `image` according to [`Self::replacement_mode`].
    fn replace(
        &mut self,
        image: &EmbeddedImage,
        bytes: Vec<u8>,
    ) -> Result<(), Box<dyn std::error::Error>>;

    fn save(&mut self, path: &Path) -> Result<(), Box<dyn std::error::Error>>;
}
