use ndarray::{ArrayView3, ArrayViewMut3};

/// One decoded raster: interleaved 8-bit samples in row-major order,
/// tagged with its position in the source (`index`).
///
/// Pixel layout is fixed at the I/O boundary (RGB for every adapter in
/// this crate); concealment code only relies on `channels`.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            expected_len(width, height, channels),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    /// Wraps a buffer without checking its length.
    ///
    /// Decoders that hand over foreign buffers use this; the frame processor
    /// rejects such frames through [`Frame::is_well_formed`] instead of panicking.
    pub fn from_raw(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Non-zero extent, at least one channel, and a buffer that matches both.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.channels > 0
            && self.data.len() == expected_len(self.width, self.height, self.channels)
    }

    /// `(height, width, channels)` view. `None` when the buffer is malformed.
    pub fn as_ndarray(&self) -> Option<ArrayView3<'_, u8>> {
        ArrayView3::from_shape(self.shape(), &self.data).ok()
    }

    pub fn as_ndarray_mut(&mut self) -> Option<ArrayViewMut3<'_, u8>> {
        let shape = self.shape();
        ArrayViewMut3::from_shape(shape, &mut self.data).ok()
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

fn expected_len(width: u32, height: u32, channels: u8) -> usize {
    (width as usize) * (height as usize) * (channels as usize)
}
