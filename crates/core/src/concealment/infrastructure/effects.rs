//! Pixel transforms applied to a face region before it is blended back.

use crate::concealment::domain::concealment_config::{ConcealmentConfig, ConcealmentShape};

use super::gaussian;

/// A concealment transform with its parameters precomputed for the job.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Separable Gaussian, kernel from the job's strength.
    Blur { kernel: Vec<f32> },
    /// Linear downsample by `block_size`, nearest-neighbor upsample.
    Mosaic { block_size: usize },
    /// Flat per-tile mean color.
    Pixelate { block_size: usize },
}

impl Effect {
    pub fn for_config(config: &ConcealmentConfig) -> Self {
        match config.shape() {
            ConcealmentShape::Circle | ConcealmentShape::Ellipse | ConcealmentShape::Rectangle => {
                Effect::Blur {
                    kernel: gaussian::gaussian_kernel_1d(config.kernel_size(), config.blur_sigma()),
                }
            }
            ConcealmentShape::Mosaic => Effect::Mosaic {
                block_size: config.block_size(),
            },
            ConcealmentShape::Pixelate => Effect::Pixelate {
                block_size: config.block_size(),
            },
        }
    }

    /// Transforms an interleaved `width` x `height` region in place.
    pub fn apply(&self, region: &mut [u8], width: usize, height: usize, channels: usize) {
        if width == 0 || height == 0 || channels == 0 {
            return;
        }
        match self {
            Effect::Blur { kernel } => {
                let mut temp = Vec::new();
                gaussian::blur_u8(region, width, height, channels, kernel, &mut temp);
            }
            Effect::Mosaic { block_size } => mosaic(region, width, height, channels, *block_size),
            Effect::Pixelate { block_size } => {
                pixelate(region, width, height, channels, *block_size)
            }
        }
    }
}

/// Shrinks to `(width / block, height / block)` with bilinear sampling
/// (pixel-center aligned, at least one pixel per axis), then blows the
/// result back up by nearest neighbor.
pub fn mosaic(region: &mut [u8], width: usize, height: usize, channels: usize, block_size: usize) {
    let block = block_size.max(1);
    let small_w = (width / block).max(1);
    let small_h = (height / block).max(1);

    let xs = linear_taps(width, small_w);
    let ys = linear_taps(height, small_h);

    let mut small = vec![0u8; small_w * small_h * channels];
    for (sy, &(y0, y1, fy)) in ys.iter().enumerate() {
        for (sx, &(x0, x1, fx)) in xs.iter().enumerate() {
            for c in 0..channels {
                let at = |x: usize, y: usize| region[(y * width + x) * channels + c] as f64;
                let top = at(x0, y0) * (1.0 - fx) + at(x1, y0) * fx;
                let bottom = at(x0, y1) * (1.0 - fx) + at(x1, y1) * fx;
                let v = top * (1.0 - fy) + bottom * fy;
                small[(sy * small_w + sx) * channels + c] = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    }

    for y in 0..height {
        let sy = (y * small_h / height).min(small_h - 1);
        for x in 0..width {
            let sx = (x * small_w / width).min(small_w - 1);
            let src = (sy * small_w + sx) * channels;
            let dst = (y * width + x) * channels;
            region[dst..dst + channels].copy_from_slice(&small[src..src + channels]);
        }
    }
}

/// Replaces each `block` x `block` tile (clipped at the right and bottom
/// edges) with its mean color, truncated toward zero.
pub fn pixelate(region: &mut [u8], width: usize, height: usize, channels: usize, block_size: usize) {
    let block = block_size.max(1);
    let mut sums = vec![0u64; channels];

    for ty in (0..height).step_by(block) {
        let th = block.min(height - ty);
        for tx in (0..width).step_by(block) {
            let tw = block.min(width - tx);
            sums.iter_mut().for_each(|s| *s = 0);

            for y in ty..ty + th {
                for x in tx..tx + tw {
                    let p = (y * width + x) * channels;
                    for (c, sum) in sums.iter_mut().enumerate() {
                        *sum += region[p + c] as u64;
                    }
                }
            }

            let count = (tw * th) as u64;
            let mean: Vec<u8> = sums.iter().map(|&s| (s / count) as u8).collect();

            for y in ty..ty + th {
                for x in tx..tx + tw {
                    let p = (y * width + x) * channels;
                    region[p..p + channels].copy_from_slice(&mean);
                }
            }
        }
    }
}

/// For each destination sample: the two source taps and the weight of the second.
fn linear_taps(src_len: usize, dst_len: usize) -> Vec<(usize, usize, f64)> {
    let scale = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let pos = ((d as f64 + 0.5) * scale - 0.5).max(0.0);
            let i0 = (pos.floor() as usize).min(src_len - 1);
            let i1 = (i0 + 1).min(src_len - 1);
            (i0, i1, pos - i0 as f64)
        })
        .collect()
}
