//! Per-face opacity masks.
//!
//! A mask has the face region's `(height, width)` and values in `[0, 1]`.
//! Circle and ellipse masks are hard-edged shapes centered in the region,
//! optionally feathered with a Gaussian of size `2 * radius + 1`; rectangle
//! masks cover the whole region.

use ndarray::Array2;

use crate::concealment::domain::concealment_config::{ConcealmentConfig, ConcealmentShape};

use super::gaussian;

/// Shape extent relative to the region, per axis.
const SHAPE_EXTENT: f64 = 0.45;

pub type Mask = Array2<f32>;

/// Builds the mask for a `width` x `height` face region.
///
/// Returns `None` for a zero-area region; callers skip the face.
pub fn build_mask(width: usize, height: usize, config: &ConcealmentConfig) -> Option<Mask> {
    if width == 0 || height == 0 {
        return None;
    }

    let mut mask = match config.shape() {
        ConcealmentShape::Rectangle => return Some(Mask::ones((height, width))),
        ConcealmentShape::Circle | ConcealmentShape::Mosaic | ConcealmentShape::Pixelate => {
            let radius = (SHAPE_EXTENT * width.max(height) as f64) as usize;
            ellipse_mask(width, height, radius, radius)
        }
        ConcealmentShape::Ellipse => ellipse_mask(
            width,
            height,
            (SHAPE_EXTENT * width as f64) as usize,
            (SHAPE_EXTENT * height as f64) as usize,
        ),
    };

    if config.feather_radius() > 0 {
        feather(&mut mask, config.feather_radius());
    }
    Some(mask)
}

/// Filled axis-aligned ellipse centered at `(width / 2, height / 2)`.
///
/// A zero semi-axis degenerates to a line along the other axis.
fn ellipse_mask(width: usize, height: usize, semi_x: usize, semi_y: usize) -> Mask {
    let cx = (width / 2) as f64;
    let cy = (height / 2) as f64;
    let (a, b) = (semi_x as f64, semi_y as f64);

    Mask::from_shape_fn((height, width), |(y, x)| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        let inside = match (semi_x, semi_y) {
            (0, 0) => dx == 0.0 && dy == 0.0,
            (0, _) => dx == 0.0 && dy.abs() <= b,
            (_, 0) => dy == 0.0 && dx.abs() <= a,
            _ => (dx * dx) / (a * a) + (dy * dy) / (b * b) <= 1.0,
        };
        if inside {
            1.0
        } else {
            0.0
        }
    })
}

fn feather(mask: &mut Mask, radius: usize) {
    let size = 2 * radius + 1;
    let kernel = gaussian::gaussian_kernel_1d(size, gaussian::auto_sigma(size));
    let (height, width) = mask.dim();
    match mask.as_slice_mut() {
        Some(plane) => gaussian::blur_plane(plane, width, height, &kernel),
        None => {
            let mut plane: Vec<f32> = mask.iter().copied().collect();
            gaussian::blur_plane(&mut plane, width, height, &kernel);
            mask.iter_mut().zip(plane).for_each(|(m, v)| *m = v);
        }
    }
    mask.mapv_inplace(|v| v.clamp(0.0, 1.0));
}
