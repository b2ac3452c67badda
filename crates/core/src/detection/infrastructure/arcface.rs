//! Input preparation for ArcFace-style embedding models.

use ndarray::Array4;

use crate::shared::face::BoundingBox;
use crate::shared::frame::Frame;

pub const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

/// Crops `bbox` out of `frame`, resizes it to 112x112 (pixel-center
/// sampling) and normalizes to `[-1, 1]` in NCHW layout.
///
/// `bbox` must already be clamped to the frame and non-empty.
pub fn face_tensor(frame: &Frame, bbox: &BoundingBox) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    let Some(src) = frame.as_ndarray() else {
        return tensor;
    };
    let (x0, y0) = (bbox.x1.max(0) as usize, bbox.y1.max(0) as usize);
    let (cw, ch) = (bbox.width() as usize, bbox.height() as usize);
    if cw == 0 || ch == 0 {
        return tensor;
    }
    let last_c = (frame.channels() as usize).saturating_sub(1);

    for y in 0..INPUT_SIZE {
        let sy = y0 + (((y as f64 + 0.5) * ch as f64 / INPUT_SIZE as f64) as usize).min(ch - 1);
        for x in 0..INPUT_SIZE {
            let sx =
                x0 + (((x as f64 + 0.5) * cw as f64 / INPUT_SIZE as f64) as usize).min(cw - 1);
            for c in 0..3 {
                let v = src[[sy, sx, c.min(last_c)]] as f32;
                tensor[[0, c, y, x]] = (v - NORM_MEAN) / NORM_STD;
            }
        }
    }
    tensor
}

/// Scales `v` to unit length; the zero vector is left alone.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_face_tensor_shape_and_range() {
        let frame = Frame::new(vec![255u8; 40 * 30 * 3], 40, 30, 3, 0);
        let t = face_tensor(&frame, &BoundingBox::new(5, 5, 25, 25));
        assert_eq!(t.shape(), &[1, 3, INPUT_SIZE, INPUT_SIZE]);
        assert_relative_eq!(t[[0, 2, 111, 111]], 1.0);
    }

    #[test]
    fn test_face_tensor_samples_inside_crop_only() {
        // left half black, right half white; crop the right half
        let mut data = vec![0u8; 20 * 10 * 3];
        for y in 0..10 {
            for x in 10..20 {
                let p = (y * 20 + x) * 3;
                data[p..p + 3].copy_from_slice(&[255, 255, 255]);
            }
        }
        let frame = Frame::new(data, 20, 10, 3, 0);
        let t = face_tensor(&frame, &BoundingBox::new(10, 0, 20, 10));
        assert!(t.iter().all(|&v| (v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert_relative_eq!(v[0], 0.6);
        assert_relative_eq!(v[1], 0.8);

        let mut zero = vec![0.0, 0.0];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0, 0.0]);
    }
}
