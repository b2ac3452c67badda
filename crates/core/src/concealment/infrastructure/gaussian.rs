/// Rectangle of a frame, in pixels, that a concealment pass works on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoiRect {
    pub x: usize,
    pub y: usize,
    pub w: usize,
    pub h: usize,
}

/// Sigma OpenCV derives for a kernel when none is given.
pub fn auto_sigma(kernel_size: usize) -> f64 {
    0.3 * ((kernel_size as f64 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1D Gaussian of odd `kernel_size` and spread `sigma`.
pub fn gaussian_kernel_1d(kernel_size: usize, sigma: f64) -> Vec<f32> {
    debug_assert!(kernel_size >= 1 && kernel_size % 2 == 1);
    if kernel_size <= 1 || sigma <= 0.0 {
        return vec![1.0];
    }
    let half = (kernel_size / 2) as f64;
    let weights: Vec<f64> = (0..kernel_size)
        .map(|i| {
            let x = i as f64 - half;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|&v| (v / sum) as f32).collect()
}

/// Separable Gaussian over interleaved 8-bit samples, edges replicated.
/// `temp` is scratch space and is resized as needed.
pub fn blur_u8(
    data: &mut [u8],
    width: usize,
    height: usize,
    channels: usize,
    kernel: &[f32],
    temp: &mut Vec<f32>,
) {
    if kernel.len() <= 1 || width == 0 || height == 0 {
        return;
    }
    let half = kernel.len() / 2;
    temp.resize(width * height * channels, 0.0);

    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = clamp_index(x + k, half, width);
                    sum += data[(y * width + sx) * channels + c] as f32 * w;
                }
                temp[(y * width + x) * channels + c] = sum;
            }
        }
    }

    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let mut sum = 0.0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sy = clamp_index(y + k, half, height);
                    sum += temp[(sy * width + x) * channels + c] * w;
                }
                data[(y * width + x) * channels + c] = sum.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

/// Separable Gaussian over a single float plane, edges replicated.
pub fn blur_plane(plane: &mut [f32], width: usize, height: usize, kernel: &[f32]) {
    if kernel.len() <= 1 || width == 0 || height == 0 {
        return;
    }
    let half = kernel.len() / 2;
    let mut temp = vec![0.0f32; width * height];

    for y in 0..height {
        for x in 0..width {
            temp[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, &w)| plane[y * width + clamp_index(x + k, half, width)] * w)
                .sum();
        }
    }

    for y in 0..height {
        for x in 0..width {
            plane[y * width + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, &w)| temp[clamp_index(y + k, half, height) * width + x] * w)
                .sum();
        }
    }
}

/// Copies a rectangle out of a frame buffer into `roi`.
pub fn extract_roi(
    data: &[u8],
    frame_width: usize,
    channels: usize,
    rect: RoiRect,
    roi: &mut Vec<u8>,
) {
    let row_len = rect.w * channels;
    roi.resize(row_len * rect.h, 0);
    for row in 0..rect.h {
        let src = ((rect.y + row) * frame_width + rect.x) * channels;
        roi[row * row_len..(row + 1) * row_len].copy_from_slice(&data[src..src + row_len]);
    }
}

/// `shifted - half`, clamped to `[0, len)`. Takes the already-offset index
/// so callers stay in unsigned arithmetic.
fn clamp_index(shifted: usize, half: usize, len: usize) -> usize {
    shifted.saturating_sub(half).min(len - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_sums_to_one() {
        for (size, sigma) in [(3, 1.0), (5, 2.0), (51, 25.0), (17, auto_sigma(17))] {
            let sum: f32 = gaussian_kernel_1d(size, sigma).iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_kernel_is_symmetric_and_peaked() {
        let k = gaussian_kernel_1d(7, 1.5);
        for i in 0..3 {
            assert_relative_eq!(k[i], k[6 - i], epsilon = 1e-7);
            assert!(k[i] < k[i + 1]);
        }
    }

    #[test]
    fn test_auto_sigma_matches_opencv_formula() {
        assert_relative_eq!(auto_sigma(3), 0.8);
        assert_relative_eq!(auto_sigma(17), 0.3 * 7.0 + 0.8);
    }

    #[test]
    fn test_blur_u8_uniform_is_unchanged() {
        let mut data = vec![255u8; 10 * 10 * 3];
        let kernel = gaussian_kernel_1d(5, 2.0);
        let mut temp = Vec::new();
        blur_u8(&mut data, 10, 10, 3, &kernel, &mut temp);
        assert!(data.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_blur_u8_spreads_a_spike() {
        let mut data = vec![0u8; 9 * 9];
        data[4 * 9 + 4] = 255;
        let kernel = gaussian_kernel_1d(5, 1.0);
        let mut temp = Vec::new();
        blur_u8(&mut data, 9, 9, 1, &kernel, &mut temp);
        assert!(data[4 * 9 + 4] < 255);
        assert!(data[4 * 9 + 5] > 0);
        assert_eq!(data[0], 0);
    }

    #[test]
    fn test_blur_plane_softens_step() {
        let mut plane = vec![0.0f32; 8];
        plane[4..].fill(1.0);
        blur_plane(&mut plane, 8, 1, &gaussian_kernel_1d(3, 0.8));
        assert!(plane[3] > 0.0 && plane[3] < 1.0);
        assert!(plane[4] > 0.0 && plane[4] < 1.0);
        assert_relative_eq!(plane[0], 0.0);
        assert_relative_eq!(plane[7], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_extract_roi_copies_rows() {
        // 4x3 single-channel frame with value = index
        let data: Vec<u8> = (0..12).collect();
        let mut roi = Vec::new();
        extract_roi(&data, 4, 1, RoiRect { x: 1, y: 1, w: 2, h: 2 }, &mut roi);
        assert_eq!(roi, vec![5, 6, 9, 10]);
    }
}
