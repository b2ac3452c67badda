//! Pre- and post-processing for YOLO-style face detection models.

use ndarray::Array4;

use crate::shared::frame::Frame;

/// Gray used for letterbox padding (YOLO convention).
const PAD_VALUE: f32 = 114.0 / 255.0;

/// How a frame was fitted into the square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Letterbox {
    pub scale: f64,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    /// Maps a point from model input space back to frame pixels.
    pub fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// A detection in frame coordinates, before suppression.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub confidence: f64,
}

/// Fits `frame` into a `size` x `size` NCHW tensor in `[0, 1]`, keeping
/// its aspect ratio and padding the rest with gray.
pub fn letterbox(frame: &Frame, size: u32) -> (Array4<f32>, Letterbox) {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let scale = (size as f64 / fw).min(size as f64 / fh);
    let new_w = ((fw * scale).round() as u32).min(size);
    let new_h = ((fh * scale).round() as u32).min(size);
    let fit = Letterbox {
        scale,
        pad_x: (size - new_w) / 2,
        pad_y: (size - new_h) / 2,
    };

    let side = size as usize;
    let mut tensor = Array4::<f32>::from_elem((1, 3, side, side), PAD_VALUE);
    let Some(src) = frame.as_ndarray() else {
        return (tensor, fit);
    };
    let src_w = frame.width() as usize;
    let src_h = frame.height() as usize;
    let channels = (frame.channels() as usize).min(3);

    for y in 0..new_h as usize {
        let sy = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let sx = ((x as f64 / scale) as usize).min(src_w - 1);
            for c in 0..3 {
                let v = src[[sy, sx, c.min(channels - 1)]];
                tensor[[0, c, fit.pad_y as usize + y, fit.pad_x as usize + x]] = v as f32 / 255.0;
            }
        }
    }

    (tensor, fit)
}

/// Parses a `[1, features, detections]` or `[1, detections, features]`
/// output whose rows start with `cx, cy, w, h, confidence`.
///
/// Rows under `min_confidence` are dropped; boxes are mapped back through `fit`.
pub fn decode_rows(
    data: &[f32],
    shape: &[usize],
    min_confidence: f64,
    fit: &Letterbox,
) -> Result<Vec<Candidate>, String> {
    if shape.len() != 3 {
        return Err(format!("unexpected detector output shape {shape:?}"));
    }
    let transposed = shape[1] < shape[2];
    let (count, features) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if features < 5 {
        return Err(format!("detector rows have {features} values, need at least 5"));
    }
    if data.len() < count * features {
        return Err(format!(
            "detector output has {} values, shape {shape:?} needs {}",
            data.len(),
            count * features
        ));
    }

    let value = |row: usize, feature: usize| -> f64 {
        let i = if transposed {
            feature * count + row
        } else {
            row * features + feature
        };
        data[i] as f64
    };

    let mut candidates = Vec::new();
    for row in 0..count {
        let confidence = value(row, 4);
        if confidence < min_confidence {
            continue;
        }
        let (cx, cy, w, h) = (value(row, 0), value(row, 1), value(row, 2), value(row, 3));
        let (x1, y1) = fit.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = fit.to_frame(cx + w / 2.0, cy + h / 2.0);
        candidates.push(Candidate {
            x1,
            y1,
            x2,
            y2,
            confidence,
        });
    }
    Ok(candidates)
}

/// Greedy non-maximum suppression, highest confidence first.
pub fn nms(mut candidates: Vec<Candidate>, iou_threshold: f64) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Candidate> = Vec::new();
    for c in candidates {
        if kept.iter().all(|k| iou(k, &c) <= iou_threshold) {
            kept.push(c);
        }
    }
    kept
}

pub fn iou(a: &Candidate, b: &Candidate) -> f64 {
    let iw = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0.0);
    let ih = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0.0);
    let inter = iw * ih;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}
