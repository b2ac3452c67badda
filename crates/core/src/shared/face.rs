/// Axis-aligned pixel box, `x2`/`y2` exclusive.
///
/// Detectors may report boxes that spill past the frame; call
/// [`BoundingBox::clamp_to`] before touching pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Intersects the box with `[0, width) x [0, height)`.
    ///
    /// Inverted or fully outside boxes collapse to zero area rather than
    /// going negative.
    pub fn clamp_to(&self, width: u32, height: u32) -> Self {
        let w = i32::try_from(width).unwrap_or(i32::MAX);
        let h = i32::try_from(height).unwrap_or(i32::MAX);
        let x1 = self.x1.clamp(0, w);
        let y1 = self.y1.clamp(0, h);
        let x2 = self.x2.clamp(x1, w);
        let y2 = self.y2.clamp(y1, h);
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        (self.x2 - self.x1).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.y2 - self.y1).max(0) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// One face reported by a detector for one frame: where it is and who it
/// looks like. The embedding is L2-normalized by the detector.
#[derive(Clone, Debug, PartialEq)]
pub struct FaceRecord {
    pub bbox: BoundingBox,
    pub embedding: Vec<f32>,
}

impl FaceRecord {
    pub fn new(bbox: BoundingBox, embedding: Vec<f32>) -> Self {
        Self { bbox, embedding }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_clamp_inside_frame_is_identity() {
        let b = BoundingBox::new(10, 20, 30, 40);
        assert_eq!(b.clamp_to(100, 100), b);
    }

    #[test]
    fn test_clamp_trims_overflowing_edges() {
        let b = BoundingBox::new(-5, -8, 120, 90).clamp_to(100, 80);
        assert_eq!(b, BoundingBox::new(0, 0, 100, 80));
        assert_eq!(b.width(), 100);
        assert_eq!(b.height(), 80);
    }

    #[rstest]
    #[case::left_of_frame(BoundingBox::new(-50, 10, -10, 40))]
    #[case::below_frame(BoundingBox::new(10, 120, 40, 160))]
    #[case::inverted(BoundingBox::new(40, 40, 10, 10))]
    #[case::zero_width(BoundingBox::new(10, 10, 10, 50))]
    fn test_clamp_degenerate_boxes_are_empty(#[case] b: BoundingBox) {
        assert!(b.clamp_to(100, 100).is_empty());
    }

    #[test]
    fn test_face_record_holds_embedding() {
        let face = FaceRecord::new(BoundingBox::new(0, 0, 4, 4), vec![1.0, 0.0]);
        assert_eq!(face.embedding.len(), 2);
        assert_eq!(face.bbox.width(), 4);
    }
}
