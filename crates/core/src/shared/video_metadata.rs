use std::path::PathBuf;

/// Stream properties reported by a video source when it is opened.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame count from the container. 0 when the container does not say.
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Source duration in seconds, or `None` when fps or frame count is unknown.
    pub fn duration_secs(&self) -> Option<f64> {
        if self.fps > 0.0 && self.total_frames > 0 {
            Some(self.total_frames as f64 / self.fps)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn meta(fps: f64, total_frames: usize) -> VideoMetadata {
        VideoMetadata {
            width: 640,
            height: 480,
            fps,
            total_frames,
            codec: "h264".to_string(),
            source_path: Some(PathBuf::from("/tmp/in.mp4")),
        }
    }

    #[test]
    fn test_duration_from_frames_and_fps() {
        assert_relative_eq!(meta(25.0, 250).duration_secs().unwrap(), 10.0);
    }

    #[test]
    fn test_duration_unknown_without_frame_count() {
        assert!(meta(30.0, 0).duration_secs().is_none());
    }

    #[test]
    fn test_duration_unknown_without_fps() {
        assert!(meta(0.0, 100).duration_secs().is_none());
    }
}
