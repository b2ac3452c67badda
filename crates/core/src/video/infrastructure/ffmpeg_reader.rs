use std::path::Path;

use ffmpeg_next::util::frame::video::Video as DecodedFrame;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Microseconds, the unit `avformat_seek_file` expects without a stream index.
const AV_TIME_BASE: f64 = 1_000_000.0;

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Converts each decoded frame to RGB24 and wraps it in a [`Frame`].
pub struct FfmpegReader {
    state: Option<DecodeState>,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self { state: None }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;

        let stream_index = stream.index();
        let time_base = f64::from(stream.time_base());
        let start_pts = match stream.start_time() {
            i64::MIN => 0,
            t => t,
        };
        let total_frames = stream.frames().max(0) as usize;
        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;
        let (width, height) = (decoder.width(), decoder.height());

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.state = Some(DecodeState {
            ictx,
            decoder,
            scaler,
            stream_index,
            time_base,
            start_pts,
            fps,
            width,
            height,
            next_index: 0,
            primed: None,
            flushing: false,
            done: false,
        });

        Ok(metadata)
    }

    fn seek(&mut self, frame_index: usize) -> Result<usize, Box<dyn std::error::Error>> {
        let state = self.state.as_mut().ok_or("FfmpegReader: not opened")?;
        state.seek(frame_index)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(state) = self.state.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };
        Box::new(std::iter::from_fn(move || state.next_frame()))
    }

    fn close(&mut self) {
        self.state = None;
    }
}

/// Everything needed to pull frames lazily, one at a time.
struct DecodeState {
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    stream_index: usize,
    time_base: f64,
    start_pts: i64,
    fps: f64,
    width: u32,
    height: u32,
    next_index: usize,
    /// A frame decoded while seeking, handed out before decoding resumes.
    primed: Option<Frame>,
    flushing: bool,
    done: bool,
}

impl DecodeState {
    fn next_frame(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        if let Some(frame) = self.primed.take() {
            return Some(Ok(frame));
        }
        let decoded = self.next_decoded()?;
        let index = self.next_index;
        self.next_index += 1;
        Some(self.convert(&decoded, index))
    }

    fn next_decoded(&mut self) -> Option<DecodedFrame> {
        if self.done {
            return None;
        }
        if let Some(decoded) = self.receive() {
            return Some(decoded);
        }
        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                let decoded = self.receive();
                if decoded.is_none() {
                    self.done = true;
                }
                return decoded;
            };

            if stream.index() != self.stream_index {
                continue;
            }

            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(decoded) = self.receive() {
                return Some(decoded);
            }
        }
    }

    fn receive(&mut self) -> Option<DecodedFrame> {
        let mut decoded = DecodedFrame::empty();
        self.decoder.receive_frame(&mut decoded).ok().map(|()| decoded)
    }

    fn convert(
        &mut self,
        decoded: &DecodedFrame,
        index: usize,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        let mut rgb_frame = DecodedFrame::empty();
        self.scaler.run(decoded, &mut rgb_frame)?;
        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        Ok(Frame::from_raw(pixels, self.width, self.height, 3, index))
    }

    /// Jumps to the keyframe at or before `target`, then decodes forward
    /// until the presentation index reaches it.
    fn seek(&mut self, target: usize) -> Result<usize, Box<dyn std::error::Error>> {
        if self.fps <= 0.0 {
            return Err("cannot seek a stream without a frame rate".into());
        }
        let ts = (target as f64 / self.fps * AV_TIME_BASE) as i64;
        self.ictx.seek(ts, ..ts)?;
        self.decoder.flush();
        self.primed = None;
        self.flushing = false;
        self.done = false;

        let mut fallback = target;
        while let Some(decoded) = self.next_decoded() {
            let landed = decoded
                .timestamp()
                .or_else(|| decoded.pts())
                .map(|pts| pts_to_index(pts, self.start_pts, self.time_base, self.fps))
                .unwrap_or(fallback);
            if landed >= target {
                let frame = self.convert(&decoded, landed)?;
                self.primed = Some(frame);
                self.next_index = landed + 1;
                return Ok(landed);
            }
            fallback = landed + 1;
        }
        Err(format!("frame {target} is past the end of the stream").into())
    }
}

/// Presentation index of a timestamp, rounded to the nearest frame.
fn pts_to_index(pts: i64, start_pts: i64, time_base: f64, fps: f64) -> usize {
    let secs = (pts - start_pts) as f64 * time_base;
    (secs * fps).round().max(0.0) as usize
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
/// This function strips that padding to produce a tightly-packed pixel buffer.
fn extract_rgb_pixels(rgb_frame: &DecodedFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}


#[cfg(test)]
mod tests {
    use super::test_video::create_test_video;
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        create_test_video(&path, 5, 160, 120, 30);

        let mut reader = FfmpegReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!((meta.width, meta.height), (160, 120));
        assert_relative_eq!(meta.fps, 30.0);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_nonexistent_is_error() {
        let mut reader = FfmpegReader::new();
        assert!(reader.open(Path::new("/nonexistent/test.mp4")).is_err());
    }

    #[test]
    fn test_frames_are_sequential_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        create_test_video(&path, 5, 160, 120, 30);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        let frames: Vec<Frame> = reader.frames().map(|f| f.unwrap()).collect();

        assert_eq!(frames.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
            assert_eq!(frame.channels(), 3);
            assert!(frame.is_well_formed());
        }
    }

    #[test]
    fn test_frames_without_open_is_error() {
        let mut reader = FfmpegReader::new();
        assert!(reader.frames().next().unwrap().is_err());
        assert!(reader.seek(3).is_err());
    }

    #[rstest]
    #[case::start(0)]
    #[case::middle(12)]
    #[case::near_end(23)]
    fn test_seek_lands_on_requested_frame(#[case] target: usize) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        create_test_video(&path, 25, 64, 48, 25);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        let landed = reader.seek(target).unwrap();
        assert_eq!(landed, target);

        let frames: Vec<Frame> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 25 - target);
        assert_eq!(frames[0].index(), target);
        assert_eq!(frames.last().unwrap().index(), 24);
    }

    #[test]
    fn test_seek_past_end_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        create_test_video(&path, 5, 64, 48, 25);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        assert!(reader.seek(500).is_err());
    }

    #[rstest]
    #[case::origin(0, 0, 1.0 / 25.0, 25.0, 0)]
    #[case::offset_start(1512, 1500, 1.0 / 25.0, 25.0, 12)]
    #[case::rounds_to_nearest(1001, 0, 1.0 / 30000.0, 30.0, 1)]
    fn test_pts_to_index(
        #[case] pts: i64,
        #[case] start: i64,
        #[case] time_base: f64,
        #[case] fps: f64,
        #[case] expected: usize,
    ) {
        assert_eq!(pts_to_index(pts, start, time_base, fps), expected);
    }

    #[test]
    fn test_close_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        create_test_video(&path, 1, 160, 120, 30);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        reader.close();
        reader.close();
    }
}
