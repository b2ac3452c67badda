use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Tried in order; the first one that opens wins.
const CODEC_PREFERENCE: [ffmpeg_next::codec::Id; 2] =
    [ffmpeg_next::codec::Id::H264, ffmpeg_next::codec::Id::MPEG4];

const FALLBACK_FPS: i32 = 30;

/// Encodes RGB frames into a video-only container via ffmpeg-next.
///
/// Audio is handled afterwards by the media assembler, which remuxes the
/// source soundtrack onto this file.
pub struct FfmpegWriter {
    state: Option<EncodeState>,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Name of the encoder picked by `open`, if open.
    pub fn codec_name(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.codec_name.as_str())
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

struct EncodeState {
    octx: ffmpeg_next::format::context::Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    scaler: ffmpeg_next::software::scaling::Context,
    codec_name: String,
    time_base: ffmpeg_next::Rational,
    width: u32,
    height: u32,
    frame_count: i64,
}

impl EncodeState {
    fn drain(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let ost_time_base = self
            .octx
            .stream(0)
            .ok_or("output stream missing")?
            .time_base();
        let mut encoded = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(0);
            encoded.rescale_ts(self.time_base, ost_time_base);
            encoded.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        if metadata.width == 0 || metadata.height == 0 {
            return Err(format!(
                "cannot encode a {}x{} video",
                metadata.width, metadata.height
            )
            .into());
        }

        let frame_rate = frame_rate(metadata.fps);
        let mut last_err: Box<dyn std::error::Error> = "no video encoder available".into();
        for id in CODEC_PREFERENCE {
            match open_encoder(path, metadata, id, frame_rate) {
                Ok(state) => {
                    log::info!(
                        "Encoding {}x{} @ {:.3} fps with {}",
                        metadata.width,
                        metadata.height,
                        f64::from(frame_rate),
                        state.codec_name
                    );
                    self.state = Some(state);
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("Encoder {id:?} unavailable: {e}");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let state = self.state.as_mut().ok_or("FfmpegWriter: not opened")?;
        if frame.width() != state.width || frame.height() != state.height || frame.channels() != 3
        {
            return Err(format!(
                "frame {} is {}x{}x{}, writer expects {}x{}x3",
                frame.index(),
                frame.width(),
                frame.height(),
                frame.channels(),
                state.width,
                state.height
            )
            .into());
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            state.width,
            state.height,
        );
        let stride = rgb_frame.stride(0);
        let row_bytes = state.width as usize * 3;
        let data = rgb_frame.data_mut(0);
        for (row, src) in frame.data().chunks_exact(row_bytes).enumerate() {
            let dst = row * stride;
            data[dst..dst + row_bytes].copy_from_slice(src);
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        state.scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(state.frame_count));
        state.encoder.send_frame(&yuv_frame)?;
        state.drain()?;

        state.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let Some(mut state) = self.state.take() else {
            return Ok(());
        };
        state.encoder.send_eof()?;
        state.drain()?;
        state.octx.write_trailer()?;
        log::debug!("Wrote {} frames", state.frame_count);
        Ok(())
    }
}

/// Rational frame rate; unknown or nonsensical rates fall back to 30.
fn frame_rate(fps: f64) -> ffmpeg_next::Rational {
    if fps.is_finite() && fps > 0.0 {
        ffmpeg_next::Rational::from(fps)
    } else {
        ffmpeg_next::Rational(FALLBACK_FPS, 1)
    }
}

fn open_encoder(
    path: &Path,
    metadata: &VideoMetadata,
    id: ffmpeg_next::codec::Id,
    frame_rate: ffmpeg_next::Rational,
) -> Result<EncodeState, Box<dyn std::error::Error>> {
    let codec = ffmpeg_next::encoder::find(id).ok_or_else(|| format!("{id:?} encoder not found"))?;

    let mut octx = ffmpeg_next::format::output(path)?;
    let global_header = octx
        .format()
        .flags()
        .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);
    let mut ost = octx.add_stream(Some(codec))?;

    let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
        .encoder()
        .video()?;
    let time_base = frame_rate.invert();
    encoder_ctx.set_width(metadata.width);
    encoder_ctx.set_height(metadata.height);
    encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);
    encoder_ctx.set_time_base(time_base);
    encoder_ctx.set_frame_rate(Some(frame_rate));
    if global_header {
        encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
    }

    let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
    ost.set_parameters(&encoder);
    octx.write_header()?;

    let scaler = ffmpeg_next::software::scaling::Context::get(
        ffmpeg_next::format::Pixel::RGB24,
        metadata.width,
        metadata.height,
        ffmpeg_next::format::Pixel::YUV420P,
        metadata.width,
        metadata.height,
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )?;

    Ok(EncodeState {
        octx,
        encoder,
        scaler,
        codec_name: codec.name().to_string(),
        time_base,
        width: metadata.width,
        height: metadata.height,
        frame_count: 0,
    })
}
