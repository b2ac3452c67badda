use crate::concealment::domain::concealment_config::ConcealmentConfig;
use crate::concealment::domain::face_concealer::FaceConcealer;
use crate::shared::face::BoundingBox;
use crate::shared::frame::Frame;

use super::effects::Effect;
use super::gaussian::{self, RoiRect};
use super::mask_builder::{self, Mask};

/// Conceals faces on the CPU: build the shape mask, transform a copy of
/// the face region, then blend it back through the mask.
///
/// Holds no scratch state, so one instance is shared across workers.
pub struct CpuFaceConcealer {
    config: ConcealmentConfig,
    effect: Effect,
}

impl CpuFaceConcealer {
    pub fn new(config: ConcealmentConfig) -> Self {
        let effect = Effect::for_config(&config);
        log::info!(
            "Concealment: {} (kernel {}, feather {}, opacity {:.2}, block {})",
            config.shape(),
            config.kernel_size(),
            config.feather_radius(),
            config.opacity(),
            config.block_size()
        );
        Self { config, effect }
    }

    pub fn config(&self) -> &ConcealmentConfig {
        &self.config
    }
}

impl Default for CpuFaceConcealer {
    fn default() -> Self {
        Self::new(ConcealmentConfig::default())
    }
}

impl FaceConcealer for CpuFaceConcealer {
    fn conceal(
        &self,
        frame: &mut Frame,
        bbox: &BoundingBox,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if !frame.is_well_formed() {
            return Err(format!(
                "frame {} is malformed ({}x{}x{}, {} bytes)",
                frame.index(),
                frame.width(),
                frame.height(),
                frame.channels(),
                frame.data().len()
            )
            .into());
        }

        let bbox = bbox.clamp_to(frame.width(), frame.height());
        let rect = RoiRect {
            x: bbox.x1 as usize,
            y: bbox.y1 as usize,
            w: bbox.width() as usize,
            h: bbox.height() as usize,
        };
        let Some(mask) = mask_builder::build_mask(rect.w, rect.h, &self.config) else {
            return Ok(());
        };

        let fw = frame.width() as usize;
        let channels = frame.channels() as usize;

        let mut original = Vec::new();
        gaussian::extract_roi(frame.data(), fw, channels, rect, &mut original);
        let mut transformed = original.clone();
        self.effect.apply(&mut transformed, rect.w, rect.h, channels);

        composite(
            frame.data_mut(),
            fw,
            channels,
            rect,
            &original,
            &transformed,
            &mask,
            self.config.opacity(),
        );
        Ok(())
    }
}

/// Blends `transformed` over the frame inside `rect`:
///
/// `out = original * (1 - m) + effect * m`, where `effect` is the
/// transformed pixel mixed with the original by `opacity` (or the
/// transformed pixel alone at full opacity).
#[allow(clippy::too_many_arguments)]
pub fn composite(
    data: &mut [u8],
    frame_width: usize,
    channels: usize,
    rect: RoiRect,
    original: &[u8],
    transformed: &[u8],
    mask: &Mask,
    opacity: f32,
) {
    for row in 0..rect.h {
        for col in 0..rect.w {
            let m = mask[[row, col]];
            if m <= 0.0 {
                continue;
            }
            let roi_px = (row * rect.w + col) * channels;
            let frame_px = ((rect.y + row) * frame_width + (rect.x + col)) * channels;

            for c in 0..channels {
                let o = original[roi_px + c] as f32;
                let t = transformed[roi_px + c] as f32;
                let effect = if opacity < 1.0 {
                    t * opacity + o * (1.0 - opacity)
                } else {
                    t
                };
                let out = o * (1.0 - m) + effect * m;
                data[frame_px + c] = out.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
