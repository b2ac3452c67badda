use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::shared::time_range::AudioSlice;

use super::remux_tool::{AudioExtraction, RemuxError, RemuxTool, VideoCodecMode};

/// Extension of the intermediate audio file; matches the extractor's AAC output.
const AUDIO_EXTENSION: &str = "aac";

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("could not create a temporary directory for audio: {0}")]
    TempDir(#[source] std::io::Error),
    #[error("could not deliver {} to {}: {source}", processed.display(), output.display())]
    Deliver {
        processed: PathBuf,
        output: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// How the final output was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblyOutcome {
    WithAudio,
    /// Every remux strategy failed; the processed video was delivered as is.
    AudioLess,
}

/// Puts the source soundtrack back onto a processed, audio-less video.
///
/// Strategies are tried in order: sliced audio then the whole track for
/// extraction, stream copy then re-encode for the merge. When none works,
/// the processed video is copied to the output without audio. The temporary
/// audio file lives in its own directory, which is removed on every path.
pub struct MediaAssembler {
    tool: Arc<dyn RemuxTool>,
}

impl MediaAssembler {
    pub fn new(tool: Arc<dyn RemuxTool>) -> Self {
        Self { tool }
    }

    pub fn assemble(
        &self,
        processed: &Path,
        source: &Path,
        output: &Path,
        slice: &AudioSlice,
    ) -> Result<AssemblyOutcome, AssemblyError> {
        let temp = tempfile::Builder::new()
            .prefix("faceveil-audio")
            .tempdir()
            .map_err(AssemblyError::TempDir)?;
        let audio = temp.path().join(format!("track.{AUDIO_EXTENSION}"));

        let merged = self
            .extract(source, slice, &audio)
            .and_then(|()| self.merge(processed, &audio, output));

        match merged {
            Ok(()) => {
                log::info!("Audio merged into {}", output.display());
                Ok(AssemblyOutcome::WithAudio)
            }
            Err(e) => {
                log::warn!("Audio could not be restored ({e}); delivering video without audio");
                deliver_audio_less(processed, output)?;
                Ok(AssemblyOutcome::AudioLess)
            }
        }
    }

    fn extract(&self, source: &Path, slice: &AudioSlice, dest: &Path) -> Result<(), RemuxError> {
        let plan = [AudioExtraction::Sliced(*slice), AudioExtraction::WholeTrack];
        let mut last = None;
        for extraction in &plan {
            match self.tool.extract_audio(source, extraction, dest) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::warn!("Audio extraction ({extraction:?}) failed: {e}");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| unreachable_plan("extraction")))
    }

    fn merge(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), RemuxError> {
        let plan = [VideoCodecMode::StreamCopy, VideoCodecMode::Reencode];
        let mut last = None;
        for mode in plan {
            match self.tool.merge(video, audio, output, mode) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    log::warn!("Audio/video merge ({mode:?}) failed: {e}");
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| unreachable_plan("merge")))
    }
}

fn unreachable_plan(step: &'static str) -> RemuxError {
    RemuxError::ToolFailed {
        step,
        status: None,
        stderr: "no strategy attempted".to_string(),
    }
}

/// A failed merge may leave a partial file behind; the copy replaces it.
fn deliver_audio_less(processed: &Path, output: &Path) -> Result<(), AssemblyError> {
    if processed == output {
        return Ok(());
    }
    fs::copy(processed, output)
        .map(|_| ())
        .map_err(|source| AssemblyError::Deliver {
            processed: processed.to_path_buf(),
            output: output.to_path_buf(),
            source,
        })
}
