use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::time_range::AudioSlice;

#[derive(Error, Debug)]
pub enum RemuxError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{step} failed ({}): {stderr}", describe_status(.status))]
    ToolFailed {
        step: &'static str,
        status: Option<i32>,
        stderr: String,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    }
}

/// Which part of the source soundtrack to pull out.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AudioExtraction {
    /// Only the window matching the processed video.
    Sliced(AudioSlice),
    WholeTrack,
}

/// How the processed video stream enters the final container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VideoCodecMode {
    StreamCopy,
    Reencode,
}

/// External tool that moves audio between containers.
pub trait RemuxTool: Send + Sync {
    /// Writes the source's audio track, re-encoded, to `dest`.
    fn extract_audio(
        &self,
        source: &Path,
        extraction: &AudioExtraction,
        dest: &Path,
    ) -> Result<(), RemuxError>;

    /// Combines the video stream of `video` and the audio of `audio` into `output`.
    fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        mode: VideoCodecMode,
    ) -> Result<(), RemuxError>;
}
