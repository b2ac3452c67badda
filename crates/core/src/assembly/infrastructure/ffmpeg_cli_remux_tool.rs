use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::assembly::domain::remux_tool::{
    AudioExtraction, RemuxError, RemuxTool, VideoCodecMode,
};

const AUDIO_BITRATE: &str = "192k";

/// Runs the `ffmpeg` executable for audio extraction and merging.
pub struct FfmpegCliRemuxTool {
    program: PathBuf,
}

impl FfmpegCliRemuxTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, step: &'static str, args: Vec<OsString>) -> Result<(), RemuxError> {
        log::debug!("{} {:?}", self.program.display(), args);
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|source| RemuxError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if output.status.success() {
            return Ok(());
        }
        Err(RemuxError::ToolFailed {
            step,
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl Default for FfmpegCliRemuxTool {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl RemuxTool for FfmpegCliRemuxTool {
    fn extract_audio(
        &self,
        source: &Path,
        extraction: &AudioExtraction,
        dest: &Path,
    ) -> Result<(), RemuxError> {
        self.run("audio extraction", extract_args(source, extraction, dest))
    }

    fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        mode: VideoCodecMode,
    ) -> Result<(), RemuxError> {
        self.run("merge", merge_args(video, audio, output, mode))
    }
}

fn common_args() -> Vec<OsString> {
    ["-y", "-hide_banner", "-loglevel", "error"]
        .into_iter()
        .map(OsString::from)
        .collect()
}

/// `[-ss start] [-t duration] -i source -vn -c:a aac -b:a 192k dest`
pub fn extract_args(source: &Path, extraction: &AudioExtraction, dest: &Path) -> Vec<OsString> {
    let mut args = common_args();
    if let AudioExtraction::Sliced(slice) = extraction {
        args.push("-ss".into());
        args.push(format!("{:.3}", slice.start_secs).into());
        if let Some(duration) = slice.duration_secs {
            args.push("-t".into());
            args.push(format!("{duration:.3}").into());
        }
    }
    args.push("-i".into());
    args.push(source.into());
    for a in ["-vn", "-c:a", "aac", "-b:a", AUDIO_BITRATE] {
        args.push(a.into());
    }
    args.push(dest.into());
    args
}

/// `-i video -i audio -c:v copy|libx264 -c:a aac -strict experimental output`
pub fn merge_args(video: &Path, audio: &Path, output: &Path, mode: VideoCodecMode) -> Vec<OsString> {
    let video_codec = match mode {
        VideoCodecMode::StreamCopy => "copy",
        VideoCodecMode::Reencode => "libx264",
    };
    let mut args = common_args();
    args.push("-i".into());
    args.push(video.into());
    args.push("-i".into());
    args.push(audio.into());
    for a in ["-c:v", video_codec, "-c:a", "aac", "-strict", "experimental"] {
        args.push(a.into());
    }
    args.push(output.into());
    args
}
