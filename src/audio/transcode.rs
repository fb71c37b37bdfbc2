//! External transcoding for containers `hound` cannot decode (MP3, WebM, OGG, ...).

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::{Error, Result};

/// Converts an audio file of unknown container into 16-bit PCM mono WAV.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Read `input`, write the canonical WAV to `output`.
    ///
    /// Failures carry the tool's own diagnostic text.
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()>;
}

/// [`Transcoder`] backed by the `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locate `ffmpeg` on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> Result<()> {
        tracing::debug!(program = %self.program.display(), input = %input.display(), "transcoding upload");

        let result = Command::new(&self.program)
            .args(["-nostdin", "-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-vn", "-acodec", "pcm_s16le", "-ac", "1", "-f", "wav"])
            .arg(output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                Error::Transcode(format!("failed to run {}: {e}", self.program.display()))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::Transcode(format!(
                "{} exited with {}: {}",
                self.program.display(),
                result.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new(dir.path().join("no-such-ffmpeg"));
        let err = transcoder
            .transcode(&dir.path().join("in.mp3"), &dir.path().join("out.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transcode(ref msg) if msg.contains("failed to run")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_program_reports_exit_status() {
        let Ok(program) = which::which("false") else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let transcoder = FfmpegTranscoder::new(program);
        let err = transcoder
            .transcode(&dir.path().join("in.bin"), &dir.path().join("out.wav"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transcode(ref msg) if msg.contains("exited with")));
    }
}
