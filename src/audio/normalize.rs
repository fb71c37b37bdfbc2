//! Upload normalization: arbitrary audio bytes → mono waveform at the model rate.

use std::path::Path;
use std::sync::Arc;

use super::{Transcoder, Waveform, decode_wav, mix::downmix_to_mono, resample::resample};
use crate::{Error, Result};

/// Turns uploaded drum clips into model-ready references.
#[derive(Clone)]
pub struct AudioNormalizer {
    transcoder: Option<Arc<dyn Transcoder>>,
    target_rate: u32,
}

impl AudioNormalizer {
    /// `transcoder` handles non-WAV input; without one only WAV is accepted.
    pub fn new(transcoder: Option<Arc<dyn Transcoder>>, target_rate: u32) -> Self {
        Self {
            transcoder,
            target_rate,
        }
    }

    /// Decode, downmix and resample `bytes`.
    ///
    /// `file_name` only supplies an extension hint to the transcoder.
    pub async fn normalize(&self, bytes: &[u8], file_name: Option<&str>) -> Result<Waveform> {
        let decoded = match decode_wav(bytes) {
            Ok(waveform) => waveform,
            Err(wav_error) => {
                tracing::debug!(%wav_error, "upload is not WAV, transcoding");
                self.transcode_and_decode(bytes, file_name).await?
            }
        };

        tracing::debug!(
            sample_rate = decoded.sample_rate,
            channels = decoded.channels,
            frames = decoded.num_frames(),
            "decoded drum audio"
        );

        let target_rate = self.target_rate;
        tokio::task::spawn_blocking(move || conform(decoded, target_rate)).await?
    }

    /// Normalize an audio file on disk, such as the bundled drum reference.
    pub async fn normalize_file(&self, path: &Path) -> Result<Waveform> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        self.normalize(&bytes, path.file_name().and_then(|name| name.to_str()))
            .await
    }

    async fn transcode_and_decode(&self, bytes: &[u8], file_name: Option<&str>) -> Result<Waveform> {
        let transcoder = self.transcoder.as_ref().ok_or_else(|| {
            Error::Transcode("upload is not WAV and no transcoder is configured".into())
        })?;

        // Removed on drop, whichever way this function exits.
        let scratch = tempfile::tempdir()?;
        let extension = file_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin");
        let input = scratch.path().join(format!("upload.{extension}"));
        let output = scratch.path().join("transcoded.wav");

        tokio::fs::write(&input, bytes).await?;
        transcoder.transcode(&input, &output).await?;
        let transcoded = tokio::fs::read(&output).await?;

        decode_wav(&transcoded)
            .map_err(|e| Error::Audio(format!("could not decode transcoded audio: {e}")))
    }
}

/// Force mono at `target_rate`.
pub fn conform(waveform: Waveform, target_rate: u32) -> Result<Waveform> {
    if waveform.channels == 0 {
        return Err(Error::Audio("audio has no channels".into()));
    }
    let mono = downmix_to_mono(waveform);
    if mono.sample_rate == target_rate {
        return Ok(mono);
    }
    tracing::debug!(from = mono.sample_rate, to = target_rate, "resampling drum audio");
    resample(mono, target_rate)
}
