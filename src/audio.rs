//! Audio utilities.
//!
//! Everything between an uploaded drum clip and the model, and between the
//! model's output and the file on disk:
//!
//! - `wav` — WAV decode/encode via `hound`
//! - [`mix`] — channel downmix
//! - [`resample`] — sinc resampling via `rubato`
//! - [`loudness`] — BS.1770 loudness normalization and soft compression
//! - [`transcode`] — external transcoder for containers `hound` cannot read
//! - [`normalize`] — the full upload → mono model-rate pipeline

pub mod loudness;
pub mod mix;
pub mod normalize;
pub mod resample;
pub mod transcode;
mod wav;

pub use normalize::AudioNormalizer;
pub use transcode::{FfmpegTranscoder, Transcoder};
pub use wav::{decode_wav, read_wav, write_wav_pcm16};

#[cfg(test)]
pub(crate) use wav::encode_wav_f32;

/// Interleaved f32 samples in [-1, 1] with their format.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Samples per channel.
    pub fn num_frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_s(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.num_frames() as f64 / self.sample_rate as f64
        }
    }
}
