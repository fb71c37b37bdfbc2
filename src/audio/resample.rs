//! Sample-rate conversion.
//!
//! A fresh sinc resampler is built per call, so the result depends only on
//! the input rate, the output rate and the samples.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use super::Waveform;
use crate::{Error, Result};

/// Frames fed to the resampler per step.
const CHUNK_FRAMES: usize = 1024;

fn sinc_parameters() -> SincInterpolationParameters {
    SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Cubic,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    }
}

/// Number of output frames for `input_frames` converted from `from` to `to` Hz.
pub fn output_frames(input_frames: usize, from: u32, to: u32) -> usize {
    (input_frames as u64 * to as u64).div_ceil(from as u64) as usize
}

/// Resample a mono waveform to `target_rate`.
pub fn resample(waveform: Waveform, target_rate: u32) -> Result<Waveform> {
    if waveform.channels != 1 {
        return Err(Error::Audio(format!(
            "resampling expects mono input, got {} channels",
            waveform.channels
        )));
    }
    if waveform.sample_rate == 0 || target_rate == 0 {
        return Err(Error::Audio("sample rate must be non-zero".into()));
    }
    if waveform.sample_rate == target_rate || waveform.samples.is_empty() {
        return Ok(Waveform::new(waveform.samples, target_rate, 1));
    }

    let samples = resample_mono(&waveform.samples, waveform.sample_rate, target_rate)?;
    Ok(Waveform::new(samples, target_rate, 1))
}

fn resample_mono(input: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    let ratio = to as f64 / from as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, sinc_parameters(), CHUNK_FRAMES, 1)?;

    let expected = output_frames(input.len(), from, to);
    let mut output = Vec::with_capacity(expected + CHUNK_FRAMES);

    let mut position = 0;
    while input.len() - position >= resampler.input_frames_next() {
        let frames = resampler.input_frames_next();
        let chunk: &[&[f32]] = &[&input[position..position + frames]];
        let block = resampler.process(chunk, None)?;
        output.extend_from_slice(&block[0]);
        position += frames;
    }

    if position < input.len() {
        let tail: &[&[f32]] = &[&input[position..]];
        let block = resampler.process_partial(Some(tail), None)?;
        output.extend_from_slice(&block[0]);
    }

    // Flush the filter with silence until every expected frame is out.
    while output.len() < expected {
        let block = resampler.process_partial::<&[f32]>(None, None)?;
        if block[0].is_empty() {
            break;
        }
        output.extend_from_slice(&block[0]);
    }

    output.resize(expected, 0.0);
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, seconds: f32) -> Vec<f32> {
        let n = (rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_output_frames() {
        assert_eq!(output_frames(44_100, 44_100, 32_000), 32_000);
        assert_eq!(output_frames(48_000, 48_000, 32_000), 32_000);
        assert_eq!(output_frames(3, 48_000, 32_000), 2);
    }

    #[test]
    fn test_downsample_to_model_rate() {
        let input = Waveform::new(sine(440.0, 44_100, 1.0), 44_100, 1);
        let output = resample(input, 32_000).unwrap();
        assert_eq!(output.sample_rate, 32_000);
        assert_eq!(output.channels, 1);
        assert_eq!(output.samples.len(), 32_000);
        assert!((output.duration_s() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_upsample_preserves_signal() {
        let input = Waveform::new(sine(220.0, 16_000, 0.5), 16_000, 1);
        let output = resample(input, 32_000).unwrap();
        assert_eq!(output.samples.len(), 16_000);

        // Compare against the ideal signal away from the edges.
        let ideal = sine(220.0, 32_000, 0.5);
        for i in 2_000..14_000 {
            assert!(
                (output.samples[i] - ideal[i]).abs() < 0.05,
                "frame {i}: {} vs {}",
                output.samples[i],
                ideal[i]
            );
        }
    }

    /// Index of the largest-magnitude sample.
    fn peak_index(samples: &[f32]) -> usize {
        samples
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(i, _)| i)
            .unwrap()
    }

    #[test]
    fn test_impulse_stays_in_place() {
        // An impulse half a second in must land half a second in at 32 kHz.
        for from in [16_000u32, 44_100, 48_000] {
            let mut samples = vec![0.0f32; from as usize];
            samples[from as usize / 2] = 1.0;
            let output = resample(Waveform::new(samples, from, 1), 32_000).unwrap();

            assert_eq!(output.samples.len(), 32_000);
            let peak = peak_index(&output.samples) as i64;
            assert!((peak - 16_000).abs() <= 1, "{from} Hz: peak at {peak}");
        }
    }

    #[test]
    fn test_onset_near_start_survives() {
        let mut samples = vec![0.0f32; 48_000];
        samples[30] = 1.0;
        let output = resample(Waveform::new(samples, 48_000, 1), 32_000).unwrap();
        let peak = peak_index(&output.samples) as i64;
        assert!((peak - 20).abs() <= 1, "peak at {peak}");
    }

    #[test]
    fn test_same_rate_is_identity() {
        let input = Waveform::new(vec![0.1, 0.2, 0.3], 32_000, 1);
        assert_eq!(resample(input.clone(), 32_000).unwrap(), input);
    }

    #[test]
    fn test_rejects_stereo() {
        let input = Waveform::new(vec![0.1, 0.2], 44_100, 2);
        assert!(resample(input, 32_000).is_err());
    }
}
