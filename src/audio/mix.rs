//! Channel downmix.

use super::Waveform;

/// Collapse all channels into one by averaging each frame.
///
/// Mono input is returned unchanged. A trailing partial frame is dropped.
pub fn downmix_to_mono(waveform: Waveform) -> Waveform {
    let channels = waveform.channels as usize;
    if channels <= 1 {
        return waveform;
    }

    let samples = waveform
        .samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Waveform::new(samples, waveform.sample_rate, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_is_averaged() {
        let stereo = Waveform::new(vec![1.0, 3.0, 0.5, -0.5, -1.0, 0.0], 48_000, 2);
        let mono = downmix_to_mono(stereo);
        assert_eq!(mono.channels, 1);
        assert_eq!(mono.sample_rate, 48_000);
        assert_eq!(mono.samples, vec![2.0, 0.0, -0.5]);
    }

    #[test]
    fn test_multichannel_is_averaged() {
        let quad = Waveform::new(vec![0.1, 0.2, 0.3, 0.4], 32_000, 4);
        let mono = downmix_to_mono(quad);
        assert_eq!(mono.samples.len(), 1);
        assert!((mono.samples[0] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_mono_passes_through() {
        let mono = Waveform::new(vec![0.1, -0.2], 16_000, 1);
        assert_eq!(downmix_to_mono(mono.clone()), mono);
    }
}
