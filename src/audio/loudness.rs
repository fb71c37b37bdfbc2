//! Loudness normalization (ITU-R BS.1770 integrated loudness).
//!
//! Generated audio is brought to [`TARGET_LUFS`] and, optionally, passed
//! through a `tanh` soft compressor so the gain never produces hard clips.

use super::Waveform;

/// Integrated loudness written files are normalized to.
pub const TARGET_LUFS: f64 = -14.0;

/// RMS below which a waveform is treated as silence and left untouched.
pub const ENERGY_FLOOR: f64 = 2e-3;

const BLOCK_S: f64 = 0.4;
const STEP_S: f64 = 0.1;
const ABSOLUTE_GATE_LUFS: f64 = -70.0;
const RELATIVE_GATE_LU: f64 = -10.0;

// BS.1770 K-weighting prototypes.
const SHELF_HZ: f64 = 1_681.974_450_955_533;
const SHELF_GAIN_DB: f64 = 3.999_843_853_973_347;
const SHELF_Q: f64 = 0.707_175_236_955_419_6;
const HIGH_PASS_HZ: f64 = 38.135_470_876_024_44;
const HIGH_PASS_Q: f64 = 0.500_327_037_323_877_3;

/// Second-order IIR section, transposed direct form II.
#[derive(Debug, Clone, Copy)]
struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    /// K-weighting stage 1: the +4 dB head-related high shelf, designed for
    /// `sample_rate` by bilinear transform of the analog prototype.
    fn high_shelf(sample_rate: u32) -> Self {
        let k = (std::f64::consts::PI * SHELF_HZ / sample_rate as f64).tan();
        let vh = 10f64.powf(SHELF_GAIN_DB / 20.0);
        let vb = vh.powf(0.499_666_774_154_541_6);
        let a0 = 1.0 + k / SHELF_Q + k * k;

        Self {
            b: [
                (vh + vb * k / SHELF_Q + k * k) / a0,
                2.0 * (k * k - vh) / a0,
                (vh - vb * k / SHELF_Q + k * k) / a0,
            ],
            a: [2.0 * (k * k - 1.0) / a0, (1.0 - k / SHELF_Q + k * k) / a0],
        }
    }

    /// K-weighting stage 2: the RLB high pass near 38 Hz.
    fn high_pass(sample_rate: u32) -> Self {
        let k = (std::f64::consts::PI * HIGH_PASS_HZ / sample_rate as f64).tan();
        let a0 = 1.0 + k / HIGH_PASS_Q + k * k;

        Self {
            b: [1.0, -2.0, 1.0],
            a: [2.0 * (k * k - 1.0) / a0, (1.0 - k / HIGH_PASS_Q + k * k) / a0],
        }
    }

    fn filter(&self, input: &[f64]) -> Vec<f64> {
        let (mut z1, mut z2) = (0.0, 0.0);
        input
            .iter()
            .map(|&x| {
                let y = self.b[0] * x + z1;
                z1 = self.b[1] * x - self.a[0] * y + z2;
                z2 = self.b[2] * x - self.a[1] * y;
                y
            })
            .collect()
    }
}

fn channel_weight(channel: usize) -> f64 {
    // L, R, C weigh 1.0; surround channels 1.41.
    if channel < 3 { 1.0 } else { 1.41 }
}

fn block_loudness(weighted_power: f64) -> f64 {
    -0.691 + 10.0 * weighted_power.log10()
}

/// Integrated loudness in LUFS, or `None` when every block is gated out.
pub fn integrated_loudness(waveform: &Waveform) -> Option<f64> {
    let channels = waveform.channels as usize;
    let frames = waveform.num_frames();
    if channels == 0 || frames == 0 || waveform.sample_rate == 0 {
        return None;
    }

    let shelf = Biquad::high_shelf(waveform.sample_rate);
    let high_pass = Biquad::high_pass(waveform.sample_rate);
    let weighted: Vec<Vec<f64>> = (0..channels)
        .map(|ch| {
            let signal: Vec<f64> = waveform
                .samples
                .iter()
                .skip(ch)
                .step_by(channels)
                .map(|&s| s as f64)
                .collect();
            high_pass.filter(&shelf.filter(&signal))
        })
        .collect();

    let block = ((BLOCK_S * waveform.sample_rate as f64).round() as usize).min(frames);
    let step = ((STEP_S * waveform.sample_rate as f64).round() as usize).max(1);
    let num_blocks = (frames - block) / step + 1;

    // Mean square per channel per block.
    let powers: Vec<Vec<f64>> = (0..num_blocks)
        .map(|j| {
            weighted
                .iter()
                .map(|signal| {
                    let window = &signal[j * step..j * step + block];
                    window.iter().map(|v| v * v).sum::<f64>() / block as f64
                })
                .collect()
        })
        .collect();

    let weighted_sum = |channel_powers: &[f64]| -> f64 {
        channel_powers
            .iter()
            .enumerate()
            .map(|(ch, p)| channel_weight(ch) * p)
            .sum()
    };

    let gated_mean = |threshold: f64| -> Option<Vec<f64>> {
        let kept: Vec<&Vec<f64>> = powers
            .iter()
            .filter(|p| block_loudness(weighted_sum(p)) > threshold)
            .collect();
        if kept.is_empty() {
            return None;
        }
        Some(
            (0..channels)
                .map(|ch| kept.iter().map(|p| p[ch]).sum::<f64>() / kept.len() as f64)
                .collect(),
        )
    };

    let absolute = gated_mean(ABSOLUTE_GATE_LUFS)?;
    let relative_threshold = block_loudness(weighted_sum(&absolute)) + RELATIVE_GATE_LU;
    let relative = gated_mean(relative_threshold)?;
    Some(block_loudness(weighted_sum(&relative)))
}

/// Scale `waveform` to `target_lufs`, then optionally soft-compress with `tanh`.
///
/// Near-silent or unmeasurable input is returned unchanged.
pub fn normalize_loudness(mut waveform: Waveform, target_lufs: f64, compress: bool) -> Waveform {
    if waveform.samples.is_empty() {
        return waveform;
    }

    let energy = (waveform
        .samples
        .iter()
        .map(|&s| (s as f64) * (s as f64))
        .sum::<f64>()
        / waveform.samples.len() as f64)
        .sqrt();
    if energy < ENERGY_FLOOR {
        tracing::debug!(energy, "skipping loudness normalization of near-silent audio");
        return waveform;
    }

    let Some(loudness) = integrated_loudness(&waveform) else {
        return waveform;
    };

    let gain = 10f64.powf((target_lufs - loudness) / 20.0) as f32;
    tracing::debug!(loudness, gain, "normalizing loudness");
    for s in waveform.samples.iter_mut() {
        *s *= gain;
        if compress {
            *s = s.tanh();
        }
    }
    waveform
}
