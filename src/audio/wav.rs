//! WAV decode/encode.

use std::io::{Cursor, Read};
use std::path::Path;

use super::Waveform;
use crate::Result;

/// Decode a WAV file held in memory.
///
/// Fails for anything that is not RIFF/WAVE; callers use that to decide
/// whether the bytes need transcoding first.
pub fn decode_wav(bytes: &[u8]) -> Result<Waveform> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    collect_samples(reader)
}

/// Read a WAV file from disk.
pub fn read_wav(path: impl AsRef<Path>) -> Result<Waveform> {
    let reader = hound::WavReader::open(path)?;
    collect_samples(reader)
}

fn collect_samples<R: Read>(reader: hound::WavReader<R>) -> Result<Waveform> {
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(Waveform::new(samples, spec.sample_rate, spec.channels))
}

/// Write interleaved samples as 16-bit PCM, clamping to [-1, 1].
pub fn write_wav_pcm16(path: impl AsRef<Path>, waveform: &Waveform) -> Result<()> {
    let spec = hound::WavSpec {
        channels: waveform.channels,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in &waveform.samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn encode_wav_f32(waveform: &Waveform) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: waveform.channels,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for &s in &waveform.samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_float_wav_from_memory() {
        let original = Waveform::new(vec![0.0, 0.5, -0.5, 1.0, -1.0, 0.25], 44_100, 2);
        let decoded = decode_wav(&encode_wav_f32(&original)).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_decode_rejects_non_wav() {
        assert!(decode_wav(b"ID3\x04\x00 definitely an mp3").is_err());
        assert!(decode_wav(&[]).is_err());
    }

    #[test]
    fn test_pcm16_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        let original = Waveform::new(vec![0.0, 0.5, -0.5, 2.0], 32_000, 1);
        write_wav_pcm16(&path, &original).unwrap();

        let loaded = read_wav(&path).unwrap();
        assert_eq!(loaded.sample_rate, 32_000);
        assert_eq!(loaded.channels, 1);
        assert_eq!(loaded.samples.len(), 4);
        assert!((loaded.samples[1] - 0.5).abs() < 1e-3);
        assert!((loaded.samples[2] + 0.5).abs() < 1e-3);
        // Out-of-range input is clamped, not wrapped.
        assert!(loaded.samples[3] > 0.999);
    }
}
