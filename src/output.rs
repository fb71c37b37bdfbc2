//! Output naming and writing.
//!
//! Files are named `<n>.wav` with `n` cycling through `1..=999`. The counter
//! lives for the life of the process. A name is claimed by creating the file
//! exclusively while holding the counter lock, so two requests can never be
//! handed the same number, and names already on disk are skipped.

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::audio::{Waveform, loudness, write_wav_pcm16};
use crate::config::MAX_OUTPUT_INDEX;
use crate::{Error, Result};

fn next_index(index: u16) -> u16 {
    index % MAX_OUTPUT_INDEX + 1
}

/// Hands out numbered output files in one directory.
#[derive(Debug)]
pub struct OutputNamer {
    dir: PathBuf,
    next: Mutex<u16>,
}

impl OutputNamer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::starting_at(dir, 1)
    }

    /// Start the counter at `index` (clamped into `1..=999`).
    pub fn starting_at(dir: impl Into<PathBuf>, index: u16) -> Self {
        Self {
            dir: dir.into(),
            next: Mutex::new(index.clamp(1, MAX_OUTPUT_INDEX)),
        }
    }

    /// Claim the next free name, creating the directory if needed.
    pub fn reserve(&self) -> Result<OutputSlot> {
        std::fs::create_dir_all(&self.dir)?;

        let mut next = self.next.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        for _ in 0..MAX_OUTPUT_INDEX {
            let index = *next;
            *next = next_index(index);

            let path = self.dir.join(format!("{index}.wav"));
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    tracing::debug!(index, path = %path.display(), "reserved output file");
                    return Ok(OutputSlot {
                        index,
                        stem: self.dir.join(index.to_string()),
                        path,
                        committed: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(Error::OutputExhausted(self.dir.display().to_string()))
    }
}

/// A claimed output file.
///
/// Until [`OutputSlot::commit`] is called the file is an empty placeholder
/// and is removed when the slot is dropped.
#[derive(Debug)]
pub struct OutputSlot {
    index: u16,
    stem: PathBuf,
    path: PathBuf,
    committed: bool,
}

impl OutputSlot {
    pub fn index(&self) -> u16 {
        self.index
    }

    /// `<dir>/<n>.wav`
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<dir>/<n>`, the value reported to clients.
    pub fn stem(&self) -> &Path {
        &self.stem
    }

    /// Keep the file past the slot's lifetime.
    pub fn commit(mut self) -> PathBuf {
        self.committed = true;
        std::mem::take(&mut self.path)
    }
}

impl Drop for OutputSlot {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(error) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), %error, "could not remove unused output file");
            }
        }
    }
}

/// Loudness-normalize, soft-compress and write `waveform` as 16-bit PCM WAV.
pub fn write_artifact(path: &Path, waveform: Waveform) -> Result<()> {
    if waveform.channels == 0 || waveform.sample_rate == 0 {
        return Err(Error::Audio(format!(
            "cannot write audio with {} channels at {} Hz",
            waveform.channels, waveform.sample_rate
        )));
    }
    let normalized = loudness::normalize_loudness(waveform, loudness::TARGET_LUFS, true);
    write_wav_pcm16(path, &normalized)
}
