//! HTTP front-end for JASCO chord- and drum-conditioned music generation.
//!
//! Accepts a text prompt, a chord progression and an optional drum clip,
//! hands them to a pretrained JASCO model running as a separate service, and
//! returns the generated audio as a WAV file.
//!
//! ## Request flow
//!
//! ```text
//! prompt ───────────────────────────┐
//! chords JSON → parse / validate ───┼→ MusicGenerator → loudness → N.wav
//! drums upload → decode / transcode │
//!            → downmix → resample ──┘
//! ```
//!
//! ## Modules
//!
//! - [`chords`] — chord progression parsing with default fallback
//! - [`audio`] — WAV I/O, downmix, resampling, loudness, transcoding
//! - [`generator`] — the model seam and its HTTP client
//! - [`output`] — numbered output files with wraparound
//! - [`server`] — the axum `POST /generate` endpoint
//! - [`config`] — service settings and model constants

pub mod audio;
pub mod chords;
pub mod config;
pub mod generator;
pub mod output;
pub mod server;

mod error;

pub use error::{Error, Result};
