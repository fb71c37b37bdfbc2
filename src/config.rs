//! Service configuration and the fixed constants of the JASCO chords+drums model.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Maximum chord onset time in seconds; the model generates 10 s per call.
pub const GENERATION_HORIZON_S: f64 = 10.0;

/// Prompt used when the request carries an empty one.
pub const DEFAULT_PROMPT: &str = "Strings, woodwind, orchestral, symphony.";

/// Chord progression used when none (or an unreadable one) is supplied.
pub const DEFAULT_CHORDS: &[(&str, f64)] = &[("Am7", 0.0), ("D7", 5.0), ("G", 8.0)];

/// Native sample rate of `facebook/jasco-chords-drums-400M`.
pub const MODEL_SAMPLE_RATE: u32 = 32_000;

/// Output files are numbered `1..=MAX_OUTPUT_INDEX`.
pub const MAX_OUTPUT_INDEX: u16 = 999;

/// What to condition on when a request carries no drum upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrumFallback {
    /// Use the bundled reference track at this path.
    Bundled(PathBuf),
    /// Generate without a drum reference.
    None,
}

/// Classifier-free guidance coefficients passed to the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidanceConfig {
    /// Guidance over all conditions combined.
    pub cfg_coef_all: f64,
    /// Guidance over the text condition alone.
    pub cfg_coef_txt: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            cfg_coef_all: 5.0,
            cfg_coef_txt: 0.0,
        }
    }
}

/// Configuration for the HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    pub bind: SocketAddr,

    /// Base URL of the model inference service.
    pub model_url: String,

    /// Sample rate the model expects for drum references and produces on output.
    pub model_sample_rate: u32,

    /// Directory generated files are written to. Created on demand.
    pub output_dir: PathBuf,

    /// Behavior when no drums are uploaded.
    pub drum_fallback: DrumFallback,

    /// External transcoder binary. `None` = only WAV uploads are accepted.
    pub transcoder: Option<PathBuf>,

    /// Guidance coefficients for every generation.
    pub guidance: GuidanceConfig,

    /// Maximum accepted request body in bytes.
    ///
    /// Default: 64 MiB.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8000)),
            model_url: "http://127.0.0.1:8001".to_string(),
            model_sample_rate: MODEL_SAMPLE_RATE,
            output_dir: PathBuf::from("output"),
            drum_fallback: DrumFallback::Bundled(PathBuf::from("assets/sep_drums_1.mp3")),
            transcoder: None,
            guidance: GuidanceConfig::default(),
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.model_sample_rate == 0 {
            return Err(crate::Error::Config("model sample rate must be non-zero".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(crate::Error::Config("output directory must not be empty".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(crate::Error::Config("body limit must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind.port(), 8000);
        assert_eq!(config.model_sample_rate, 32_000);
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(matches!(config.drum_fallback, DrumFallback::Bundled(_)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_guidance_defaults() {
        let guidance = GuidanceConfig::default();
        assert_eq!(guidance.cfg_coef_all, 5.0);
        assert_eq!(guidance.cfg_coef_txt, 0.0);
    }

    #[test]
    fn test_validate_rejects_zero_rate() {
        let config = ServerConfig {
            model_sample_rate: 0,
            ..ServerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_chords_within_horizon() {
        assert!(DEFAULT_CHORDS.iter().all(|(_, t)| *t <= GENERATION_HORIZON_S));
    }
}
