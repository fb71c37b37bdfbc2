//! Error types for jasco-rs.

use crate::chords::ChordError;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Chord progression rejected by validation.
    #[error(transparent)]
    Chords(#[from] ChordError),

    /// Audio processing error (decode, downmix, resampling, WAV I/O).
    #[error("audio: {0}")]
    Audio(String),

    /// External transcoder failed or is unavailable.
    #[error("transcode: {0}")]
    Transcode(String),

    /// The generation model failed or returned an unusable result.
    #[error("generation: {0}")]
    Generation(String),

    /// Every output file name is already taken.
    #[error("no free output file name left in {0}")]
    OutputExhausted(String),

    /// Invalid configuration.
    #[error("config: {0}")]
    Config(String),

    /// I/O error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error talking to the model service.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// True when the error was caused by the request content rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Chords(_))
    }
}

impl From<hound::Error> for Error {
    fn from(error: hound::Error) -> Self {
        Error::Audio(error.to_string())
    }
}

impl From<rubato::ResampleError> for Error {
    fn from(error: rubato::ResampleError) -> Self {
        Error::Audio(format!("resampling failed: {error}"))
    }
}

impl From<rubato::ResamplerConstructionError> for Error {
    fn from(error: rubato::ResamplerConstructionError) -> Self {
        Error::Audio(format!("resampler setup failed: {error}"))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Self {
        Error::Audio(format!("audio task panicked: {error}"))
    }
}
