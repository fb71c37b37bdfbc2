//! HTTP front-end: `POST /generate`.
//!
//! One request runs start to finish on its own task:
//!
//! 1. decode the multipart form (`prompt`, `chords`, `drums`),
//! 2. resolve the chord progression (400 if an onset is past the horizon),
//! 3. normalize the drum upload or fall back to the bundled reference,
//! 4. reserve an output name, call the model, write the WAV,
//! 5. answer with the file and an `X-File-Path` header.
//!
//! Errors are answered as `{"detail": "..."}` with status 400 or 500.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::post,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::audio::{AudioNormalizer, Waveform};
use crate::chords::parse_chords;
use crate::config::DEFAULT_PROMPT;
use crate::generator::{GenerationRequest, MusicGenerator};
use crate::output::{OutputNamer, write_artifact};
use crate::{Error, Result};

/// Response header naming the generated file (without extension).
pub const FILE_PATH_HEADER: &str = "x-file-path";

/// Shared state behind the router.
pub struct AppState {
    generator: Arc<dyn MusicGenerator>,
    normalizer: AudioNormalizer,
    namer: OutputNamer,
    default_drums: Option<Arc<Waveform>>,
}

impl AppState {
    /// `default_drums` is used for requests without an upload; `None` leaves
    /// those requests unconditioned on drums.
    pub fn new(
        generator: Arc<dyn MusicGenerator>,
        normalizer: AudioNormalizer,
        namer: OutputNamer,
        default_drums: Option<Waveform>,
    ) -> Self {
        Self {
            generator,
            normalizer,
            namer,
            default_drums: default_drums.map(Arc::new),
        }
    }

    /// Validate, generate and write one request's output.
    async fn run(&self, form: GenerateForm) -> Result<Generated> {
        let chords = parse_chords(form.chords.as_deref())?;

        let prompt = match form.prompt {
            Some(prompt) if !prompt.is_empty() => prompt,
            _ => DEFAULT_PROMPT.to_string(),
        };

        let drums = match form.drums {
            Some(upload) => {
                let waveform = self
                    .normalizer
                    .normalize(&upload.bytes, upload.file_name.as_deref())
                    .await
                    .inspect_err(|e| tracing::error!("error processing drum audio: {e}"))?;
                Some(waveform)
            }
            None => match &self.default_drums {
                Some(reference) => {
                    tracing::info!("no custom drums provided, using default drums");
                    Some(reference.as_ref().clone())
                }
                None => {
                    tracing::info!("no custom drums provided, generating without drums");
                    None
                }
            },
        };

        let slot = self.namer.reserve()?;
        let stem = slot.stem().display().to_string();
        let file_path = HeaderValue::from_str(&stem).map_err(|_| {
            Error::Config(format!("output path {stem:?} cannot be sent as a header value"))
        })?;

        tracing::info!(
            prompt = %prompt,
            chords = chords.len(),
            drums = drums.is_some(),
            output = %slot.path().display(),
            "generating"
        );

        let request = GenerationRequest {
            descriptions: vec![prompt],
            chords,
            drums,
        };
        let waveform = self
            .generator
            .generate(&request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Generation("model returned no audio".into()))?;

        let path = slot.path().to_path_buf();
        tokio::task::spawn_blocking(move || write_artifact(&path, waveform)).await??;

        let bytes = tokio::fs::read(slot.path()).await?;
        let path = slot.commit();
        tracing::info!(output = %path.display(), bytes = bytes.len(), "done");

        Ok(Generated { file_path, bytes })
    }
}

/// Build the router with CORS, tracing and the upload size limit applied.
pub fn router(state: Arc<AppState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/generate", post(generate))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Any origin, method and header; credentials allowed.
fn cors() -> CorsLayer {
    CorsLayer::very_permissive().expose_headers([HeaderName::from_static(FILE_PATH_HEADER)])
}

// ── Form decoding ────────────────────────────────────────────────────────────

struct Upload {
    file_name: Option<String>,
    bytes: Bytes,
}

#[derive(Default)]
struct GenerateForm {
    prompt: Option<String>,
    chords: Option<String>,
    drums: Option<Upload>,
}

async fn read_form(mut multipart: Multipart) -> std::result::Result<GenerateForm, ApiError> {
    let mut form = GenerateForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "prompt" => form.prompt = Some(field.text().await?),
            "chords" => form.chords = Some(field.text().await?),
            "drums" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                // Browsers send an empty part when no file was picked.
                if !bytes.is_empty() {
                    form.drums = Some(Upload { file_name, bytes });
                }
            }
            other => tracing::debug!(field = other, "ignoring unknown form field"),
        }
    }

    Ok(form)
}

// ── Handler ──────────────────────────────────────────────────────────────────

struct Generated {
    /// `X-File-Path` value, checked before the file is committed.
    file_path: HeaderValue,
    bytes: Vec<u8>,
}

async fn generate(
    State(state): State<Arc<AppState>>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> std::result::Result<Response, ApiError> {
    let form = read_form(multipart?).await?;
    let generated = state.run(form).await?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/wav")),
            (HeaderName::from_static(FILE_PATH_HEADER), generated.file_path),
        ],
        generated.bytes,
    )
        .into_response())
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Error answered to HTTP clients as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn internal(detail: String) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail,
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        if error.is_client_error() {
            tracing::warn!("rejected request: {error}");
            Self {
                status: StatusCode::BAD_REQUEST,
                detail: error.to_string(),
            }
        } else {
            tracing::error!("error generating music: {error}");
            Self::internal(error.to_string())
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        tracing::warn!("unreadable form: {}", error.body_text());
        Self {
            status: error.status(),
            detail: error.body_text(),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self {
            status: rejection.status(),
            detail: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}
