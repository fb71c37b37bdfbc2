//! JASCO generation server — HTTP, multipart in, WAV out.
//!
//! Forwards each request to a JASCO model service and writes the result to a
//! numbered file under the output directory.
//!
//! # Endpoint
//!
//! `POST /generate` (`multipart/form-data`):
//!
//! - `prompt` — text description; empty = default orchestral prompt
//! - `chords` — optional JSON `[["Am7", 0.0], ["D7", 5.0]]`, times ≤ 10 s
//! - `drums`  — optional audio file (WAV natively, anything else via ffmpeg)
//!
//! **Response on success**: the WAV bytes, `Content-Type: audio/wav`, and
//! `X-File-Path: output/<n>`.
//!
//! **Response on error**: `{"detail": "..."}` with status 400 (chord time past
//! the horizon) or 500 (audio, model or filesystem failure).
//!
//! # Example (shell)
//!
//! ```sh
//! curl -F prompt="ambient piano" -F chords='[["C",0],["Am",4]]' \
//!   -F drums=@beat.mp3 -o out.wav http://localhost:8000/generate
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use jasco_rs::{
    audio::{AudioNormalizer, FfmpegTranscoder, Transcoder},
    config::{DrumFallback, GuidanceConfig, MODEL_SAMPLE_RATE, ServerConfig},
    generator::{MusicGenerator, RemoteGenerator},
    output::OutputNamer,
    server::{AppState, router},
};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FallbackMode {
    /// Condition on the bundled drum track when nothing is uploaded.
    Bundled,
    /// Generate without drums when nothing is uploaded.
    None,
}

#[derive(Parser, Debug)]
#[command(
    name = "jasco-server",
    about = "JASCO music generation server — chords + drums conditioned, HTTP multipart interface"
)]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "JASCO_BIND", default_value = "0.0.0.0:8000")]
    bind: SocketAddr,

    /// Base URL of the JASCO model service.
    #[arg(long, env = "JASCO_MODEL_URL", default_value = "http://127.0.0.1:8001")]
    model_url: String,

    /// Sample rate the model consumes and produces.
    #[arg(long, env = "JASCO_SAMPLE_RATE", default_value_t = MODEL_SAMPLE_RATE)]
    sample_rate: u32,

    /// Directory generated files are written to.
    #[arg(long, env = "JASCO_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// What to do when a request carries no drums.
    #[arg(long, env = "JASCO_DRUM_FALLBACK", value_enum, default_value_t = FallbackMode::Bundled)]
    drum_fallback: FallbackMode,

    /// Bundled drum reference used with `--drum-fallback bundled`.
    #[arg(long, env = "JASCO_DEFAULT_DRUMS", default_value = "assets/sep_drums_1.mp3")]
    default_drums: PathBuf,

    /// Transcoder executable. Looked up as `ffmpeg` on PATH when omitted.
    #[arg(long, env = "JASCO_FFMPEG")]
    ffmpeg: Option<PathBuf>,

    /// Classifier-free guidance over all conditions.
    #[arg(long, env = "JASCO_CFG_COEF_ALL", default_value_t = 5.0)]
    cfg_coef_all: f64,

    /// Classifier-free guidance over the text condition.
    #[arg(long, env = "JASCO_CFG_COEF_TXT", default_value_t = 0.0)]
    cfg_coef_txt: f64,

    /// Maximum request body size in MiB.
    #[arg(long, env = "JASCO_MAX_BODY_MB", default_value_t = 64)]
    max_body_mb: usize,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let drum_fallback = match self.drum_fallback {
            FallbackMode::Bundled => DrumFallback::Bundled(self.default_drums),
            FallbackMode::None => DrumFallback::None,
        };
        let transcoder = self
            .ffmpeg
            .or_else(|| FfmpegTranscoder::from_path().map(|t| t.program().to_path_buf()));

        ServerConfig {
            bind: self.bind,
            model_url: self.model_url,
            model_sample_rate: self.sample_rate,
            output_dir: self.output_dir,
            drum_fallback,
            transcoder,
            guidance: GuidanceConfig {
                cfg_coef_all: self.cfg_coef_all,
                cfg_coef_txt: self.cfg_coef_txt,
            },
            max_body_bytes: self.max_body_mb.saturating_mul(1024 * 1024),
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config();
    config.validate()?;

    let transcoder: Option<Arc<dyn Transcoder>> = match &config.transcoder {
        Some(program) => {
            tracing::info!(program = %program.display(), "using transcoder");
            Some(Arc::new(FfmpegTranscoder::new(program)))
        }
        None => {
            tracing::warn!("ffmpeg not found; only WAV drum uploads will be accepted");
            None
        }
    };

    let generator = RemoteGenerator::new(&config.model_url, config.guidance, config.model_sample_rate)?;
    tracing::info!(endpoint = %generator.endpoint(), "model service");

    let normalizer = AudioNormalizer::new(transcoder, generator.sample_rate());

    let default_drums = match &config.drum_fallback {
        DrumFallback::Bundled(path) => {
            let drums = normalizer
                .normalize_file(path)
                .await
                .with_context(|| format!("failed to load default drums from {}", path.display()))?;
            tracing::info!(
                path = %path.display(),
                duration_s = drums.duration_s(),
                "loaded default drums"
            );
            Some(drums)
        }
        DrumFallback::None => None,
    };

    let state = AppState::new(
        Arc::new(generator),
        normalizer,
        OutputNamer::new(&config.output_dir),
        default_drums,
    );
    let app = router(Arc::new(state), config.max_body_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("could not bind {}", config.bind))?;
    tracing::info!("Listening on http://{}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
