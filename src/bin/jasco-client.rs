//! Simple command-line client for the JASCO generation server.
//!
//! Posts a multipart request to `/generate`, saves the returned WAV, and exits
//! 0 on success or 1 on error.
//!
//! # Usage
//!
//! ```sh
//! jasco-client \
//!   --prompt "lofi hip hop, mellow keys" \
//!   --chords '[["Cmaj7", 0], ["Am7", 2.5], ["Dm7", 5], ["G7", 7.5]]' \
//!   --output /tmp/lofi.wav
//!
//! # With a drum reference:
//! jasco-client --prompt "funk band" --drums beat.mp3 --output /tmp/funk.wav
//! ```

use std::{path::PathBuf, time::Duration};

use anyhow::{Context, bail};
use clap::Parser;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::time::timeout;

#[derive(Parser)]
#[command(name = "jasco-client", about = "Send a generation request to the JASCO server")]
struct Args {
    /// Text description; omit for the server's default prompt
    #[arg(long, default_value = "")]
    prompt: String,

    /// Chord progression as JSON, e.g. '[["C", 0], ["G", 4]]'
    #[arg(long)]
    chords: Option<String>,

    /// Drum reference audio file (any format the server can decode)
    #[arg(long)]
    drums: Option<PathBuf>,

    /// Where to save the generated WAV (default: file name reported by the server)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Server base URL
    #[arg(long, env = "JASCO_SERVER", default_value = "http://localhost:8000")]
    server: String,

    /// Timeout in seconds to wait for generation (default: 300)
    #[arg(long, default_value = "300")]
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct ErrorResponse {
    detail: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut form = Form::new().text("prompt", args.prompt);
    if let Some(chords) = args.chords {
        form = form.text("chords", chords);
    }
    if let Some(path) = &args.drums {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "drums".into());
        form = form.part("drums", Part::bytes(bytes).file_name(file_name));
    }

    let url = format!("{}/generate", args.server.trim_end_matches('/'));
    let request = reqwest::Client::new().post(&url).multipart(form).send();

    let response = timeout(Duration::from_secs(args.timeout_secs), request)
        .await
        .context("timed out waiting for server response")?
        .with_context(|| format!("failed to reach {url}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(error) => bail!("generation failed ({status}): {}", error.detail),
            Err(_) => bail!("generation failed ({status}): {}", body.trim()),
        }
    }

    let server_path = response
        .headers()
        .get("x-file-path")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let audio = response.bytes().await.context("failed to read response body")?;

    let output = match (args.output, &server_path) {
        (Some(path), _) => path,
        (None, Some(stem)) => {
            let name = stem.rsplit('/').next().unwrap_or(stem.as_str());
            PathBuf::from(format!("{name}.wav"))
        }
        (None, None) => PathBuf::from("generated.wav"),
    };
    tokio::fs::write(&output, &audio)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    if let Some(stem) = server_path {
        eprintln!("server saved {stem}.wav");
    }
    eprintln!("received {} bytes → {}", audio.len(), output.display());
    println!("{}", output.display());
    Ok(())
}
