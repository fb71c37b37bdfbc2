//! Generation invoker.
//!
//! The JASCO model runs out of process. [`MusicGenerator`] is the seam the
//! HTTP handler calls through; [`RemoteGenerator`] speaks JSON to the model
//! service and tests substitute their own implementation.
//!
//! # Wire format
//!
//! `POST <model_url>/generate_music`:
//!
//! ```json
//! {
//!   "descriptions": ["Strings, woodwind, orchestral, symphony."],
//!   "chords": [["Am7", 0.0], ["D7", 5.0], ["G", 8.0]],
//!   "drums": {"sample_rate": 32000, "channels": 1, "samples": "<base64 f32le>"},
//!   "cfg_coef_all": 5.0,
//!   "cfg_coef_txt": 0.0
//! }
//! ```
//!
//! Response: `{"waveforms": [{"sample_rate": 32000, "channels": 1, "samples": "..."}]}`,
//! one entry per description.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::audio::Waveform;
use crate::chords::ChordProgression;
use crate::config::GuidanceConfig;
use crate::{Error, Result};

/// Everything the model is conditioned on for one call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Text descriptions; the model returns one waveform for each.
    pub descriptions: Vec<String>,
    pub chords: ChordProgression,
    /// Mono drum reference at the model's sample rate.
    pub drums: Option<Waveform>,
}

/// A pretrained text + chords + drums → music model.
#[async_trait]
pub trait MusicGenerator: Send + Sync {
    /// Sample rate of the waveforms the model returns.
    fn sample_rate(&self) -> u32;

    /// Run one generation to completion. Returns one waveform per description.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Waveform>>;
}

/// Waveform as carried over JSON.
#[derive(Debug, Serialize, Deserialize)]
struct WireAudio {
    sample_rate: u32,
    channels: u16,
    /// Base64 of little-endian f32 interleaved samples.
    samples: String,
}

impl WireAudio {
    fn encode(waveform: &Waveform) -> Self {
        let bytes: Vec<u8> = waveform
            .samples
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        Self {
            sample_rate: waveform.sample_rate,
            channels: waveform.channels,
            samples: BASE64.encode(bytes),
        }
    }

    fn decode(self) -> Result<Waveform> {
        let bytes = BASE64
            .decode(self.samples.as_bytes())
            .map_err(|e| Error::Generation(format!("invalid sample encoding: {e}")))?;
        if bytes.len() % 4 != 0 {
            return Err(Error::Generation(format!(
                "sample payload of {} bytes is not a whole number of f32 samples",
                bytes.len()
            )));
        }
        if self.channels == 0 {
            return Err(Error::Generation("model returned audio with 0 channels".into()));
        }
        let samples = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Waveform::new(samples, self.sample_rate, self.channels))
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    descriptions: &'a [String],
    chords: &'a ChordProgression,
    drums: Option<WireAudio>,
    cfg_coef_all: f64,
    cfg_coef_txt: f64,
}

#[derive(Deserialize)]
struct WireResponse {
    waveforms: Vec<WireAudio>,
}

/// [`MusicGenerator`] backed by a model inference service over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteGenerator {
    http: reqwest::Client,
    endpoint: Url,
    guidance: GuidanceConfig,
    sample_rate: u32,
}

impl RemoteGenerator {
    /// `base_url` is the service root; requests go to `<base_url>/generate_music`.
    pub fn new(base_url: &str, guidance: GuidanceConfig, sample_rate: u32) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid model URL '{base_url}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base
            .join("generate_music")
            .map_err(|e| Error::Config(format!("invalid model URL '{base_url}': {e}")))?;

        // No request timeout: generation runs as long as the model needs.
        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            endpoint,
            guidance,
            sample_rate,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl MusicGenerator for RemoteGenerator {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<Waveform>> {
        let body = WireRequest {
            descriptions: &request.descriptions,
            chords: &request.chords,
            drums: request.drums.as_ref().map(WireAudio::encode),
            cfg_coef_all: self.guidance.cfg_coef_all,
            cfg_coef_txt: self.guidance.cfg_coef_txt,
        };

        let response = self.http.post(self.endpoint.clone()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "model service responded with {status}: {}",
                detail.trim()
            )));
        }

        let wire: WireResponse = response.json().await?;
        if wire.waveforms.len() != request.descriptions.len() {
            return Err(Error::Generation(format!(
                "expected {} waveforms, model returned {}",
                request.descriptions.len(),
                wire.waveforms.len()
            )));
        }
        wire.waveforms.into_iter().map(WireAudio::decode).collect()
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, http::StatusCode, routing::post};

    use super::*;

    fn request(drums: Option<Waveform>) -> GenerationRequest {
        GenerationRequest {
            descriptions: vec!["lofi piano".into()],
            chords: ChordProgression::default_progression(),
            drums,
        }
    }

    /// Serve `router` on an ephemeral port and return its base URL.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_wire_audio_encoding() {
        let waveform = Waveform::new(vec![0.0, 1.0, -0.5], 32_000, 1);
        let wire = WireAudio::encode(&waveform);
        assert_eq!(wire.samples, BASE64.encode([0u8, 0, 0, 0, 0, 0, 128, 63, 0, 0, 0, 191]));
        assert_eq!(wire.decode().unwrap(), waveform);
    }

    #[test]
    fn test_wire_audio_rejects_ragged_payload() {
        let wire = WireAudio {
            sample_rate: 32_000,
            channels: 1,
            samples: BASE64.encode([1u8, 2, 3]),
        };
        assert!(wire.decode().is_err());
    }

    #[test]
    fn test_endpoint_join() {
        let generator =
            RemoteGenerator::new("http://models:9000/jasco", GuidanceConfig::default(), 32_000).unwrap();
        assert_eq!(generator.endpoint().as_str(), "http://models:9000/jasco/generate_music");
        assert!(RemoteGenerator::new("not a url", GuidanceConfig::default(), 32_000).is_err());
    }

    #[tokio::test]
    async fn test_remote_generate_round_trip() {
        let router = Router::new().route(
            "/generate_music",
            post(|Json(body): Json<serde_json::Value>| async move {
                assert_eq!(body["descriptions"][0], "lofi piano");
                assert_eq!(body["chords"][1][0], "D7");
                assert_eq!(body["cfg_coef_all"], 5.0);
                assert_eq!(body["drums"]["channels"], 1);
                let echo = Waveform::new(vec![0.25; 4], 32_000, 1);
                Json(serde_json::json!({ "waveforms": [WireAudio::encode(&echo)] }))
            }),
        );
        let url = serve(router).await;

        let generator = RemoteGenerator::new(&url, GuidanceConfig::default(), 32_000).unwrap();
        let drums = Waveform::new(vec![0.1; 8], 32_000, 1);
        let output = generator.generate(&request(Some(drums))).await.unwrap();
        assert_eq!(output.len(), 1);
        assert_eq!(output[0].samples, vec![0.25; 4]);
    }

    #[tokio::test]
    async fn test_remote_error_status_is_reported() {
        let router = Router::new().route(
            "/generate_music",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "CUDA out of memory") }),
        );
        let url = serve(router).await;

        let generator = RemoteGenerator::new(&url, GuidanceConfig::default(), 32_000).unwrap();
        let err = generator.generate(&request(None)).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("500"), "{message}");
        assert!(message.contains("CUDA out of memory"), "{message}");
    }
}
