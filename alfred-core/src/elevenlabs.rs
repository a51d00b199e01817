//! ElevenLabs voice backend: one synchronous synthesis call per render.

use async_trait::async_trait;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Instrument};

use crate::backend::VoiceBackend;
use crate::config::ConfigProvider;
use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult};
use crate::http::{build_client, error_body, send_within, stream_to_file, API_TIMEOUT, IDLE_TIMEOUT};

pub const ELEVENLABS_API_URL: &str = "https://api.elevenlabs.io/v1";
pub const ELEVENLABS_PROVIDER: &str = "elevenlabs";
pub const DEFAULT_MODEL: &str = "eleven_multilingual_v2";
const OUTPUT_FORMAT: &str = "mp3_44100_128";

pub struct ElevenLabsBackend {
    config: Arc<dyn ConfigProvider>,
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    response_timeout: Duration,
    idle_timeout: Duration,
}

impl ElevenLabsBackend {
    /// Resolves the `elevenlabs` secret up front so a missing key fails before any render.
    pub fn new(config: Arc<dyn ConfigProvider>) -> RenderResult<Self> {
        let api_key = config.resolve_secret(ELEVENLABS_PROVIDER)?;
        Ok(Self {
            config,
            client: build_client()?,
            api_key,
            base_url: ELEVENLABS_API_URL.to_string(),
            response_timeout: API_TIMEOUT,
            idle_timeout: IDLE_TIMEOUT,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `response` bounds the wait for headers; `idle` bounds each gap in the
    /// audio stream. A long synthesis that keeps streaming is never cut off.
    pub fn with_timeouts(mut self, response: Duration, idle: Duration) -> Self {
        self.response_timeout = response;
        self.idle_timeout = idle;
        self
    }

    fn build_request(&self, voice_id: &str, text: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/text-to-speech/{}", self.base_url, voice_id);
        self.client
            .post(url)
            .query(&[("output_format", OUTPUT_FORMAT)])
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&json!({
                "text": text,
                "model_id": DEFAULT_MODEL,
            }))
    }

    async fn synthesize(
        &self,
        text: &str,
        voice_alias: &str,
        output_path: &Path,
    ) -> RenderResult<PathBuf> {
        let voice_id = self.config.resolve_voice_identifier(voice_alias)?;
        info!(voice = voice_alias, chars = text.chars().count(), "requesting speech synthesis");

        let response = send_within(self.build_request(&voice_id, text), self.response_timeout)
            .await
            .map_err(|e| RenderError::Synthesis(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = error_body(response).await;
            error!("TTS API error ({}): {}", status, body);
            return Err(RenderError::Synthesis(format!("API error ({status}): {body}")));
        }

        let (path, written) = stream_to_file(response, output_path, self.idle_timeout)
            .await
            .map_err(|e| RenderError::Synthesis(e.to_string()))?;
        info!(path = %path.display(), bytes = written, "audio written");
        Ok(path)
    }
}

#[async_trait]
impl VoiceBackend for ElevenLabsBackend {
    fn name(&self) -> &str {
        ELEVENLABS_PROVIDER
    }

    async fn generate(
        &self,
        ctx: &RenderContext,
        text: &str,
        voice_alias: &str,
        output_path: &Path,
    ) -> RenderResult<PathBuf> {
        self.synthesize(text, voice_alias, output_path)
            .instrument(ctx.span().clone())
            .await
    }
}
