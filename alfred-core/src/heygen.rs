//! HeyGen avatar backend: video jobs submitted, polled, and downloaded via `JobRunner`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

use crate::backend::AvatarBackend;
use crate::config::ConfigProvider;
use crate::context::RenderContext;
use crate::error::{RenderError, RenderResult};
use crate::http::{
    build_client, error_body, send_within, stream_to_file, SendError, StreamError, API_TIMEOUT,
    IDLE_TIMEOUT,
};
use crate::job::{
    DownloadFailure, JobApi, JobRunner, JobStatus, JobTimings, RetryPolicy, StatusReport,
    SubmitRequest,
};

pub const HEYGEN_API_URL: &str = "https://api.heygen.com/v2";
pub const HEYGEN_PROVIDER: &str = "heygen";
/// Output orientation sent with every submission.
pub const ORIENTATION: &str = "vertical";

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    video_inputs: Vec<VideoInput<'a>>,
    dimension: &'a str,
}

#[derive(Debug, Serialize)]
struct VideoInput<'a> {
    character: Character<'a>,
    voice: Voice<'a>,
}

#[derive(Debug, Serialize)]
struct Character<'a> {
    r#type: &'a str,
    avatar_id: &'a str,
}

#[derive(Debug, Serialize)]
struct Voice<'a> {
    r#type: &'a str,
    input_text: &'a str,
    voice_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateData {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    status: String,
    #[serde(default)]
    video_url: Option<String>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// The service reports errors either as a bare string or as `{code, message, detail}`.
fn describe_error(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => ["detail", "message"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|m| m.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| v.to_string()),
        other => other.to_string(),
    }
}

fn parse_status(data: StatusData) -> StatusReport {
    let status = match data.status.as_str() {
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        // pending, waiting, processing
        _ => JobStatus::Processing,
    };
    StatusReport {
        status,
        result_url: data.video_url,
        error: data.error.as_ref().map(describe_error),
    }
}

/// HTTP status codes worth retrying a download on.
fn is_transient_status(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::REQUEST_TIMEOUT
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Wire client for the HeyGen video API.
pub struct HeyGenApi {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    idle_timeout: Duration,
}

impl HeyGenApi {
    pub fn new(api_key: impl Into<String>) -> RenderResult<Self> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            base_url: HEYGEN_API_URL.to_string(),
            idle_timeout: IDLE_TIMEOUT,
        })
    }

    /// Bound on silence while downloading: before headers, and between body chunks.
    pub fn with_idle_timeout(mut self, idle: Duration) -> Self {
        self.idle_timeout = idle;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl JobApi for HeyGenApi {
    async fn submit(&self, request: &SubmitRequest) -> RenderResult<String> {
        let body = GenerateBody {
            video_inputs: vec![VideoInput {
                character: Character {
                    r#type: "avatar",
                    avatar_id: &request.avatar_id,
                },
                voice: Voice {
                    r#type: "text",
                    input_text: &request.text,
                    voice_id: &request.voice_id,
                },
            }],
            dimension: ORIENTATION,
        };
        let response = self
            .client
            .post(format!("{}/video_generate", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .timeout(API_TIMEOUT)
            .json(&body)
            .send()
            .await
            .map_err(|e| RenderError::Submission(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = error_body(response).await;
            return Err(RenderError::Submission(format!("API error ({status}): {body}")));
        }

        let envelope: Envelope<GenerateData> = response
            .json()
            .await
            .map_err(|e| RenderError::Submission(format!("malformed response: {e}")))?;
        match envelope.data {
            Some(d) => Ok(d.video_id),
            None => Err(RenderError::Submission(
                envelope
                    .error
                    .as_ref()
                    .map(describe_error)
                    .unwrap_or_else(|| "response carried no video_id".to_string()),
            )),
        }
    }

    async fn status(&self, job_id: &str) -> RenderResult<StatusReport> {
        let status_err = |message: String| RenderError::StatusCheck {
            job_id: job_id.to_string(),
            message,
        };
        let response = self
            .client
            .get(format!("{}/video_status", self.base_url))
            .query(&[("video_id", job_id)])
            .header("X-Api-Key", &self.api_key)
            .timeout(API_TIMEOUT)
            .send()
            .await
            .map_err(|e| status_err(format!("transport error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = error_body(response).await;
            return Err(status_err(format!("API error ({status}): {body}")));
        }

        let envelope: Envelope<StatusData> = response
            .json()
            .await
            .map_err(|e| status_err(format!("malformed response: {e}")))?;
        let data = envelope
            .data
            .ok_or_else(|| status_err("response carried no data".to_string()))?;
        Ok(parse_status(data))
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<PathBuf, DownloadFailure> {
        let response = send_within(self.client.get(url), self.idle_timeout)
            .await
            .map_err(|e| match e {
                SendError::Transport(ref t) if t.is_builder() => {
                    DownloadFailure::Permanent(format!("invalid download request: {t}"))
                }
                other => DownloadFailure::Transient(other.to_string()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("HTTP {status}");
            return Err(if is_transient_status(status) {
                DownloadFailure::Transient(message)
            } else {
                DownloadFailure::Permanent(message)
            });
        }

        match stream_to_file(response, dest, self.idle_timeout).await {
            Ok((path, _)) => Ok(path),
            Err(e @ (StreamError::Body(_) | StreamError::Stalled(_))) => {
                Err(DownloadFailure::Transient(e.to_string()))
            }
            Err(e @ StreamError::Local(_)) => Err(DownloadFailure::Permanent(e.to_string())),
        }
    }
}

pub struct HeyGenBackend<A = HeyGenApi> {
    config: Arc<dyn ConfigProvider>,
    runner: JobRunner<A>,
}

impl HeyGenBackend<HeyGenApi> {
    /// Resolves the `heygen` secret up front so a missing key fails before any render.
    /// `base_url` overrides the public API root.
    pub fn new(config: Arc<dyn ConfigProvider>, base_url: Option<&str>) -> RenderResult<Self> {
        let mut api = HeyGenApi::new(config.resolve_secret(HEYGEN_PROVIDER)?)?;
        if let Some(url) = base_url {
            api = api.with_base_url(url);
        }
        Ok(Self::with_api(config, api))
    }
}

impl<A: JobApi> HeyGenBackend<A> {
    pub fn with_api(config: Arc<dyn ConfigProvider>, api: A) -> Self {
        Self {
            config,
            runner: JobRunner::new(api),
        }
    }

    pub fn with_timings(mut self, timings: JobTimings) -> Self {
        self.runner = self.runner.with_timings(timings);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.runner = self.runner.with_retry(retry);
        self
    }
}

#[async_trait]
impl<A: JobApi> AvatarBackend for HeyGenBackend<A> {
    fn name(&self) -> &str {
        HEYGEN_PROVIDER
    }

    async fn generate(
        &self,
        ctx: &RenderContext,
        text: &str,
        avatar_alias: &str,
        voice_alias: &str,
        output_path: &Path,
    ) -> RenderResult<PathBuf> {
        let request = SubmitRequest {
            text: text.to_string(),
            avatar_id: self.config.resolve_avatar_identifier(avatar_alias)?,
            voice_id: self.config.resolve_voice_identifier(voice_alias)?,
        };
        self.runner
            .run(&request, output_path)
            .instrument(ctx.span().clone())
            .await
    }
}
