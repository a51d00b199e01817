//! Shared HTTP plumbing for the remote backends.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::artifact::PartialFile;
use crate::config::ConfigError;
use crate::error::RenderError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Whole-request timeout for the small JSON calls (submit, status).
pub(crate) const API_TIMEOUT: Duration = Duration::from_secs(60);
/// Longest silence tolerated while waiting for headers or the next body chunk
/// of a streamed response. Total transfer time is not bounded.
pub(crate) const IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 512;

pub(crate) fn build_client() -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Read an error response body for diagnostics, truncated.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    let mut body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}

/// Where a streamed body copy failed.
#[derive(Debug)]
pub(crate) enum StreamError {
    /// Reading the body from the network.
    Body(reqwest::Error),
    /// No body bytes arrived within the idle bound.
    Stalled(Duration),
    /// Writing to the local file.
    Local(RenderError),
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamError::Body(e) => write!(f, "body stream interrupted: {e}"),
            StreamError::Stalled(idle) => write!(f, "body stream stalled for {idle:?}"),
            StreamError::Local(e) => write!(f, "{e}"),
        }
    }
}

/// Send a request, giving up if no response headers arrive within `idle`.
pub(crate) async fn send_within(
    request: reqwest::RequestBuilder,
    idle: Duration,
) -> Result<reqwest::Response, SendError> {
    match tokio::time::timeout(idle, request.send()).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => Err(SendError::Transport(e)),
        Err(_) => Err(SendError::NoResponse(idle)),
    }
}

#[derive(Debug)]
pub(crate) enum SendError {
    Transport(reqwest::Error),
    NoResponse(Duration),
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendError::Transport(e) => write!(f, "transport error: {e}"),
            SendError::NoResponse(idle) => write!(f, "no response within {idle:?}"),
        }
    }
}

/// Copy a response body to `dest` chunk by chunk through a `.part` file.
/// Works the same whether the server sent one buffer or a chunked body.
/// Each chunk must arrive within `idle` of the previous one.
pub(crate) async fn stream_to_file(
    response: reqwest::Response,
    dest: &Path,
    idle: Duration,
) -> Result<(PathBuf, u64), StreamError> {
    let mut out = PartialFile::create(dest).await.map_err(StreamError::Local)?;
    let mut stream = response.bytes_stream();
    loop {
        let next = tokio::time::timeout(idle, stream.next())
            .await
            .map_err(|_| StreamError::Stalled(idle))?;
        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(StreamError::Body)?;
        out.write_chunk(&chunk).await.map_err(StreamError::Local)?;
    }
    let written = out.bytes_written();
    let path = out.commit().await.map_err(StreamError::Local)?;
    Ok((path, written))
}
