//! Error taxonomy for render requests: one variant per violated contract or failed phase.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::ConfigError;

/// Which generation capability a request needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Voice,
    Avatar,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Voice => "voice",
            Capability::Avatar => "avatar",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unknown alias '{alias}' (not in {registry} registry)")]
    UnknownAlias { alias: String, registry: String },

    #[error("no {0} backend configured")]
    BackendNotConfigured(Capability),

    #[error("job submission failed: {0}")]
    Submission(String),

    #[error("generation job {job_id} failed: {detail}")]
    GenerationFailed { job_id: String, detail: String },

    #[error("generation job {job_id} did not finish within {elapsed:?}")]
    PollTimeout { job_id: String, elapsed: Duration },

    #[error("status check for job {job_id} failed: {message}")]
    StatusCheck { job_id: String, message: String },

    #[error("download failed after {attempts} attempt(s): {message}")]
    Download { attempts: u32, message: String },

    #[error("backend returned unusable artifact {}: {reason}", path.display())]
    BackendContractViolation { path: PathBuf, reason: String },

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    /// Short label for the failure class, used when reporting at the process boundary.
    pub fn category(&self) -> &'static str {
        match self {
            RenderError::InvalidInput(_)
            | RenderError::UnknownAlias { .. }
            | RenderError::BackendContractViolation { .. } => "Contract Violation",
            RenderError::BackendNotConfigured(_) | RenderError::Config(_) => "Configuration Error",
            RenderError::Submission(_) => "Submission Error",
            RenderError::GenerationFailed { .. } => "Generation Failed",
            RenderError::PollTimeout { .. } => "Timeout",
            RenderError::StatusCheck { .. } => "Status Check Error",
            RenderError::Download { .. } => "Download Error",
            RenderError::Synthesis(_) => "Synthesis Error",
            RenderError::Io { .. } => "I/O Error",
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RenderError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_kinds_share_category() {
        let e = RenderError::InvalidInput("too short".into());
        assert_eq!(e.category(), "Contract Violation");
        let e = RenderError::UnknownAlias {
            alias: "x".into(),
            registry: "voice".into(),
        };
        assert_eq!(e.category(), "Contract Violation");
        assert!(e.to_string().contains("'x'"));
        assert!(e.to_string().contains("voice registry"));
    }

    #[test]
    fn backend_not_configured_names_capability() {
        let e = RenderError::BackendNotConfigured(Capability::Avatar);
        assert_eq!(e.to_string(), "no avatar backend configured");
    }
}
