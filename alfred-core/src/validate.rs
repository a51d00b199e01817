//! Request preconditions and artifact postconditions.

use std::path::Path;

use crate::artifact::ArtifactKind;
use crate::error::{RenderError, RenderResult};

pub const TEXT_MIN_CHARS: usize = 10;
pub const TEXT_MAX_CHARS: usize = 4000;

/// Text length is counted in characters, not bytes.
pub fn validate_text(text: &str) -> RenderResult<()> {
    let len = text.chars().count();
    if len < TEXT_MIN_CHARS {
        return Err(RenderError::InvalidInput(format!(
            "text is {} characters, minimum is {}",
            len, TEXT_MIN_CHARS
        )));
    }
    if len > TEXT_MAX_CHARS {
        return Err(RenderError::InvalidInput(format!(
            "text is {} characters, maximum is {}",
            len, TEXT_MAX_CHARS
        )));
    }
    Ok(())
}

/// The artifact a backend hands back must exist and clear the size floor for its kind.
pub async fn check_artifact(path: &Path, kind: ArtifactKind) -> RenderResult<()> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(_) => {
            return Err(RenderError::BackendContractViolation {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            })
        }
    };
    if !meta.is_file() {
        return Err(RenderError::BackendContractViolation {
            path: path.to_path_buf(),
            reason: "not a regular file".to_string(),
        });
    }
    let floor = kind.size_floor();
    if meta.len() <= floor {
        return Err(RenderError::BackendContractViolation {
            path: path.to_path_buf(),
            reason: format!("{} bytes, expected more than {}", meta.len(), floor),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn text_bounds_inclusive() {
        assert!(validate_text(&"a".repeat(10)).is_ok());
        assert!(validate_text(&"a".repeat(4000)).is_ok());
    }

    #[test]
    fn text_too_short_names_minimum() {
        let err = validate_text("too short").unwrap_err();
        assert!(matches!(err, RenderError::InvalidInput(_)));
        assert!(err.to_string().contains("minimum is 10"));
    }

    #[test]
    fn text_too_long_names_maximum() {
        let err = validate_text(&"a".repeat(4001)).unwrap_err();
        assert!(err.to_string().contains("maximum is 4000"));
    }

    #[test]
    fn multibyte_counts_chars() {
        // 10 characters, 20 bytes
        assert!(validate_text(&"é".repeat(10)).is_ok());
    }

    #[tokio::test]
    async fn audio_zero_bytes_violates() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.mp3");
        fs::write(&p, b"").unwrap();
        assert!(matches!(
            check_artifact(&p, ArtifactKind::Audio).await,
            Err(RenderError::BackendContractViolation { .. })
        ));
        fs::write(&p, b"x").unwrap();
        assert!(check_artifact(&p, ArtifactKind::Audio).await.is_ok());
    }

    #[tokio::test]
    async fn video_floor() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("v.mp4");
        fs::write(&p, vec![0u8; 50 * 1024]).unwrap();
        assert!(check_artifact(&p, ArtifactKind::Video).await.is_err());
        fs::write(&p, vec![0u8; 50 * 1024 + 1]).unwrap();
        assert!(check_artifact(&p, ArtifactKind::Video).await.is_ok());
    }

    #[tokio::test]
    async fn missing_artifact_violates() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_artifact(&dir.path().join("nope.mp3"), ArtifactKind::Audio)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
