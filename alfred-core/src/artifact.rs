//! Artifact kinds, deterministic destination names, and the `.part` writer.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::error::{RenderError, RenderResult};

/// Smallest plausible video payload; the avatar service can hand back a near-empty
/// placeholder during transient failures.
pub const MIN_VIDEO_BYTES: u64 = 50 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Audio,
    Video,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Audio => "mp3",
            ArtifactKind::Video => "mp4",
        }
    }

    /// Artifact must be strictly larger than this many bytes.
    pub fn size_floor(&self) -> u64 {
        match self {
            ArtifactKind::Audio => 0,
            ArtifactKind::Video => MIN_VIDEO_BYTES,
        }
    }
}

/// `{voice}_output.mp3`
pub fn audio_file_name(voice_alias: &str) -> String {
    format!("{}_output.{}", voice_alias, ArtifactKind::Audio.extension())
}

/// `{avatar}_{voice}_output.mp4`
pub fn video_file_name(avatar_alias: &str, voice_alias: &str) -> String {
    format!(
        "{}_{}_output.{}",
        avatar_alias,
        voice_alias,
        ArtifactKind::Video.extension()
    )
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

/// Streams bytes into `<dest>.part` and renames over `dest` on `commit`.
/// Dropping an uncommitted writer removes the partial file, so a failed or
/// cancelled render never leaves a half-written artifact at `dest`.
#[derive(Debug)]
pub struct PartialFile {
    dest: PathBuf,
    part: PathBuf,
    file: Option<tokio::fs::File>,
    written: u64,
}

impl PartialFile {
    pub async fn create(dest: impl Into<PathBuf>) -> RenderResult<Self> {
        let dest = dest.into();
        let part = part_path(&dest);
        let file = tokio::fs::File::create(&part)
            .await
            .map_err(|e| RenderError::io(&part, e))?;
        Ok(Self {
            dest,
            part,
            file: Some(file),
            written: 0,
        })
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> RenderResult<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(RenderError::io(
                &self.part,
                std::io::Error::other("write after commit"),
            ));
        };
        file.write_all(chunk)
            .await
            .map_err(|e| RenderError::io(&self.part, e))?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Flush, close, and move into place. Returns the final path.
    pub async fn commit(mut self) -> RenderResult<PathBuf> {
        if let Some(mut file) = self.file.take() {
            file.flush().await.map_err(|e| RenderError::io(&self.part, e))?;
            file.sync_all()
                .await
                .map_err(|e| RenderError::io(&self.part, e))?;
        }
        tokio::fs::rename(&self.part, &self.dest)
            .await
            .map_err(|e| RenderError::io(&self.dest, e))?;
        self.part = PathBuf::new();
        Ok(self.dest.clone())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        self.file.take();
        if !self.part.as_os_str().is_empty() {
            let _ = std::fs::remove_file(&self.part);
        }
    }
}
