//! Generation backends: one trait per capability, one implementation per remote service.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::context::RenderContext;
use crate::error::RenderResult;

/// Text → speech audio file.
#[async_trait]
pub trait VoiceBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Write synthesized audio for `text` to `output_path` and return the written path.
    async fn generate(
        &self,
        ctx: &RenderContext,
        text: &str,
        voice_alias: &str,
        output_path: &Path,
    ) -> RenderResult<PathBuf>;
}

/// Text → talking-avatar video file.
#[async_trait]
pub trait AvatarBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(
        &self,
        ctx: &RenderContext,
        text: &str,
        avatar_alias: &str,
        voice_alias: &str,
        output_path: &Path,
    ) -> RenderResult<PathBuf>;
}
