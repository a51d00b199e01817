//! Render orchestration: validate a request, pick the backend for its capability,
//! delegate, then check the artifact before handing its path back.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::artifact::{audio_file_name, video_file_name, ArtifactKind};
use crate::backend::{AvatarBackend, VoiceBackend};
use crate::context::RenderContext;
use crate::error::{Capability, RenderError, RenderResult};
use crate::registry::AliasRegistry;
use crate::validate::{check_artifact, validate_text};

/// One render call's inputs. Built per invocation and dropped when it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub text: String,
    /// Voice alias; for video this is still the voice the avatar speaks with.
    pub target_alias: String,
    /// Avatar alias, present for video renders.
    pub secondary_alias: Option<String>,
    pub output_dir: PathBuf,
}

impl RenderRequest {
    pub fn audio(
        text: impl Into<String>,
        voice_alias: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            text: text.into(),
            target_alias: voice_alias.into(),
            secondary_alias: None,
            output_dir: output_dir.into(),
        }
    }

    pub fn video(
        text: impl Into<String>,
        avatar_alias: impl Into<String>,
        voice_alias: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            text: text.into(),
            target_alias: voice_alias.into(),
            secondary_alias: Some(avatar_alias.into()),
            output_dir: output_dir.into(),
        }
    }

    pub fn capability(&self) -> Capability {
        if self.secondary_alias.is_some() {
            Capability::Avatar
        } else {
            Capability::Voice
        }
    }
}

pub struct RenderController {
    voice_backend: Option<Arc<dyn VoiceBackend>>,
    avatar_backend: Option<Arc<dyn AvatarBackend>>,
    voices: AliasRegistry,
    avatars: AliasRegistry,
}

#[derive(Default)]
pub struct RenderControllerBuilder {
    voice_backend: Option<Arc<dyn VoiceBackend>>,
    avatar_backend: Option<Arc<dyn AvatarBackend>>,
    voices: Option<AliasRegistry>,
    avatars: Option<AliasRegistry>,
}

impl RenderControllerBuilder {
    pub fn voice_backend(mut self, backend: Arc<dyn VoiceBackend>) -> Self {
        self.voice_backend = Some(backend);
        self
    }

    pub fn avatar_backend(mut self, backend: Arc<dyn AvatarBackend>) -> Self {
        self.avatar_backend = Some(backend);
        self
    }

    pub fn voices(mut self, registry: AliasRegistry) -> Self {
        self.voices = Some(registry);
        self
    }

    pub fn avatars(mut self, registry: AliasRegistry) -> Self {
        self.avatars = Some(registry);
        self
    }

    pub fn build(self) -> RenderController {
        RenderController {
            voice_backend: self.voice_backend,
            avatar_backend: self.avatar_backend,
            voices: self
                .voices
                .unwrap_or_else(|| AliasRegistry::empty(Capability::Voice)),
            avatars: self
                .avatars
                .unwrap_or_else(|| AliasRegistry::empty(Capability::Avatar)),
        }
    }
}

impl RenderController {
    pub fn builder() -> RenderControllerBuilder {
        RenderControllerBuilder::default()
    }

    /// Dispatch on the request's capability.
    pub async fn render(&self, ctx: &RenderContext, request: &RenderRequest) -> RenderResult<PathBuf> {
        match request.secondary_alias.as_deref() {
            Some(avatar) => {
                self.render_video(ctx, &request.text, avatar, &request.target_alias, &request.output_dir)
                    .await
            }
            None => {
                self.render_audio(ctx, &request.text, &request.target_alias, &request.output_dir)
                    .await
            }
        }
    }

    pub async fn render_audio(
        &self,
        ctx: &RenderContext,
        text: &str,
        voice_alias: &str,
        output_dir: &Path,
    ) -> RenderResult<PathBuf> {
        validate_text(text)?;
        self.voices.require(voice_alias)?;
        let backend = self
            .voice_backend
            .as_ref()
            .ok_or(RenderError::BackendNotConfigured(Capability::Voice))?;

        let dest = prepare_destination(output_dir, &audio_file_name(voice_alias)).await?;
        {
            let _enter = ctx.span().enter();
            info!(backend = backend.name(), voice = voice_alias, dest = %dest.display(), "rendering audio");
        }

        let produced = backend.generate(ctx, text, voice_alias, &dest).await?;
        accept_artifact(ctx, produced, ArtifactKind::Audio).await
    }

    pub async fn render_video(
        &self,
        ctx: &RenderContext,
        text: &str,
        avatar_alias: &str,
        voice_alias: &str,
        output_dir: &Path,
    ) -> RenderResult<PathBuf> {
        validate_text(text)?;
        self.avatars.require(avatar_alias)?;
        self.voices.require(voice_alias)?;
        let backend = self
            .avatar_backend
            .as_ref()
            .ok_or(RenderError::BackendNotConfigured(Capability::Avatar))?;

        let dest = prepare_destination(output_dir, &video_file_name(avatar_alias, voice_alias)).await?;
        {
            let _enter = ctx.span().enter();
            info!(
                backend = backend.name(),
                avatar = avatar_alias,
                voice = voice_alias,
                dest = %dest.display(),
                "rendering video"
            );
        }

        let produced = backend
            .generate(ctx, text, avatar_alias, voice_alias, &dest)
            .await?;
        accept_artifact(ctx, produced, ArtifactKind::Video).await
    }
}

async fn prepare_destination(output_dir: &Path, file_name: &str) -> RenderResult<PathBuf> {
    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| RenderError::io(output_dir, e))?;
    Ok(output_dir.join(file_name))
}

async fn accept_artifact(
    ctx: &RenderContext,
    path: PathBuf,
    kind: ArtifactKind,
) -> RenderResult<PathBuf> {
    let checked = check_artifact(&path, kind).await;
    let _enter = ctx.span().enter();
    if let Err(e) = checked {
        warn!(error = %e, "backend artifact rejected");
        return Err(e);
    }
    info!(path = %path.display(), "render complete");
    Ok(path)
}
