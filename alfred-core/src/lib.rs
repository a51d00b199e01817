//! Alfred core: validated text-to-media rendering over remote voice and avatar services.

pub mod artifact;
pub mod backend;
pub mod config;
pub mod context;
pub mod elevenlabs;
pub mod error;
pub mod heygen;
mod http;
pub mod job;
pub mod orchestration;
pub mod registry;
pub mod validate;

pub use artifact::{audio_file_name, video_file_name, ArtifactKind, PartialFile, MIN_VIDEO_BYTES};
pub use backend::{AvatarBackend, VoiceBackend};
pub use config::{ConfigError, ConfigProvider, FileConfig, DEFAULT_CONFIG_PATH};
pub use context::RenderContext;
pub use elevenlabs::ElevenLabsBackend;
pub use error::{Capability, RenderError, RenderResult};
pub use heygen::{HeyGenApi, HeyGenBackend};
pub use job::{
    DownloadFailure, GenerationJob, JobApi, JobRunner, JobStatus, JobTimings, RetryPolicy,
    StatusReport, SubmitRequest,
};
pub use orchestration::{RenderController, RenderControllerBuilder, RenderRequest};
pub use registry::AliasRegistry;
pub use validate::{check_artifact, validate_text, TEXT_MAX_CHARS, TEXT_MIN_CHARS};
