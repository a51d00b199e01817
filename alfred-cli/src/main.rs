//! Alfred CLI: render text to an MP3 (`audio`) or an avatar MP4 (`video`).

use alfred_core::config::Defaults;
use alfred_core::elevenlabs::ELEVENLABS_PROVIDER;
use alfred_core::heygen::HEYGEN_PROVIDER;
use alfred_core::{
    AliasRegistry, AvatarBackend, ConfigError, ConfigProvider, ElevenLabsBackend, FileConfig,
    HeyGenBackend, RenderContext, RenderController, RenderError, RenderRequest,
    VoiceBackend, DEFAULT_CONFIG_PATH,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_VOICE: &str = "alfred_calm";
const DEFAULT_AVATAR: &str = "business_suit";
const DEFAULT_OUTPUT_DIR: &str = "./output";

#[derive(Debug, Parser)]
#[command(name = "alfred", version, about = "Render text to audio or avatar video")]
struct Cli {
    /// Alias/asset configuration file (YAML, or TOML by extension)
    #[arg(long, global = true, env = "ALFRED_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Trace identifier attached to every log line; generated when omitted
    #[arg(long, global = true)]
    trace_id: Option<String>,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Json)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render text into an MP3 with the configured voice provider
    Audio {
        /// Text to render (10 to 4000 characters)
        #[arg(long)]
        text: String,
        /// Voice alias [default: defaults.voice from config, else alfred_calm]
        #[arg(long)]
        voice: Option<String>,
        /// Output directory [default: defaults.output_dir from config, else ./output]
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Render text into an MP4 of an avatar speaking it
    Video {
        /// Text the avatar speaks (10 to 4000 characters)
        #[arg(long)]
        text: String,
        /// Avatar alias [default: defaults.avatar from config, else business_suit]
        #[arg(long)]
        avatar: Option<String>,
        /// Voice alias [default: defaults.voice from config, else alfred_calm]
        #[arg(long)]
        voice: Option<String>,
        /// Output directory [default: defaults.output_dir from config, else ./output]
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().with_current_span(true).init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn output_dir(arg: Option<PathBuf>, defaults: &Defaults) -> PathBuf {
    arg.or_else(|| defaults.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR))
}

/// A backend whose secret is missing stays unset; the controller then reports it
/// as not configured after the request's own preconditions have been checked.
fn optional_backend<T>(built: Result<T, RenderError>, provider: &str) -> Option<T> {
    match built {
        Ok(b) => Some(b),
        Err(e) => {
            warn!(provider, error = %e, "backend unavailable");
            None
        }
    }
}

fn build_controller(config: &Arc<FileConfig>, need_avatar: bool) -> RenderController {
    let provider: Arc<dyn ConfigProvider> = config.clone();
    let endpoints = config.endpoints();
    let mut builder = RenderController::builder()
        .voices(AliasRegistry::voices_from(&**config))
        .avatars(AliasRegistry::avatars_from(&**config));

    if need_avatar {
        let built = HeyGenBackend::new(provider.clone(), endpoints.heygen.as_deref()).map(|b| {
            b.with_timings(config.job_timings())
                .with_retry(config.download_policy())
        });
        if let Some(b) = optional_backend(built, HEYGEN_PROVIDER) {
            builder = builder.avatar_backend(Arc::new(b) as Arc<dyn AvatarBackend>);
        }
    } else {
        let built =
            ElevenLabsBackend::new(provider.clone()).map(|b| match endpoints.elevenlabs.as_deref() {
                Some(url) => b.with_base_url(url),
                None => b,
            });
        if let Some(b) = optional_backend(built, ELEVENLABS_PROVIDER) {
            builder = builder.voice_backend(Arc::new(b) as Arc<dyn VoiceBackend>);
        }
    }
    builder.build()
}

async fn run(cli: Cli) -> Result<PathBuf> {
    let trace_id = cli
        .trace_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let ctx = RenderContext::with_trace_id(trace_id);

    let config = Arc::new(
        FileConfig::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?,
    );
    info!(config = %config.path().display(), "configuration loaded");
    let defaults = config.defaults().clone();

    let request = match cli.command {
        Command::Audio {
            text,
            voice,
            output_dir: dir,
        } => RenderRequest::audio(
            text,
            voice
                .or_else(|| defaults.voice.clone())
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            output_dir(dir, &defaults),
        ),
        Command::Video {
            text,
            avatar,
            voice,
            output_dir: dir,
        } => RenderRequest::video(
            text,
            avatar
                .or_else(|| defaults.avatar.clone())
                .unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
            voice
                .or_else(|| defaults.voice.clone())
                .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            output_dir(dir, &defaults),
        ),
    };

    let controller = build_controller(&config, request.secondary_alias.is_some());
    let path = controller.render(&ctx, &request).await?;
    Ok(path)
}

fn failure_category(err: &anyhow::Error) -> &'static str {
    if let Some(e) = err.downcast_ref::<RenderError>() {
        e.category()
    } else if err.downcast_ref::<ConfigError>().is_some() {
        "Configuration Error"
    } else {
        "Error"
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match run(cli).await {
        Ok(path) => {
            println!("{}", path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {:#}", failure_category(&e), e);
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn video_flags_parse() {
        let cli = Cli::try_parse_from([
            "alfred",
            "--trace-id",
            "t-1",
            "video",
            "--text",
            "Good evening, sir.",
            "--avatar",
            "business_suit",
        ])
        .unwrap();
        assert_eq!(cli.trace_id.as_deref(), Some("t-1"));
        match cli.command {
            Command::Video { avatar, voice, .. } => {
                assert_eq!(avatar.as_deref(), Some("business_suit"));
                assert!(voice.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn every_video_flag_has_help() {
        let cmd = Cli::command();
        let video = cmd.find_subcommand("video").unwrap();
        for id in ["text", "avatar", "voice", "output_dir"] {
            let arg = video.get_arguments().find(|a| a.get_id() == id).unwrap();
            assert!(arg.get_help().is_some(), "--{id} has no help text");
        }
    }

    #[test]
    fn output_dir_falls_back_to_config_then_literal() {
        let mut defaults = Defaults::default();
        assert_eq!(output_dir(None, &defaults), PathBuf::from("./output"));
        defaults.output_dir = Some(PathBuf::from("/srv/renders"));
        assert_eq!(output_dir(None, &defaults), PathBuf::from("/srv/renders"));
        assert_eq!(
            output_dir(Some(PathBuf::from("here")), &defaults),
            PathBuf::from("here")
        );
    }
}
