//! Configuration provider: alias → provider identifier lookups and API secrets.
//!
//! `FileConfig` reads a YAML (or TOML, by extension) file shaped like:
//!
//! ```yaml
//! assets:
//!   voices:
//!     alfred_calm: "21m00Tcm4TlvDq8ikWAM"
//!   avatars:
//!     business_suit: "Daisy-inskirt-20220818"
//! defaults:
//!   voice: alfred_calm
//!   avatar: business_suit
//!   output_dir: ./output
//! timings:
//!   grace_secs: 30
//!   poll_interval_secs: 10
//!   ceiling_secs: 600
//! download:
//!   max_attempts: 3
//!   initial_backoff_secs: 4
//!   max_backoff_secs: 10
//! endpoints:
//!   elevenlabs: https://api.elevenlabs.io/v1
//!   heygen: https://api.heygen.com/v2
//! ```
//!
//! Secrets never live in the file; they come from `DIGITAL_ALFRED_<PROVIDER>_KEY`.

use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::job::{JobTimings, RetryPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const SECRET_ENV_PREFIX: &str = "DIGITAL_ALFRED_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("{kind} alias '{alias}' not found in configuration")]
    NotFound { kind: &'static str, alias: String },

    #[error("API key for {provider} not found in environment (expected {env_var})")]
    MissingSecret { provider: String, env_var: String },

    #[error("failed to initialise HTTP client: {0}")]
    HttpClient(String),
}

/// The capability surface the render core consumes from configuration.
pub trait ConfigProvider: Send + Sync {
    fn resolve_voice_identifier(&self, alias: &str) -> Result<String, ConfigError>;
    fn resolve_avatar_identifier(&self, alias: &str) -> Result<String, ConfigError>;
    fn list_voice_aliases(&self) -> BTreeSet<String>;
    fn list_avatar_aliases(&self) -> BTreeSet<String>;
    fn resolve_secret(&self, provider: &str) -> Result<String, ConfigError>;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub assets: Assets,
    pub defaults: Defaults,
    pub timings: Option<TimingsSection>,
    pub download: Option<DownloadSection>,
    pub endpoints: Endpoints,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Assets {
    pub voices: BTreeMap<String, String>,
    pub avatars: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub voice: Option<String>,
    pub avatar: Option<String>,
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimingsSection {
    pub grace_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub ceiling_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    pub max_attempts: Option<u32>,
    pub initial_backoff_secs: Option<u64>,
    pub max_backoff_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub elevenlabs: Option<String>,
    pub heygen: Option<String>,
}

/// File-backed configuration with secrets resolved from the process environment.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
    file: ConfigFile,
}

impl FileConfig {
    /// Load from `path`; `.toml` files are parsed as TOML, everything else as YAML.
    /// A `.env` file in the working directory is loaded first if present.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let _ = dotenvy::dotenv();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path));
        }
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let is_toml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("toml"));
        let file = if is_toml {
            Self::parse_toml(&contents)
        } else {
            Self::parse_yaml(&contents)
        }
        .map_err(|message| ConfigError::Parse {
            path: path.clone(),
            message,
        })?;
        Ok(Self { path, file })
    }

    pub fn from_yaml(s: &str) -> Result<Self, ConfigError> {
        let file = Self::parse_yaml(s).map_err(|message| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            message,
        })?;
        Ok(Self {
            path: PathBuf::from("<inline>"),
            file,
        })
    }

    fn parse_yaml(s: &str) -> Result<ConfigFile, String> {
        // An empty document deserializes to null; treat it as an empty config.
        if s.trim().is_empty() {
            return Ok(ConfigFile::default());
        }
        serde_yaml::from_str(s).map_err(|e| e.to_string())
    }

    fn parse_toml(s: &str) -> Result<ConfigFile, String> {
        toml::from_str(s).map_err(|e| e.to_string())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn defaults(&self) -> &Defaults {
        &self.file.defaults
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.file.endpoints
    }

    /// Poll timings, with any file overrides applied over the built-in defaults.
    pub fn job_timings(&self) -> JobTimings {
        let mut t = JobTimings::default();
        if let Some(ref s) = self.file.timings {
            if let Some(v) = s.grace_secs {
                t.grace = Duration::from_secs(v);
            }
            if let Some(v) = s.poll_interval_secs {
                t.poll_interval = Duration::from_secs(v);
            }
            if let Some(v) = s.ceiling_secs {
                t.ceiling = Duration::from_secs(v);
            }
        }
        t
    }

    pub fn download_policy(&self) -> RetryPolicy {
        let mut p = RetryPolicy::default();
        if let Some(ref s) = self.file.download {
            if let Some(v) = s.max_attempts {
                p.max_attempts = v.max(1);
            }
            if let Some(v) = s.initial_backoff_secs {
                p.initial_backoff = Duration::from_secs(v);
            }
            if let Some(v) = s.max_backoff_secs {
                p.max_backoff = Duration::from_secs(v);
            }
        }
        p
    }
}

fn secret_env_var(provider: &str) -> String {
    format!("{}{}_KEY", SECRET_ENV_PREFIX, provider.to_uppercase())
}

impl ConfigProvider for FileConfig {
    fn resolve_voice_identifier(&self, alias: &str) -> Result<String, ConfigError> {
        self.file
            .assets
            .voices
            .get(alias)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound {
                kind: "Voice",
                alias: alias.to_string(),
            })
    }

    fn resolve_avatar_identifier(&self, alias: &str) -> Result<String, ConfigError> {
        self.file
            .assets
            .avatars
            .get(alias)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound {
                kind: "Avatar",
                alias: alias.to_string(),
            })
    }

    fn list_voice_aliases(&self) -> BTreeSet<String> {
        self.file.assets.voices.keys().cloned().collect()
    }

    fn list_avatar_aliases(&self) -> BTreeSet<String> {
        self.file.assets.avatars.keys().cloned().collect()
    }

    fn resolve_secret(&self, provider: &str) -> Result<String, ConfigError> {
        let env_var = secret_env_var(provider);
        match std::env::var(&env_var) {
            Ok(v) if !v.is_empty() => Ok(v),
            _ => Err(ConfigError::MissingSecret {
                provider: provider.to_string(),
                env_var,
            }),
        }
    }
}
