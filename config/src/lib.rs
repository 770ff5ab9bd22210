//! Configuration for the build event client.
//!
//! Read from `~/.bep/config.toml`, then `<workspace>/.bep/config.toml`; the
//! workspace file wins where both set something.
//!
//! ```toml
//! [session]
//! encoding = "utf-8"
//! diagnostic_stream = "stderr"   # "stdout" | "both"
//!
//! [[problem_matchers.CppCompile]]
//! name = "gcc"
//! file_prefix = "${workspaceRoot}/"
//!
//! [[problem_matchers.CppCompile.pattern]]
//! regexp = '^(?<file>[^:]+):(?<line>\d+):(?<column>\d+): (?<severity>error|warning): (?<message>.*)$'
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bep_engine::{DiagnosticStream, SessionOptions};
use bep_matcher::{
    LineDecoder, ProblemMatcherRegistry, ProblemMatchersConfig, UnknownEncoding, builtin_matchers,
};
use serde::Deserialize;
use thiserror::Error;
use toml::de;

const CONFIG_DIR: &str = ".bep";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: de::Error,
    },
    #[error("{0} in [session]")]
    Encoding(#[from] UnknownEncoding),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Encoding(_) => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BepConfig {
    pub session: Option<SessionConfig>,
    /// Matchers by mnemonic. A mnemonic listed here replaces the built-in
    /// matchers for that mnemonic.
    #[serde(default)]
    pub problem_matchers: ProblemMatchersConfig,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct SessionConfig {
    /// WHATWG label of the tool output encoding. Default: UTF-8.
    pub encoding: Option<String>,
    pub diagnostic_stream: Option<DiagnosticStream>,
}

impl BepConfig {
    /// User config overlaid with the workspace config. Missing files are
    /// skipped; a file that exists but cannot be read or parsed is an error.
    pub fn load(workspace: Option<&Path>) -> Result<Self, ConfigError> {
        let user = match config_path() {
            Some(path) => Self::load_from(&path)?,
            None => None,
        };
        let project = match workspace {
            Some(dir) => Self::load_from(&workspace_config_path(dir))?,
            None => None,
        };
        Ok(user.unwrap_or_default().merge(project.unwrap_or_default()))
    }

    /// Parse one file. `Ok(None)` when it does not exist.
    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!("Loaded config from {:?}", path);
                Ok(Some(config))
            }
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    /// Overlay `other` on `self`: session fields set in `other` win, and
    /// each mnemonic in `other` replaces the one in `self`.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.session = match (self.session, other.session) {
            (Some(base), Some(over)) => Some(SessionConfig {
                encoding: over.encoding.or(base.encoding),
                diagnostic_stream: over.diagnostic_stream.or(base.diagnostic_stream),
            }),
            (base, over) => over.or(base),
        };
        self.problem_matchers.extend(other.problem_matchers);
        self
    }

    /// Built-in matchers with the configured mnemonics layered on top.
    #[must_use]
    pub fn matcher_registry(&self) -> ProblemMatcherRegistry {
        let mut matchers = builtin_matchers();
        matchers.extend(
            self.problem_matchers
                .iter()
                .map(|(mnemonic, list)| (mnemonic.clone(), list.clone())),
        );
        ProblemMatcherRegistry::from_config(&matchers)
    }

    pub fn session_options(&self) -> Result<SessionOptions, ConfigError> {
        let mut options = SessionOptions::default();
        let Some(session) = &self.session else {
            return Ok(options);
        };
        if let Some(label) = &session.encoding {
            options.encoding = LineDecoder::for_label(label)?.encoding();
        }
        if let Some(stream) = session.diagnostic_stream {
            options.diagnostic_stream = stream;
        }
        Ok(options)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR).join(CONFIG_FILE))
}

#[must_use]
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(CONFIG_DIR).join(CONFIG_FILE)
}
