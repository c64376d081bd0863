use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const CONFIG_DIR: &str = "soar";
pub const CONFIG_FILE: &str = "config.toml";
pub const LOCAL_CONFIG_FILE: &str = ".soar.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found at {0} (run 'soar config init' to create one)")]
    NotFound(PathBuf),
    #[error("failed to determine the user config directory")]
    NoConfigDir,
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("a config file already exists at {0} (use --force to overwrite)")]
    Exists(PathBuf),
    #[error("refusing to overwrite non-soar file {0}")]
    Foreign(PathBuf),
    #[error("invalid {scope} credentials: {reason}")]
    InvalidScope { scope: ScopeKind, reason: String },
}

/// Which panel API a command talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Application,
    Client,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Application => f.write_str("application"),
            ScopeKind::Client => f.write_str("client"),
        }
    }
}

/// Base URL and bearer token for one API scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scope {
    pub url: String,
    pub key: String,
}

/// Output shaping toggles, resolved once per invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputPolicy {
    pub unwrap_attributes: bool,
    pub pretty_print: bool,
    pub retry_on_rate_limit: bool,
}

impl Default for OutputPolicy {
    fn default() -> Self {
        Self {
            unwrap_attributes: true,
            pretty_print: true,
            retry_on_rate_limit: false,
        }
    }
}

/// Per-invocation flag values; `None` keeps the configured setting.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyOverrides {
    pub unwrap_attributes: Option<bool>,
    pub pretty_print: Option<bool>,
    pub retry_on_rate_limit: Option<bool>,
}

impl OutputPolicy {
    pub fn with_overrides(self, overrides: PolicyOverrides) -> Self {
        Self {
            unwrap_attributes: overrides
                .unwrap_attributes
                .unwrap_or(self.unwrap_attributes),
            pretty_print: overrides.pretty_print.unwrap_or(self.pretty_print),
            retry_on_rate_limit: overrides
                .retry_on_rate_limit
                .unwrap_or(self.retry_on_rate_limit),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub use_color: bool,
    pub use_debug: bool,
    pub ignore_warnings: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            use_color: true,
            use_debug: false,
            ignore_warnings: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub application: Scope,
    pub client: Scope,
    pub http: OutputPolicy,
    pub logs: LogConfig,
    #[serde(skip)]
    path: PathBuf,
}

impl Config {
    pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|d| d.join(CONFIG_DIR))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Picks the config file: an explicit path wins, then `./.soar.toml`
    /// (unless `global`), then the user config directory.
    pub fn resolve_path(explicit: Option<&Path>, global: bool) -> Result<PathBuf, ConfigError> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }

        if !global {
            if let Ok(cwd) = std::env::current_dir() {
                let local = cwd.join(LOCAL_CONFIG_FILE);
                if local.is_file() {
                    return Ok(local);
                }
            }
        }

        Ok(Self::get_config_dir()?.join(CONFIG_FILE))
    }

    pub fn load(explicit: Option<&Path>, global: bool) -> Result<Self, ConfigError> {
        let path = Self::resolve_path(explicit, global)?;
        Self::from_path(&path)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.path = path.to_path_buf();

        Ok(config)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the credentials for `kind`, checking they are usable.
    pub fn get_scope(&self, kind: ScopeKind) -> Result<Scope, ConfigError> {
        let scope = match kind {
            ScopeKind::Application => &self.application,
            ScopeKind::Client => &self.client,
        };

        let invalid = |reason: &str| ConfigError::InvalidScope {
            scope: kind,
            reason: reason.to_string(),
        };

        if scope.url.trim().is_empty() {
            return Err(invalid("url is required"));
        }
        let url = Url::parse(&scope.url).map_err(|e| invalid(&format!("url is invalid: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("url must use http or https"));
        }
        if scope.key.trim().is_empty() {
            return Err(invalid("key is required"));
        }

        Ok(scope.clone())
    }

    pub fn output_policy(&self) -> OutputPolicy {
        self.http
    }

    /// Writes a blank config. Without a path the global config is created.
    /// A directory path receives a `.soar.toml` inside it.
    pub fn create(path: Option<&Path>, force: bool) -> Result<PathBuf, ConfigError> {
        let mut path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::get_config_dir()?.join(CONFIG_FILE),
        };

        if path.is_dir() {
            path = path.join(LOCAL_CONFIG_FILE);
        }

        if path.exists() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name != CONFIG_FILE && name != LOCAL_CONFIG_FILE {
                return Err(ConfigError::Foreign(path));
            }
            if !force {
                return Err(ConfigError::Exists(path));
            }
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(&Config::default())?;
        fs::write(&path, content).map_err(|source| ConfigError::Write {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }

    /// Renders the config as TOML with keys masked.
    pub fn masked(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        shown.application.key = mask_key(&shown.application.key);
        shown.client.key = mask_key(&shown.client.key);
        Ok(toml::to_string_pretty(&shown)?)
    }
}

fn mask_key(key: &str) -> String {
    let count = key.chars().count();
    if count <= 12 {
        return "*".repeat(count);
    }

    let head: String = key.chars().take(8).collect();
    let tail: String = key.chars().skip(count - 4).collect();
    format!("{head}...{tail}")
}
