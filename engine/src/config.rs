//! Configuration loaded from `~/.docchat/config.toml`.

use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use docchat_transport::{BackendConfig, retry::RetryConfig};

/// Overrides `[backend] url`.
pub const API_URL_ENV: &str = "DOCCHAT_API_URL";
/// Alternative config file location.
pub const CONFIG_PATH_ENV: &str = "DOCCHAT_CONFIG";

const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 30;

// Default value function for serde (bool::default() is false, so only true needs a fn)
const fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct DocchatConfig {
    pub backend: Option<BackendSection>,
    pub session: Option<SessionSection>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

/// `[backend]`: where the server lives and how patiently to talk to it.
#[derive(Debug, Default, Deserialize)]
pub struct BackendSection {
    /// Base URL. Supports `${VAR}` expansion.
    pub url: Option<String>,
    pub request_timeout_secs: Option<u64>,
    pub health_timeout_secs: Option<u64>,
    pub stream_idle_timeout_secs: Option<u64>,
    pub max_stream_bytes: Option<usize>,
    /// Retries for opening the answer stream. Uploads and health probes never retry.
    pub max_retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SessionSection {
    /// Ask the backend to serve cached answers. Default: true.
    #[serde(default = "default_true")]
    pub use_cache: bool,
    /// Send prior completed turns with each question. Default: false.
    #[serde(default)]
    pub include_history: bool,
    pub health_interval_secs: Option<u64>,
}

/// Resolved session behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub use_cache: bool,
    pub include_history: bool,
    pub health_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            use_cache: true,
            include_history: false,
            health_interval: Duration::from_secs(DEFAULT_HEALTH_INTERVAL_SECS),
        }
    }
}

/// Expand `${VAR}` references. Unset variables expand to nothing; an unclosed
/// `${` is kept literally.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + len];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[start + 2 + len + 1..];
    }

    out.push_str(rest);
    out
}

impl DocchatConfig {
    /// Load from [`config_path`]. A missing file is `Ok(None)`.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Backend settings, with `DOCCHAT_API_URL` taking precedence over the file.
    #[must_use]
    pub fn backend_config(&self) -> BackendConfig {
        self.resolve_backend(env::var(API_URL_ENV).ok())
    }

    fn resolve_backend(&self, url_override: Option<String>) -> BackendConfig {
        let mut config = BackendConfig::default();
        let section = self.backend.as_ref();

        let file_url = section
            .and_then(|s| s.url.as_deref())
            .map(expand_env_vars);
        if let Some(url) = url_override
            .filter(|url| !url.trim().is_empty())
            .or(file_url.filter(|url| !url.trim().is_empty()))
        {
            config.base_url = url.trim().to_string();
        }

        let Some(section) = section else {
            return config;
        };
        if let Some(secs) = positive(section.request_timeout_secs) {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = positive(section.health_timeout_secs) {
            config.health_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = positive(section.stream_idle_timeout_secs) {
            config.stream_idle_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = section.max_stream_bytes.filter(|b| *b > 0) {
            config.max_stream_bytes = bytes;
        }
        if let Some(retries) = section.max_retries {
            config.retry = RetryConfig {
                max_retries: retries,
                ..RetryConfig::default()
            };
        }
        config
    }

    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        let mut settings = SessionSettings::default();
        if let Some(section) = &self.session {
            settings.use_cache = section.use_cache;
            settings.include_history = section.include_history;
            if let Some(secs) = positive(section.health_interval_secs) {
                settings.health_interval = Duration::from_secs(secs);
            }
        }
        settings
    }
}

fn positive(value: Option<u64>) -> Option<u64> {
    value.filter(|v| *v > 0)
}

/// `~/.docchat`, home of the config file and logs.
#[must_use]
pub fn docchat_home() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".docchat"))
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    docchat_home().map(|home| home.join("config.toml"))
}
