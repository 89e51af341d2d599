use std::{path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;

use crate::util::paths;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const SESSION_FILE: &str = "session.json";

pub const BASE_URL_ENV: &str = "MUSICROOM_BASE_URL";
pub const STORE_ENV: &str = "MUSICROOM_STORE";
pub const AUTH_MODE_ENV: &str = "MUSICROOM_AUTH_MODE";
pub const TIMEOUT_ENV: &str = "MUSICROOM_TIMEOUT_SECS";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Where the session record is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "keyring" => Ok(Self::Keyring),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: STORE_ENV,
                value: s.to_string(),
            }),
        }
    }
}

/// `Remote` talks to the Music Room server; `Offline` keeps every
/// credential check on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Remote,
    Offline,
}

impl FromStr for AuthMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "offline" => Ok(Self::Offline),
            _ => Err(ConfigError::InvalidValue {
                key: AUTH_MODE_ENV,
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub data_dir: PathBuf,
    pub store: StoreBackend,
    pub auth_mode: AuthMode,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: paths::data_dir(),
            store: StoreBackend::default(),
            auth_mode: AuthMode::default(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Layers the values returned by `lookup` over the defaults. Empty
    /// values count as unset.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(BASE_URL_ENV) {
            config.base_url = normalize_base_url(&url);
        }
        if let Some(dir) = get(paths::DATA_ENV.as_str()) {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(store) = get(STORE_ENV) {
            config.store = store.parse()?;
        }
        if let Some(mode) = get(AUTH_MODE_ENV) {
            config.auth_mode = mode.parse()?;
        }
        if let Some(timeout) = get(TIMEOUT_ENV) {
            config.request_timeout_secs = timeout
                .trim()
                .parse()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidValue {
                    key: TIMEOUT_ENV,
                    value: timeout,
                })?;
        }

        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_FILE)
    }
}

pub fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}
