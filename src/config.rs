use serde::{ Deserialize, Serialize };
use std::path::{ Path, PathBuf };
use std::time::Duration;
use log::{ debug, info };
use url::Url;

use crate::backend::{ parse_backend_url, BackendConfig };
use crate::error::ConsoleError;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5001";
pub const BACKEND_URL_ENV: &str = "VECTOR_CONSOLE_BACKEND_URL";

/// Operator settings, persisted as TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub backend_url: Url,
    /// How long notifications stay up before closing themselves.
    pub notification_duration_ms: u64,
    /// No timeout unless set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            backend_url: Url::parse(DEFAULT_BACKEND_URL).expect("default backend url is valid"),
            notification_duration_ms: 3000,
            request_timeout_secs: None,
        }
    }
}

impl ConsoleConfig {
    /// `<config dir>/vector-console/config.toml`, or a relative path when the
    /// platform has no config directory.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("vector-console"))
            .unwrap_or_else(|| PathBuf::from(".vector-console"))
            .join("config.toml")
    }

    /// Reads `path` if it exists (defaults otherwise), then applies the
    /// `VECTOR_CONSOLE_BACKEND_URL` override.
    pub fn load(path: &Path) -> Result<Self, ConsoleError> {
        let mut config = Self::load_file(path)?;
        config.apply_env_override(std::env::var(BACKEND_URL_ENV).ok())?;
        Ok(config)
    }

    /// The saved settings alone, without environment overrides.
    pub fn load_file(path: &Path) -> Result<Self, ConsoleError> {
        if path.exists() {
            debug!("Reading console configuration from {}", path.display());
            let text = std::fs::read_to_string(path)?;
            Self::from_toml(&text)
        } else {
            debug!("No configuration at {}; using defaults.", path.display());
            Ok(Self::default())
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConsoleError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConsoleError> {
        self.validate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        info!("Saved console configuration to {}", path.display());
        Ok(())
    }

    pub fn apply_env_override(&mut self, value: Option<String>) -> Result<(), ConsoleError> {
        if let Some(raw) = value.filter(|v| !v.trim().is_empty()) {
            debug!("Backend url overridden from {}", BACKEND_URL_ENV);
            self.backend_url = parse_backend_url(&raw)?;
        }
        Ok(())
    }

    pub fn set_backend_url(&mut self, raw: &str) -> Result<(), ConsoleError> {
        self.backend_url = parse_backend_url(raw)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConsoleError> {
        parse_backend_url(self.backend_url.as_str())?;
        if self.notification_duration_ms == 0 {
            return Err(ConsoleError::Config("notification_duration_ms must be positive".to_string()));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(ConsoleError::Config("request_timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_millis(self.notification_duration_ms)
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            base_url: self.backend_url.clone(),
            timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }
}
