use arsession_device::{CameraDirection, InitFlags, OrientationPreference, PixelFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LICENSE_KEY_ENV: &str = "ARSESSION_LICENSE_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid session config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("{0}")]
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub license_key: String,
    pub init_flags: InitFlags,
    pub default_camera: CameraDirection,
    pub orientation: OrientationPreference,
    pub frame_format: PixelFormat,
    pub gateway: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            license_key: String::new(),
            init_flags: InitFlags::default(),
            default_camera: CameraDirection::default(),
            orientation: OrientationPreference::default(),
            frame_format: PixelFormat::default(),
            gateway: "mock".to_owned(),
        }
    }
}

impl SessionConfig {
    /// Load config from `~/.config/arsession/session.toml`.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path()?;
        Self::load(&path)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Let `ARSESSION_LICENSE_KEY` override the file's license key.
    #[must_use]
    pub fn apply_env(mut self) -> Self {
        if let Ok(key) = std::env::var(LICENSE_KEY_ENV) {
            if !key.is_empty() {
                self.license_key = key;
            }
        }
        self
    }
}

fn default_config_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME").map_err(|_| ConfigError::Config("HOME not set".to_owned()))?;
    Ok(PathBuf::from(home).join(".config/arsession/session.toml"))
}
