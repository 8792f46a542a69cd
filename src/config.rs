use crate::calendar::{
    default_levels, default_type_options, Projector, StylePalette, TypeOption,
    DEFAULT_DURATION_MINUTES, DEFAULT_START_TIME,
};
use crate::error::ClubResult;
use crate::services::DEFAULT_ROSTER_MAX_AGE;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_VAR: &str = "TRAILCLUB_CONFIG_PATH";
pub const SERVER_URL_VAR: &str = "TRAILCLUB_SERVER_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_levels")]
    pub levels: Vec<String>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub palette: StylePalette,
    #[serde(default = "default_type_options")]
    pub meetup_types: Vec<TypeOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Rest,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub base_url: String,
    /// No timeout when unset
    pub timeout_secs: Option<u64>,
    /// Members are reloaded after this long even without local edits
    #[serde(default = "default_roster_max_age_secs")]
    pub roster_max_age_secs: u64,
}

fn default_roster_max_age_secs() -> u64 {
    DEFAULT_ROSTER_MAX_AGE.as_secs()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Rest,
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: None,
            roster_max_age_secs: default_roster_max_age_secs(),
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn roster_max_age(&self) -> Duration {
        Duration::from_secs(self.roster_max_age_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub default_start_time: String,
    pub default_duration_minutes: i64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            default_start_time: DEFAULT_START_TIME.to_string(),
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
        }
    }
}

impl CalendarConfig {
    pub fn projector(&self) -> ClubResult<Projector> {
        Projector::new(&self.default_start_time, self.default_duration_minutes)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            levels: default_levels(),
            storage: StorageConfig::default(),
            server: ServerConfig::default(),
            calendar: CalendarConfig::default(),
            palette: StylePalette::default(),
            meetup_types: default_type_options(),
        }
    }
}

impl Config {
    /// Load from `path`, `TRAILCLUB_CONFIG_PATH`, or the platform config
    /// directory, in that order. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => get_config_path()?,
        };
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|name| env::var(name).ok());
        Ok(config)
    }

    /// Read the file at `path`, creating it with defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default_config = Config::default();
            default_config.save_to(path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(SERVER_URL_VAR).filter(|v| !v.trim().is_empty()) {
            log::debug!("Storage base URL overridden by {}", SERVER_URL_VAR);
            self.storage.base_url = url.trim().to_string();
        }
    }
}

fn get_config_path() -> Result<PathBuf> {
    if let Ok(path) = env::var(CONFIG_PATH_VAR) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    let proj_dirs = ProjectDirs::from("com", "trailclub", "trailclub")
        .context("Failed to determine config directory")?;

    Ok(proj_dirs.config_dir().join("config.toml"))
}
