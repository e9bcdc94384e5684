use anyhow::{Context, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{
    error::{Result, WeatherError},
    model::Coordinate,
};

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

/// URLs of every external host the core talks to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Base for `/weather` and `/forecast`.
    pub openweather: String,
    pub ip_geolocation: String,
    pub reverse_geocode: String,
    /// Country lookup; the country name is appended as a path segment.
    pub country_lookup: String,
    pub ip_city: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            openweather: "https://api.openweathermap.org/data/2.5".to_string(),
            ip_geolocation: "https://location.services.mozilla.com/v1/geolocate?key=test"
                .to_string(),
            reverse_geocode: "https://nominatim.openstreetmap.org/reverse".to_string(),
            country_lookup: "https://restcountries.com/v3.1/name".to_string(),
            ip_city: "https://ipapi.co/json/".to_string(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// request_timeout_secs = 10
///
/// [device_position]
/// latitude = 48.85
/// longitude = 2.35
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,

    /// Bound for every HTTP request except the GPS wait.
    pub request_timeout_secs: u64,

    /// Bound for the device position request.
    pub gps_timeout_secs: u64,

    /// JSON list of `{ "name", "country" }` used for search suggestions.
    pub cities_file: Option<PathBuf>,

    /// Position reported for this device on hosts without a positioning service.
    pub device_position: Option<Coordinate>,

    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            request_timeout_secs: 10,
            gps_timeout_secs: 10,
            cities_file: None,
            device_position: None,
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Load config from disk, then apply the environment.
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self::load_stored()?.with_api_key_override(std::env::var(API_KEY_ENV).ok()))
    }

    /// Load config from disk only, or return defaults if it doesn't exist yet.
    pub fn load_stored() -> anyhow::Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        if self.gps_timeout_secs == 0 {
            bail!("gps_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> anyhow::Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weatherdash", "weatherdash")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// A non-blank override replaces the stored key.
    pub fn with_api_key_override(mut self, value: Option<String>) -> Self {
        if let Some(key) = value.filter(|k| !k.trim().is_empty()) {
            self.api_key = Some(key.trim().to_string());
        }
        self
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key.trim().to_string());
    }

    /// The weather API key, or `ConfigurationError` when none is configured.
    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(missing_api_key)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn gps_timeout(&self) -> Duration {
        Duration::from_secs(self.gps_timeout_secs)
    }
}

pub(crate) fn missing_api_key() -> WeatherError {
    WeatherError::configuration(format!(
        "No OpenWeather API key configured.\n\
         Hint: set {API_KEY_ENV} or run `weather configure`."
    ))
}
