use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::discovery::DiscoveryConfig;
use crate::models::{Coordinates, MADRID};

/// Environment variable that overrides `places.api_key`
pub const API_KEY_ENV: &str = "FOODIE_PLACES_API_KEY";

/// Main configuration structure
///
/// Loaded from the config file, then env vars, then CLI flags.
/// Priority: CLI > Env > File > Defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub places: PlacesConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub location: LocationConfig,
}

impl Config {
    /// Load config from the default location, falling back to defaults,
    /// then apply the environment override for the API key
    pub fn load() -> crate::Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_api_key_override(std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&contents)
                .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to the default location
    pub fn save(&self) -> crate::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// A non-empty key wins over whatever the file said
    pub fn apply_api_key_override(&mut self, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.places.api_key = Some(key);
        }
    }

    /// XDG config dir on Unix-like systems, AppData on Windows
    pub fn config_path() -> crate::Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| crate::Error::Config("Could not find config directory".into()))?
            .join("foodie");

        Ok(config_dir.join("config.toml"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacesConfig {
    /// Places API key, sent with every request
    pub api_key: Option<String>,

    #[serde(default = "default_places_url")]
    pub base_url: String,

    /// Nearby searches cover this many meters around the center
    #[serde(default = "default_radius")]
    pub search_radius_meters: u32,

    /// Provider place type to search for
    #[serde(default = "default_category")]
    pub category: String,

    /// Per-request timeout; expiry counts as a transport failure
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl PlacesConfig {
    pub fn api_key(&self) -> crate::Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                crate::Error::Config(format!(
                    "No places API key configured. Set places.api_key or {}",
                    API_KEY_ENV
                ))
            })
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            search_radius_meters: self.search_radius_meters,
            category: self.category.clone(),
        }
    }
}

fn default_places_url() -> String {
    "https://maps.googleapis.com/maps/api/place".to_string()
}

fn default_radius() -> u32 {
    1500
}

fn default_category() -> String {
    "restaurant".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for PlacesConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_places_url(),
            search_radius_meters: default_radius(),
            category: default_category(),
            timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// Where the saved lists live; defaults to the user data dir
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolved_db_path(&self) -> crate::Result<PathBuf> {
        if let Some(path) = &self.db_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| crate::Error::Config("Could not find data directory".into()))?
            .join("foodie");

        Ok(data_dir.join("foodie.db"))
    }
}

/// Where to search when the device won't tell us where it is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_latitude")]
    pub default_latitude: f64,
    #[serde(default = "default_longitude")]
    pub default_longitude: f64,
}

impl LocationConfig {
    pub fn default_coordinates(&self) -> Coordinates {
        Coordinates::new(self.default_latitude, self.default_longitude)
    }
}

fn default_latitude() -> f64 {
    MADRID.latitude
}

fn default_longitude() -> f64 {
    MADRID.longitude
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            default_latitude: default_latitude(),
            default_longitude: default_longitude(),
        }
    }
}
