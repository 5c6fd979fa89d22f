use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

pub const DEFAULT_ADDRESS: &str = "0.0.0.0:5000";
pub const DEFAULT_OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "google/gemma-3n-e2b-it:free";
pub const DEFAULT_POPULATION_YEAR: i32 = 2020;
pub const DEFAULT_EARTH_ENGINE_URL: &str = "https://earthengine.googleapis.com/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { address: DEFAULT_ADDRESS.to_string() }
    }
}

/// Collection ids queried for each indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Datasets {
    pub vegetation: String,
    pub burn: String,
    pub fire: String,
    pub population: String,
}

impl Default for Datasets {
    fn default() -> Self {
        Self {
            vegetation: "COPERNICUS/S2_HARMONIZED".to_string(),
            burn: "MODIS/061/MCD64A1".to_string(),
            fire: "FIRMS".to_string(),
            population: "WorldPop/GP/100m/pop".to_string(),
        }
    }
}

/// Earth Engine service-account credentials and query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthEngineConfig {
    /// Path to the service-account JSON key.
    pub key_file: Option<PathBuf>,
    /// Overrides the key's `client_email`.
    pub service_account: Option<String>,
    /// Overrides the key's `project_id`. Required when `access_token` is used.
    pub project: Option<String>,
    /// Pre-issued OAuth token (e.g. `gcloud auth print-access-token`); skips the key file.
    pub access_token: Option<String>,
    /// REST API root, without trailing `/projects/...`.
    pub api_base: String,
    /// Population rasters are pinned to this year regardless of the request window.
    pub population_year: i32,
    pub datasets: Datasets,
}

impl Default for EarthEngineConfig {
    fn default() -> Self {
        Self {
            key_file: None,
            service_account: None,
            project: None,
            access_token: None,
            api_base: DEFAULT_EARTH_ENGINE_URL.to_string(),
            population_year: DEFAULT_POPULATION_YEAR,
            datasets: Datasets::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenRouterConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub url: String,
    pub referer: String,
    pub title: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            url: DEFAULT_OPENROUTER_URL.to_string(),
            referer: "https://hazend.tech".to_string(),
            title: "HazEnd".to_string(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [earth_engine]
/// key_file = "/etc/hazend/ee-key.json"
///
/// [openrouter]
/// api_key = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub earth_engine: EarthEngineConfig,
    pub openrouter: OpenRouterConfig,
}

/// `HAZEND_*` environment variables layered over the file.
#[derive(Debug, Default, Deserialize)]
pub struct EnvOverrides {
    pub address: Option<String>,
    pub ee_key_file: Option<PathBuf>,
    pub ee_service_account: Option<String>,
    pub ee_project: Option<String>,
    pub ee_access_token: Option<String>,
    pub ee_population_year: Option<i32>,
    pub openrouter_api_key: Option<String>,
    pub openrouter_model: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self> {
        envy::prefixed("HAZEND_")
            .from_env::<EnvOverrides>()
            .context("Failed to read HAZEND_* environment variables")
    }
}

impl Config {
    /// Load config from disk (or defaults on first run), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_overrides(EnvOverrides::from_env()?);
        Ok(cfg)
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("tech", "hazend", "hazend")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn apply_overrides(&mut self, env: EnvOverrides) {
        if let Some(address) = env.address {
            self.server.address = address;
        }
        if let Some(key_file) = env.ee_key_file {
            self.earth_engine.key_file = Some(key_file);
        }
        if let Some(account) = env.ee_service_account {
            self.earth_engine.service_account = Some(account);
        }
        if let Some(project) = env.ee_project {
            self.earth_engine.project = Some(project);
        }
        if let Some(token) = env.ee_access_token {
            self.earth_engine.access_token = Some(token);
        }
        if let Some(year) = env.ee_population_year {
            self.earth_engine.population_year = year;
        }
        if let Some(key) = env.openrouter_api_key {
            self.openrouter.api_key = Some(key);
        }
        if let Some(model) = env.openrouter_model {
            self.openrouter.model = model;
        }
    }

    /// Returns the OpenRouter API key, ignoring blank values.
    pub fn openrouter_api_key(&self) -> Option<&str> {
        self.openrouter.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// Either a key file or a pre-issued token is present.
    pub fn is_earth_engine_configured(&self) -> bool {
        self.earth_engine.key_file.is_some() || self.earth_engine.access_token.is_some()
    }
}
