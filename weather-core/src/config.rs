use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const DEFAULT_EDGE_PORT: u16 = 8080;
pub const DEFAULT_WEATHER_PORT: u16 = 8081;
pub const DEFAULT_EDGE_ROUTE: &str = "/input";
pub const DEFAULT_DOWNSTREAM_URL: &str = "http://service-b:8081/weather";
pub const DEFAULT_VIACEP_URL: &str = "https://viacep.com.br/ws";
pub const DEFAULT_WEATHERAPI_URL: &str = "http://api.weatherapi.com/v1/current.json";
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://otel-collector:4317";

/// Environment variable pointing at an alternate config file.
pub const CONFIG_PATH_ENV: &str = "CEP_WEATHER_CONFIG";

/// Settings of the edge service (the one clients talk to).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    pub port: Option<u16>,

    /// Route the edge service listens on; `/input` or `/cep` in the known deployments.
    pub route: Option<String>,

    /// Full URL of the weather service endpoint requests are forwarded to.
    pub downstream_url: Option<String>,
}

/// Settings of the weather service (postal lookup + temperature).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub port: Option<u16>,
    pub api_key: Option<String>,
    pub viacep_url: Option<String>,
    pub weatherapi_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,

    /// OTLP gRPC collector endpoint.
    pub endpoint: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { enabled: true, endpoint: None }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// [edge]
/// downstream_url = "http://localhost:8081/weather"
///
/// [weather]
/// api_key = "..."
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub edge: EdgeConfig,
    pub weather: WeatherConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    /// Like [`Config::load`], then overlays the process environment.
    pub fn load_with_env() -> Result<Self> {
        let mut cfg = Self::load()?;
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
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

    /// Path to the config file. `CEP_WEATHER_CONFIG` wins over the platform directory.
    pub fn config_file_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }

        let dirs = ProjectDirs::from("dev", "cep-weather", "cep-weather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay environment variables on top of the file settings.
    ///
    /// `lookup` is usually `std::env::var(..).ok()`; empty values are ignored.
    /// A `PORT` that is not a port number is an error.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .with_context(|| format!("invalid PORT value {port:?}"))?;
            // Each process runs a single service, so PORT applies to whichever one starts.
            self.edge.port = Some(port);
            self.weather.port = Some(port);
        }
        if let Some(url) = get("SERVICE_B_URL") {
            self.edge.downstream_url = Some(url);
        }
        if let Some(route) = get("EDGE_ROUTE") {
            self.edge.route = Some(route);
        }
        if let Some(key) = get("WEATHER_API_KEY") {
            self.weather.api_key = Some(key);
        }
        if let Some(url) = get("VIACEP_URL") {
            self.weather.viacep_url = Some(url);
        }
        if let Some(url) = get("WEATHERAPI_URL") {
            self.weather.weatherapi_url = Some(url);
        }
        if let Some(endpoint) = get("OTEL_EXPORTER_OTLP_ENDPOINT") {
            self.telemetry.endpoint = Some(endpoint);
        }
        if get("OTEL_SDK_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            self.telemetry.enabled = false;
        }

        Ok(())
    }

    /// Convenience helper for `configure`: set/replace the WeatherAPI key.
    pub fn set_weather_api_key(&mut self, api_key: String) {
        self.weather.api_key = Some(api_key);
    }

    /// Returns the WeatherAPI key, if present and non-empty.
    pub fn weather_api_key(&self) -> Option<&str> {
        self.weather.api_key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn edge_port(&self) -> u16 {
        self.edge.port.unwrap_or(DEFAULT_EDGE_PORT)
    }

    pub fn weather_port(&self) -> u16 {
        self.weather.port.unwrap_or(DEFAULT_WEATHER_PORT)
    }

    pub fn edge_route(&self) -> &str {
        non_empty(&self.edge.route).unwrap_or(DEFAULT_EDGE_ROUTE)
    }

    pub fn downstream_url(&self) -> &str {
        non_empty(&self.edge.downstream_url).unwrap_or(DEFAULT_DOWNSTREAM_URL)
    }

    pub fn viacep_url(&self) -> &str {
        non_empty(&self.weather.viacep_url).unwrap_or(DEFAULT_VIACEP_URL)
    }

    pub fn weatherapi_url(&self) -> &str {
        non_empty(&self.weather.weatherapi_url).unwrap_or(DEFAULT_WEATHERAPI_URL)
    }

    pub fn otlp_endpoint(&self) -> &str {
        non_empty(&self.telemetry.endpoint).unwrap_or(DEFAULT_OTLP_ENDPOINT)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
