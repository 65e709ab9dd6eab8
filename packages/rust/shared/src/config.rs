//! Application configuration for sdgtool.
//!
//! User config lives at `~/.sdgtool/sdgtool.toml`.
//! CLI arguments override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SdgError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sdgtool.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sdgtool";

// ---------------------------------------------------------------------------
// Config structs (matching sdgtool.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Geocoding provider settings.
    #[serde(default)]
    pub geocoding: GeocodingConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Normalize mode used when none is given: "all" or "minimal".
    #[serde(default = "default_mode")]
    pub mode: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
        }
    }
}

fn default_mode() -> String {
    "all".into()
}

/// `[geocoding]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocodingConfig {
    /// Base URL of a Nominatim-compatible search API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// User-Agent sent with every request (the public Nominatim requires one).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GeocodingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    "https://nominatim.openstreetmap.org".into()
}
fn default_user_agent() -> String {
    "address_geocoding".into()
}
fn default_timeout_secs() -> u64 {
    5
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sdgtool/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| SdgError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sdgtool/sdgtool.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SdgError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SdgError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SdgError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content = toml::to_string_pretty(&config).map_err(|e| SdgError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SdgError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the geocoding settings are usable before any request is made.
pub fn validate_geocoding(config: &GeocodingConfig) -> Result<()> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| SdgError::config(format!("invalid geocoding base_url '{}': {e}", config.base_url)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(SdgError::config(format!(
            "geocoding base_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(SdgError::config(
            "geocoding user_agent must not be empty; the provider rejects anonymous clients",
        ));
    }

    if config.timeout_secs == 0 {
        return Err(SdgError::config("geocoding timeout_secs must be at least 1"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("base_url"));
        assert!(toml_str.contains("nominatim.openstreetmap.org"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.geocoding.timeout_secs, 5);
        assert_eq!(parsed.defaults.mode, "all");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[geocoding]
base_url = "http://localhost:8080"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.geocoding.base_url, "http://localhost:8080");
        assert_eq!(config.geocoding.user_agent, "address_geocoding");
        assert_eq!(config.geocoding.timeout(), Duration::from_secs(5));
        assert_eq!(config.defaults.mode, "all");
    }

    #[test]
    fn load_config_from_file() {
        let path = std::env::temp_dir().join(format!("sdgtool-config-{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&path, "[defaults]\nmode = \"minimal\"\n").unwrap();
        let config = load_config_from(&path).expect("load");
        assert_eq!(config.defaults.mode, "minimal");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_config_from_invalid_toml() {
        let path = std::env::temp_dir().join(format!("sdgtool-config-{}.toml", uuid::Uuid::now_v7()));
        std::fs::write(&path, "[geocoding\n").unwrap();
        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("failed to parse"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn geocoding_validation() {
        assert!(validate_geocoding(&GeocodingConfig::default()).is_ok());

        let mut config = GeocodingConfig::default();
        config.base_url = "not a url".into();
        assert!(validate_geocoding(&config).is_err());

        let mut config = GeocodingConfig::default();
        config.user_agent = "  ".into();
        let err = validate_geocoding(&config).unwrap_err();
        assert!(err.to_string().contains("user_agent"));

        let mut config = GeocodingConfig::default();
        config.timeout_secs = 0;
        assert!(validate_geocoding(&config).is_err());
    }
}
