use crate::server::DEFAULT_MAX_UPLOAD_BYTES;
use pantry_core::recipe::{DEFAULT_API_URL, DEFAULT_MODEL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Recipe suggestion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeConfig {
    /// Base URL of an OpenAI-compatible API
    pub api_url: String,
    /// Bearer token for the API
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Model name sent with each request
    pub model: String,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl RecipeConfig {
    /// Returns true if an API key is available
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database (server)
    pub database_path: ConfigValue<PathBuf>,
    /// Directory holding image blobs (server)
    pub blob_dir: ConfigValue<PathBuf>,
    /// Base URL used in blob retrieval URLs (server)
    pub public_url: ConfigValue<String>,
    /// Port to listen on (server)
    pub port: ConfigValue<u16>,
    /// Largest accepted image upload in bytes (server)
    pub max_upload_bytes: ConfigValue<usize>,
    /// Server URL the CLI connects to
    pub server_url: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Recipe service configuration
    pub recipe: RecipeConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    blob_dir: Option<PathBuf>,
    public_url: Option<String>,
    port: Option<u16>,
    max_upload_bytes: Option<usize>,
    server_url: Option<String>,
    recipe: Option<RecipeConfig>,
}

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_URL: &str = "http://localhost:8080";

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let data_dir = Self::default_data_dir();

        let mut database_path =
            ConfigValue::new(data_dir.join("pantry.db"), ConfigSource::Default);
        let mut blob_dir = ConfigValue::new(data_dir.join("blobs"), ConfigSource::Default);
        let mut public_url = ConfigValue::new(DEFAULT_URL.to_string(), ConfigSource::Default);
        let mut port = ConfigValue::new(DEFAULT_PORT, ConfigSource::Default);
        let mut max_upload_bytes =
            ConfigValue::new(DEFAULT_MAX_UPLOAD_BYTES, ConfigSource::Default);
        let mut server_url = ConfigValue::new(DEFAULT_URL.to_string(), ConfigSource::Default);
        let mut config_file = None;
        let mut recipe = RecipeConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                database_path = ConfigValue::new(resolve(&path, db_path), ConfigSource::File);
            }
            if let Some(dir) = file_config.blob_dir {
                blob_dir = ConfigValue::new(resolve(&path, dir), ConfigSource::File);
            }
            if let Some(url) = file_config.public_url {
                public_url = ConfigValue::new(url, ConfigSource::File);
            }
            if let Some(p) = file_config.port {
                port = ConfigValue::new(p, ConfigSource::File);
            }
            if let Some(limit) = file_config.max_upload_bytes {
                max_upload_bytes = ConfigValue::new(limit, ConfigSource::File);
            }
            if let Some(url) = file_config.server_url {
                server_url = ConfigValue::new(url, ConfigSource::File);
            }
            if let Some(recipe_config) = file_config.recipe {
                recipe = recipe_config;
            }
        }

        // Apply environment variable overrides
        if let Ok(db_path) = std::env::var("PANTRY_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(dir) = std::env::var("PANTRY_BLOB_DIR") {
            blob_dir = ConfigValue::new(PathBuf::from(dir), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("PANTRY_PUBLIC_URL") {
            public_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        if let Ok(p) = std::env::var("PANTRY_PORT") {
            let value = p
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PANTRY_PORT", p.clone()))?;
            port = ConfigValue::new(value, ConfigSource::Environment);
        }
        if let Ok(limit) = std::env::var("PANTRY_MAX_UPLOAD_BYTES") {
            let value = limit
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PANTRY_MAX_UPLOAD_BYTES", limit.clone()))?;
            max_upload_bytes = ConfigValue::new(value, ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("PANTRY_SERVER_URL") {
            server_url = ConfigValue::new(url, ConfigSource::Environment);
        }
        // Recipe env var overrides
        if let Ok(url) = std::env::var("PANTRY_RECIPE_API_URL") {
            recipe.api_url = url;
        }
        if let Ok(key) = std::env::var("PANTRY_RECIPE_API_KEY") {
            recipe.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("PANTRY_RECIPE_MODEL") {
            recipe.model = model;
        }

        Ok(Self {
            database_path,
            blob_dir,
            public_url,
            port,
            max_upload_bytes,
            server_url,
            config_file,
            recipe,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/pantry/
    /// - macOS: ~/Library/Application Support/pantry/
    /// - Windows: %APPDATA%/pantry/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pantry")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/pantry/
    /// - macOS: ~/Library/Application Support/pantry/
    /// - Windows: %APPDATA%/pantry/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pantry")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

/// Resolves relative paths against the config file's directory
fn resolve(config_path: &std::path::Path, value: PathBuf) -> PathBuf {
    if value.is_relative() {
        config_path
            .parent()
            .map(|p| p.join(&value))
            .unwrap_or(value)
    } else {
        value
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::InvalidValue(name, value) => {
                write!(f, "Invalid value for {}: '{}'", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config
            .blob_dir
            .value
            .to_string_lossy()
            .ends_with("blobs"));
        assert_eq!(config.blob_dir.source, ConfigSource::Default);
        assert!(config.config_file.is_none());
        assert_eq!(config.recipe.api_url, DEFAULT_API_URL);
        assert_eq!(config.max_upload_bytes.value, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "blob_dir: /custom/blobs").unwrap();
        writeln!(file, "public_url: https://pantry.example.com").unwrap();
        writeln!(file, "max_upload_bytes: 1048576").unwrap();
        writeln!(file, "recipe:").unwrap();
        writeln!(file, "  api_key: sk-test").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.blob_dir.value, PathBuf::from("/custom/blobs"));
        assert_eq!(config.blob_dir.source, ConfigSource::File);
        assert_eq!(config.public_url.value, "https://pantry.example.com");
        assert_eq!(config.max_upload_bytes.value, 1_048_576);
        assert_eq!(config.max_upload_bytes.source, ConfigSource::File);
        assert_eq!(config.config_file, Some(config_path));
        assert!(config.recipe.is_configured());
        assert_eq!(config.recipe.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn test_relative_database_path_resolves_against_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: data/pantry.db").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(
            config.database_path.value,
            temp_dir.path().join("data/pantry.db")
        );
    }

    #[test]
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "recipe:").unwrap();
        writeln!(file, "  model: from-file").unwrap();

        std::env::set_var("PANTRY_RECIPE_MODEL", "from-env");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.recipe.model, "from-env");

        std::env::remove_var("PANTRY_RECIPE_MODEL");
    }

    #[test]
    fn test_invalid_port_env() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        std::env::set_var("PANTRY_PORT", "not-a-port");
        let result = Config::load(Some(config_path));
        std::env::remove_var("PANTRY_PORT");

        let err = result.unwrap_err();
        assert!(err.to_string().contains("PANTRY_PORT"));
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut recipe = RecipeConfig::default();
        recipe.api_key = Some("sk-secret".to_string());
        let json = serde_json::to_string(&recipe).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
