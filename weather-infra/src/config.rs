//! Deployment configuration
//!
//! Settings come from a stack file (`weather-infra.<stack>.yaml`) overlaid
//! by `WEATHER_INFRA_*` environment variables. [`DeploymentConfig`] is the
//! validated, immutable result that the declaration code receives; building
//! it fails on the first missing required key, before anything is declared.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

pub const PROJECT: &str = "weather-infra";
pub const ENV_PREFIX: &str = "WEATHER_INFRA_";

pub const DEFAULT_CACHE_LOCATION: &str = "westus3";
pub const DEFAULT_IMAGE_PLATFORM: &str = "linux/amd64";

/// Setting keys
pub mod keys {
    pub const APP_PATH: &str = "appPath";
    pub const PREFIX_NAME: &str = "prefixName";
    pub const IMAGE_TAG: &str = "imageTag";
    pub const CONTAINER_PORT: &str = "containerPort";
    pub const PUBLIC_PORT: &str = "publicPort";
    pub const CPU: &str = "cpu";
    pub const MEMORY: &str = "memory";
    pub const WEATHER_API_KEY: &str = "weatherApiKey";

    pub const CACHE_LOCATION: &str = "cacheLocation";
    pub const ENABLE_NON_SSL_PORT: &str = "enableNonSslPort";
    pub const IMAGE_PLATFORM: &str = "imagePlatform";

    pub const REQUIRED: [&str; 8] = [
        APP_PATH,
        PREFIX_NAME,
        IMAGE_TAG,
        CONTAINER_PORT,
        PUBLIC_PORT,
        CPU,
        MEMORY,
        WEATHER_API_KEY,
    ];

    pub const OPTIONAL: [&str; 3] = [CACHE_LOCATION, ENABLE_NON_SSL_PORT, IMAGE_PLATFORM];

    pub const SECRET: [&str; 1] = [WEATHER_API_KEY];
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required configuration key '{0}'")]
    Missing(String),

    #[error("invalid value for configuration key '{key}': {reason}")]
    Invalid { key: String, reason: String },

    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

enum Setting {
    Plain(String),
    Secret(SecretString),
}

impl fmt::Debug for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Plain(value) => write!(f, "{:?}", value),
            Setting::Secret(_) => f.write_str("[secret]"),
        }
    }
}

#[derive(Deserialize)]
struct StackFile {
    #[serde(default)]
    config: BTreeMap<String, serde_yaml::Value>,
}

/// Raw name → value settings store
#[derive(Debug, Default)]
pub struct Settings {
    values: BTreeMap<String, Setting>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default stack file for `stack` in the current directory
    pub fn stack_file(stack: &str) -> PathBuf {
        PathBuf::from(format!("{}.{}.yaml", PROJECT, stack))
    }

    /// Load `.env`, the stack file and environment overrides
    ///
    /// An explicitly given `file` must exist; the default stack file is
    /// optional.
    pub fn load(stack: &str, file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let mut settings = match file {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::stack_file(stack);
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    debug!(path = %path.display(), "No stack file, using environment only");
                    Self::new()
                }
            }
        };

        settings.overlay_env(std::env::vars());
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_yaml(&contents, path)?;
        info!(path = %path.display(), keys = settings.values.len(), "Loaded stack settings");
        Ok(settings)
    }

    /// Parse a stack file's `config:` mapping
    ///
    /// Keys may be namespaced as `weather-infra:<key>`; secret values are
    /// written as `{ secure: <value> }`.
    pub fn from_yaml(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let file: StackFile = serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        let namespace = format!("{}:", PROJECT);
        let mut settings = Self::new();
        for (raw_key, value) in file.config {
            let key = raw_key.strip_prefix(&namespace).unwrap_or(&raw_key).to_string();
            let setting = match &value {
                serde_yaml::Value::String(s) => Setting::Plain(s.clone()),
                serde_yaml::Value::Number(n) => Setting::Plain(n.to_string()),
                serde_yaml::Value::Bool(b) => Setting::Plain(b.to_string()),
                serde_yaml::Value::Mapping(_) => match value.get("secure").and_then(|v| v.as_str()) {
                    Some(secret) => Setting::Secret(secret_string(secret)),
                    None => {
                        return Err(ConfigError::Invalid {
                            key,
                            reason: "mappings must have the form { secure: <value> }".to_string(),
                        })
                    }
                },
                _ => {
                    return Err(ConfigError::Invalid {
                        key,
                        reason: "expected a string, number, boolean or secure value".to_string(),
                    })
                }
            };
            let setting = match setting {
                Setting::Plain(value) if keys::SECRET.contains(&key.as_str()) => {
                    Setting::Secret(secret_string(&value))
                }
                other => other,
            };
            settings.values.insert(key, setting);
        }
        Ok(settings)
    }

    /// Apply `WEATHER_INFRA_<KEY>` overrides for every known key
    pub fn overlay_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: BTreeMap<String, String> = vars.into_iter().collect();
        for key in keys::REQUIRED.iter().chain(keys::OPTIONAL.iter()) {
            if let Some(value) = vars.get(&env_var_name(key)) {
                debug!(key, "Setting overridden from environment");
                if keys::SECRET.contains(key) {
                    self.set_secret(key, value);
                } else {
                    self.set(key, value);
                }
            }
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.values.insert(key.to_string(), Setting::Plain(value.into()));
    }

    pub fn set_secret(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), Setting::Secret(secret_string(value)));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|setting| match setting {
            Setting::Plain(value) => value.as_str(),
            Setting::Secret(value) => value.expose_secret(),
        })
    }

    pub fn require(&self, key: &str) -> Result<&str, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    pub fn require_number<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.require(key)?;
        raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("'{}' is not a valid number: {}", raw, e),
        })
    }

    /// Secret settings may be stored plain (e.g. from the environment); the
    /// returned value is always wrapped.
    pub fn require_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        self.require(key).map(secret_string)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<bool>().map_err(|_| ConfigError::Invalid {
                key: key.to_string(),
                reason: format!("'{}' is not true or false", raw),
            }),
        }
    }
}

fn secret_string(value: &str) -> SecretString {
    SecretString::new(value.to_string().into_boxed_str())
}

/// `containerPort` → `WEATHER_INFRA_CONTAINER_PORT`
pub fn env_var_name(key: &str) -> String {
    let mut name = String::from(ENV_PREFIX);
    for (i, c) in key.chars().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            name.push('_');
        }
        name.push(c.to_ascii_uppercase());
    }
    name
}

/// Validated configuration of one deployment
#[derive(Debug)]
pub struct DeploymentConfig {
    /// Local path of the container build context
    pub app_path: String,
    pub prefix_name: String,
    pub image_tag: String,
    pub container_port: u16,
    pub public_port: u16,
    pub cpu: f64,
    pub memory_gb: f64,
    pub weather_api_key: SecretString,
    pub cache_location: String,
    pub enable_non_ssl_port: bool,
    pub image_platform: String,
}

impl DeploymentConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigError> {
        if let Some(missing) = keys::REQUIRED.iter().find(|key| !settings.contains(key)) {
            return Err(ConfigError::Missing(missing.to_string()));
        }

        let prefix_name = settings.require(keys::PREFIX_NAME)?.trim().to_string();
        if prefix_name.is_empty() {
            return Err(ConfigError::Invalid {
                key: keys::PREFIX_NAME.to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        Ok(Self {
            app_path: settings.require(keys::APP_PATH)?.to_string(),
            prefix_name,
            image_tag: settings.require(keys::IMAGE_TAG)?.to_string(),
            container_port: require_port(settings, keys::CONTAINER_PORT)?,
            public_port: require_port(settings, keys::PUBLIC_PORT)?,
            cpu: require_positive(settings, keys::CPU)?,
            memory_gb: require_positive(settings, keys::MEMORY)?,
            weather_api_key: settings.require_secret(keys::WEATHER_API_KEY)?,
            cache_location: settings
                .get_or(keys::CACHE_LOCATION, DEFAULT_CACHE_LOCATION)
                .to_string(),
            enable_non_ssl_port: settings.get_bool_or(keys::ENABLE_NON_SSL_PORT, true)?,
            image_platform: settings
                .get_or(keys::IMAGE_PLATFORM, DEFAULT_IMAGE_PLATFORM)
                .to_string(),
        })
    }

    /// Repository name of the service image inside the registry
    pub fn image_name(&self) -> &str {
        &self.prefix_name
    }
}

fn require_port(settings: &Settings, key: &str) -> Result<u16, ConfigError> {
    let port: u16 = settings.require_number(key)?;
    if port == 0 {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: "port must be between 1 and 65535".to_string(),
        });
    }
    Ok(port)
}

fn require_positive(settings: &Settings, key: &str) -> Result<f64, ConfigError> {
    let value: f64 = settings.require_number(key)?;
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            reason: format!("{} must be a positive number", value),
        });
    }
    Ok(value)
}
