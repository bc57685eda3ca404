use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, fs, io, time::Duration};
use url::Url;

// Runtime settings for the portal client (not portal content).

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/api";
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_STATE_PATH: &str = "portal_state.json";
pub const DEFAULT_CONFIG_PATH: &str = "portal.toml";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue {
                key: "PORTAL_ENV",
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid api url {value:?}: {source}")]
    InvalidUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

// Shape of the optional TOML file; every field may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    api_url: Option<String>,
    http_timeout_ms: Option<u64>,
    state_path: Option<PathBuf>,
    environment: Option<Environment>,
}

#[derive(Clone, Debug)]
pub struct PortalConfig {
    pub api_url: Url,
    pub http_timeout: Duration,
    pub state_path: PathBuf,
    pub environment: Environment,
}

impl PortalConfig {
    /// Defaults, then the TOML file named by `PORTAL_CONFIG`, then env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("PORTAL_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let file = read_optional(Path::new(&path))?;
        Self::from_sources(file.as_deref(), |key| env::var(key).ok())
    }

    pub fn from_sources<F>(file: Option<&str>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = match file {
            Some(raw) => toml::from_str(raw)?,
            None => FileConfig::default(),
        };

        let api_url = lookup("PORTAL_API_URL")
            .or(file.api_url)
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = Url::parse(&api_url).map_err(|source| ConfigError::InvalidUrl {
            value: api_url.clone(),
            source,
        })?;

        let timeout_ms = match lookup("PORTAL_HTTP_TIMEOUT_MS") {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue {
                    key: "PORTAL_HTTP_TIMEOUT_MS",
                    value,
                })?,
            None => file.http_timeout_ms.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS),
        };

        let state_path = lookup("PORTAL_STATE_PATH")
            .map(PathBuf::from)
            .or(file.state_path)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH));

        let environment = match lookup("PORTAL_ENV") {
            Some(value) => value.parse()?,
            None => file.environment.unwrap_or_default(),
        };

        Ok(Self {
            api_url,
            http_timeout: Duration::from_millis(timeout_ms),
            state_path,
            environment,
        })
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}
