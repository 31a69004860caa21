use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::data::DataSources;
use crate::environment::Environment;
use crate::error::{HarnessError, Result};
use crate::poller::PollConfig;

const DEFAULT_SETTINGS_FILE: &str = "convergent";
const ENV_PREFIX: &str = "CONVERGENT";

// Default configuration constants
const DEFAULT_ENVIRONMENT_NAME: &str = "qa";
const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_POLL_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_TRANSPORT_TIMEOUT_SECS: u64 = 30;

/// Harness settings, read from `convergent.toml` and `CONVERGENT__*` variables.
///
/// Every section falls back to its defaults, so an empty source yields a usable
/// configuration pointing at a local service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub environment: EnvironmentSettings,
    pub polling: PollingSettings,
    pub transport: TransportSettings,
    pub data: DataSettings,
    /// Free-form variables available to endpoint templates.
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentSettings {
    pub name: String,
    pub browser: String,
    pub base_url: String,
    pub api_version: Option<String>,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_ENVIRONMENT_NAME.to_string(),
            browser: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: Some("1".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSettings {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
        }
    }
}

impl PollingSettings {
    pub fn poll_config(&self) -> Result<PollConfig> {
        PollConfig::new(
            Duration::from_millis(self.interval_ms),
            Duration::from_millis(self.timeout_ms),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TRANSPORT_TIMEOUT_SECS,
            user_agent: format!("convergent/{}", crate::VERSION),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub root: PathBuf,
    pub sources: Vec<String>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            sources: Vec::new(),
        }
    }
}

impl Settings {
    /// Load from `convergent.toml` in the working directory (if present) and the environment.
    pub fn new() -> Result<Self> {
        Self::load(None)
    }

    /// Load from an explicit file, falling back to `convergent.toml` when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path),
            None => config::File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        let settings: Settings = config::Config::builder()
            .add_source(file)
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        log::debug!("Loaded settings: {settings:?}");
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.polling.interval_ms == 0 {
            return Err(HarnessError::InvalidConfig(
                "polling.interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.transport.timeout_secs == 0 {
            return Err(HarnessError::InvalidConfig(
                "transport.timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.environment.base_url.trim().is_empty() {
            return Err(HarnessError::InvalidConfig(
                "environment.base_url must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Variables for endpoint and data source templates.
    ///
    /// User-defined `variables` come first; the built-in names `env`, `browser`,
    /// `base_url` and `api_version` override them.
    pub fn variables(&self) -> Environment {
        let mut environment = Environment::new();
        for (name, value) in &self.variables {
            environment.define(name, value);
        }
        environment.define("env", &self.environment.name);
        environment.define("browser", &self.environment.browser);
        environment.define("base_url", self.environment.base_url.trim_end_matches('/'));
        let api_version = self
            .environment
            .api_version
            .as_ref()
            .map(|version| format!("?api-version={version}"))
            .unwrap_or_default();
        environment.define("api_version", &api_version);
        environment
    }

    pub fn data_sources(&self) -> DataSources {
        self.data
            .sources
            .iter()
            .fold(DataSources::new(&self.data.root), |sources, template| {
                sources.read_from(template)
            })
    }
}
