use std::{collections::HashMap, env, str::FromStr};

use crate::util::errors::StdError;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Output format of the log layer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = StdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(StdError::ConfigError(format!(
                "LOG_FORMAT must be `compact` or `json`, got `{other}`"
            ))),
        }
    }
}

/// Operator settings read from the process environment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Address of the diagnostics/metrics web server
    pub bind_address: String,
    /// Restrict watches to one namespace; `None` watches the whole cluster
    pub watch_namespace: Option<String>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            watch_namespace: None,
            log_format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, StdError> {
        Self::from_vars(env::vars().collect())
    }

    fn from_vars(vars: HashMap<String, String>) -> Result<Self, StdError> {
        let non_empty = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        Ok(Self {
            bind_address: non_empty("BIND_ADDRESS").unwrap_or(DEFAULT_BIND_ADDRESS).to_string(),
            watch_namespace: non_empty("WATCH_NAMESPACE").map(str::to_string),
            log_format: non_empty("LOG_FORMAT").unwrap_or_default().parse()?,
        })
    }
}
