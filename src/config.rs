use crate::application::dispatcher::DispatcherConfig;
use crate::application::retry::RetryPolicy;
use crate::error::{DispatchError, Result};
use crate::infrastructure::http_channel::DEFAULT_TRANSACTIONS_PATH;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownstreamConfig {
    pub base_url: String,
    pub path: String,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            path: DEFAULT_TRANSACTIONS_PATH.to_string(),
        }
    }
}

/// Complete runtime configuration. Every section and field has a default, so
/// a config file only needs to name what it changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub downstream: DownstreamConfig,
    pub retry: RetryPolicy,
    pub dispatcher: DispatcherConfig,
}

impl DispatchConfig {
    /// Loads a JSON config file, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let file = File::open(path)?;
                Ok(serde_json::from_reader(file)?)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.downstream.base_url.trim().is_empty() {
            return Err(DispatchError::ConfigError(
                "downstream.base_url must not be empty".to_string(),
            ));
        }
        self.retry.validate()?;
        self.dispatcher.validate()
    }
}
