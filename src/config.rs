//! Configuration for the mock server.
//!
//! Defines the mock wire types and the optional YAML seed file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::request_log::DEFAULT_MAX_LOGS;

/// Main configuration for the mock server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MockServerConfig {
    /// Mocks registered at startup
    #[serde(default)]
    pub mocks: Vec<MockRoute>,

    /// Global settings
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl MockServerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.settings.validate()?;
        for (i, mock) in self.mocks.iter().enumerate() {
            mock.validate()
                .map_err(|e| anyhow::anyhow!("Mock {}: {}", i, e))?;
        }
        Ok(())
    }
}

/// A canned response bound to a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockResponse {
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status_code: u16,

    /// Response headers, names kept verbatim
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Response body
    #[serde(default)]
    pub body: String,
}

fn default_status() -> u16 {
    200
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status_code: default_status(),
            headers: BTreeMap::new(),
            body: String::new(),
        }
    }
}

impl MockResponse {
    /// Plain response with no headers.
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A mock as submitted to `POST /__mock/add` or listed in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockRoute {
    /// HTTP method, compared verbatim
    pub method: String,

    /// Request path, compared verbatim
    pub path: String,

    /// Response to return
    #[serde(default)]
    pub response: MockResponse,
}

impl MockRoute {
    /// Validate a mock loaded from the config file.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.method.is_empty() {
            anyhow::bail!("Mock method cannot be empty");
        }
        if !self.path.starts_with('/') {
            anyhow::bail!("Mock path must start with '/': {:?}", self.path);
        }
        Ok(())
    }
}

/// Route key submitted to `DELETE /__mock/delete`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteKey {
    pub method: String,
    pub path: String,
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalSettings {
    /// Maximum number of request logs kept in memory
    #[serde(default = "default_max_logs")]
    pub max_logs: usize,

    /// Log requests served by a mock
    #[serde(default = "default_true")]
    pub log_matches: bool,

    /// Log requests with no matching mock
    #[serde(default = "default_true")]
    pub log_unmatched: bool,
}

impl GlobalSettings {
    /// Validate the settings.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_logs == 0 {
            anyhow::bail!("max_logs must be at least 1");
        }
        Ok(())
    }
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            max_logs: default_max_logs(),
            log_matches: true,
            log_unmatched: true,
        }
    }
}

fn default_max_logs() -> usize {
    DEFAULT_MAX_LOGS
}

fn default_true() -> bool {
    true
}
