use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use transfer_config::shared::LoaderMode;

use crate::error::{ErrorKind, TransferResult};
use crate::transfer_error;

/// Immutable key/value settings visible to the connectors of one task attempt.
///
/// Cloning is cheap, the properties are shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskContext {
    properties: Arc<BTreeMap<String, String>>,
}

impl TaskContext {
    pub fn new(properties: BTreeMap<String, String>) -> Self {
        Self {
            properties: Arc::new(properties),
        }
    }

    pub fn builder() -> TaskContextBuilder {
        TaskContextBuilder::default()
    }

    /// Returns the raw value stored under `key`.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Returns the value under `key` parsed as an integer, or `default` when absent.
    pub fn get_long(&self, key: &str, default: i64) -> TransferResult<i64> {
        let Some(raw) = self.get_string(key) else {
            return Ok(default);
        };

        raw.trim().parse::<i64>().map_err(|err| {
            transfer_error!(
                ErrorKind::ConfigError,
                "Context property is not an integer",
                format!("property `{key}` holds `{raw}`"),
                source: err
            )
        })
    }

    /// Returns the value under `key` parsed as a boolean, or `default` when absent.
    pub fn get_bool(&self, key: &str, default: bool) -> TransferResult<bool> {
        let Some(raw) = self.get_string(key) else {
            return Ok(default);
        };

        raw.trim().parse::<bool>().map_err(|err| {
            transfer_error!(
                ErrorKind::ConfigError,
                "Context property is not a boolean",
                format!("property `{key}` holds `{raw}`"),
                source: err
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.properties
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl From<BTreeMap<String, String>> for TaskContext {
    fn from(properties: BTreeMap<String, String>) -> Self {
        TaskContext::new(properties)
    }
}

/// Builder for [`TaskContext`].
#[derive(Debug, Default)]
pub struct TaskContextBuilder {
    properties: BTreeMap<String, String>,
}

impl TaskContextBuilder {
    pub fn set(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.properties.insert(key.into(), value.to_string());
        self
    }

    pub fn build(self) -> TaskContext {
        TaskContext::new(self.properties)
    }
}

/// Connector-defined configuration passed through the engine unmodified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorConfig(serde_json::Value);

impl ConnectorConfig {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Returns `true` when no configuration was provided.
    pub fn is_empty(&self) -> bool {
        self.0.is_null()
    }

    /// Decodes the configuration into the connector's own type.
    pub fn deserialize<T>(&self) -> TransferResult<T>
    where
        T: DeserializeOwned,
    {
        T::deserialize(&self.0).map_err(|err| {
            transfer_error!(
                ErrorKind::ConfigError,
                "Connector configuration does not match the expected shape",
                err.to_string(),
                source: err
            )
        })
    }
}

impl From<serde_json::Value> for ConnectorConfig {
    fn from(value: serde_json::Value) -> Self {
        ConnectorConfig::new(value)
    }
}

/// Context handed to [`crate::connector::Extractor::run`].
#[derive(Debug, Clone, Default)]
pub struct ExtractorContext {
    task: TaskContext,
}

impl ExtractorContext {
    pub fn new(task: TaskContext) -> Self {
        Self { task }
    }
}

impl Deref for ExtractorContext {
    type Target = TaskContext;

    fn deref(&self) -> &Self::Target {
        &self.task
    }
}

/// Context handed to [`crate::connector::Loader::load`].
///
/// Carries the configured [`LoaderMode`] so a loader can tell whether it is expected to drain
/// the stream until end-of-data.
#[derive(Debug, Clone, Default)]
pub struct LoaderContext {
    task: TaskContext,
    mode: LoaderMode,
}

impl LoaderContext {
    pub fn new(task: TaskContext, mode: LoaderMode) -> Self {
        Self { task, mode }
    }

    pub fn mode(&self) -> LoaderMode {
        self.mode
    }
}

impl Deref for LoaderContext {
    type Target = TaskContext;

    fn deref(&self) -> &Self::Target {
        &self.task
    }
}
