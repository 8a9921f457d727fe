use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::load::Config;
use crate::shared::{BridgeConfig, ValidationError};

/// Chooses a registered connector and carries its connector-defined settings.
///
/// `connection` and `job` are opaque to the engine and reach the connector unmodified.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ConnectorSelection {
    /// Stable identifier the connector was registered under.
    pub connector_id: String,
    /// Connection-level settings (hosts, credentials references, ...).
    #[serde(default)]
    pub connection: serde_json::Value,
    /// Job-level settings (tables, paths, formats, ...).
    #[serde(default)]
    pub job: serde_json::Value,
}

impl ConnectorSelection {
    pub fn new(connector_id: impl Into<String>) -> Self {
        Self {
            connector_id: connector_id.into(),
            connection: serde_json::Value::Null,
            job: serde_json::Value::Null,
        }
    }
}

/// Configuration of one transfer job: which connectors move the data and how they are bridged.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TransferJobConfig {
    /// Identifier of the job, used to tag logs and metrics.
    pub id: u64,
    /// Connector reading from the source system.
    pub extractor: ConnectorSelection,
    /// Connector writing to the destination system.
    pub loader: ConnectorSelection,
    /// Buffering between extraction and loading.
    #[serde(default)]
    pub bridge: BridgeConfig,
    /// Free-form key/value settings exposed to both connectors.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl TransferJobConfig {
    /// Validates the job configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.extractor.connector_id.trim().is_empty() {
            return Err(ValidationError::ConnectorIdEmpty("extractor"));
        }

        if self.loader.connector_id.trim().is_empty() {
            return Err(ValidationError::ConnectorIdEmpty("loader"));
        }

        self.bridge.validate()
    }
}

impl Config for TransferJobConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];

    fn validate(&self) -> Result<(), ValidationError> {
        TransferJobConfig::validate(self)
    }
}
