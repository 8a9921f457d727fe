use std::fmt;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// How a loader consumes the records handed to it.
///
/// The mode is always taken from configuration; it decides how the bridge validates the way a
/// loader completed.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LoaderMode {
    /// The loader consumes one bounded batch and returns.
    ///
    /// A finite loader may return without reading the end-of-data signal, but it must have
    /// read every record written to the bridge.
    #[default]
    Finite,
    /// The loader keeps reading until it observes the end-of-data signal itself.
    Continuous,
}

impl LoaderMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoaderMode::Finite => "finite",
            LoaderMode::Continuous => "continuous",
        }
    }
}

impl fmt::Display for LoaderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings of the output bridge sitting between the host engine and a loader.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// Maximum number of records buffered between the writer and the loader.
    ///
    /// Writers suspend once this many records are waiting to be read.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// How the configured loader consumes records.
    #[serde(default)]
    pub loader_mode: LoaderMode,
}

impl BridgeConfig {
    /// Default number of records buffered between writer and loader.
    pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

    /// Returns a config with the given capacity and loader mode.
    pub fn new(buffer_capacity: usize, loader_mode: LoaderMode) -> Self {
        Self {
            buffer_capacity,
            loader_mode,
        }
    }

    /// Validates bridge settings.
    ///
    /// The buffer must hold at least one record, otherwise no write could ever complete.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.buffer_capacity == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "bridge.buffer_capacity".to_string(),
                constraint: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            loader_mode: LoaderMode::default(),
        }
    }
}

fn default_buffer_capacity() -> usize {
    BridgeConfig::DEFAULT_BUFFER_CAPACITY
}
