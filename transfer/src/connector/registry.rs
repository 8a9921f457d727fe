use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::bail;
use crate::connector::{Extractor, Loader};
use crate::error::{ErrorKind, TransferResult};

/// Builds a fresh extractor for one partition attempt.
pub type ExtractorFactory = Arc<dyn Fn() -> Box<dyn Extractor> + Send + Sync>;

/// Builds a fresh loader for one partition attempt.
pub type LoaderFactory = Arc<dyn Fn() -> Box<dyn Loader> + Send + Sync>;

/// Connectors available to the engine, keyed by a stable connector identifier.
///
/// Each lookup builds a new instance, so connectors never share state across attempts.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    extractors: HashMap<String, ExtractorFactory>,
    loaders: HashMap<String, LoaderFactory>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an extractor factory under `connector_id`.
    ///
    /// Registering the same identifier twice is a configuration error.
    pub fn register_extractor<F>(
        &mut self,
        connector_id: impl Into<String>,
        factory: F,
    ) -> TransferResult<()>
    where
        F: Fn() -> Box<dyn Extractor> + Send + Sync + 'static,
    {
        let connector_id = connector_id.into();
        if self.extractors.contains_key(&connector_id) {
            bail!(
                ErrorKind::ConfigError,
                "Extractor registered twice",
                format!("connector `{connector_id}` already has an extractor")
            );
        }

        debug!(%connector_id, "registered extractor");
        self.extractors.insert(connector_id, Arc::new(factory));

        Ok(())
    }

    /// Registers a loader factory under `connector_id`.
    ///
    /// Registering the same identifier twice is a configuration error.
    pub fn register_loader<F>(
        &mut self,
        connector_id: impl Into<String>,
        factory: F,
    ) -> TransferResult<()>
    where
        F: Fn() -> Box<dyn Loader> + Send + Sync + 'static,
    {
        let connector_id = connector_id.into();
        if self.loaders.contains_key(&connector_id) {
            bail!(
                ErrorKind::ConfigError,
                "Loader registered twice",
                format!("connector `{connector_id}` already has a loader")
            );
        }

        debug!(%connector_id, "registered loader");
        self.loaders.insert(connector_id, Arc::new(factory));

        Ok(())
    }

    pub fn create_extractor(&self, connector_id: &str) -> TransferResult<Box<dyn Extractor>> {
        match self.extractors.get(connector_id) {
            Some(factory) => Ok(factory()),
            None => bail!(
                ErrorKind::ConnectorNotFound,
                "No extractor registered for connector",
                format!("connector `{connector_id}`")
            ),
        }
    }

    pub fn create_loader(&self, connector_id: &str) -> TransferResult<Box<dyn Loader>> {
        match self.loaders.get(connector_id) {
            Some(factory) => Ok(factory()),
            None => bail!(
                ErrorKind::ConnectorNotFound,
                "No loader registered for connector",
                format!("connector `{connector_id}`")
            ),
        }
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extractors: Vec<_> = self.extractors.keys().collect();
        let mut loaders: Vec<_> = self.loaders.keys().collect();
        extractors.sort();
        loaders.sort();

        f.debug_struct("ConnectorRegistry")
            .field("extractors", &extractors)
            .field("loaders", &loaders)
            .finish()
    }
}
