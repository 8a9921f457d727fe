//! Connector contracts and the registry resolving connectors by identifier.

mod context;
mod extractor;
mod loader;
mod registry;

pub use context::{
    ConnectorConfig, ExtractorContext, LoaderContext, TaskContext, TaskContextBuilder,
};
pub use extractor::Extractor;
pub use loader::Loader;
pub use registry::{ConnectorRegistry, ExtractorFactory, LoaderFactory};
pub use transfer_config::shared::LoaderMode;
