use async_trait::async_trait;

use crate::connector::{ConnectorConfig, ExtractorContext};
use crate::error::TransferResult;
use crate::io::DataWriter;
use crate::types::Partition;

/// Connector side that reads one [`Partition`] of the source system.
///
/// An extractor pushes every record of its partition into the supplied [`DataWriter`] and
/// returns once all of them were written. Writes may suspend while the downstream loader
/// catches up, and a write fails as soon as the loader has failed: implementations should
/// propagate that error with `?` instead of continuing to read from the source.
///
/// Instances are created fresh for each partition attempt by the
/// [`crate::connector::ConnectorRegistry`].
#[async_trait]
pub trait Extractor: Send {
    /// Extracts `partition` and writes its records into `writer`.
    async fn run(
        &mut self,
        context: &ExtractorContext,
        connection_config: &ConnectorConfig,
        job_config: &ConnectorConfig,
        partition: &Partition,
        writer: &mut dyn DataWriter,
    ) -> TransferResult<()>;

    /// Returns the number of rows read by the most recent [`Extractor::run`].
    fn rows_read(&self) -> u64;
}
