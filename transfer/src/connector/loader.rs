use async_trait::async_trait;

use crate::connector::{ConnectorConfig, LoaderContext};
use crate::error::TransferResult;
use crate::io::DataReader;

/// Connector side that writes records into the destination system.
///
/// A loader runs as its own task, concurrently with the extractor feeding it. It pulls records
/// from the [`DataReader`] until [`DataReader::read_record`] returns `Ok(None)`.
///
/// In [`transfer_config::shared::LoaderMode::Finite`] mode a loader may return as soon as it
/// has consumed every record it needs. In [`transfer_config::shared::LoaderMode::Continuous`]
/// mode it must keep reading until it observes end-of-data itself; returning earlier is
/// reported as a protocol violation when the bridge closes.
///
/// Returning an error fails the whole transfer: the error is stored, every suspended writer is
/// woken and the next write or close reports it wrapped as
/// [`crate::error::ErrorKind::LoaderFailed`].
#[async_trait]
pub trait Loader: Send {
    async fn load(
        &mut self,
        context: &LoaderContext,
        connection_config: &ConnectorConfig,
        job_config: &ConnectorConfig,
        reader: &mut dyn DataReader,
    ) -> TransferResult<()>;
}
