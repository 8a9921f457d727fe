use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::bail;
use crate::connector::{ConnectorConfig, Loader, LoaderContext};
use crate::error::{ErrorKind, TransferResult};
use crate::io::DataReader;
use crate::test_utils::memory::InMemorySink;
use crate::types::Value;

/// Loader that stores every record it reads until end-of-data.
#[derive(Debug, Clone)]
pub struct CollectingLoader {
    sink: InMemorySink,
}

impl CollectingLoader {
    pub fn new(sink: InMemorySink) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Loader for CollectingLoader {
    async fn load(
        &mut self,
        context: &LoaderContext,
        _connection_config: &ConnectorConfig,
        _job_config: &ConnectorConfig,
        reader: &mut dyn DataReader,
    ) -> TransferResult<()> {
        self.sink.mark_load_started().await;

        while let Some(record) = reader.read_record().await? {
            self.sink.push(record).await;
        }
        self.sink.mark_end_of_data().await;

        info!(loader_mode = %context.mode(), "collecting loader reached end of data");

        Ok(())
    }
}

/// Loader that waits before every read, keeping the bridge buffer full.
#[derive(Debug, Clone)]
pub struct SlowLoader {
    sink: InMemorySink,
    delay: Duration,
}

impl SlowLoader {
    pub fn new(sink: InMemorySink, delay: Duration) -> Self {
        Self { sink, delay }
    }
}

#[async_trait]
impl Loader for SlowLoader {
    async fn load(
        &mut self,
        _context: &LoaderContext,
        _connection_config: &ConnectorConfig,
        _job_config: &ConnectorConfig,
        reader: &mut dyn DataReader,
    ) -> TransferResult<()> {
        self.sink.mark_load_started().await;

        loop {
            tokio::time::sleep(self.delay).await;
            let Some(record) = reader.read_record().await? else {
                break;
            };
            self.sink.push(record).await;
        }
        self.sink.mark_end_of_data().await;

        Ok(())
    }
}

/// Loader that stores `fail_after` records and then fails with a destination error.
#[derive(Debug, Clone)]
pub struct FailingLoader {
    sink: InMemorySink,
    fail_after: usize,
}

impl FailingLoader {
    pub fn new(sink: InMemorySink, fail_after: usize) -> Self {
        Self { sink, fail_after }
    }
}

#[async_trait]
impl Loader for FailingLoader {
    async fn load(
        &mut self,
        _context: &LoaderContext,
        _connection_config: &ConnectorConfig,
        _job_config: &ConnectorConfig,
        reader: &mut dyn DataReader,
    ) -> TransferResult<()> {
        self.sink.mark_load_started().await;

        for _ in 0..self.fail_after {
            let Some(record) = reader.read_record().await? else {
                self.sink.mark_end_of_data().await;
                return Ok(());
            };
            self.sink.push(record).await;
        }

        bail!(
            ErrorKind::DestinationError,
            "Destination rejected the batch",
            format!("failed after {} records", self.fail_after)
        );
    }
}

/// Finite loader expecting `records` records whose fields are numbered from zero.
///
/// Returns as soon as it has read them, without waiting for end-of-data.
#[derive(Debug, Clone)]
pub struct NumberedFieldsLoader {
    sink: InMemorySink,
    records: usize,
    fields: usize,
}

impl NumberedFieldsLoader {
    pub fn new(sink: InMemorySink, records: usize, fields: usize) -> Self {
        Self {
            sink,
            records,
            fields,
        }
    }
}

#[async_trait]
impl Loader for NumberedFieldsLoader {
    async fn load(
        &mut self,
        _context: &LoaderContext,
        _connection_config: &ConnectorConfig,
        _job_config: &ConnectorConfig,
        reader: &mut dyn DataReader,
    ) -> TransferResult<()> {
        self.sink.mark_load_started().await;

        for _ in 0..self.records {
            let Some(values) = reader.read_array_record().await? else {
                bail!(ErrorKind::InvalidData, "End of data before the expected records");
            };

            let expected = (0..self.fields as i64).map(Value::Int).collect::<Vec<_>>();
            if values != expected {
                bail!(
                    ErrorKind::InvalidData,
                    "Record fields are not numbered in order",
                    format!("got {} fields", values.len())
                );
            }

            self.sink.push(values.into()).await;
        }

        Ok(())
    }
}
