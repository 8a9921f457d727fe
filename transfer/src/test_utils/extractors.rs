use async_trait::async_trait;

use crate::connector::{ConnectorConfig, Extractor, ExtractorContext};
use crate::error::TransferResult;
use crate::io::DataWriter;
use crate::types::{Partition, Record};

/// Extractor writing a fixed list of records for every partition.
#[derive(Debug, Clone)]
pub struct MemoryExtractor {
    records: Vec<Record>,
    rows_read: u64,
}

impl MemoryExtractor {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            rows_read: 0,
        }
    }
}

#[async_trait]
impl Extractor for MemoryExtractor {
    async fn run(
        &mut self,
        _context: &ExtractorContext,
        _connection_config: &ConnectorConfig,
        _job_config: &ConnectorConfig,
        _partition: &Partition,
        writer: &mut dyn DataWriter,
    ) -> TransferResult<()> {
        self.rows_read = 0;

        for record in &self.records {
            self.rows_read += 1;
            writer.write_record(record.clone()).await?;
        }

        Ok(())
    }

    fn rows_read(&self) -> u64 {
        self.rows_read
    }
}
