use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;

use crate::bridge::HandoffBuffer;
use crate::error::TransferResult;
use crate::io::DataReader;
use crate::metrics::{JOB_ID_LABEL, TRANSFER_RECORDS_READ_TOTAL};
use crate::types::Record;

/// Reader view of a [`HandoffBuffer`] handed to the loader task.
#[derive(Debug)]
pub struct BridgeReader {
    buffer: Arc<HandoffBuffer>,
    job_id: u64,
    records_read: u64,
}

impl BridgeReader {
    pub(crate) fn new(buffer: Arc<HandoffBuffer>, job_id: u64) -> Self {
        Self {
            buffer,
            job_id,
            records_read: 0,
        }
    }

    /// Returns the number of records this reader handed out.
    pub fn records_read(&self) -> u64 {
        self.records_read
    }
}

#[async_trait]
impl DataReader for BridgeReader {
    async fn read_record(&mut self) -> TransferResult<Option<Record>> {
        let record = self.buffer.pop().await?;

        if record.is_some() {
            self.records_read += 1;
            counter!(TRANSFER_RECORDS_READ_TOTAL, JOB_ID_LABEL => self.job_id.to_string())
                .increment(1);
        }

        Ok(record)
    }
}
