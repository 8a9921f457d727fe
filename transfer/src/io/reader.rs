use async_trait::async_trait;

use crate::error::TransferResult;
use crate::types::{Record, Value};

/// Source a loader pulls its records from.
///
/// [`DataReader::read_record`] suspends until a record is available and returns `Ok(None)` once
/// the writer side signalled end-of-data. When the transfer failed or was cancelled, the stored
/// failure is returned instead. Reading again after `Ok(None)` is a protocol violation.
#[async_trait]
pub trait DataReader: Send {
    /// Reads the next record, or `None` at end-of-data.
    async fn read_record(&mut self) -> TransferResult<Option<Record>>;

    /// Reads the next record as CSV text.
    async fn read_text_record(&mut self) -> TransferResult<Option<String>> {
        Ok(self.read_record().await?.map(Record::into_text))
    }

    /// Reads the next record as typed fields.
    async fn read_array_record(&mut self) -> TransferResult<Option<Vec<Value>>> {
        self.read_record()
            .await?
            .map(Record::into_values)
            .transpose()
    }
}
