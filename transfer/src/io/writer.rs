use async_trait::async_trait;

use crate::error::TransferResult;
use crate::types::{Record, Value};

/// Sink an extractor pushes its records into.
///
/// Implementations may suspend while buffering (the output bridge suspends while its buffer is
/// full) and must deliver records to the matching [`crate::io::DataReader`] in the order they
/// were written.
#[async_trait]
pub trait DataWriter: Send {
    /// Writes one record.
    async fn write_record(&mut self, record: Record) -> TransferResult<()>;

    /// Writes one record given as CSV text.
    async fn write_text_record(&mut self, text: String) -> TransferResult<()> {
        self.write_record(Record::from_text(text)).await
    }

    /// Writes one record given as typed fields.
    async fn write_array_record(&mut self, values: Vec<Value>) -> TransferResult<()> {
        self.write_record(Record::from_values(values)).await
    }
}
