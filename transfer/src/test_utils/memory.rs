use std::sync::Arc;

use tokio::sync::Mutex;

use crate::types::Record;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<Record>,
    end_of_data_seen: bool,
    loads: usize,
}

/// Destination shared between a test and the loaders it registers.
///
/// Loaders append what they read; the test inspects it after the bridge closed.
#[derive(Debug, Clone, Default)]
pub struct InMemorySink {
    inner: Arc<Mutex<Inner>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, record: Record) {
        self.inner.lock().await.records.push(record);
    }

    pub async fn mark_end_of_data(&self) {
        self.inner.lock().await.end_of_data_seen = true;
    }

    pub async fn mark_load_started(&self) {
        self.inner.lock().await.loads += 1;
    }

    pub async fn records(&self) -> Vec<Record> {
        self.inner.lock().await.records.clone()
    }

    /// Returns every stored record rendered as CSV text.
    pub async fn texts(&self) -> Vec<String> {
        self.inner
            .lock()
            .await
            .records
            .iter()
            .map(|record| record.text().into_owned())
            .collect()
    }

    pub async fn end_of_data_seen(&self) -> bool {
        self.inner.lock().await.end_of_data_seen
    }

    /// Returns how many times a loader started loading into this sink.
    pub async fn load_count(&self) -> usize {
        self.inner.lock().await.loads
    }
}
