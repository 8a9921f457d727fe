use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use transfer::bridge::{LoaderState, OutputBridge};
use transfer::connector::{ConnectorConfig, Loader, LoaderContext, LoaderMode, TaskContext};
use transfer::bail;
use transfer::error::{ErrorKind, TransferResult};
use transfer::io::{DataReader, DataWriter};
use transfer::test_utils::loaders::{
    CollectingLoader, FailingLoader, NumberedFieldsLoader, SlowLoader,
};
use transfer::test_utils::memory::InMemorySink;
use transfer::test_utils::numbered_csv_record;
use transfer::types::{Record, Value};
use transfer_config::shared::BridgeConfig;
use transfer_telemetry::tracing::init_test_tracing;

fn bridge(capacity: usize, mode: LoaderMode, loader: impl Loader + 'static) -> OutputBridge {
    OutputBridge::new(
        1,
        &BridgeConfig::new(capacity, mode),
        Box::new(loader),
        TaskContext::default(),
        ConnectorConfig::default(),
        ConnectorConfig::default(),
    )
    .unwrap()
}

fn text_records(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{i},'row {i}'")).collect()
}

/// Loader that reads a single record and returns.
struct SingleReadLoader;

#[async_trait]
impl Loader for SingleReadLoader {
    async fn load(
        &mut self,
        _context: &LoaderContext,
        _connection_config: &ConnectorConfig,
        _job_config: &ConnectorConfig,
        reader: &mut dyn DataReader,
    ) -> TransferResult<()> {
        reader.read_record().await?;
        Ok(())
    }
}

/// Loader that never reads.
struct StallingLoader;

#[async_trait]
impl Loader for StallingLoader {
    async fn load(
        &mut self,
        _context: &LoaderContext,
        _connection_config: &ConnectorConfig,
        _job_config: &ConnectorConfig,
        _reader: &mut dyn DataReader,
    ) -> TransferResult<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Loader that reads one record and then keeps running, holding `guard` until it is dropped.
struct GuardedLoader {
    guard: Arc<()>,
}

#[async_trait]
impl Loader for GuardedLoader {
    async fn load(
        &mut self,
        _context: &LoaderContext,
        _connection_config: &ConnectorConfig,
        _job_config: &ConnectorConfig,
        reader: &mut dyn DataReader,
    ) -> TransferResult<()> {
        let _guard = self.guard.clone();
        reader.read_record().await?;
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

/// Loader that reads one record and fails once the writer has moved on.
struct LateFailingLoader;

#[async_trait]
impl Loader for LateFailingLoader {
    async fn load(
        &mut self,
        _context: &LoaderContext,
        _connection_config: &ConnectorConfig,
        _job_config: &ConnectorConfig,
        reader: &mut dyn DataReader,
    ) -> TransferResult<()> {
        reader.read_record().await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
        bail!(ErrorKind::DestinationError, "Destination rejected the batch");
    }
}

struct PanickingLoader;

#[async_trait]
impl Loader for PanickingLoader {
    async fn load(
        &mut self,
        _context: &LoaderContext,
        _connection_config: &ConnectorConfig,
        _job_config: &ConnectorConfig,
        reader: &mut dyn DataReader,
    ) -> TransferResult<()> {
        reader.read_record().await?;
        panic!("destination client crashed");
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn finite_loader_receives_every_record_in_order() {
    init_test_tracing();

    for count in [0, 1, 250] {
        let sink = InMemorySink::new();
        let mut bridge = bridge(16, LoaderMode::Finite, CollectingLoader::new(sink.clone()));

        for text in text_records(count) {
            bridge.write(Record::from_text(text)).await.unwrap();
        }
        bridge.close().await.unwrap();

        assert_eq!(sink.texts().await, text_records(count));
        assert!(sink.end_of_data_seen().await);
        assert_eq!(sink.load_count().await, 1);
        assert_eq!(bridge.state(), LoaderState::Done);
        assert_eq!(bridge.records_written(), count as u64);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn loader_runs_once_when_nothing_is_written() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let mut bridge = bridge(4, LoaderMode::Finite, CollectingLoader::new(sink.clone()));
    assert_eq!(bridge.state(), LoaderState::NotStarted);

    bridge.close().await.unwrap();

    assert_eq!(sink.load_count().await, 1);
    assert!(sink.records().await.is_empty());
    assert!(sink.end_of_data_seen().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn loader_failure_is_raised_by_every_later_write_and_by_close() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let mut bridge = bridge(1, LoaderMode::Finite, FailingLoader::new(sink.clone(), 3));

    let mut first_failure = None;
    for text in text_records(100) {
        if let Err(err) = bridge.write(Record::from_text(text)).await {
            first_failure = Some(err);
            break;
        }
    }

    let err = first_failure.expect("a write should observe the loader failure");
    assert_eq!(err.kind(), ErrorKind::LoaderFailed);
    assert_eq!(err.cause().unwrap().kind(), ErrorKind::DestinationError);
    assert_eq!(bridge.state(), LoaderState::Failed);

    let err = bridge.write(Record::from_text("late")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoaderFailed);

    let err = bridge.close().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoaderFailed);
    assert_eq!(
        err.cause().unwrap().detail(),
        Some("failed after 3 records")
    );

    // The failure was reported; closing again does not raise it a second time.
    bridge.close().await.unwrap();
    assert_eq!(sink.texts().await, text_records(3));
}

#[tokio::test(flavor = "multi_thread")]
async fn continuous_loader_reads_every_batch_before_end_of_data() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let mut bridge = bridge(
        8,
        LoaderMode::Continuous,
        SlowLoader::new(sink.clone(), Duration::from_millis(1)),
    );

    let expected = text_records(10 * 20);
    for batch in expected.chunks(20) {
        for text in batch {
            bridge.write_text_record(text.clone()).await.unwrap();
        }
    }
    assert!(!sink.end_of_data_seen().await);

    bridge.close().await.unwrap();

    assert!(sink.end_of_data_seen().await);
    assert_eq!(sink.texts().await, expected);
    assert_eq!(bridge.state(), LoaderState::Done);
}

#[tokio::test(flavor = "multi_thread")]
async fn close_after_success_is_a_no_op() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let mut bridge = bridge(4, LoaderMode::Finite, CollectingLoader::new(sink.clone()));
    bridge.write(Record::from_text("1")).await.unwrap();

    bridge.close().await.unwrap();
    bridge.close().await.unwrap();

    assert_eq!(sink.load_count().await, 1);
    assert_eq!(bridge.state(), LoaderState::Done);
}

#[tokio::test(flavor = "multi_thread")]
async fn single_slot_buffer_suspends_writers_and_keeps_order() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let mut bridge = bridge(
        1,
        LoaderMode::Finite,
        SlowLoader::new(sink.clone(), Duration::from_millis(5)),
    );

    let expected = text_records(30);
    for text in &expected {
        bridge.write(Record::from_text(text.clone())).await.unwrap();
        assert!(bridge.buffer().len() <= 1);
    }
    bridge.close().await.unwrap();

    assert_eq!(bridge.buffer().high_watermark(), 1);
    assert_eq!(sink.texts().await, expected);
}

#[tokio::test(flavor = "multi_thread")]
async fn finite_loader_checks_one_hundred_numbered_fields() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let mut bridge = bridge(
        4,
        LoaderMode::Finite,
        NumberedFieldsLoader::new(sink.clone(), 1, 100),
    );

    bridge.write(numbered_csv_record(100)).await.unwrap();
    bridge.close().await.unwrap();

    let records = sink.records().await;
    assert_eq!(records.len(), 1);
    let values = records[0].values().unwrap();
    assert_eq!(values.len(), 100);
    assert_eq!(values[99], Value::Int(99));
}

#[tokio::test(flavor = "multi_thread")]
async fn continuous_loader_failing_mid_stream_fails_the_attempt() {
    init_test_tracing();
    let sink = InMemorySink::new();
    // Fails after 5 of 10 batches of 50 records.
    let mut bridge = bridge(
        10,
        LoaderMode::Continuous,
        FailingLoader::new(sink.clone(), 5 * 50),
    );

    let mut failed = false;
    for batch in 0..10 {
        for field in 0..50 {
            let result = bridge
                .write_array_record(vec![Value::Int(batch), Value::Int(field)])
                .await;

            match result {
                Ok(()) => assert!(!failed, "a record was accepted after the loader failed"),
                Err(err) => {
                    assert_eq!(err.kind(), ErrorKind::LoaderFailed);
                    failed = true;
                }
            }
        }
    }
    assert!(failed);

    let err = bridge.close().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LoaderFailed);
    assert_eq!(err.cause().unwrap().kind(), ErrorKind::DestinationError);
    assert_eq!(sink.records().await.len(), 250);
}

#[tokio::test(flavor = "multi_thread")]
async fn write_after_close_is_rejected() {
    init_test_tracing();
    let mut bridge = bridge(
        4,
        LoaderMode::Finite,
        CollectingLoader::new(InMemorySink::new()),
    );
    bridge.close().await.unwrap();

    let err = bridge.write(Record::from_text("1")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
}

#[tokio::test(flavor = "multi_thread")]
async fn continuous_loader_returning_before_end_of_data_is_rejected() {
    init_test_tracing();
    let mut bridge = bridge(4, LoaderMode::Continuous, SingleReadLoader);

    bridge.write(Record::from_text("1")).await.unwrap();
    let err = bridge.close().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    assert_eq!(
        err.description(),
        Some("Continuous loader returned before end of data")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn finite_loader_leaving_records_unread_is_rejected() {
    init_test_tracing();
    let mut bridge = bridge(8, LoaderMode::Finite, SingleReadLoader);

    let mut write_failure = None;
    for text in text_records(5) {
        if let Err(err) = bridge.write(Record::from_text(text)).await {
            write_failure = Some(err);
            break;
        }
    }
    let closed = bridge.close().await;

    match write_failure {
        Some(err) => assert_eq!(err.kind(), ErrorKind::ProtocolViolation),
        None => assert_eq!(closed.unwrap_err().kind(), ErrorKind::ProtocolViolation),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn loader_panic_is_reported_on_close() {
    init_test_tracing();
    let mut bridge = bridge(4, LoaderMode::Finite, PanickingLoader);

    bridge.write(Record::from_text("1")).await.unwrap();
    let err = bridge.close().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LoaderPanic);
    assert_eq!(err.detail(), Some("destination client crashed"));
    assert_eq!(bridge.state(), LoaderState::Failed);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_wakes_a_writer_suspended_on_a_full_buffer() {
    init_test_tracing();
    let mut bridge = bridge(1, LoaderMode::Finite, StallingLoader);
    let cancellation = bridge.cancellation_handle();
    bridge.write(Record::from_text("1")).await.unwrap();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancellation.cancel()
    });
    let err = bridge.write(Record::from_text("2")).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(canceller.await.unwrap());
    assert_eq!(
        bridge.close().await.unwrap_err().kind(),
        ErrorKind::Cancelled
    );
    assert!(bridge.cancellation_handle().is_cancelled());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_before_the_first_write_never_starts_the_loader() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let mut bridge = bridge(4, LoaderMode::Finite, CollectingLoader::new(sink.clone()));

    assert!(bridge.cancellation_handle().cancel());

    assert_eq!(
        bridge.write(Record::from_text("1")).await.unwrap_err().kind(),
        ErrorKind::Cancelled
    );
    assert_eq!(
        bridge.close().await.unwrap_err().kind(),
        ErrorKind::Cancelled
    );
    assert_eq!(sink.load_count().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn cancel_after_completion_has_no_effect() {
    init_test_tracing();
    let mut bridge = bridge(
        4,
        LoaderMode::Finite,
        CollectingLoader::new(InMemorySink::new()),
    );
    bridge.write(Record::from_text("1")).await.unwrap();
    bridge.close().await.unwrap();

    assert!(!bridge.cancellation_handle().cancel());
    assert_eq!(bridge.state(), LoaderState::Done);
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_an_unclosed_bridge_cancels_the_loader() {
    init_test_tracing();
    let mut bridge = bridge(1, LoaderMode::Finite, StallingLoader);
    let cancellation = bridge.cancellation_handle();
    bridge.write(Record::from_text("1")).await.unwrap();

    drop(bridge);

    assert!(cancellation.is_cancelled());
}

#[tokio::test(flavor = "multi_thread")]
async fn dropping_a_bridge_while_close_waits_aborts_the_loader() {
    init_test_tracing();
    let guard = Arc::new(());
    let mut bridge = bridge(
        4,
        LoaderMode::Continuous,
        GuardedLoader {
            guard: guard.clone(),
        },
    );
    let cancellation = bridge.cancellation_handle();
    bridge.write(Record::from_text("1")).await.unwrap();

    let closed = tokio::time::timeout(Duration::from_millis(100), bridge.close()).await;
    assert!(closed.is_err());
    assert_eq!(bridge.state(), LoaderState::Running);

    drop(bridge);

    assert!(cancellation.is_cancelled());
    // The aborted loader task releases its clones of the guard once it is torn down.
    tokio::time::timeout(Duration::from_secs(5), async {
        while Arc::strong_count(&guard) > 1 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn loader_failure_after_the_last_write_is_reported_by_close() {
    init_test_tracing();
    let mut bridge = bridge(4, LoaderMode::Finite, LateFailingLoader);

    bridge.write(Record::from_text("1")).await.unwrap();
    let err = bridge.close().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LoaderFailed);
    assert_eq!(err.cause().unwrap().kind(), ErrorKind::DestinationError);
    assert_eq!(bridge.state(), LoaderState::Failed);
    assert_eq!(bridge.buffer().failure().unwrap().kind(), ErrorKind::LoaderFailed);
}

#[tokio::test(flavor = "multi_thread")]
async fn typed_writes_are_read_back_as_text() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let mut bridge = bridge(4, LoaderMode::Finite, CollectingLoader::new(sink.clone()));

    bridge
        .write_array_record(vec![Value::Int(1), Value::from("o'neil"), Value::Null])
        .await
        .unwrap();
    bridge.close().await.unwrap();

    assert_eq!(sink.texts().await, vec!["1,'o\\'neil',NULL".to_string()]);
}

#[test]
fn zero_capacity_is_rejected() {
    let result = OutputBridge::new(
        1,
        &BridgeConfig::new(0, LoaderMode::Finite),
        Box::new(SingleReadLoader),
        TaskContext::default(),
        ConnectorConfig::default(),
        ConnectorConfig::default(),
    );

    assert_eq!(result.err().unwrap().kind(), ErrorKind::ConfigError);
}
