use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use transfer::bail;
use transfer::connector::{
    ConnectorConfig, ConnectorRegistry, Extractor, ExtractorContext, Loader, LoaderContext,
};
use transfer::error::{ErrorKind, TransferResult};
use transfer::io::{DataReader, DataWriter};
use transfer::policy::{RetryDirective, build_error_handling_policy};
use transfer::task::{PartitionTask, TaskReport};
use transfer::test_utils::extractors::MemoryExtractor;
use transfer::test_utils::loaders::{CollectingLoader, FailingLoader};
use transfer::test_utils::memory::InMemorySink;
use transfer::types::{Partition, Record};
use transfer_config::environment::Environment;
use transfer_config::shared::{BridgeConfig, ConnectorSelection, LoaderMode, TransferJobConfig};
use transfer_telemetry::tracing::init_test_tracing;

fn job_config(capacity: usize, mode: LoaderMode) -> TransferJobConfig {
    TransferJobConfig {
        id: 42,
        extractor: ConnectorSelection::new("memory"),
        loader: ConnectorSelection::new("memory"),
        bridge: BridgeConfig::new(capacity, mode),
        context: BTreeMap::new(),
    }
}

fn records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| Record::from_text(format!("{i},'user {i}'")))
        .collect()
}

fn registry<L>(records: Vec<Record>, loader: L) -> Arc<ConnectorRegistry>
where
    L: Fn() -> Box<dyn Loader> + Send + Sync + 'static,
{
    let mut registry = ConnectorRegistry::new();
    registry
        .register_extractor("memory", move || {
            Box::new(MemoryExtractor::new(records.clone()))
        })
        .unwrap();
    registry.register_loader("memory", loader).unwrap();

    Arc::new(registry)
}

fn partition() -> Partition {
    Partition::new(0, &"users").unwrap()
}

/// Extractor writing `fail_after` records and then losing its source connection.
struct FailingExtractor {
    fail_after: usize,
    rows_read: u64,
}

#[async_trait]
impl Extractor for FailingExtractor {
    async fn run(
        &mut self,
        _context: &ExtractorContext,
        _connection_config: &ConnectorConfig,
        _job_config: &ConnectorConfig,
        _partition: &Partition,
        writer: &mut dyn DataWriter,
    ) -> TransferResult<()> {
        for record in records(self.fail_after) {
            writer.write_record(record).await?;
            self.rows_read += 1;
        }

        bail!(ErrorKind::SourceError, "Source connection lost");
    }

    fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

/// Loader checking the record count announced through the task context.
struct CountingLoader;

#[async_trait]
impl Loader for CountingLoader {
    async fn load(
        &mut self,
        context: &LoaderContext,
        _connection_config: &ConnectorConfig,
        job_config: &ConnectorConfig,
        reader: &mut dyn DataReader,
    ) -> TransferResult<()> {
        let expected = context.get_long("rows.expected", -1)?;
        let table = job_config.as_value()["table"].as_str().unwrap_or_default();

        let mut read = 0;
        while reader.read_record().await?.is_some() {
            read += 1;
        }

        if read != expected || table != "users" {
            bail!(
                ErrorKind::DestinationError,
                "Unexpected load",
                format!("read {read} records into `{table}`")
            );
        }

        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn partition_is_moved_from_extractor_to_loader() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let loader_sink = sink.clone();
    let registry = registry(records(120), move || {
        Box::new(CollectingLoader::new(loader_sink.clone()))
    });

    let report = PartitionTask::new(
        Arc::new(job_config(8, LoaderMode::Continuous)),
        registry,
        partition(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(
        report,
        TaskReport {
            rows_read: 120,
            records_written: 120
        }
    );
    let expected: Vec<String> = records(120)
        .into_iter()
        .map(Record::into_text)
        .collect();
    assert_eq!(sink.texts().await, expected);
    assert!(sink.end_of_data_seen().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn loader_failure_fails_the_attempt_and_is_retriable() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let loader_sink = sink.clone();
    let registry = registry(records(200), move || {
        Box::new(FailingLoader::new(loader_sink.clone(), 10))
    });

    let err = PartitionTask::new(
        Arc::new(job_config(1, LoaderMode::Finite)),
        registry,
        partition(),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LoaderFailed);
    assert_eq!(err.cause().unwrap().kind(), ErrorKind::DestinationError);
    assert_eq!(
        build_error_handling_policy(&err).retry_directive(),
        RetryDirective::AttemptRetry
    );
    assert_eq!(sink.records().await.len(), 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn extractor_failure_cancels_the_loader() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let mut registry = ConnectorRegistry::new();
    registry
        .register_extractor("memory", || {
            Box::new(FailingExtractor {
                fail_after: 3,
                rows_read: 0,
            })
        })
        .unwrap();
    let loader_sink = sink.clone();
    registry
        .register_loader("memory", move || {
            Box::new(CollectingLoader::new(loader_sink.clone()))
        })
        .unwrap();

    let err = PartitionTask::new(
        Arc::new(job_config(8, LoaderMode::Finite)),
        Arc::new(registry),
        partition(),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.kinds(), vec![ErrorKind::ExtractorFailed]);
    assert_eq!(err.cause().unwrap().kind(), ErrorKind::SourceError);
    // The loader was woken by the cancellation instead of waiting for end of data.
    assert!(!sink.end_of_data_seen().await);
}

#[tokio::test(flavor = "multi_thread")]
async fn context_and_connector_configs_reach_the_loader() {
    init_test_tracing();
    let registry = registry(records(7), || Box::new(CountingLoader));
    let mut config = job_config(4, LoaderMode::Continuous);
    config
        .context
        .insert("rows.expected".to_string(), "7".to_string());
    config.loader.job = serde_json::json!({"table": "users"});

    let report = PartitionTask::new(Arc::new(config), registry, partition())
        .run()
        .await
        .unwrap();

    assert_eq!(report.records_written, 7);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_connector_is_not_retried() {
    init_test_tracing();
    let registry = registry(records(1), || Box::new(CountingLoader));
    let mut config = job_config(4, LoaderMode::Finite);
    config.loader = ConnectorSelection::new("hdfs");

    let err = PartitionTask::new(Arc::new(config), registry, partition())
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConnectorNotFound);
    assert_eq!(
        build_error_handling_policy(&err).retry_directive(),
        RetryDirective::NoRetry
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn invalid_bridge_config_is_rejected_before_connectors_run() {
    init_test_tracing();
    let sink = InMemorySink::new();
    let loader_sink = sink.clone();
    let registry = registry(records(1), move || {
        Box::new(CollectingLoader::new(loader_sink.clone()))
    });

    let err = PartitionTask::new(
        Arc::new(job_config(0, LoaderMode::Finite)),
        registry,
        partition(),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);
    assert_eq!(sink.load_count().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn task_runs_the_job_loaded_from_configuration_files() {
    init_test_tracing();
    let directory = std::env::temp_dir().join(format!("transfer-job-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&directory).unwrap();
    std::fs::write(
        directory.join("base.yaml"),
        "id: 9\n\
         extractor:\n  connector_id: memory\n\
         loader:\n  connector_id: memory\n",
    )
    .unwrap();
    std::fs::write(
        directory.join("staging.yaml"),
        "bridge:\n  buffer_capacity: 2\n  loader_mode: continuous\n",
    )
    .unwrap();
    let sink = InMemorySink::new();
    let loader_sink = sink.clone();
    let registry = registry(records(5), move || {
        Box::new(CollectingLoader::new(loader_sink.clone()))
    });

    let task =
        PartitionTask::load_from(&directory, Environment::Staging, registry, partition()).unwrap();
    let report = task.run().await.unwrap();

    assert_eq!(
        report,
        TaskReport {
            rows_read: 5,
            records_written: 5
        }
    );
    assert!(sink.end_of_data_seen().await);

    std::fs::remove_dir_all(directory).unwrap();
}

#[test]
fn invalid_configuration_files_are_config_errors() {
    let directory = std::env::temp_dir().join(format!("transfer-job-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&directory).unwrap();
    std::fs::write(
        directory.join("base.yaml"),
        "id: 9\nextractor:\n  connector_id: memory\nloader:\n  connector_id: \"\"\n",
    )
    .unwrap();
    std::fs::write(directory.join("dev.yaml"), "{}\n").unwrap();
    let registry = registry(records(1), || Box::new(CountingLoader));

    let err = PartitionTask::load_from(&directory, Environment::Dev, registry, partition())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConfigError);

    std::fs::remove_dir_all(directory).unwrap();
}
