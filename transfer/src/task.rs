use std::path::Path;
use std::sync::Arc;

use metrics::counter;
use tracing::{Instrument, debug, info, warn};
use transfer_config::environment::Environment;
use transfer_config::load::{load_config, load_config_from};
use transfer_config::shared::TransferJobConfig;
use uuid::Uuid;

use crate::bridge::{CancellationHandle, OutputBridge};
use crate::connector::{ConnectorConfig, ConnectorRegistry, ExtractorContext, TaskContext};
use crate::error::{ErrorKind, TransferError, TransferResult};
use crate::metrics::{ERROR_KIND_LABEL, JOB_ID_LABEL, TRANSFER_PARTITION_FAILURES_TOTAL};
use crate::transfer_error;
use crate::types::Partition;

/// Outcome of a successful partition task attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskReport {
    /// Rows the extractor reported reading.
    pub rows_read: u64,
    /// Records the bridge accepted and the loader consumed.
    pub records_written: u64,
}

/// One attempt at moving one partition from the extractor to the loader.
///
/// The task builds fresh connectors from the registry, runs the extractor with an
/// [`OutputBridge`] as its writer and closes the bridge, so the loader task is always joined
/// before [`PartitionTask::run`] returns. Retrying a failed attempt is up to the caller, see
/// [`crate::policy::build_error_handling_policy`].
#[derive(Debug, Clone)]
pub struct PartitionTask {
    config: Arc<TransferJobConfig>,
    registry: Arc<ConnectorRegistry>,
    partition: Partition,
    attempt_id: Uuid,
}

impl PartitionTask {
    pub fn new(
        config: Arc<TransferJobConfig>,
        registry: Arc<ConnectorRegistry>,
        partition: Partition,
    ) -> Self {
        Self {
            config,
            registry,
            partition,
            attempt_id: Uuid::new_v4(),
        }
    }

    /// Creates a task for the job configured under `./configuration` for the environment named
    /// by `APP_ENVIRONMENT`.
    pub fn load(registry: Arc<ConnectorRegistry>, partition: Partition) -> TransferResult<Self> {
        let config: TransferJobConfig = load_config()?;

        Ok(Self::new(Arc::new(config), registry, partition))
    }

    /// Creates a task for the job configured in `directory` for `environment`.
    pub fn load_from(
        directory: &Path,
        environment: Environment,
        registry: Arc<ConnectorRegistry>,
        partition: Partition,
    ) -> TransferResult<Self> {
        let config: TransferJobConfig = load_config_from(directory, environment)?;
        debug!(job_id = config.id, directory = %directory.display(), "loaded job configuration");

        Ok(Self::new(Arc::new(config), registry, partition))
    }

    /// Returns the identifier of this attempt, used to correlate its logs.
    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// Runs the attempt to completion.
    ///
    /// A loader failure is returned as reported by the bridge. An extractor failure cancels the
    /// bridge and is returned as [`ErrorKind::ExtractorFailed`]; if the loader had already
    /// failed, both are returned together with the loader failure first.
    pub async fn run(self) -> TransferResult<TaskReport> {
        let partition_task_span = tracing::info_span!(
            "partition_task",
            job_id = self.config.id,
            partition = self.partition.index(),
            attempt_id = %self.attempt_id,
        );

        let result = self.run_attempt().instrument(partition_task_span).await;

        if let Err(err) = &result {
            counter!(
                TRANSFER_PARTITION_FAILURES_TOTAL,
                JOB_ID_LABEL => self.config.id.to_string(),
                ERROR_KIND_LABEL => format!("{:?}", err.kind())
            )
            .increment(1);
        }

        result
    }

    async fn run_attempt(&self) -> TransferResult<TaskReport> {
        self.config.validate()?;

        let mut extractor = self
            .registry
            .create_extractor(&self.config.extractor.connector_id)?;
        let loader = self
            .registry
            .create_loader(&self.config.loader.connector_id)?;

        let context = TaskContext::new(self.config.context.clone());
        let mut bridge = OutputBridge::new(
            self.config.id,
            &self.config.bridge,
            loader,
            context.clone(),
            ConnectorConfig::new(self.config.loader.connection.clone()),
            ConnectorConfig::new(self.config.loader.job.clone()),
        )?;
        let cancellation = bridge.cancellation_handle();

        info!(
            extractor = %self.config.extractor.connector_id,
            loader = %self.config.loader.connector_id,
            loader_mode = %bridge.mode(),
            "starting partition task"
        );

        let extractor_context = ExtractorContext::new(context);
        let extracted = extractor
            .run(
                &extractor_context,
                &ConnectorConfig::new(self.config.extractor.connection.clone()),
                &ConnectorConfig::new(self.config.extractor.job.clone()),
                &self.partition,
                &mut bridge,
            )
            .await;

        if let Err(err) = extracted {
            return Err(Self::fail_attempt(&mut bridge, &cancellation, err).await);
        }

        bridge.close().await?;

        let report = TaskReport {
            rows_read: extractor.rows_read(),
            records_written: bridge.records_written(),
        };
        info!(
            rows_read = report.rows_read,
            records_written = report.records_written,
            "partition task completed"
        );

        Ok(report)
    }

    /// Closes the bridge after the extractor returned `err` and picks the error to report.
    async fn fail_attempt(
        bridge: &mut OutputBridge,
        cancellation: &CancellationHandle,
        err: TransferError,
    ) -> TransferError {
        if is_bridge_failure(&err) {
            // The bridge already holds this failure; closing only joins the loader.
            if let Err(close_err) = bridge.close().await {
                debug!(error_kind = ?close_err.kind(), "bridge closed after loader failure");
            }
            return err;
        }

        warn!(error = %err, "extractor failed, cancelling loader");

        let extractor_failure = transfer_error!(
            ErrorKind::ExtractorFailed,
            "Extractor failed while reading its partition",
            source: err
        );

        cancellation.cancel();
        match bridge.close().await {
            Err(loader_failure) if loader_failure.kind() != ErrorKind::Cancelled => {
                vec![loader_failure, extractor_failure].into()
            }
            _ => extractor_failure,
        }
    }
}

/// Returns `true` for errors the bridge raised into the extractor's writes.
fn is_bridge_failure(err: &TransferError) -> bool {
    matches!(
        err.kind(),
        ErrorKind::LoaderFailed
            | ErrorKind::LoaderPanic
            | ErrorKind::Cancelled
            | ErrorKind::ProtocolViolation
    )
}
