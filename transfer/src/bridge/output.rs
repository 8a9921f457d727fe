use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use metrics::{counter, histogram};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{Instrument, debug, error, info, warn};
use transfer_config::shared::{BridgeConfig, LoaderMode};

use crate::bail;
use crate::bridge::{BridgeReader, CancellationHandle, HandoffBuffer, LoaderState, Slot};
use crate::connector::{ConnectorConfig, Loader, LoaderContext, TaskContext};
use crate::error::{ErrorKind, TransferError, TransferResult};
use crate::failpoints::{BRIDGE_LOADER_BEFORE_LOAD, transfer_fail_point};
use crate::io::DataWriter;
use crate::metrics::{
    ERROR_KIND_LABEL, JOB_ID_LABEL, LOADER_MODE_LABEL, TRANSFER_LOADER_DURATION_SECONDS,
    TRANSFER_LOADER_FAILURES_TOTAL, TRANSFER_RECORDS_WRITTEN_TOTAL,
    TRANSFER_WRITE_BLOCKED_SECONDS,
};
use crate::transfer_error;
use crate::types::Record;

/// Everything the loader task needs, held until the loader is spawned.
struct PendingLoader {
    loader: Box<dyn Loader>,
    context: LoaderContext,
    connection_config: ConnectorConfig,
    job_config: ConnectorConfig,
}

/// Adapts per-record writes from the host engine to a loader running as its own task.
///
/// The loader is spawned on the first [`OutputBridge::write`], or by [`OutputBridge::close`]
/// when nothing was written, and is fed through a bounded [`HandoffBuffer`]. Writes suspend
/// while the buffer is full. Once the loader fails, the next write or close reports the failure
/// wrapped as [`ErrorKind::LoaderFailed`], with the loader's own error as its source.
///
/// Records reach the loader in write order, followed by a single end-of-data signal written by
/// `close`. `close` joins the loader task before returning, so a successful close means the
/// loader returned.
///
/// Dropping a bridge whose loader task is still running, including while a [`OutputBridge::close`]
/// is in flight, aborts the loader task.
pub struct OutputBridge {
    job_id: u64,
    mode: LoaderMode,
    buffer: Arc<HandoffBuffer>,
    loader_abort: Arc<OnceLock<AbortHandle>>,
    pending: Option<PendingLoader>,
    handle: Option<JoinHandle<()>>,
    closed: bool,
    records_written: u64,
}

impl OutputBridge {
    /// Creates a bridge feeding `loader`.
    ///
    /// Fails with [`ErrorKind::ConfigError`] when `config` is invalid.
    pub fn new(
        job_id: u64,
        config: &BridgeConfig,
        loader: Box<dyn Loader>,
        context: TaskContext,
        connection_config: ConnectorConfig,
        job_config: ConnectorConfig,
    ) -> TransferResult<Self> {
        config.validate()?;

        Ok(Self {
            job_id,
            mode: config.loader_mode,
            buffer: Arc::new(HandoffBuffer::new(config.buffer_capacity)),
            loader_abort: Arc::new(OnceLock::new()),
            pending: Some(PendingLoader {
                loader,
                context: LoaderContext::new(context, config.loader_mode),
                connection_config,
                job_config,
            }),
            handle: None,
            closed: false,
            records_written: 0,
        })
    }

    /// Hands `record` to the loader, suspending while the buffer is full.
    ///
    /// Fails with the stored failure once the loader failed or the bridge was cancelled, and
    /// with [`ErrorKind::ProtocolViolation`] after [`OutputBridge::close`].
    pub async fn write(&mut self, record: Record) -> TransferResult<()> {
        if self.closed {
            bail!(
                ErrorKind::ProtocolViolation,
                "Write after the bridge was closed"
            );
        }

        if let Some(failure) = self.buffer.failure() {
            return Err(failure);
        }

        self.ensure_loader_started();

        let waited = self.buffer.push(Slot::Record(record)).await?;
        if let Some(waited) = waited {
            histogram!(TRANSFER_WRITE_BLOCKED_SECONDS, JOB_ID_LABEL => self.job_id.to_string())
                .record(waited.as_secs_f64());
        }

        self.records_written += 1;
        counter!(TRANSFER_RECORDS_WRITTEN_TOTAL, JOB_ID_LABEL => self.job_id.to_string())
            .increment(1);

        Ok(())
    }

    /// Signals end-of-data, waits for the loader to return and reports how it ended.
    ///
    /// The loader is started first if nothing was written, so it runs exactly once per bridge.
    /// Fails with the stored failure when the loader failed or the bridge was cancelled, and
    /// with [`ErrorKind::ProtocolViolation`] when the loader returned without reading every
    /// written record, or, in continuous mode, without reading end-of-data.
    ///
    /// Calling `close` again after it returned is a no-op.
    pub async fn close(&mut self) -> TransferResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.ensure_loader_started();

        // A failed push means the transfer already failed, which is reported below.
        if let Err(err) = self.buffer.push(Slot::EndOfData).await {
            debug!(error_kind = ?err.kind(), "end of data not delivered");
        }

        // The handle stays in place while joining, so dropping this future leaves it to `Drop`.
        if let Some(handle) = self.handle.as_mut() {
            join_loader(&self.buffer, self.job_id, handle).await;
            self.handle = None;
        }

        match self.buffer.loader_state() {
            LoaderState::Done => self.check_completion(),
            LoaderState::Failed => match self.buffer.failure() {
                Some(failure) => Err(failure),
                None => bail!(
                    ErrorKind::InvalidState,
                    "Loader failed without a recorded failure"
                ),
            },
            state => bail!(
                ErrorKind::InvalidState,
                "Loader is not terminal after it was joined",
                format!("loader state is `{state}`")
            ),
        }
    }

    /// Returns the current [`LoaderState`].
    pub fn state(&self) -> LoaderState {
        self.buffer.loader_state()
    }

    /// Returns the [`LoaderMode`] the loader was started with.
    pub fn mode(&self) -> LoaderMode {
        self.mode
    }

    /// Returns the number of records accepted by [`OutputBridge::write`].
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Returns a handle that cancels this bridge from another task.
    pub fn cancellation_handle(&self) -> CancellationHandle {
        CancellationHandle::new(self.buffer.clone(), self.loader_abort.clone())
    }

    /// Returns the buffer shared with the loader task, for inspecting its occupancy and state.
    pub fn buffer(&self) -> &HandoffBuffer {
        &self.buffer
    }

    fn check_completion(&self) -> TransferResult<()> {
        let unconsumed = self.buffer.unconsumed_records();
        if unconsumed > 0 {
            bail!(
                ErrorKind::ProtocolViolation,
                "Loader completed before consuming all records",
                format!(
                    "{unconsumed} of {} records were never read",
                    self.records_written
                )
            );
        }

        if self.mode == LoaderMode::Continuous && !self.buffer.end_of_data_observed() {
            bail!(
                ErrorKind::ProtocolViolation,
                "Continuous loader returned before end of data",
                "a continuous loader must keep reading until it is told there are no more records"
            );
        }

        info!(
            job_id = self.job_id,
            records = self.records_written,
            loader_mode = %self.mode,
            "loader completed"
        );

        Ok(())
    }

    fn ensure_loader_started(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };

        if !self.buffer.start() {
            debug!(job_id = self.job_id, "loader not started, transfer already failed");
            return;
        }

        let loader_span = tracing::info_span!(
            "loader",
            job_id = self.job_id,
            loader_mode = %self.mode,
        );
        let loader_task =
            run_loader(pending, self.buffer.clone(), self.job_id).instrument(loader_span);

        let handle = tokio::spawn(loader_task);
        // Only the first spawn stores its handle and a bridge spawns at most once.
        let _ = self.loader_abort.set(handle.abort_handle());
        self.handle = Some(handle);
    }
}

#[async_trait]
impl DataWriter for OutputBridge {
    async fn write_record(&mut self, record: Record) -> TransferResult<()> {
        self.write(record).await
    }
}

impl Drop for OutputBridge {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };

        if !handle.is_finished() {
            warn!(
                job_id = self.job_id,
                "output bridge dropped before its loader was joined, aborting loader"
            );
            self.buffer.poison(transfer_error!(
                ErrorKind::Cancelled,
                "Output bridge dropped before its loader was joined"
            ));
            handle.abort();
        }
    }
}

/// Body of the loader task.
///
/// Converts the loader's outcome into a terminal [`LoaderState`] so that writers suspended on
/// the buffer are woken even before the task is joined.
async fn run_loader(pending: PendingLoader, buffer: Arc<HandoffBuffer>, job_id: u64) {
    let PendingLoader {
        mut loader,
        context,
        connection_config,
        job_config,
    } = pending;
    let mode = context.mode();
    let mut reader = BridgeReader::new(buffer.clone(), job_id);
    let started_at = Instant::now();

    info!("starting loader");

    let result = AssertUnwindSafe(async {
        transfer_fail_point(BRIDGE_LOADER_BEFORE_LOAD)?;

        loader
            .load(&context, &connection_config, &job_config, &mut reader)
            .await?;

        Ok::<_, TransferError>(())
    })
    .catch_unwind()
    .await;

    histogram!(
        TRANSFER_LOADER_DURATION_SECONDS,
        JOB_ID_LABEL => job_id.to_string(),
        LOADER_MODE_LABEL => mode.as_str()
    )
    .record(started_at.elapsed().as_secs_f64());

    let failure = match result {
        Ok(Ok(())) => {
            if buffer.complete() {
                debug!(records_read = reader.records_read(), "loader returned");
            }
            return;
        }
        Ok(Err(err)) => wrap_loader_error(err),
        Err(payload) => transfer_error!(
            ErrorKind::LoaderPanic,
            "Loader task panicked",
            panic_message(payload.as_ref())
        ),
    };

    if buffer.poison(failure.clone()) {
        counter!(
            TRANSFER_LOADER_FAILURES_TOTAL,
            JOB_ID_LABEL => job_id.to_string(),
            ERROR_KIND_LABEL => format!("{:?}", failure.kind())
        )
        .increment(1);
        error!(
            records_read = reader.records_read(),
            error = %failure,
            "loader failed"
        );
    }
}

/// Waits for the loader task and records an abort or an uncaught panic as the failure.
async fn join_loader(buffer: &HandoffBuffer, job_id: u64, handle: &mut JoinHandle<()>) {
    let Err(err) = handle.await else {
        return;
    };

    let failure = if err.is_cancelled() {
        transfer_error!(ErrorKind::Cancelled, "Loader task was cancelled", source: err)
    } else {
        transfer_error!(ErrorKind::LoaderPanic, "Loader task panicked", source: err)
    };

    if buffer.poison(failure) {
        error!(job_id, "loader task ended abnormally");
    }
}

/// Wraps a loader error so the caller sees [`ErrorKind::LoaderFailed`] with the original error
/// as its source.
fn wrap_loader_error(err: TransferError) -> TransferError {
    let detail = match err.description() {
        Some(description) => format!("the loader returned `{description}`"),
        None => "the loader returned multiple errors".to_string(),
    };

    transfer_error!(
        ErrorKind::LoaderFailed,
        "Loader failed while consuming records",
        detail = detail,
        source: err
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }

    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }

    "loader panicked with a non-string payload".to_string()
}
