use std::sync::{Arc, OnceLock};

use tokio::task::AbortHandle;
use tracing::info;

use crate::bridge::HandoffBuffer;
use crate::error::ErrorKind;
use crate::transfer_error;

/// Cloneable handle that cancels an [`crate::bridge::OutputBridge`] from any task.
///
/// Cancelling fails the transfer with [`ErrorKind::Cancelled`], wakes a writer suspended on a
/// full buffer and a loader suspended on an empty one, and aborts the loader task if it is
/// running. Cancelling a bridge that already reached a terminal state has no effect.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    buffer: Arc<HandoffBuffer>,
    loader_abort: Arc<OnceLock<AbortHandle>>,
}

impl CancellationHandle {
    pub(crate) fn new(
        buffer: Arc<HandoffBuffer>,
        loader_abort: Arc<OnceLock<AbortHandle>>,
    ) -> Self {
        Self {
            buffer,
            loader_abort,
        }
    }

    /// Cancels the transfer.
    ///
    /// Returns `false` when the transfer had already finished or failed.
    pub fn cancel(&self) -> bool {
        let cancelled = self
            .buffer
            .poison(transfer_error!(ErrorKind::Cancelled, "Transfer was cancelled"));

        if cancelled {
            info!("transfer cancelled");
            if let Some(abort) = self.loader_abort.get() {
                abort.abort();
            }
        }

        cancelled
    }

    /// Returns `true` when the transfer failed because it was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.buffer
            .failure()
            .is_some_and(|failure| failure.kind() == ErrorKind::Cancelled)
    }
}
