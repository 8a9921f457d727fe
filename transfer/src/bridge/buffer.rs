use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::bail;
use crate::bridge::LoaderState;
use crate::error::{ErrorKind, TransferError, TransferResult};
use crate::types::Record;

/// Entry stored in a [`HandoffBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Record(Record),
    /// Sentinel written once by the bridge after the last record.
    EndOfData,
}

#[derive(Debug)]
struct BufferState {
    slots: VecDeque<Slot>,
    capacity: usize,
    loader_state: LoaderState,
    failure: Option<TransferError>,
    end_of_data_pushed: bool,
    end_of_data_observed: bool,
    consumer_closed: bool,
    high_watermark: usize,
    records_pushed: u64,
    records_popped: u64,
}

impl BufferState {
    fn transition(&mut self, next: LoaderState) -> bool {
        if !self.loader_state.can_transition_to(next) {
            return false;
        }

        self.loader_state = next;
        true
    }
}

/// Bounded FIFO between the writer of an output bridge and its loader task.
///
/// The buffer also owns the [`LoaderState`] and the first failure recorded for the transfer, so
/// that a writer suspended on a full buffer and a reader suspended on an empty one both observe
/// the failure under the same lock that guards the slots.
///
/// One writer and one reader are expected at a time. Every wait registers interest with
/// [`Notify`] before checking the condition, so wakeups issued between the check and the wait
/// are never lost.
#[derive(Debug)]
pub struct HandoffBuffer {
    state: Mutex<BufferState>,
    not_full: Notify,
    not_empty: Notify,
}

impl HandoffBuffer {
    /// Creates an empty buffer holding at most `capacity` slots.
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);

        Self {
            state: Mutex::new(BufferState {
                slots: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
                loader_state: LoaderState::NotStarted,
                failure: None,
                end_of_data_pushed: false,
                end_of_data_observed: false,
                consumer_closed: false,
                high_watermark: 0,
                records_pushed: 0,
                records_popped: 0,
            }),
            not_full: Notify::new(),
            not_empty: Notify::new(),
        }
    }

    /// Inserts `slot`, suspending while the buffer is full.
    ///
    /// Returns the time spent suspended, if the call had to wait. Fails with the stored failure
    /// when the transfer failed before or while waiting, and with
    /// [`ErrorKind::ProtocolViolation`] when a record is pushed after the loader completed.
    /// Pushing end-of-data after the loader completed is accepted and ignored.
    pub(crate) async fn push(&self, slot: Slot) -> TransferResult<Option<Duration>> {
        let mut waiting_since: Option<Instant> = None;

        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();

                if let Some(failure) = &state.failure {
                    return Err(failure.clone());
                }

                let is_end_of_data = matches!(slot, Slot::EndOfData);
                if is_end_of_data && state.end_of_data_pushed {
                    bail!(
                        ErrorKind::InvalidState,
                        "End of data was already signalled"
                    );
                }

                if state.consumer_closed {
                    if is_end_of_data {
                        state.end_of_data_pushed = true;
                        return Ok(waiting_since.map(|since| since.elapsed()));
                    }

                    bail!(
                        ErrorKind::ProtocolViolation,
                        "Loader completed before consuming all records",
                        format!(
                            "the loader returned after reading {} of {} records",
                            state.records_popped,
                            state.records_pushed + 1
                        )
                    );
                }

                if state.slots.len() < state.capacity {
                    if is_end_of_data {
                        state.end_of_data_pushed = true;
                    } else {
                        state.records_pushed += 1;
                    }
                    state.slots.push_back(slot);
                    state.high_watermark = state.high_watermark.max(state.slots.len());
                    drop(state);

                    self.not_empty.notify_one();

                    return Ok(waiting_since.map(|since| since.elapsed()));
                }
            }

            waiting_since.get_or_insert_with(Instant::now);
            notified.await;
        }
    }

    /// Removes the oldest slot, suspending while the buffer is empty.
    ///
    /// Returns `Ok(None)` when the oldest slot is end-of-data. Fails with the stored failure
    /// once the transfer failed, and with [`ErrorKind::ProtocolViolation`] when called again
    /// after end-of-data was returned.
    pub(crate) async fn pop(&self) -> TransferResult<Option<Record>> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();

                if let Some(failure) = &state.failure {
                    return Err(failure.clone());
                }

                if state.end_of_data_observed {
                    bail!(
                        ErrorKind::ProtocolViolation,
                        "Read after end of data",
                        "the loader kept reading after it was told there are no more records"
                    );
                }

                match state.slots.pop_front() {
                    Some(Slot::Record(record)) => {
                        state.records_popped += 1;
                        drop(state);

                        self.not_full.notify_one();

                        return Ok(Some(record));
                    }
                    Some(Slot::EndOfData) => {
                        state.end_of_data_observed = true;

                        return Ok(None);
                    }
                    None => {}
                }
            }

            notified.await;
        }
    }

    /// Moves the loader from `NotStarted` to `Running`.
    ///
    /// Returns `false` when the loader was already started or the transfer already failed.
    pub(crate) fn start(&self) -> bool {
        self.lock().transition(LoaderState::Running)
    }

    /// Marks the loader as returned successfully and wakes a suspended writer.
    ///
    /// Returns `false` when the transfer already reached a terminal state.
    pub(crate) fn complete(&self) -> bool {
        let completed = {
            let mut state = self.lock();
            let completed = state.transition(LoaderState::Done);
            if completed {
                state.consumer_closed = true;
            }
            completed
        };

        if completed {
            self.not_full.notify_waiters();
        }

        completed
    }

    /// Records `error` as the transfer failure and wakes every suspended writer and reader.
    ///
    /// Only the first failure is kept. Returns `false` when the transfer already reached a
    /// terminal state, in which case `error` is discarded.
    pub(crate) fn poison(&self, error: TransferError) -> bool {
        let poisoned = {
            let mut state = self.lock();
            let poisoned = state.transition(LoaderState::Failed);
            if poisoned {
                state.failure = Some(error);
            }
            poisoned
        };

        if poisoned {
            self.not_full.notify_waiters();
            self.not_empty.notify_waiters();
        }

        poisoned
    }

    pub fn loader_state(&self) -> LoaderState {
        self.lock().loader_state
    }

    /// Returns the stored failure, if the transfer failed.
    pub fn failure(&self) -> Option<TransferError> {
        self.lock().failure.clone()
    }

    /// Returns the number of occupied slots, end-of-data included.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Returns the highest number of slots ever occupied at once.
    pub fn high_watermark(&self) -> usize {
        self.lock().high_watermark
    }

    /// Returns the number of records written but never read by the loader.
    pub fn unconsumed_records(&self) -> u64 {
        let state = self.lock();
        state.records_pushed - state.records_popped
    }

    /// Returns `true` once the reader was handed end-of-data.
    pub fn end_of_data_observed(&self) -> bool {
        self.lock().end_of_data_observed
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
