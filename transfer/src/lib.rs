//! Connector contracts and the output bridge of a bulk transfer engine.
//!
//! An [`connector::Extractor`] writes the records of one [`types::Partition`] into an
//! [`bridge::OutputBridge`], which hands them to a [`connector::Loader`] running as its own task.
//! [`task::PartitionTask`] wires both for a single attempt.

pub mod bridge;
pub mod connector;
pub mod error;
pub mod failpoints;
pub mod format;
pub mod io;
mod macros;
pub mod metrics;
pub mod policy;
pub mod task;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
