//! Connectors and helpers for testing transfers without external systems.
//!
//! - [`memory`] - shared sink recording what loaders received
//! - [`loaders`] - loaders that collect, stall or fail on demand
//! - [`extractors`] - extractors replaying in-memory records
//! - [`failpoints`] - scoped failpoint configuration (feature `failpoints`)

pub mod extractors;
#[cfg(feature = "failpoints")]
pub mod failpoints;
pub mod loaders;
pub mod memory;

use crate::types::Record;

/// Returns a text record holding the fields `0` to `fields - 1`.
pub fn numbered_csv_record(fields: usize) -> Record {
    let text = (0..fields)
        .map(|field| field.to_string())
        .collect::<Vec<_>>()
        .join(",");

    Record::from_text(text)
}
