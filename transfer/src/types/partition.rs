use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TransferResult;

/// Descriptor of one unit of source data handed to one extractor run.
///
/// The engine treats the descriptor as opaque: connectors produce it from their own type with
/// [`Partition::new`] and read it back with [`Partition::descriptor`]. Partitions serialize to
/// bytes so they can be shipped to whichever worker runs the extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    index: u32,
    descriptor: serde_json::Value,
}

impl Partition {
    /// Creates partition `index` from a connector-defined descriptor.
    pub fn new<T>(index: u32, descriptor: &T) -> TransferResult<Self>
    where
        T: Serialize,
    {
        Ok(Self {
            index,
            descriptor: serde_json::to_value(descriptor)?,
        })
    }

    /// Returns the position of this partition within its job.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Decodes the connector-defined descriptor.
    pub fn descriptor<T>(&self) -> TransferResult<T>
    where
        T: DeserializeOwned,
    {
        Ok(T::deserialize(&self.descriptor)?)
    }

    /// Serializes the partition for shipping to a worker.
    pub fn to_bytes(&self) -> TransferResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Restores a partition produced by [`Partition::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> TransferResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "partition {} {}", self.index, self.descriptor)
    }
}
