//! Configuration for bulk transfer jobs.
//!
//! Holds the typed settings consumed by the `transfer` crate (bridge buffering, loader mode,
//! connector selection) and the layered loader that reads them from files and environment
//! variables.

pub mod environment;
pub mod load;
pub mod shared;
