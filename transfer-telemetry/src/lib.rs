//! Logging setup shared by transfer workers and their tests.

pub mod tracing;
