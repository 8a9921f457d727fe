//! Per-record read and write contracts shared by extractors, loaders and the bridge.

mod reader;
mod writer;

pub use reader::DataReader;
pub use writer::DataWriter;
