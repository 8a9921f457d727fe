//! Values exchanged between connectors and the output bridge.

mod partition;
mod record;
mod sized;
mod value;

pub use partition::*;
pub use record::*;
pub use sized::*;
pub use value::*;
