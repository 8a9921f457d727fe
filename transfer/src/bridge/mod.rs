//! Output bridge between the host engine's writer and a loader task.
//!
//! The host writes records one at a time into an [`OutputBridge`]. Records cross a bounded
//! [`HandoffBuffer`] to a loader running as its own task, which reads them through a
//! [`BridgeReader`]. The buffer carries the loader's [`LoaderState`] and the first failure of
//! the transfer, so failures raised on either side reach the other one without polling.

mod buffer;
mod cancel;
mod output;
mod reader;
mod state;

pub use buffer::{HandoffBuffer, Slot};
pub use cancel::CancellationHandle;
pub use output::OutputBridge;
pub use reader::BridgeReader;
pub use state::LoaderState;
