mod base;
mod bridge;
mod job;

pub use base::*;
pub use bridge::*;
pub use job::*;
