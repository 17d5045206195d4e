//! Flow control and routing elements.
//!
//! ## Buffering
//! - [`Queue`]: Thread boundary with backpressure
//!
//! ## Routing
//! - [`Tee`]: 1-to-N fanout (duplicates buffers)

mod queue;
mod tee;

pub use queue::{DEFAULT_MAX_SIZE_BUFFERS, Queue, QueueStats};
pub use tee::Tee;
