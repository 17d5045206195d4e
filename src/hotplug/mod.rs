//! Dynamic tee hot-plugging.
//!
//! A [`FanOutHost`] wraps a tee with a permanent keep-alive consumer and is
//! installed as the decoder's video sink. The [`Mutator`] runs on a timer and
//! alternately attaches a [`Branch`] (queue, converter, video sink) to a
//! fresh tee request pad and removes the oldest one again. Removal goes
//! through an idle probe on the branch's tee pad, so the branch is cut loose
//! between two buffers while the other outputs keep streaming.
//!
//! [`Session`] ties it together: it builds the graph, plays it, drives the
//! mutator and stops on end-of-stream or the first error.
//!
//! ## Example
//!
//! ```rust,ignore
//! use teeswap::config::SessionConfig;
//! use teeswap::hotplug::Session;
//!
//! let session = Session::new(SessionConfig::new("test://?duration=10"))?;
//! let termination = session.run().await;
//! ```

mod branch;
mod host;
mod mutator;
mod progress;
mod session;
mod unlink;

pub use branch::{Branch, BranchElements};
pub use host::{FanOutHost, HOST_BIN_NAME};
pub use mutator::Mutator;
pub use progress::{Observer, Progress, RecordingObserver, StdoutObserver};
pub use session::{Session, Termination};
pub use unlink::handle_idle;
