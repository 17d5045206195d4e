//! # teeswap
//!
//! Hot-plugging of consumer branches on a live fan-out.
//!
//! teeswap plays a source into a tee and, on a timer, attaches and detaches
//! whole branches of downstream consumers while data keeps flowing through
//! the other outputs. Removal waits for the branch's tee pad to go idle, so
//! no buffer is ever pushed into half-dismantled elements.
//!
//! The crate ships its own compact, in-process media framework: elements
//! with pads and state transitions, bins and a pipeline with a message bus,
//! and the handful of elements the controller needs (`playbin`, `tee`,
//! `queue`, `videoconvert`, `fakesink`, `autovideosink`).
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use teeswap::prelude::*;
//!
//! let config = SessionConfig::new("test://?duration=10").interval(Duration::from_secs(2));
//! let session = Session::new(config)?;
//! match session.run().await {
//!     Termination::Eos => println!("done"),
//!     other => eprintln!("{other:?}"),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod config;
pub mod element;
pub mod elements;
pub mod error;
pub mod event;
pub mod hotplug;
pub mod observability;
pub mod pipeline;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::buffer::Buffer;
    pub use crate::config::SessionConfig;
    pub use crate::element::{Element, Pad, ProbeReturn, ProbeType, State};
    pub use crate::error::{Error, Result};
    pub use crate::hotplug::{FanOutHost, Observer, Progress, Session, Termination};
    pub use crate::pipeline::{ElementFactory, Message, Pipeline};
    pub use std::time::Duration;
}

pub use error::{Error, Result};
