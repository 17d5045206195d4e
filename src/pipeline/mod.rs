//! Pipeline construction and supervision.
//!
//! This module provides the top-level infrastructure around elements:
//!
//! - [`Pipeline`]: the top-level bin, owner of the bus
//! - [`Bus`]/[`BusReceiver`]/[`Message`]: asynchronous messages from the graph
//! - [`ElementFactory`]: builds elements by factory name
//! - [`dot`]: Graphviz snapshots of a running graph
//!
//! # Example
//!
//! ```rust,ignore
//! use teeswap::element::State;
//! use teeswap::pipeline::{ElementFactory, Message, Pipeline};
//!
//! let factory = ElementFactory::new();
//! let pipeline = Pipeline::new(None);
//! let playbin = factory.make("playbin", None)?;
//! playbin.set_property("uri", "test://?duration=1")?;
//! pipeline.add(&playbin)?;
//!
//! let mut bus = pipeline.subscribe();
//! pipeline.set_state(State::Playing)?;
//! bus.wait_eos().await.ok();
//! pipeline.set_state(State::Null)?;
//! ```

mod bus;
pub mod dot;
pub mod factory;
mod graph;

pub use bus::{Bus, BusReceiver, Message};
pub use dot::{debug_bin_to_dot_data, debug_bin_to_dot_file};
pub use factory::ElementFactory;
pub use graph::Pipeline;
