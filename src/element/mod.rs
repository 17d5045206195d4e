//! Element system.
//!
//! This module defines the building blocks of a media graph:
//!
//! - [`Element`]: a reference-counted node handle. Containers (bins) are
//!   elements with children.
//! - [`ElementImpl`]: the behaviour behind a handle (what happens to buffers,
//!   events, state changes and properties).
//! - [`Pad`]: a directional connection point. Output pads push into the input
//!   pad they are linked to.
//! - [`State`]/[`StateChange`]: the `Null -> Ready -> Paused -> Playing`
//!   lifecycle.
//! - Idle probes ([`ProbeType::Idle`]) that run while a pad carries no data.
//!
//! # Threading
//!
//! Control calls (state changes, linking, adding children) come from the
//! application thread; buffers travel on streaming threads owned by sources
//! and queues. Every push through a pad holds that pad's stream lock, so an
//! idle probe on one output pad of a tee blocks that branch only.
//!
//! # Example
//!
//! ```rust,ignore
//! use teeswap::element::State;
//! use teeswap::pipeline::{ElementFactory, Pipeline};
//!
//! let factory = ElementFactory::new();
//! let pipeline = Pipeline::new(None);
//! let tee = factory.make("tee", None)?;
//! pipeline.add(&tee)?;
//! let pad = tee.request_pad_simple("src_%u").unwrap();
//! pipeline.set_state(State::Playing)?;
//! tee.release_request_pad(&pad);
//! ```

mod object;
mod pad;
mod probe;
mod state;
mod traits;

pub use object::{Element, WeakElement};
pub use pad::{Pad, PadDirection, PadPresence, PadTemplate};
pub use probe::{ProbeId, ProbeInfo, ProbeReturn, ProbeType};
pub use state::{State, StateChange};
pub use traits::{BinImpl, ElementImpl, PropertyValue};
