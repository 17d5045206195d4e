//! Observability: structured logging and spans.
//!
//! teeswap logs through `tracing`. Framework code logs with structured
//! fields (`element`, `pad`, `from`, `to`); streaming threads enter an
//! element span so their lines can be told apart.
//!
//! ## Example
//!
//! ```rust,ignore
//! use teeswap::observability::init_subscriber;
//!
//! // RUST_LOG=teeswap=debug teeswap test://
//! init_subscriber();
//! ```

mod tracing_support;

pub use tracing_support::{
    DEFAULT_FILTER, init_subscriber, instrument_element, span_element, span_session,
    trace_buffer_produced, trace_eos, trace_state_change,
};
