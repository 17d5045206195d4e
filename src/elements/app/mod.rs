//! Application-facing output elements.
//!
//! - [`AutoVideoSink`]: Default video output

mod autovideosink;

pub use autovideosink::AutoVideoSink;
