//! Built-in pipeline elements.
//!
//! These are the elements registered in [`ElementFactory::new`](crate::pipeline::ElementFactory::new):
//!
//! ## Sources
//! - [`PlayBin`]: Plays a URI into a video sink (`playbin`)
//!
//! ## Sinks
//! - [`AutoVideoSink`]: Default video output, synchronised (`autovideosink`)
//! - [`FakeSink`]: Discards all buffers (`fakesink`)
//!
//! ## Transforms
//! - [`VideoConvert`]: Video format conversion (`videoconvert`)
//! - [`Queue`]: Thread boundary with backpressure (`queue`)
//!
//! ## Routing
//! - [`Tee`]: Duplicates buffers to request pads (`tee`)

pub mod app;
pub mod flow;
mod null;
pub mod playback;
pub(crate) mod sink;
pub mod transform;

// Sources
pub use playback::PlayBin;

// Sinks
pub use app::AutoVideoSink;
pub use null::FakeSink;

// Transforms
pub use flow::{Queue, QueueStats};
pub use transform::VideoConvert;

// Routing
pub use flow::Tee;
