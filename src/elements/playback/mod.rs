//! Playback elements.
//!
//! - [`PlayBin`]: URI player feeding a video sink
//! - [`SourceLocation`]/[`MediaSource`]: the media behind a locator

mod playbin;
mod source;

pub use playbin::PlayBin;
pub use source::{
    DEFAULT_DURATION_SECS, DEFAULT_FPS, DEFAULT_FRAME_SIZE, MediaSource, SourceError,
    SourceLocation,
};
