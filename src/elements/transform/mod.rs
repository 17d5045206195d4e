//! Transform elements.
//!
//! - [`VideoConvert`]: Video format conversion

mod videoconvert;

pub use videoconvert::VideoConvert;
