//! Video format conversion element.
//!
//! Frames travel through the graph in a single raw format, so the converter
//! forwards every buffer untouched. It still sits between queue and sink in
//! each video branch so the branch has the same shape as one that would need
//! conversion.

use crate::buffer::Buffer;
use crate::element::{Element, ElementImpl, Pad, PadTemplate, PropertyValue};
use crate::error::{FlowError, FlowResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// Video format conversion element.
///
/// Read-only properties `num-buffers` and `num-bytes` count what went
/// through.
///
/// # Example
///
/// ```rust,ignore
/// use teeswap::pipeline::ElementFactory;
///
/// let factory = ElementFactory::new();
/// let conv = factory.make("videoconvert", Some("vsbconv0"))?;
/// let sink = factory.make("autovideosink", Some("vsbsink0"))?;
/// bin.add_many(&[&conv, &sink])?;
/// conv.link(&sink)?;
/// ```
pub struct VideoConvert {
    /// Frames passed downstream.
    frames: AtomicU64,
    /// Bytes passed downstream.
    bytes: AtomicU64,
}

impl VideoConvert {
    /// Create a new video convert element.
    pub fn new() -> Self {
        Self {
            frames: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }
}

impl Default for VideoConvert {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementImpl for VideoConvert {
    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![PadTemplate::input("sink"), PadTemplate::output("src")]
    }

    fn chain(&self, element: &Element, _pad: &Pad, buffer: Buffer) -> FlowResult {
        let src = element.static_pad("src").ok_or(FlowError::Error)?;
        let len = buffer.len() as u64;
        src.push(buffer)?;
        self.frames.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len, Ordering::Relaxed);
        Ok(())
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "num-buffers" => Some(self.frames.load(Ordering::Relaxed).into()),
            "num-bytes" => Some(self.bytes.load(Ordering::Relaxed).into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::Buffer;
    use crate::element::{Pad, PadDirection, State};
    use crate::error::FlowError;
    use crate::pipeline::{ElementFactory, Pipeline};

    #[test]
    fn test_passes_buffers_through() {
        let factory = ElementFactory::new();
        let pipeline = Pipeline::new(None);
        let conv = factory.make("videoconvert", None).unwrap();
        let sink = factory.make("fakesink", None).unwrap();
        pipeline.add_many(&[&conv, &sink]).unwrap();
        conv.link(&sink).unwrap();

        let upstream = Pad::new("src", PadDirection::Output);
        upstream.link(&conv.static_pad("sink").unwrap()).unwrap();
        upstream.set_active(true);
        pipeline.set_state(State::Playing).unwrap();

        upstream.push(Buffer::new(vec![0u8; 100], 0)).unwrap();
        upstream.push(Buffer::new(vec![0u8; 50], 1)).unwrap();

        assert_eq!(conv.property("num-buffers").unwrap().as_u64(), Some(2));
        assert_eq!(conv.property("num-bytes").unwrap().as_u64(), Some(150));
        assert_eq!(sink.property("num-rendered").unwrap().as_u64(), Some(2));

        pipeline.set_state(State::Null).unwrap();
    }

    #[test]
    fn test_unlinked_output() {
        let conv = ElementFactory::new().make("videoconvert", None).unwrap();
        let upstream = Pad::new("src", PadDirection::Output);
        upstream.link(&conv.static_pad("sink").unwrap()).unwrap();
        upstream.set_active(true);
        conv.set_state(State::Playing).unwrap();

        assert_eq!(upstream.push(Buffer::new(vec![0u8; 8], 0)), Err(FlowError::NotLinked));
        conv.set_state(State::Null).unwrap();
    }
}
