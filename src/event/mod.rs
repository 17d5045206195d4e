//! In-band events travelling alongside buffers.
//!
//! Events are serialized with data: a queue keeps them in order with the
//! buffers around them, and a fan-out forwards them to every output pad.

use std::fmt;

/// An in-band stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// First event of a stream.
    StreamStart {
        /// Identifier of the stream.
        stream_id: String,
    },
    /// No more data will follow.
    Eos,
}

impl Event {
    /// Create a stream-start event.
    pub fn stream_start(stream_id: impl Into<String>) -> Self {
        Event::StreamStart {
            stream_id: stream_id.into(),
        }
    }

    /// Whether this is an end-of-stream event.
    pub fn is_eos(&self) -> bool {
        matches!(self, Event::Eos)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::StreamStart { stream_id } => write!(f, "stream-start ({})", stream_id),
            Event::Eos => write!(f, "eos"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        assert_eq!(Event::Eos.to_string(), "eos");
        assert_eq!(
            Event::stream_start("decoder/video").to_string(),
            "stream-start (decoder/video)"
        );
        assert!(Event::Eos.is_eos());
        assert!(!Event::stream_start("x").is_eos());
    }
}
