//! Media buffers flowing between pads.

use bytes::Bytes;
use std::time::Duration;

/// A chunk of media data with timing information.
///
/// Cloning is cheap: the payload is reference counted, which is how the
/// fan-out duplicates one input buffer onto every output pad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    data: Bytes,
    pts: Duration,
    duration: Duration,
    sequence: u64,
}

impl Buffer {
    /// Create a buffer with zero timestamps.
    pub fn new(data: impl Into<Bytes>, sequence: u64) -> Self {
        Self {
            data: data.into(),
            pts: Duration::ZERO,
            duration: Duration::ZERO,
            sequence,
        }
    }

    /// Set presentation timestamp and duration.
    pub fn with_timing(mut self, pts: Duration, duration: Duration) -> Self {
        self.pts = pts;
        self.duration = duration;
        self
    }

    /// Payload bytes.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Presentation timestamp, relative to the start of the stream.
    pub fn pts(&self) -> Duration {
        self.pts
    }

    /// Duration of the frame.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Sequence number assigned by the producer.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_clone_shares_payload() {
        let buffer = Buffer::new(vec![7u8; 64], 3);
        let copy = buffer.clone();

        assert_eq!(copy.len(), 64);
        assert_eq!(copy.sequence(), 3);
        assert_eq!(buffer.data().as_ptr(), copy.data().as_ptr());
    }

    #[test]
    fn test_buffer_timing() {
        let buffer = Buffer::new(Bytes::from_static(b"frame"), 0)
            .with_timing(Duration::from_millis(40), Duration::from_millis(20));

        assert_eq!(buffer.pts(), Duration::from_millis(40));
        assert_eq!(buffer.duration(), Duration::from_millis(20));
        assert!(!buffer.is_empty());
    }
}
