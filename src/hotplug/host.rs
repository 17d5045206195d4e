//! The fan-out host: a bin around a tee that always has one consumer.

use crate::element::{Element, Pad};
use crate::error::{Error, Result};
use crate::pipeline::ElementFactory;
use std::sync::Mutex;

/// Name of the host bin.
pub const HOST_BIN_NAME: &str = "videosinkbin";

/// Container holding the fan-out and its branches.
///
/// The bin exposes a single input, a ghost pad named `sink` that forwards to
/// the tee. A keep-alive branch (queue and a synchronised `fakesink`) is
/// linked to the tee from the start, so the tee always has at least one
/// consumer however many hot-plugged branches come and go.
///
/// The host also owns the element factory used to build branches.
pub struct FanOutHost {
    factory: ElementFactory,
    bin: Element,
    tee: Element,
    keepalive_queue: Element,
    keepalive_sink: Element,
    keepalive_pad: Mutex<Option<Pad>>,
    entry: Pad,
}

impl FanOutHost {
    /// Build the host bin. The result is meant to be installed as the
    /// decoder's `video-sink` before the graph starts.
    pub fn new(factory: ElementFactory) -> Result<Self> {
        let bin = factory.make("bin", Some(HOST_BIN_NAME))?;
        let tee = factory.make("tee", None)?;
        let queue = factory.make("queue", None)?;
        let sink = factory.make("fakesink", None)?;
        sink.set_property("sync", true)?;

        bin.add_many(&[&tee, &queue, &sink])?;
        queue.link(&sink)?;

        let tee_src = tee
            .request_pad_simple("src_%u")
            .ok_or_else(|| Error::Construction(format!("{} refused an output pad", tee.name())))?;
        let queue_sink = queue.static_pad("sink").ok_or_else(|| Error::NoSuchPad {
            element: queue.name().to_string(),
            pad: "sink".to_string(),
        })?;
        tee_src.link(&queue_sink).map_err(|reason| Error::Link {
            src: tee_src.path(),
            sink: queue_sink.path(),
            reason,
        })?;

        let tee_sink = tee.static_pad("sink").ok_or_else(|| Error::NoSuchPad {
            element: tee.name().to_string(),
            pad: "sink".to_string(),
        })?;
        let entry = Pad::new_ghost("sink", &tee_sink);
        entry.set_active(true);
        bin.add_pad(&entry)?;

        tracing::debug!(bin = %bin.name(), tee = %tee.name(), "fan-out host built");

        Ok(Self {
            factory,
            bin,
            tee,
            keepalive_queue: queue,
            keepalive_sink: sink,
            keepalive_pad: Mutex::new(Some(tee_src)),
            entry,
        })
    }

    /// The host bin.
    pub fn bin(&self) -> &Element {
        &self.bin
    }

    /// The fan-out element.
    pub fn tee(&self) -> &Element {
        &self.tee
    }

    /// The bin's input pad.
    pub fn entry_pad(&self) -> &Pad {
        &self.entry
    }

    /// Factory used to build branches.
    pub fn factory(&self) -> &ElementFactory {
        &self.factory
    }

    /// The keep-alive consumer.
    pub fn keepalive_sink(&self) -> &Element {
        &self.keepalive_sink
    }

    /// Number of tee outputs currently linked to a consumer.
    pub fn linked_output_count(&self) -> usize {
        self.tee
            .src_pads()
            .iter()
            .filter(|pad| pad.is_linked())
            .count()
    }

    /// Unlink and release the keep-alive request pad.
    ///
    /// Called once at shutdown, after the graph went back to `Null`. Later
    /// calls do nothing.
    pub fn release_keepalive(&self) {
        let Some(pad) = self.keepalive_pad.lock().unwrap().take() else {
            return;
        };
        if let Some(queue_sink) = self.keepalive_queue.static_pad("sink") {
            pad.unlink(&queue_sink);
        }
        self.tee.release_request_pad(&pad);
        tracing::debug!(pad = %pad.name(), "keep-alive pad released");
    }
}

impl std::fmt::Debug for FanOutHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutHost")
            .field("bin", &self.bin.name())
            .field("tee", &self.tee.name())
            .field("linked_outputs", &self.linked_output_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::PadPresence;

    #[test]
    fn test_host_layout() {
        let host = FanOutHost::new(ElementFactory::new()).unwrap();

        assert_eq!(host.bin().name(), HOST_BIN_NAME);
        assert_eq!(host.bin().children().len(), 3);
        assert_eq!(host.linked_output_count(), 1);
        assert_eq!(host.keepalive_sink().property("sync").unwrap().as_bool(), Some(true));

        let entry = host.bin().static_pad("sink").unwrap();
        assert_eq!(&entry, host.entry_pad());
        assert!(entry.is_active());
        assert_eq!(
            entry.ghost_target(),
            host.tee().static_pad("sink").as_ref()
        );
    }

    #[test]
    fn test_release_keepalive_once() {
        let host = FanOutHost::new(ElementFactory::new()).unwrap();
        let pad = host.tee().src_pads().pop().unwrap();
        assert_eq!(pad.presence(), PadPresence::Request);

        host.release_keepalive();
        assert_eq!(host.linked_output_count(), 0);
        assert!(host.tee().src_pads().is_empty());
        assert!(pad.parent().is_none());

        host.release_keepalive();
        assert_eq!(host.tee().property("num-src-pads").unwrap().as_u64(), Some(0));
    }
}
