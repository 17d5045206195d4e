//! FakeSink - discards everything it receives.

use super::sink::BaseSink;
use crate::buffer::Buffer;
use crate::element::{Element, ElementImpl, Pad, PadTemplate, PropertyValue, StateChange};
use crate::error::{Error, FlowResult, Result, StateChangeError};
use crate::event::Event;

/// A sink that discards all buffers.
///
/// This is useful for:
/// - Keeping a fan-out output permanently consumed
/// - Testing upstream elements
/// - Draining a pipeline without side effects
///
/// Unlike most sinks it does not synchronise to timestamps unless `sync` is
/// set.
///
/// # Example
///
/// ```rust,ignore
/// use teeswap::pipeline::ElementFactory;
///
/// let sink = ElementFactory::new().make("fakesink", None)?;
/// sink.set_property("sync", true)?;
/// ```
pub struct FakeSink {
    base: BaseSink,
}

impl FakeSink {
    /// Create a new FakeSink.
    pub fn new() -> Self {
        Self {
            base: BaseSink::new(false),
        }
    }
}

impl Default for FakeSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementImpl for FakeSink {
    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![PadTemplate::input("sink")]
    }

    fn is_sink(&self) -> bool {
        true
    }

    fn chain(&self, _element: &Element, _pad: &Pad, buffer: Buffer) -> FlowResult {
        self.base.render(&buffer);
        Ok(())
    }

    fn sink_event(&self, element: &Element, _pad: &Pad, event: Event) -> bool {
        self.base.event(element, event)
    }

    fn change_state(
        &self,
        _element: &Element,
        transition: StateChange,
    ) -> std::result::Result<(), StateChangeError> {
        self.base.change_state(transition);
        Ok(())
    }

    fn set_property(&self, element: &Element, name: &str, value: PropertyValue) -> Result<()> {
        self.base
            .set_property(name, &value)
            .unwrap_or_else(|| {
                Err(Error::NoSuchProperty {
                    element: element.name().to_string(),
                    property: name.to_string(),
                })
            })
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        self.base.property(name)
    }
}

#[cfg(test)]
mod tests {
    use crate::element::PadDirection;
    use crate::element::State;
    use crate::element::Pad;
    use crate::buffer::Buffer;
    use crate::pipeline::{ElementFactory, Message, Pipeline};

    #[test]
    fn test_fakesink_defaults() {
        let sink = ElementFactory::new().make("fakesink", None).unwrap();
        assert!(sink.is_sink());
        assert_eq!(sink.property("sync").unwrap().as_bool(), Some(false));
        assert!(sink.static_pad("sink").is_some());
        assert!(sink.src_pads().is_empty());
    }

    #[test]
    fn test_fakesink_consumes_and_posts_eos() {
        let pipeline = Pipeline::new(None);
        let mut bus = pipeline.subscribe();
        let sink = ElementFactory::new().make("fakesink", None).unwrap();
        pipeline.add(&sink).unwrap();

        let upstream = Pad::new("src", PadDirection::Output);
        upstream.link(&sink.static_pad("sink").unwrap()).unwrap();
        upstream.set_active(true);
        pipeline.set_state(State::Playing).unwrap();

        upstream.push(Buffer::new(vec![1u8; 32], 0)).unwrap();
        assert!(upstream.push_event(crate::event::Event::Eos));
        assert!(sink.is_eos());
        assert_eq!(sink.property("num-rendered").unwrap().as_u64(), Some(1));

        let mut got_eos = false;
        while let Some(message) = bus.try_recv() {
            if matches!(message, Message::Eos { ref src } if src == &pipeline.path_string()) {
                got_eos = true;
            }
        }
        assert!(got_eos);

        pipeline.set_state(State::Null).unwrap();
    }
}
