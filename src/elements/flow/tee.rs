//! Tee element - duplicates buffers to multiple outputs.

use crate::buffer::Buffer;
use crate::element::{Element, ElementImpl, Pad, PadTemplate, PropertyValue, StateChange};
use crate::error::{Error, FlowError, FlowResult, Result, StateChangeError};
use crate::event::Event;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// A fan-out element: one input, any number of requested outputs.
///
/// Output pads are requested from the `src_%u` template and must be
/// released again with [`Element::release_request_pad`]. Every buffer that
/// arrives on `sink` is pushed, in turn, out of every output pad. Outputs
/// that are unlinked or shutting down are skipped; the push only fails with
/// [`FlowError::NotLinked`] if no output took the buffer (unless
/// `allow-not-linked` is set).
///
/// Properties:
///
/// | Name | Type | Default |
/// |------|------|---------|
/// | `allow-not-linked` | bool | `false` |
/// | `num-src-pads` | u64, read-only | |
/// | `num-buffers` | u64, read-only | |
/// | `num-bytes` | u64, read-only | |
///
/// # Example
///
/// ```rust,ignore
/// use teeswap::pipeline::ElementFactory;
///
/// let tee = ElementFactory::new().make("tee", None)?;
/// let first = tee.request_pad_simple("src_%u").unwrap();  // src_0
/// let second = tee.request_pad_simple("src_%u").unwrap(); // src_1
/// tee.release_request_pad(&first);
/// ```
pub struct Tee {
    next_pad: AtomicU32,
    num_src_pads: AtomicU32,
    allow_not_linked: AtomicBool,
    /// End-of-stream already went through.
    eos: AtomicBool,
    /// Number of buffers that have passed through.
    count: AtomicU64,
    /// Total bytes that have passed through.
    bytes: AtomicU64,
}

impl Tee {
    /// Create a new Tee element.
    pub fn new() -> Self {
        Self {
            next_pad: AtomicU32::new(0),
            num_src_pads: AtomicU32::new(0),
            allow_not_linked: AtomicBool::new(false),
            eos: AtomicBool::new(false),
            count: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }
}

impl Default for Tee {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementImpl for Tee {
    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![
            PadTemplate::input("sink"),
            PadTemplate::request_output("src_%u"),
        ]
    }

    fn chain(&self, element: &Element, _pad: &Pad, buffer: Buffer) -> FlowResult {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(buffer.len() as u64, Ordering::Relaxed);

        let mut delivered = false;
        for pad in element.src_pads() {
            match pad.push(buffer.clone()) {
                Ok(()) => delivered = true,
                Err(FlowError::NotLinked) | Err(FlowError::Flushing) => {
                    tracing::trace!(pad = %pad.path(), "skipping output");
                }
                Err(FlowError::Eos) => {}
                Err(FlowError::Error) => return Err(FlowError::Error),
            }
        }

        if delivered || self.allow_not_linked.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(FlowError::NotLinked)
        }
    }

    fn request_new_pad(&self, _element: &Element, template: Arc<PadTemplate>) -> Option<Pad> {
        let index = self.next_pad.fetch_add(1, Ordering::Relaxed);
        let name = template.instance_name(index);
        self.num_src_pads.fetch_add(1, Ordering::Relaxed);
        let pad = Pad::from_template(template, name);
        if self.eos.load(Ordering::Acquire) {
            pad.set_sticky_eos();
        }
        Some(pad)
    }

    fn sink_event(&self, element: &Element, _pad: &Pad, event: Event) -> bool {
        if event.is_eos() {
            self.eos.store(true, Ordering::Release);
        }
        element.forward_event(event)
    }

    fn change_state(
        &self,
        _element: &Element,
        transition: StateChange,
    ) -> std::result::Result<(), StateChangeError> {
        if transition == StateChange::ReadyToPaused {
            self.eos.store(false, Ordering::Release);
        }
        Ok(())
    }

    fn release_pad(&self, _element: &Element, _pad: &Pad) {
        self.num_src_pads.fetch_sub(1, Ordering::Relaxed);
    }

    fn set_property(&self, element: &Element, name: &str, value: PropertyValue) -> Result<()> {
        match name {
            "allow-not-linked" => {
                let allow = value
                    .as_bool()
                    .ok_or_else(|| PropertyValue::invalid(name, "bool"))?;
                self.allow_not_linked.store(allow, Ordering::Relaxed);
                Ok(())
            }
            _ => Err(Error::NoSuchProperty {
                element: element.name().to_string(),
                property: name.to_string(),
            }),
        }
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "allow-not-linked" => Some(self.allow_not_linked.load(Ordering::Relaxed).into()),
            "num-src-pads" => Some(u64::from(self.num_src_pads.load(Ordering::Relaxed)).into()),
            "num-buffers" => Some(self.count.load(Ordering::Relaxed).into()),
            "num-bytes" => Some(self.bytes.load(Ordering::Relaxed).into()),
            _ => None,
        }
    }
}
