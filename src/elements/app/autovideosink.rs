//! AutoVideoSink - the default video output.
//!
//! This build has no windowing backend: frames are paced against their
//! timestamps exactly like a display would, then dropped. Frame statistics are
//! logged when the sink shuts down.
//!
//! # Example
//!
//! ```rust,ignore
//! use teeswap::pipeline::ElementFactory;
//!
//! let sink = ElementFactory::new().make("autovideosink", Some("vsbsink0"))?;
//! assert_eq!(sink.property("sync").unwrap().as_bool(), Some(true));
//! ```

use crate::buffer::Buffer;
use crate::element::{Element, ElementImpl, Pad, PadTemplate, PropertyValue, StateChange};
use crate::elements::sink::BaseSink;
use crate::error::{Error, FlowResult, Result, StateChangeError};
use crate::event::Event;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// A video sink synchronised to buffer timestamps.
///
/// Properties:
///
/// | Name | Type | Default |
/// |------|------|---------|
/// | `sync` | bool | `true` |
/// | `num-rendered` | u64, read-only | |
/// | `num-bytes` | u64, read-only | |
pub struct AutoVideoSink {
    base: BaseSink,
    /// Set once the first frame has been shown.
    opened: AtomicBool,
    /// When the first frame was shown.
    started: Mutex<Option<Instant>>,
}

impl AutoVideoSink {
    /// Create a new auto video sink with default settings.
    pub fn new() -> Self {
        Self {
            base: BaseSink::new(true),
            opened: AtomicBool::new(false),
            started: Mutex::new(None),
        }
    }

    fn report(&self, element: &Element) {
        let Some(started) = self.started.lock().unwrap().take() else {
            return;
        };
        let elapsed = started.elapsed().as_secs_f64();
        let frames = self.base.rendered();
        let fps = if elapsed > 0.0 { frames as f64 / elapsed } else { 0.0 };
        tracing::info!(
            element = %element.name(),
            frames,
            fps = format!("{:.1}", fps),
            "video output closed"
        );
    }
}

impl Default for AutoVideoSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementImpl for AutoVideoSink {
    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![PadTemplate::input("sink")]
    }

    fn is_sink(&self) -> bool {
        true
    }

    fn chain(&self, element: &Element, _pad: &Pad, buffer: Buffer) -> FlowResult {
        if !self.opened.swap(true, Ordering::AcqRel) {
            *self.started.lock().unwrap() = Some(Instant::now());
            tracing::info!(element = %element.name(), frame_size = buffer.len(), "video output opened");
        }
        self.base.render(&buffer);
        Ok(())
    }

    fn sink_event(&self, element: &Element, _pad: &Pad, event: Event) -> bool {
        self.base.event(element, event)
    }

    fn change_state(
        &self,
        element: &Element,
        transition: StateChange,
    ) -> std::result::Result<(), StateChangeError> {
        self.base.change_state(transition);
        if transition == StateChange::PausedToReady {
            self.report(element);
            self.opened.store(false, Ordering::Release);
        }
        Ok(())
    }

    fn set_property(&self, element: &Element, name: &str, value: PropertyValue) -> Result<()> {
        self.base.set_property(name, &value).unwrap_or_else(|| {
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
