//! The behaviour seam every element type implements.

use super::{Element, Pad, PadTemplate, StateChange};
use crate::buffer::Buffer;
use crate::error::{Error, FlowError, FlowResult, Result, StateChangeError};
use crate::event::Event;
use crate::pipeline::Message;
use std::sync::Arc;

/// A value assigned to an element property.
#[derive(Debug, Clone)]
pub enum PropertyValue {
    /// Boolean value.
    Bool(bool),
    /// Unsigned integer value.
    UInt(u64),
    /// String value.
    String(String),
    /// Another element (e.g. the `video-sink` of a decoder).
    Element(Element),
}

impl PropertyValue {
    /// Get as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            PropertyValue::String(s) => match s.as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Get as an unsigned integer.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            PropertyValue::UInt(v) => Some(*v),
            PropertyValue::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Get as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as an element.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            PropertyValue::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Build the error for a value of the wrong kind.
    pub fn invalid(property: &str, expected: &str) -> Error {
        Error::InvalidProperty {
            property: property.to_string(),
            reason: format!("expected {}", expected),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<u64> for PropertyValue {
    fn from(v: u64) -> Self {
        PropertyValue::UInt(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<Element> for PropertyValue {
    fn from(v: Element) -> Self {
        PropertyValue::Element(v)
    }
}

impl From<&Element> for PropertyValue {
    fn from(v: &Element) -> Self {
        PropertyValue::Element(v.clone())
    }
}

/// Element behaviour.
///
/// An [`Element`] handle owns one boxed implementation of this trait. The
/// handle takes care of pads, parents, children and state bookkeeping; the
/// implementation only supplies what is specific to the element type. All
/// methods take `&self`: implementations keep their mutable state behind
/// their own locks because data arrives on streaming threads while control
/// calls come from the application thread.
pub trait ElementImpl: Send + Sync + 'static {
    /// Templates of the pads this element can have.
    ///
    /// `Always` templates are instantiated when the element is created.
    fn pad_templates(&self) -> Vec<PadTemplate> {
        Vec::new()
    }

    /// Called once the element handle exists.
    fn constructed(&self, _element: &Element) {}

    /// Whether the element is a container.
    fn is_bin(&self) -> bool {
        false
    }

    /// Whether the element terminates the data flow.
    fn is_sink(&self) -> bool {
        false
    }

    /// Handle a buffer arriving on one of the element's input pads.
    fn chain(&self, _element: &Element, _pad: &Pad, _buffer: Buffer) -> FlowResult {
        Err(FlowError::Error)
    }

    /// Handle an event arriving on one of the element's input pads.
    ///
    /// The default forwards the event out of every output pad.
    fn sink_event(&self, element: &Element, _pad: &Pad, event: Event) -> bool {
        element.forward_event(event)
    }

    /// Perform one state transition.
    fn change_state(
        &self,
        _element: &Element,
        _transition: StateChange,
    ) -> std::result::Result<(), StateChangeError> {
        Ok(())
    }

    /// Create a pad for a request template.
    fn request_new_pad(&self, _element: &Element, _template: Arc<PadTemplate>) -> Option<Pad> {
        None
    }

    /// A request pad is about to be removed from the element.
    fn release_pad(&self, _element: &Element, _pad: &Pad) {}

    /// Set a property.
    fn set_property(&self, element: &Element, name: &str, _value: PropertyValue) -> Result<()> {
        Err(Error::NoSuchProperty {
            element: element.name().to_string(),
            property: name.to_string(),
        })
    }

    /// Read a property.
    fn property(&self, _name: &str) -> Option<PropertyValue> {
        None
    }

    /// A child was removed from this container or from one of its
    /// descendants.
    ///
    /// The default passes the notification on to the parent.
    fn child_removed(&self, element: &Element, child: &Element) {
        if let Some(parent) = element.parent() {
            parent.imp().child_removed(&parent, child);
        }
    }

    /// Intercept a message posted by this element or one of its descendants.
    ///
    /// Return `true` to consume it; otherwise it bubbles up to the parent.
    fn handle_message(&self, _element: &Element, _message: &Message) -> bool {
        false
    }
}

/// Plain container without behaviour of its own.
#[derive(Debug, Default)]
pub struct BinImpl;

impl ElementImpl for BinImpl {
    fn is_bin(&self) -> bool {
        true
    }
}
