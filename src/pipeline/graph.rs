//! The top-level container.

use super::bus::{Bus, BusReceiver, Message};
use super::factory;
use crate::element::{Element, ElementImpl, State, StateChange};
use crate::error::StateChangeError;
use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// A top-level bin that owns a [`Bus`].
///
/// Messages posted anywhere below the pipeline end up on its bus. The
/// pipeline also collects end-of-stream: once every sink in the tree has
/// received EOS, it posts a single [`Message::Eos`].
///
/// `Pipeline` dereferences to its [`Element`], so all container operations
/// (`add`, `remove`, `set_state`, ...) are available directly.
#[derive(Clone, Debug)]
pub struct Pipeline {
    element: Element,
    bus: Bus,
    base_time: Arc<Mutex<Option<Instant>>>,
}

impl Pipeline {
    /// Create a pipeline. Without a name it is called `pipeline<N>`.
    pub fn new(name: Option<&str>) -> Self {
        let bus = Bus::default();
        let base_time = Arc::new(Mutex::new(None));
        let name = match name {
            Some(name) => name.to_string(),
            None => factory::unique_name("pipeline"),
        };
        let element = Element::new(
            name,
            "pipeline",
            Box::new(PipelineImpl {
                bus: bus.clone(),
                eos_posted: AtomicBool::new(false),
                base_time: base_time.clone(),
            }),
        );
        Self {
            element,
            bus,
            base_time,
        }
    }

    /// When the pipeline last went to `Playing`.
    pub fn base_time(&self) -> Option<Instant> {
        *self.base_time.lock().unwrap()
    }

    /// The pipeline's bus.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Subscribe to the pipeline's bus.
    pub fn subscribe(&self) -> BusReceiver {
        self.bus.subscribe()
    }

    /// The pipeline as a plain element handle.
    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl Deref for Pipeline {
    type Target = Element;

    fn deref(&self) -> &Element {
        &self.element
    }
}

struct PipelineImpl {
    bus: Bus,
    eos_posted: AtomicBool,
    base_time: Arc<Mutex<Option<Instant>>>,
}

impl PipelineImpl {
    fn all_sinks_eos(element: &Element) -> bool {
        let sinks: Vec<Element> = element
            .iterate_recurse()
            .into_iter()
            .filter(|e| e.is_sink())
            .collect();
        !sinks.is_empty() && sinks.iter().all(|sink| sink.is_eos())
    }

    fn check_eos(&self, element: &Element) {
        if Self::all_sinks_eos(element) && !self.eos_posted.swap(true, Ordering::AcqRel) {
            crate::observability::trace_eos(element.name());
            self.bus.post(Message::Eos {
                src: element.path_string(),
            });
        }
    }
}

impl ElementImpl for PipelineImpl {
    fn is_bin(&self) -> bool {
        true
    }

    fn change_state(
        &self,
        element: &Element,
        transition: StateChange,
    ) -> Result<(), StateChangeError> {
        match transition {
            StateChange::ReadyToPaused => self.eos_posted.store(false, Ordering::Release),
            StateChange::PausedToPlaying => {
                *self.base_time.lock().unwrap() = Some(Instant::now());
                tracing::debug!(pipeline = %element.name(), "base time set");
            }
            StateChange::PausedToReady => *self.base_time.lock().unwrap() = None,
            _ => {}
        }
        Ok(())
    }

    fn child_removed(&self, element: &Element, child: &Element) {
        // The removed subtree may have held the last sink still streaming.
        tracing::trace!(pipeline = %element.name(), child = %child.name(), "child removed");
        if element.state() >= State::Paused {
            self.check_eos(element);
        }
    }

    fn handle_message(&self, element: &Element, message: &Message) -> bool {
        match message {
            Message::Eos { src } => {
                tracing::debug!(pipeline = %element.name(), %src, "sink reached eos");
                self.check_eos(element);
            }
            other => {
                self.bus.post(other.clone());
            }
        }
        true
    }
}
