//! The reference-counted element handle.

use super::traits::{ElementImpl, PropertyValue};
use super::{Pad, PadPresence, State, StateChange};
use crate::error::{Error, Result, StateChangeError};
use crate::event::Event;
use crate::observability;
use crate::pipeline::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// A node of the media graph.
///
/// `Element` is a strong, reference-counted handle: cloning it takes a new
/// reference, dropping it releases one. Containers hold a reference to each
/// child; pads only hold weak references back to their element.
#[derive(Clone)]
pub struct Element {
    inner: Arc<ElementInner>,
}

struct ElementInner {
    name: String,
    factory_name: String,
    parent: Mutex<WeakElement>,
    state: Mutex<State>,
    /// Serializes `set_state` calls on this element.
    state_lock: Mutex<()>,
    pads: Mutex<Vec<Pad>>,
    children: Option<Mutex<Vec<Element>>>,
    eos: AtomicBool,
    imp: Box<dyn ElementImpl>,
}

/// A weak element reference.
#[derive(Clone, Default)]
pub struct WeakElement {
    inner: Weak<ElementInner>,
}

impl WeakElement {
    /// A reference to nothing.
    pub fn new() -> Self {
        Self { inner: Weak::new() }
    }

    /// Get a strong handle if the element is still alive.
    pub fn upgrade(&self) -> Option<Element> {
        self.inner.upgrade().map(|inner| Element { inner })
    }
}

impl Element {
    /// Wrap an implementation into a new element.
    ///
    /// Pads for all `Always` templates are created right away.
    pub fn new(
        name: impl Into<String>,
        factory_name: impl Into<String>,
        imp: Box<dyn ElementImpl>,
    ) -> Self {
        let children = imp.is_bin().then(|| Mutex::new(Vec::new()));
        let element = Element {
            inner: Arc::new(ElementInner {
                name: name.into(),
                factory_name: factory_name.into(),
                parent: Mutex::new(WeakElement::new()),
                state: Mutex::new(State::Null),
                state_lock: Mutex::new(()),
                pads: Mutex::new(Vec::new()),
                children,
                eos: AtomicBool::new(false),
                imp,
            }),
        };

        for template in element.imp().pad_templates() {
            if template.presence == PadPresence::Always {
                let name = template.name.clone();
                let pad = Pad::from_template(Arc::new(template), name);
                pad.set_parent(Some(&element));
                element.inner.pads.lock().unwrap().push(pad);
            }
        }

        element.imp().constructed(&element);
        element
    }

    pub(crate) fn imp(&self) -> &dyn ElementImpl {
        self.inner.imp.as_ref()
    }

    /// Get a weak reference.
    pub fn downgrade(&self) -> WeakElement {
        WeakElement {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Number of strong references to this element.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Get the element's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Name of the factory that built this element.
    pub fn factory_name(&self) -> &str {
        &self.inner.factory_name
    }

    /// The container this element lives in.
    pub fn parent(&self) -> Option<Element> {
        self.inner.parent.lock().unwrap().upgrade()
    }

    /// Slash-separated path from the top-level container, e.g.
    /// `/pipeline0/playbin0/videosinkbin/tee0`.
    pub fn path_string(&self) -> String {
        let mut names = vec![self.name().to_string()];
        let mut current = self.parent();
        while let Some(element) = current {
            names.push(element.name().to_string());
            current = element.parent();
        }
        names.reverse();
        format!("/{}", names.join("/"))
    }

    /// Current state.
    pub fn state(&self) -> State {
        *self.inner.state.lock().unwrap()
    }

    /// Whether the element has seen end-of-stream since it was last started.
    pub fn is_eos(&self) -> bool {
        self.inner.eos.load(Ordering::Acquire)
    }

    pub(crate) fn mark_eos(&self) {
        self.inner.eos.store(true, Ordering::Release);
    }

    /// Whether the element terminates the data flow.
    pub fn is_sink(&self) -> bool {
        self.imp().is_sink()
    }

    /// Whether the element can hold children.
    pub fn is_bin(&self) -> bool {
        self.inner.children.is_some()
    }

    // ------------------------------------------------------------------
    // Properties
    // ------------------------------------------------------------------

    /// Set a property.
    pub fn set_property(&self, name: &str, value: impl Into<PropertyValue>) -> Result<()> {
        self.imp().set_property(self, name, value.into())
    }

    /// Read a property.
    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        self.imp().property(name)
    }

    // ------------------------------------------------------------------
    // Pads
    // ------------------------------------------------------------------

    /// All pads of the element.
    pub fn pads(&self) -> Vec<Pad> {
        self.inner.pads.lock().unwrap().clone()
    }

    /// Output pads.
    pub fn src_pads(&self) -> Vec<Pad> {
        self.pads().into_iter().filter(|p| p.is_output()).collect()
    }

    /// Input pads.
    pub fn sink_pads(&self) -> Vec<Pad> {
        self.pads().into_iter().filter(|p| p.is_input()).collect()
    }

    /// Look up a pad by name.
    pub fn static_pad(&self, name: &str) -> Option<Pad> {
        self.inner
            .pads
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name() == name)
            .cloned()
    }

    /// Add a pad to the element.
    ///
    /// The pad is activated straight away if the element is already
    /// streaming.
    pub fn add_pad(&self, pad: &Pad) -> Result<()> {
        {
            let mut pads = self.inner.pads.lock().unwrap();
            if pads.iter().any(|p| p.name() == pad.name()) {
                return Err(Error::Construction(format!(
                    "element '{}' already has a pad named '{}'",
                    self.name(),
                    pad.name()
                )));
            }
            pad.set_parent(Some(self));
            pads.push(pad.clone());
        }
        if self.state() >= State::Paused {
            pad.set_active(true);
        }
        Ok(())
    }

    /// Remove a pad, unlinking and deactivating it.
    pub fn remove_pad(&self, pad: &Pad) -> bool {
        let removed = {
            let mut pads = self.inner.pads.lock().unwrap();
            let before = pads.len();
            pads.retain(|p| p != pad);
            pads.len() != before
        };
        if removed {
            pad.unlink_peer();
            pad.set_active(false);
            pad.set_parent(None);
        }
        removed
    }

    /// Request a new pad from a `Request` template, e.g. `src_%u` on a tee.
    ///
    /// Every pad obtained this way must be handed back with
    /// [`release_request_pad`](Self::release_request_pad).
    pub fn request_pad_simple(&self, template_name: &str) -> Option<Pad> {
        let template = self
            .imp()
            .pad_templates()
            .into_iter()
            .find(|t| t.presence == PadPresence::Request && t.name == template_name)?;
        let pad = self.imp().request_new_pad(self, Arc::new(template))?;
        if let Err(err) = self.add_pad(&pad) {
            tracing::warn!(element = %self.name(), error = %err, "requested pad refused");
            return None;
        }
        tracing::debug!(pad = %pad.path(), "request pad created");
        Some(pad)
    }

    /// Give a request pad back to the element.
    pub fn release_request_pad(&self, pad: &Pad) {
        if pad.presence() != PadPresence::Request || pad.parent().as_ref() != Some(self) {
            tracing::warn!(
                element = %self.name(),
                pad = %pad.name(),
                "not a request pad of this element, ignoring release"
            );
            return;
        }
        self.imp().release_pad(self, pad);
        self.remove_pad(pad);
        tracing::debug!(element = %self.name(), pad = %pad.name(), "request pad released");
    }

    /// Send an event out of every output pad.
    ///
    /// Returns whether at least one peer accepted it.
    pub fn forward_event(&self, event: Event) -> bool {
        let mut handled = false;
        for pad in self.src_pads() {
            handled |= pad.push_event(event.clone());
        }
        handled
    }

    // ------------------------------------------------------------------
    // Linking
    // ------------------------------------------------------------------

    /// Link this element's `src` pad to `dest`'s `sink` pad.
    ///
    /// Both elements must live in the same container.
    pub fn link(&self, dest: &Element) -> Result<()> {
        let src = self.static_pad("src").ok_or_else(|| Error::NoSuchPad {
            element: self.name().to_string(),
            pad: "src".to_string(),
        })?;
        let sink = dest.static_pad("sink").ok_or_else(|| Error::NoSuchPad {
            element: dest.name().to_string(),
            pad: "sink".to_string(),
        })?;

        if self.parent() != dest.parent() {
            return Err(Error::Link {
                src: src.path(),
                sink: sink.path(),
                reason: crate::error::LinkError::WrongHierarchy,
            });
        }

        src.link(&sink).map_err(|reason| Error::Link {
            src: src.path(),
            sink: sink.path(),
            reason,
        })
    }

    /// Link a chain of elements in order.
    pub fn link_many(elements: &[&Element]) -> Result<()> {
        for pair in elements.windows(2) {
            pair[0].link(pair[1])?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Containers
    // ------------------------------------------------------------------

    /// Children of a container, in insertion order. Empty for plain elements.
    pub fn children(&self) -> Vec<Element> {
        match &self.inner.children {
            Some(children) => children.lock().unwrap().clone(),
            None => Vec::new(),
        }
    }

    /// Add a child to this container.
    pub fn add(&self, child: &Element) -> Result<()> {
        let children = self
            .inner
            .children
            .as_ref()
            .ok_or_else(|| Error::NotABin(self.name().to_string()))?;
        let mut children = children.lock().unwrap();

        if children.iter().any(|c| c.name() == child.name()) {
            return Err(Error::DuplicateName {
                bin: self.name().to_string(),
                name: child.name().to_string(),
            });
        }

        {
            let mut parent = child.inner.parent.lock().unwrap();
            if parent.upgrade().is_some() {
                return Err(Error::AlreadyParented(child.name().to_string()));
            }
            *parent = self.downgrade();
        }
        children.push(child.clone());

        tracing::debug!(bin = %self.name(), child = %child.name(), "added child");
        Ok(())
    }

    /// Add several children at once, stopping at the first failure.
    pub fn add_many(&self, children: &[&Element]) -> Result<()> {
        for child in children {
            self.add(child)?;
        }
        Ok(())
    }

    /// Remove a child from this container.
    ///
    /// All pads of the child are unlinked. The child keeps its state; the
    /// caller is responsible for shutting it down.
    pub fn remove(&self, child: &Element) -> Result<()> {
        let children = self
            .inner
            .children
            .as_ref()
            .ok_or_else(|| Error::NotABin(self.name().to_string()))?;

        {
            let mut children = children.lock().unwrap();
            let position = children
                .iter()
                .position(|c| c == child)
                .ok_or_else(|| Error::NotAChild {
                    bin: self.name().to_string(),
                    element: child.name().to_string(),
                })?;
            children.remove(position);
        }

        for pad in child.pads() {
            pad.unlink_peer();
        }
        *child.inner.parent.lock().unwrap() = WeakElement::new();

        tracing::debug!(bin = %self.name(), child = %child.name(), "removed child");
        self.imp().child_removed(self, child);
        Ok(())
    }

    /// Find a descendant by name.
    pub fn by_name(&self, name: &str) -> Option<Element> {
        for child in self.children() {
            if child.name() == name {
                return Some(child);
            }
            if let Some(found) = child.by_name(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants, depth first.
    pub fn iterate_recurse(&self) -> Vec<Element> {
        let mut all = Vec::new();
        for child in self.children() {
            all.push(child.clone());
            all.extend(child.iterate_recurse());
        }
        all
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Move the element to `target`, one transition at a time.
    ///
    /// Containers move their children first, in reverse insertion order,
    /// which puts sinks ahead of the sources feeding them. On the way down
    /// failures are logged and the transition continues; on the way up the
    /// first failure aborts.
    pub fn set_state(&self, target: State) -> std::result::Result<(), StateChangeError> {
        let _guard = self.inner.state_lock.lock().unwrap();
        while let Some(transition) = StateChange::towards(self.state(), target) {
            self.change_state(transition)?;
        }
        Ok(())
    }

    /// Like `set_state`, but never moves the element up.
    fn lower_state(&self, target: State) -> std::result::Result<(), StateChangeError> {
        let _guard = self.inner.state_lock.lock().unwrap();
        while let Some(transition) = StateChange::towards(self.state(), target) {
            if !transition.is_downward() {
                break;
            }
            self.change_state(transition)?;
        }
        Ok(())
    }

    /// Bring the element to the state of its container.
    ///
    /// Used for elements added to a graph that is already running.
    pub fn sync_state_with_parent(&self) -> std::result::Result<(), StateChangeError> {
        match self.parent() {
            Some(parent) => self.set_state(parent.state()),
            None => Ok(()),
        }
    }

    fn change_state(&self, transition: StateChange) -> std::result::Result<(), StateChangeError> {
        let downward = transition.is_downward();

        for child in self.children().iter().rev() {
            // Removed concurrently by a streaming thread.
            if child.parent().as_ref() != Some(self) {
                continue;
            }
            let result = if downward {
                child.lower_state(transition.next())
            } else {
                child.set_state(transition.next())
            };
            if let Err(err) = result {
                if !downward {
                    return Err(err);
                }
                tracing::warn!(element = %child.name(), error = %err, "state change failed");
            }
        }

        if transition == StateChange::ReadyToPaused {
            self.inner.eos.store(false, Ordering::Release);
            for pad in self.pads() {
                pad.set_active(true);
            }
        }

        let result = self.imp().change_state(self, transition);

        if transition == StateChange::PausedToReady {
            for pad in self.pads() {
                pad.set_active(false);
            }
        }

        if let Err(err) = result {
            if !downward {
                return Err(err);
            }
            tracing::warn!(element = %self.name(), error = %err, "state change failed");
        }

        *self.inner.state.lock().unwrap() = transition.next();
        observability::trace_state_change(self.name(), transition);
        self.post_message(Message::StateChanged {
            src: self.path_string(),
            old: transition.current(),
            new: transition.next(),
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    /// Post a message towards the application.
    ///
    /// The message bubbles from this element up through its ancestors until
    /// one of them consumes it (the pipeline puts it on its bus). Returns
    /// `false` when nothing took it, i.e. the element is not in a pipeline.
    pub fn post_message(&self, message: Message) -> bool {
        let mut current = Some(self.clone());
        while let Some(element) = current {
            if element.imp().handle_message(&element, &message) {
                return true;
            }
            current = element.parent();
        }
        tracing::trace!(element = %self.name(), ?message, "message dropped, no bus");
        false
    }

    /// Post an error message with the element's path as source.
    pub fn post_error(&self, error: impl Into<String>, debug: Option<String>) -> bool {
        self.post_message(Message::Error {
            src: self.path_string(),
            error: error.into(),
            debug,
        })
    }

    /// Post a warning message with the element's path as source.
    pub fn post_warning(&self, warning: impl Into<String>, debug: Option<String>) -> bool {
        self.post_message(Message::Warning {
            src: self.path_string(),
            error: warning.into(),
            debug,
        })
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Element {}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("name", &self.inner.name)
            .field("factory", &self.inner.factory_name)
            .field("state", &self.state())
            .field("pads", &self.inner.pads.lock().unwrap().len())
            .finish()
    }
}
