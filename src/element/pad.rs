//! Pad abstraction for element inputs and outputs.
//!
//! Pads are the connection points of elements. An output pad pushes buffers
//! and events into the input pad it is linked to. Each pad owns a stream lock
//! that is held for the duration of every push through it; idle probes run
//! under that lock, which is what lets a single branch of a fan-out be
//! quiesced while its siblings keep streaming.
//!
//! Pads keep weak references to their parent element and to their peer, so
//! links never keep elements alive.

use super::object::{Element, WeakElement};
use super::probe::{Probe, ProbeId, ProbeInfo, ProbeReturn, ProbeType};
use crate::buffer::Buffer;
use crate::error::{FlowError, FlowResult, LinkError};
use crate::event::Event;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

/// Direction of a pad (input or output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadDirection {
    /// An input pad (receives buffers from upstream).
    Input,
    /// An output pad (sends buffers downstream).
    Output,
}

/// Whether a pad is always present or created dynamically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadPresence {
    /// Pad is always present on the element.
    Always,
    /// Pad is created when requested and must be released again.
    Request,
}

/// Template for creating pads.
///
/// Pad templates define the characteristics of pads that an element can have.
/// Request templates carry a `%u` placeholder in their name (`src_%u`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadTemplate {
    /// Name pattern for this pad (e.g., "src", "sink", "src_%u").
    pub name: String,
    /// Direction of this pad.
    pub direction: PadDirection,
    /// Whether this pad is always present or created on demand.
    pub presence: PadPresence,
}

impl PadTemplate {
    /// Create a new pad template.
    pub fn new(name: impl Into<String>, direction: PadDirection, presence: PadPresence) -> Self {
        Self {
            name: name.into(),
            direction,
            presence,
        }
    }

    /// Create a template for an always-present input pad.
    pub fn input(name: impl Into<String>) -> Self {
        Self::new(name, PadDirection::Input, PadPresence::Always)
    }

    /// Create a template for an always-present output pad.
    pub fn output(name: impl Into<String>) -> Self {
        Self::new(name, PadDirection::Output, PadPresence::Always)
    }

    /// Create a template for output pads handed out on request.
    pub fn request_output(name: impl Into<String>) -> Self {
        Self::new(name, PadDirection::Output, PadPresence::Request)
    }

    /// Expand the `%u` placeholder with a pad index.
    pub fn instance_name(&self, index: u32) -> String {
        self.name.replace("%u", &index.to_string())
    }
}

/// A pad instance on an element.
///
/// `Pad` is a cheap handle; clones refer to the same pad.
#[derive(Clone)]
pub struct Pad {
    inner: Arc<PadInner>,
}

struct PadInner {
    name: String,
    direction: PadDirection,
    template: Option<Arc<PadTemplate>>,
    parent: Mutex<WeakElement>,
    peer: Mutex<Weak<PadInner>>,
    ghost_target: Option<Pad>,
    active: AtomicBool,
    /// End-of-stream went out of this pad; a new peer gets it on link.
    sticky_eos: AtomicBool,
    stream_lock: Mutex<()>,
    probes: Mutex<Vec<Probe>>,
    next_probe_id: AtomicU64,
}

impl Pad {
    fn build(
        name: String,
        direction: PadDirection,
        template: Option<Arc<PadTemplate>>,
        ghost_target: Option<Pad>,
    ) -> Self {
        Self {
            inner: Arc::new(PadInner {
                name,
                direction,
                template,
                parent: Mutex::new(WeakElement::new()),
                peer: Mutex::new(Weak::new()),
                ghost_target,
                active: AtomicBool::new(false),
                sticky_eos: AtomicBool::new(false),
                stream_lock: Mutex::new(()),
                probes: Mutex::new(Vec::new()),
                next_probe_id: AtomicU64::new(1),
            }),
        }
    }

    /// Create a new pad.
    pub fn new(name: impl Into<String>, direction: PadDirection) -> Self {
        Self::build(name.into(), direction, None, None)
    }

    /// Create a pad from a template.
    pub fn from_template(template: Arc<PadTemplate>, name: impl Into<String>) -> Self {
        let direction = template.direction;
        Self::build(name.into(), direction, Some(template), None)
    }

    /// Create a ghost pad that forwards everything to `target`.
    ///
    /// Ghost pads let a container expose a pad of one of its children as
    /// its own. The ghost takes the direction of its target.
    pub fn new_ghost(name: impl Into<String>, target: &Pad) -> Self {
        Self::build(name.into(), target.direction(), None, Some(target.clone()))
    }

    /// Get the pad's name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Get the pad's direction.
    pub fn direction(&self) -> PadDirection {
        self.inner.direction
    }

    /// Check if this is an input pad.
    pub fn is_input(&self) -> bool {
        self.inner.direction == PadDirection::Input
    }

    /// Check if this is an output pad.
    pub fn is_output(&self) -> bool {
        self.inner.direction == PadDirection::Output
    }

    /// Get the template this pad was created from.
    pub fn template(&self) -> Option<&Arc<PadTemplate>> {
        self.inner.template.as_ref()
    }

    /// Presence of the template this pad came from.
    pub fn presence(&self) -> PadPresence {
        self.template()
            .map(|t| t.presence)
            .unwrap_or(PadPresence::Always)
    }

    /// Target of a ghost pad.
    pub fn ghost_target(&self) -> Option<&Pad> {
        self.inner.ghost_target.as_ref()
    }

    /// The element this pad belongs to.
    pub fn parent(&self) -> Option<Element> {
        self.inner.parent.lock().unwrap().upgrade()
    }

    pub(crate) fn set_parent(&self, parent: Option<&Element>) {
        *self.inner.parent.lock().unwrap() = match parent {
            Some(element) => element.downgrade(),
            None => WeakElement::new(),
        };
    }

    /// `element:pad`, for log output.
    pub fn path(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{}:{}", parent.name(), self.name()),
            None => format!("<orphan>:{}", self.name()),
        }
    }

    /// The pad this one is linked to.
    pub fn peer(&self) -> Option<Pad> {
        self.inner
            .peer
            .lock()
            .unwrap()
            .upgrade()
            .map(|inner| Pad { inner })
    }

    /// Whether the pad has a peer.
    pub fn is_linked(&self) -> bool {
        self.peer().is_some()
    }

    /// Link this output pad to an input pad.
    pub fn link(&self, sink: &Pad) -> Result<(), LinkError> {
        if !self.is_output() || !sink.is_input() {
            return Err(LinkError::WrongDirection);
        }

        {
            // Always output pad first, then input pad.
            let mut src_peer = self.inner.peer.lock().unwrap();
            let mut sink_peer = sink.inner.peer.lock().unwrap();
            if src_peer.upgrade().is_some() || sink_peer.upgrade().is_some() {
                return Err(LinkError::WasLinked);
            }
            *src_peer = Arc::downgrade(&sink.inner);
            *sink_peer = Arc::downgrade(&self.inner);
        }

        tracing::debug!(src = %self.path(), sink = %sink.path(), "linked pads");
        if self.inner.sticky_eos.load(Ordering::Acquire) {
            self.push_event(Event::Eos);
        }
        Ok(())
    }

    /// Unlink this output pad from `sink`.
    ///
    /// Returns `false` if the two pads were not linked to each other.
    pub fn unlink(&self, sink: &Pad) -> bool {
        {
            let mut src_peer = self.inner.peer.lock().unwrap();
            let linked = src_peer
                .upgrade()
                .is_some_and(|peer| Arc::ptr_eq(&peer, &sink.inner));
            if !linked {
                return false;
            }
            let mut sink_peer = sink.inner.peer.lock().unwrap();
            *src_peer = Weak::new();
            *sink_peer = Weak::new();
        }

        tracing::debug!(src = %self.path(), sink = %sink.path(), "unlinked pads");
        true
    }

    /// Unlink from whatever peer this pad has.
    pub fn unlink_peer(&self) -> bool {
        match self.peer() {
            Some(peer) if self.is_output() => self.unlink(&peer),
            Some(peer) => peer.unlink(self),
            None => false,
        }
    }

    /// Whether the pad accepts data.
    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::Acquire)
    }

    /// Activate or deactivate the pad.
    ///
    /// An inactive pad refuses data with [`FlowError::Flushing`]. A pad that
    /// is deactivated while idle gets its pending idle probes run: it will not
    /// carry data again, so it is idle for good.
    pub fn set_active(&self, active: bool) {
        let was_active = self.inner.active.swap(active, Ordering::AcqRel);
        if was_active && !active {
            self.inner.sticky_eos.store(false, Ordering::Release);
            if let Ok(_stream) = self.inner.stream_lock.try_lock() {
                self.run_idle_probes();
            }
        }
    }

    /// Push a buffer out of this output pad into its peer.
    pub fn push(&self, buffer: Buffer) -> FlowResult {
        let _stream = self.inner.stream_lock.lock().unwrap();
        let result = if !self.is_active() {
            Err(FlowError::Flushing)
        } else {
            match self.peer() {
                Some(peer) => peer.chain(buffer),
                None => Err(FlowError::NotLinked),
            }
        };
        self.run_idle_probes();
        result
    }

    /// Push an event out of this output pad into its peer.
    ///
    /// Returns whether the peer accepted the event.
    pub fn push_event(&self, event: Event) -> bool {
        let _stream = self.inner.stream_lock.lock().unwrap();
        if event.is_eos() {
            self.inner.sticky_eos.store(true, Ordering::Release);
        }
        let handled = self.is_active()
            && match self.peer() {
                Some(peer) => peer.handle_event(event),
                None => false,
            };
        self.run_idle_probes();
        handled
    }

    /// Mark the stream on this output pad as already finished.
    ///
    /// Used for pads created after end-of-stream went through their element:
    /// linking them delivers EOS to the new peer.
    pub(crate) fn set_sticky_eos(&self) {
        self.inner.sticky_eos.store(true, Ordering::Release);
    }

    /// Deliver a buffer arriving on this input pad.
    pub(crate) fn chain(&self, buffer: Buffer) -> FlowResult {
        let _stream = self.inner.stream_lock.lock().unwrap();
        let result = if !self.is_active() {
            Err(FlowError::Flushing)
        } else if let Some(target) = self.ghost_target() {
            target.chain(buffer)
        } else {
            match self.parent() {
                Some(element) => element.imp().chain(&element, self, buffer),
                None => Err(FlowError::Flushing),
            }
        };
        self.run_idle_probes();
        result
    }

    /// Deliver an event arriving on this input pad.
    pub(crate) fn handle_event(&self, event: Event) -> bool {
        let _stream = self.inner.stream_lock.lock().unwrap();
        let handled = if !self.is_active() {
            false
        } else if let Some(target) = self.ghost_target() {
            target.handle_event(event)
        } else {
            match self.parent() {
                Some(element) => element.imp().sink_event(&element, self, event),
                None => false,
            }
        };
        self.run_idle_probes();
        handled
    }

    /// Install a probe on this pad.
    ///
    /// If the pad is idle right now the callback runs immediately on the
    /// calling thread; otherwise it runs on the streaming thread as soon as
    /// the buffer currently in flight has been handed over. Returns `None`
    /// when the probe already ran and asked to be removed.
    pub fn add_probe<F>(&self, probe_type: ProbeType, callback: F) -> Option<ProbeId>
    where
        F: FnMut(&Pad, &ProbeInfo) -> ProbeReturn + Send + 'static,
    {
        let id = ProbeId(self.inner.next_probe_id.fetch_add(1, Ordering::Relaxed));
        self.inner.probes.lock().unwrap().push(Probe {
            id,
            probe_type,
            callback: Box::new(callback),
        });
        tracing::trace!(pad = %self.path(), probe = id.0, "probe installed");

        if let Ok(_stream) = self.inner.stream_lock.try_lock() {
            self.run_idle_probes();
        }

        self.has_probe(id).then_some(id)
    }

    /// Whether a probe with this id is installed.
    pub fn has_probe(&self, id: ProbeId) -> bool {
        self.inner
            .probes
            .lock()
            .unwrap()
            .iter()
            .any(|probe| probe.id == id)
    }

    /// Number of installed probes.
    pub fn probe_count(&self) -> usize {
        self.inner.probes.lock().unwrap().len()
    }

    /// Run idle probes. Callers hold the stream lock.
    fn run_idle_probes(&self) {
        let mut pending = std::mem::take(&mut *self.inner.probes.lock().unwrap());
        if pending.is_empty() {
            return;
        }

        pending.retain_mut(|probe| match probe.probe_type {
            ProbeType::Idle => probe.fire(self),
        });

        let mut probes = self.inner.probes.lock().unwrap();
        // Probes installed by the callbacks themselves go after the survivors.
        pending.append(&mut probes);
        *probes = pending;
    }
}

impl PartialEq for Pad {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Pad {}

impl std::fmt::Debug for Pad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pad")
            .field("name", &self.inner.name)
            .field("direction", &self.inner.direction)
            .field("linked", &self.is_linked())
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn linked_pair() -> (Pad, Pad) {
        let src = Pad::new("src", PadDirection::Output);
        let sink = Pad::new("sink", PadDirection::Input);
        src.link(&sink).unwrap();
        (src, sink)
    }

    #[test]
    fn test_pad_template() {
        let template = PadTemplate::input("sink");
        assert_eq!(template.direction, PadDirection::Input);
        assert_eq!(template.presence, PadPresence::Always);

        let template = PadTemplate::request_output("src_%u");
        assert_eq!(template.presence, PadPresence::Request);
        assert_eq!(template.instance_name(3), "src_3");
    }

    #[test]
    fn test_pad_from_template() {
        let template = Arc::new(PadTemplate::request_output("src_%u"));
        let pad = Pad::from_template(template.clone(), "src_0");

        assert_eq!(pad.name(), "src_0");
        assert!(pad.is_output());
        assert_eq!(pad.presence(), PadPresence::Request);
    }

    #[test]
    fn test_link_and_unlink() {
        let (src, sink) = linked_pair();
        assert_eq!(src.peer(), Some(sink.clone()));
        assert_eq!(sink.peer(), Some(src.clone()));

        assert!(src.unlink(&sink));
        assert!(!src.is_linked());
        assert!(!sink.is_linked());
        assert!(!src.unlink(&sink));
    }

    #[test]
    fn test_link_refuses_wrong_direction_and_relink() {
        let src = Pad::new("src", PadDirection::Output);
        let other_src = Pad::new("src", PadDirection::Output);
        assert_eq!(src.link(&other_src), Err(LinkError::WrongDirection));

        let (src, _sink) = linked_pair();
        let sink2 = Pad::new("sink", PadDirection::Input);
        assert_eq!(src.link(&sink2), Err(LinkError::WasLinked));
    }

    #[test]
    fn test_peer_is_weak() {
        let src = Pad::new("src", PadDirection::Output);
        {
            let sink = Pad::new("sink", PadDirection::Input);
            src.link(&sink).unwrap();
        }
        assert!(!src.is_linked());
    }

    #[test]
    fn test_push_without_peer_or_inactive() {
        let src = Pad::new("src", PadDirection::Output);
        assert_eq!(src.push(Buffer::new(vec![0u8; 4], 0)), Err(FlowError::Flushing));
        src.set_active(true);
        assert_eq!(src.push(Buffer::new(vec![0u8; 4], 0)), Err(FlowError::NotLinked));
    }

    #[test]
    fn test_idle_probe_fires_immediately_when_idle() {
        let src = Pad::new("src", PadDirection::Output);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let id = src.add_probe(ProbeType::Idle, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            ProbeReturn::Remove
        });

        assert!(id.is_none());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(src.probe_count(), 0);
    }

    #[test]
    fn test_kept_idle_callback_fires_after_every_push() {
        let (src, _sink) = linked_pair();
        src.set_active(true);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let id = src
            .add_probe(ProbeType::Idle, move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                ProbeReturn::Ok
            })
            .unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // The sink pad has no parent, so data is refused, but the push still
        // leaves the pad idle afterwards.
        let _ = src.push(Buffer::new(vec![1u8; 4], 0));
        let _ = src.push(Buffer::new(vec![1u8; 4], 1));
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert!(src.has_probe(id));
    }

    #[test]
    fn test_probe_payload_dropped_on_remove() {
        let src = Pad::new("src", PadDirection::Output);
        let payload = Arc::new(());
        let held = payload.clone();

        src.add_probe(ProbeType::Idle, move |_, _| {
            let _keep = &held;
            ProbeReturn::Remove
        });

        assert_eq!(Arc::strong_count(&payload), 1);
    }

    #[test]
    fn test_deactivation_runs_pending_probes() {
        let (src, _sink) = linked_pair();
        src.set_active(true);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        // Keep the first firing, then remove on the next one.
        src.add_probe(ProbeType::Idle, move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                ProbeReturn::Ok
            } else {
                ProbeReturn::Remove
            }
        });
        assert_eq!(src.probe_count(), 1);

        src.set_active(false);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
        assert_eq!(src.probe_count(), 0);
    }

    #[test]
    fn test_eos_is_sticky_for_new_peers() {
        let src = Pad::new("src", PadDirection::Output);
        src.set_active(true);
        assert!(!src.push_event(Event::Eos));

        let sink = Pad::new("sink", PadDirection::Input);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        src.add_probe(ProbeType::Idle, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            ProbeReturn::Ok
        });
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Linking replays EOS, which goes through the stream lock again.
        src.link(&sink).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ghost_pad_takes_target_direction() {
        let target = Pad::new("sink", PadDirection::Input);
        let ghost = Pad::new_ghost("sink", &target);
        assert!(ghost.is_input());
        assert_eq!(ghost.ghost_target(), Some(&target));
    }
}
