//! Queue element for asynchronous buffering.
//!
//! Provides a thread boundary between pipeline elements:
//! - Upstream hands buffers over and returns immediately
//! - A dedicated thread pushes them downstream
//! - Upstream blocks once `max-size-buffers` items are waiting

use crate::buffer::Buffer;
use crate::element::{Element, ElementImpl, Pad, PadTemplate, PropertyValue, StateChange};
use crate::error::{Error, FlowError, FlowResult, Result, StateChangeError};
use crate::event::Event;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// Default limit on queued items.
pub const DEFAULT_MAX_SIZE_BUFFERS: usize = 200;

/// A queue element that decouples its input from its output.
///
/// Buffers and events are queued in arrival order and pushed out of `src` by
/// the queue's own streaming thread. The thread runs between the `Paused`
/// and `Ready` states; going back to `Ready` flushes whatever is still
/// waiting and releases upstream if it is blocked on a full queue.
///
/// Properties:
///
/// | Name | Type | Default |
/// |------|------|---------|
/// | `max-size-buffers` | u64 | 200 |
/// | `current-level-buffers` | u64, read-only | |
///
/// # Example
///
/// ```rust,ignore
/// use teeswap::pipeline::ElementFactory;
///
/// let queue = ElementFactory::new().make("queue", Some("vsbqueue0"))?;
/// queue.set_property("max-size-buffers", 50u64)?;
/// ```
pub struct Queue {
    inner: Arc<QueueInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct QueueInner {
    state: Mutex<QueueState>,
    not_empty: Condvar,
    not_full: Condvar,
    total_pushed: AtomicU64,
    total_popped: AtomicU64,
}

struct QueueState {
    items: VecDeque<Item>,
    max_buffers: usize,
    flushing: bool,
}

enum Item {
    Buffer(Buffer),
    Event(Event),
}

/// Statistics about a queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Items waiting right now.
    pub current_level: usize,
    /// Buffers accepted from upstream.
    pub total_pushed: u64,
    /// Buffers handed downstream.
    pub total_popped: u64,
}

impl Queue {
    /// Create a new queue with the default limits.
    pub fn new() -> Self {
        Self::with_max_buffers(DEFAULT_MAX_SIZE_BUFFERS)
    }

    /// Create a queue holding at most `max_buffers` items.
    pub fn with_max_buffers(max_buffers: usize) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(max_buffers.min(1024)),
                    max_buffers: max_buffers.max(1),
                    flushing: true,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                total_pushed: AtomicU64::new(0),
                total_popped: AtomicU64::new(0),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Get statistics about the queue.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            current_level: self.inner.state.lock().unwrap().items.len(),
            total_pushed: self.inner.total_pushed.load(Ordering::Relaxed),
            total_popped: self.inner.total_popped.load(Ordering::Relaxed),
        }
    }

    /// Set flushing mode (causes blocked operations to return).
    fn set_flushing(&self, flushing: bool) {
        let mut state = self.inner.state.lock().unwrap();
        state.flushing = flushing;
        if flushing {
            state.items.clear();
            self.inner.not_empty.notify_all();
            self.inner.not_full.notify_all();
        }
    }

    fn start(&self, element: &Element) -> std::result::Result<(), StateChangeError> {
        let src = element.static_pad("src").ok_or_else(|| StateChangeError {
            element: element.name().to_string(),
            transition: StateChange::ReadyToPaused,
        })?;

        self.set_flushing(false);

        let inner = self.inner.clone();
        let owner = element.downgrade();
        let handle = thread::Builder::new()
            .name(format!("{}:src", element.name()))
            .spawn(move || {
                let _span = crate::observability::instrument_element(
                    &owner.upgrade().map(|e| e.path_string()).unwrap_or_default(),
                    "queue",
                );
                inner.run(&src, &owner);
            })
            .map_err(|err| {
                tracing::error!(element = %element.name(), error = %err, "failed to spawn queue thread");
                StateChangeError {
                    element: element.name().to_string(),
                    transition: StateChange::ReadyToPaused,
                }
            })?;

        *self.worker.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn stop(&self, element: &Element) {
        self.set_flushing(true);
        let Some(handle) = self.worker.lock().unwrap().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            tracing::warn!(element = %element.name(), "queue stopped from its own thread");
            return;
        }
        join_worker(handle);
        tracing::debug!(element = %element.name(), "queue thread stopped");
    }

    fn enqueue(&self, item: Item) -> FlowResult {
        let mut state = self.inner.state.lock().unwrap();
        while state.items.len() >= state.max_buffers && !state.flushing {
            state = self.inner.not_full.wait(state).unwrap();
        }
        if state.flushing {
            return Err(FlowError::Flushing);
        }
        state.items.push_back(item);
        self.inner.not_empty.notify_one();
        Ok(())
    }
}

impl QueueInner {
    /// Streaming thread body.
    fn run(&self, src: &Pad, owner: &crate::element::WeakElement) {
        loop {
            let item = {
                let mut state = self.state.lock().unwrap();
                while state.items.is_empty() && !state.flushing {
                    state = self.not_empty.wait(state).unwrap();
                }
                if state.flushing {
                    return;
                }
                let item = state.items.pop_front();
                self.not_full.notify_one();
                item
            };

            match item {
                Some(Item::Buffer(buffer)) => {
                    self.total_popped.fetch_add(1, Ordering::Relaxed);
                    match src.push(buffer) {
                        Ok(()) => {}
                        Err(FlowError::Flushing) => return,
                        Err(FlowError::NotLinked) => {
                            tracing::debug!(pad = %src.path(), "dropping buffer, not linked");
                        }
                        Err(FlowError::Eos) => return,
                        Err(FlowError::Error) => {
                            if let Some(element) = owner.upgrade() {
                                element.post_error(
                                    "Internal data stream error.",
                                    Some("streaming stopped, reason error".to_string()),
                                );
                            }
                            return;
                        }
                    }
                }
                Some(Item::Event(event)) => {
                    let eos = event.is_eos();
                    if !src.push_event(event) {
                        tracing::debug!(pad = %src.path(), "event not handled downstream");
                    }
                    if eos {
                        tracing::debug!(pad = %src.path(), "queue drained to eos");
                    }
                }
                None => {}
            }
        }
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementImpl for Queue {
    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![PadTemplate::input("sink"), PadTemplate::output("src")]
    }

    fn chain(&self, _element: &Element, _pad: &Pad, buffer: Buffer) -> FlowResult {
        self.enqueue(Item::Buffer(buffer))?;
        self.inner.total_pushed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn sink_event(&self, _element: &Element, _pad: &Pad, event: Event) -> bool {
        self.enqueue(Item::Event(event)).is_ok()
    }

    fn change_state(
        &self,
        element: &Element,
        transition: StateChange,
    ) -> std::result::Result<(), StateChangeError> {
        match transition {
            StateChange::ReadyToPaused => self.start(element),
            StateChange::PausedToReady => {
                self.stop(element);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn set_property(&self, element: &Element, name: &str, value: PropertyValue) -> Result<()> {
        match name {
            "max-size-buffers" => {
                let max = value
                    .as_u64()
                    .filter(|max| *max > 0)
                    .ok_or_else(|| PropertyValue::invalid(name, "positive integer"))?;
                self.inner.state.lock().unwrap().max_buffers = max as usize;
                self.inner.not_full.notify_all();
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
            "max-size-buffers" => {
                Some((self.inner.state.lock().unwrap().max_buffers as u64).into())
            }
            "current-level-buffers" => Some((self.stats().current_level as u64).into()),
            _ => None,
        }
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.set_flushing(true);
        if let Some(handle) = self.worker.get_mut().unwrap().take() {
            if handle.thread().id() != thread::current().id() {
                join_worker(handle);
            }
        }
    }
}

/// Wait for a streaming thread that was told to stop.
fn join_worker(handle: JoinHandle<()>) {
    let thread = handle.thread().name().unwrap_or("queue").to_string();
    if handle.join().is_err() {
        tracing::error!(%thread, "queue thread panicked");
    }
}
