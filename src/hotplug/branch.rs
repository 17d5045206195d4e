//! A hot-pluggable consumer branch on the fan-out.

use super::host::FanOutHost;
use super::progress::Observer;
use super::unlink;
use crate::element::{Element, Pad, ProbeType, State};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

static NEXT_BRANCH_ID: AtomicU64 = AtomicU64::new(0);

/// The three elements of a branch, in data-flow order.
#[derive(Debug, Clone)]
pub struct BranchElements {
    /// Decouples the branch from the fan-out's streaming thread.
    pub queue: Element,
    /// Format converter.
    pub convert: Element,
    /// Terminal consumer.
    pub sink: Element,
}

impl BranchElements {
    /// Data-flow order.
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        [&self.queue, &self.convert, &self.sink].into_iter()
    }

    /// Stop order: consumer first.
    pub(crate) fn shutdown_order(&self) -> [&Element; 3] {
        [&self.sink, &self.convert, &self.queue]
    }

    /// Undo a partial attach: take the elements out of `bin` and shut them
    /// down.
    fn discard(&self, bin: &Element) {
        for element in self.iter() {
            if element.parent().as_ref() == Some(bin) {
                let _ = bin.remove(element);
            }
        }
        for element in self.shutdown_order() {
            if let Err(err) = element.set_state(State::Null) {
                tracing::warn!(element = %element.name(), error = %err, "rollback shutdown failed");
            }
        }
    }
}

/// One queue, converter and consumer hanging off a tee request pad.
///
/// A branch holds its own strong references to its elements and to the tee
/// pad, independent of the bin it lives in. Both are given up exactly once,
/// by the idle probe installed in [`begin_remove`](Self::begin_remove).
///
/// Two latches guard removal. `remove_requested` makes `begin_remove`
/// idempotent on the control side; `removing` is flipped by the probe
/// callback and makes the teardown run once however often the probe fires.
pub struct Branch {
    id: u64,
    teepad: Mutex<Option<Pad>>,
    elements: Mutex<Option<BranchElements>>,
    remove_requested: AtomicBool,
    removing: AtomicBool,
}

impl Branch {
    /// Build a branch and hook it to the host's tee.
    ///
    /// Elements are named `vsbqueue<N>`, `vsbconv<N>` and `vsbsink<N>`. On
    /// failure everything done so far is undone: added elements leave the
    /// bin and the tee pad is released.
    pub fn attach(host: &FanOutHost) -> Result<Arc<Self>> {
        let id = NEXT_BRANCH_ID.fetch_add(1, Ordering::Relaxed);
        let tee = host.tee();
        let teepad = tee
            .request_pad_simple("src_%u")
            .ok_or_else(|| Error::Construction(format!("{} refused an output pad", tee.name())))?;

        let elements = match Self::assemble(host, &teepad, id) {
            Ok(elements) => elements,
            Err(err) => {
                tee.release_request_pad(&teepad);
                return Err(err);
            }
        };

        tracing::debug!(branch = id, pad = %teepad.name(), "branch attached");
        Ok(Arc::new(Self {
            id,
            teepad: Mutex::new(Some(teepad)),
            elements: Mutex::new(Some(elements)),
            remove_requested: AtomicBool::new(false),
            removing: AtomicBool::new(false),
        }))
    }

    fn assemble(host: &FanOutHost, teepad: &Pad, id: u64) -> Result<BranchElements> {
        let factory = host.factory();
        let elements = BranchElements {
            queue: factory.make("queue", Some(&format!("vsbqueue{id}")))?,
            convert: factory.make("videoconvert", Some(&format!("vsbconv{id}")))?,
            sink: factory.make("autovideosink", Some(&format!("vsbsink{id}")))?,
        };

        let bin = host.bin();
        if let Err(err) = bin
            .add_many(&[&elements.queue, &elements.convert, &elements.sink])
            .and_then(|()| Self::wire(teepad, &elements))
        {
            elements.discard(bin);
            return Err(err);
        }
        Ok(elements)
    }

    fn wire(teepad: &Pad, elements: &BranchElements) -> Result<()> {
        Element::link_many(&[&elements.queue, &elements.convert, &elements.sink])?;

        for element in elements.shutdown_order() {
            element.sync_state_with_parent()?;
        }

        let queue_sink = elements.queue.static_pad("sink").ok_or_else(|| Error::NoSuchPad {
            element: elements.queue.name().to_string(),
            pad: "sink".to_string(),
        })?;
        teepad.link(&queue_sink).map_err(|reason| Error::Link {
            src: teepad.path(),
            sink: queue_sink.path(),
            reason,
        })
    }

    /// Schedule the branch for removal.
    ///
    /// Installs an idle probe on the tee pad; the teardown runs once no
    /// buffer is in flight on that pad, possibly before this returns.
    /// Returns `false` if removal was already requested or the branch is
    /// gone.
    pub fn begin_remove(self: &Arc<Self>, host: &Arc<FanOutHost>, observer: Arc<dyn Observer>) -> bool {
        if self
            .remove_requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let Some(teepad) = self.teepad() else {
            return false;
        };

        let branch = Arc::clone(self);
        let host = Arc::downgrade(host);
        teepad.add_probe(ProbeType::Idle, move |_pad, _info| {
            unlink::handle_idle(&branch, &host, observer.as_ref())
        });
        true
    }

    /// Process-unique branch number.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the teardown has started.
    pub fn is_removing(&self) -> bool {
        self.removing.load(Ordering::Acquire)
    }

    /// Whether `begin_remove` was called.
    pub fn is_remove_requested(&self) -> bool {
        self.remove_requested.load(Ordering::Acquire)
    }

    /// Whether the branch still holds its pad and elements.
    pub fn is_attached(&self) -> bool {
        self.teepad.lock().unwrap().is_some()
    }

    /// The tee request pad, until teardown released it.
    pub fn teepad(&self) -> Option<Pad> {
        self.teepad.lock().unwrap().clone()
    }

    /// The branch elements, until teardown released them.
    pub fn elements(&self) -> Option<BranchElements> {
        self.elements.lock().unwrap().clone()
    }

    /// Flip the `removing` latch. Only the first caller gets `true`.
    pub(crate) fn try_start_removal(&self) -> bool {
        self.removing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn take_teepad(&self) -> Option<Pad> {
        self.teepad.lock().unwrap().take()
    }

    pub(crate) fn take_elements(&self) -> Option<BranchElements> {
        self.elements.lock().unwrap().take()
    }
}

impl std::fmt::Debug for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Branch")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .field("removing", &self.is_removing())
            .finish()
    }
}
