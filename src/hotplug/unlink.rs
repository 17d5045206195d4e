//! Idle-probe teardown of a branch.
//!
//! The callback runs on whatever thread finds the tee pad idle: the decoder's
//! streaming thread right after it handed a buffer over, or the thread that
//! installed the probe when the pad was already idle. While it runs, no data
//! can enter the pad, so the branch can be cut loose without a buffer racing
//! into half-dismantled elements. The other tee outputs keep flowing.

use super::branch::{Branch, BranchElements};
use super::host::FanOutHost;
use super::progress::{Observer, Progress};
use crate::element::{Element, Pad, ProbeReturn, State};
use std::sync::Weak;

/// Body of the idle probe installed by [`Branch::begin_remove`].
///
/// The first call flips the branch's `removing` latch and tears the branch
/// down, then asks for the probe to be removed, which drops the closure and
/// with it the probe's reference to the branch. Any later call finds the
/// latch set and changes nothing.
pub fn handle_idle(branch: &Branch, host: &Weak<FanOutHost>, observer: &dyn Observer) -> ProbeReturn {
    if !branch.try_start_removal() {
        return ProbeReturn::Ok;
    }

    unlink_branch(branch, host);
    observer.notify(Progress::Removed);
    ProbeReturn::Remove
}

fn unlink_branch(branch: &Branch, host: &Weak<FanOutHost>) {
    let teepad = branch.take_teepad();
    let elements = branch.take_elements();
    let host = host.upgrade();

    if let Some(elements) = elements {
        if let Some(teepad) = &teepad
            && let Some(queue_sink) = elements.queue.static_pad("sink")
        {
            teepad.unlink(&queue_sink);
        }

        let bin = host
            .as_ref()
            .map(|host| host.bin().clone())
            .or_else(|| elements.queue.parent());
        if let Some(bin) = bin {
            detach_elements(&bin, &elements);
        }

        for element in elements.shutdown_order() {
            if let Err(err) = element.set_state(State::Null) {
                tracing::warn!(element = %element.name(), error = %err, "failed to stop branch element");
            }
        }
        // Last strong references held by the branch go here.
        drop(elements);
    }

    if let Some(teepad) = teepad {
        release_teepad(host.as_ref().map(|host| host.tee()), teepad);
    }

    tracing::debug!(branch = branch.id(), "branch removed");
}

fn detach_elements(bin: &Element, elements: &BranchElements) {
    for element in elements.iter() {
        if let Err(err) = bin.remove(element) {
            tracing::warn!(element = %element.name(), error = %err, "branch element not in host bin");
        }
    }
}

fn release_teepad(tee: Option<&Element>, teepad: Pad) {
    match tee.cloned().or_else(|| teepad.parent()) {
        Some(tee) => tee.release_request_pad(&teepad),
        None => tracing::debug!(pad = %teepad.name(), "tee already gone"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotplug::progress::RecordingObserver;
    use crate::pipeline::ElementFactory;
    use std::sync::Arc;

    #[test]
    fn test_second_call_is_noop() {
        let host = Arc::new(FanOutHost::new(ElementFactory::new()).unwrap());
        let branch = Branch::attach(&host).unwrap();
        let observer = RecordingObserver::new();
        let weak = Arc::downgrade(&host);

        assert_eq!(handle_idle(&branch, &weak, &observer), ProbeReturn::Remove);
        assert_eq!(host.linked_output_count(), 1);
        assert_eq!(host.bin().children().len(), 3);

        assert_eq!(handle_idle(&branch, &weak, &observer), ProbeReturn::Ok);
        assert_eq!(observer.count(Progress::Removed), 1);
        assert_eq!(host.tee().src_pads().len(), 1);
    }

    #[test]
    fn test_teardown_without_host() {
        let host = Arc::new(FanOutHost::new(ElementFactory::new()).unwrap());
        let branch = Branch::attach(&host).unwrap();
        let tee = host.tee().clone();
        let bin = host.bin().clone();
        let weak = Arc::downgrade(&host);
        drop(host);

        let observer = RecordingObserver::new();
        assert_eq!(handle_idle(&branch, &weak, &observer), ProbeReturn::Remove);
        assert!(!branch.is_attached());
        assert_eq!(tee.src_pads().len(), 1);
        assert_eq!(bin.children().len(), 3);
    }
}
