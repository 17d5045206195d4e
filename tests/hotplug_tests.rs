//! Integration tests for hot-plugging branches on a streaming graph.
//!
//! These tests run a real decoder thread feeding the fan-out host and attach
//! or remove branches while buffers are flowing.

use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use teeswap::element::{Element, ProbeReturn, State};
use teeswap::hotplug::{Branch, FanOutHost, Mutator, Progress, RecordingObserver, handle_idle};
use teeswap::pipeline::{ElementFactory, Pipeline};

// ============================================================================
// Helpers
// ============================================================================

/// A playing `pipeline ! playbin` with the host as video sink.
fn playing_graph(uri: &str) -> (Pipeline, Arc<FanOutHost>) {
    let factory = ElementFactory::new();
    let pipeline = Pipeline::new(None);
    let playbin = factory.make("playbin", None).unwrap();
    playbin.set_property("uri", uri).unwrap();

    let host = Arc::new(FanOutHost::new(factory).unwrap());
    playbin.set_property("video-sink", host.bin()).unwrap();
    pipeline.add(&playbin).unwrap();
    pipeline.set_state(State::Playing).unwrap();
    (pipeline, host)
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn rendered(element: &Element) -> u64 {
    element.property("num-rendered").unwrap().as_u64().unwrap()
}

fn child_names(bin: &Element) -> BTreeSet<String> {
    bin.children().iter().map(|c| c.name().to_string()).collect()
}

// ============================================================================
// Attach / detach under live data flow
// ============================================================================

/// Linked tee outputs go 1 -> 2 -> 1 over one attach/remove cycle.
#[test]
fn test_linked_outputs_follow_branch_lifecycle() {
    let (pipeline, host) = playing_graph("test://?duration=30&fps=50&size=256");
    assert_eq!(host.linked_output_count(), 1);

    let branch = Branch::attach(&host).unwrap();
    assert_eq!(host.linked_output_count(), 2);

    let sink = branch.elements().unwrap().sink;
    assert!(wait_for(|| rendered(&sink) > 0), "branch never rendered");

    let observer = Arc::new(RecordingObserver::new());
    assert!(branch.begin_remove(&host, observer.clone()));
    assert!(wait_for(|| observer.count(Progress::Removed) == 1));

    assert_eq!(host.linked_output_count(), 1);
    assert!(!branch.is_attached());
    assert!(branch.is_removing());
    assert_eq!(sink.state(), State::Null);
    assert!(sink.parent().is_none());

    // The keep-alive output keeps consuming.
    let keepalive = host.keepalive_sink().clone();
    let before = rendered(&keepalive);
    assert!(wait_for(|| rendered(&keepalive) > before));

    pipeline.set_state(State::Null).unwrap();
}

/// Attaching and removing a branch leaves the host as it was.
#[test]
fn test_attach_then_remove_restores_structure() {
    let (pipeline, host) = playing_graph("test://?duration=30&fps=50&size=256");
    let names = child_names(host.bin());
    let pads = host.tee().src_pads();

    let branch = Branch::attach(&host).unwrap();
    assert_eq!(host.bin().children().len(), names.len() + 3);

    let observer = Arc::new(RecordingObserver::new());
    branch.begin_remove(&host, observer.clone());
    assert!(wait_for(|| observer.count(Progress::Removed) == 1));

    assert_eq!(child_names(host.bin()), names);
    assert_eq!(host.tee().src_pads(), pads);

    pipeline.set_state(State::Null).unwrap();
}

/// Only the idle callback holds the branch once removal started, and it lets go.
#[test]
fn test_branch_references_are_released() {
    let (pipeline, host) = playing_graph("test://?duration=30&fps=50&size=256");

    let branch = Branch::attach(&host).unwrap();
    let sink = branch.elements().unwrap().sink.downgrade();
    let observer = Arc::new(RecordingObserver::new());
    branch.begin_remove(&host, observer.clone());
    assert!(wait_for(|| observer.count(Progress::Removed) == 1));

    assert!(wait_for(|| Arc::strong_count(&branch) == 1));
    assert!(sink.upgrade().is_none());

    pipeline.set_state(State::Null).unwrap();
}

// ============================================================================
// Idempotence
// ============================================================================

/// A second removal request installs nothing.
#[test]
fn test_begin_remove_twice() {
    let (pipeline, host) = playing_graph("test://?duration=30&fps=50&size=256");
    let branch = Branch::attach(&host).unwrap();
    let observer = Arc::new(RecordingObserver::new());

    assert!(branch.begin_remove(&host, observer.clone()));
    assert!(!branch.begin_remove(&host, observer.clone()));
    assert!(wait_for(|| observer.count(Progress::Removed) == 1));

    thread::sleep(Duration::from_millis(100));
    assert_eq!(observer.count(Progress::Removed), 1);
    assert_eq!(host.linked_output_count(), 1);

    pipeline.set_state(State::Null).unwrap();
}

/// Running the teardown body twice tears the branch down once.
#[test]
fn test_teardown_body_twice() {
    let (pipeline, host) = playing_graph("test://?duration=30&fps=50&size=256");
    let branch = Branch::attach(&host).unwrap();
    let observer = RecordingObserver::new();
    let weak = Arc::downgrade(&host);

    assert_eq!(
        handle_idle(&branch, &weak, &observer),
        ProbeReturn::Remove
    );
    assert_eq!(
        handle_idle(&branch, &weak, &observer),
        ProbeReturn::Ok
    );
    assert_eq!(observer.count(Progress::Removed), 1);
    assert_eq!(host.tee().src_pads().len(), 1);

    pipeline.set_state(State::Null).unwrap();
}

/// Two streaming threads racing into the teardown body tear down once.
#[test]
fn test_teardown_body_on_two_threads() {
    let (pipeline, host) = playing_graph("test://?duration=30&fps=50&size=256");
    let pads = host.tee().src_pads();

    for _ in 0..20 {
        let branch = Branch::attach(&host).unwrap();
        let observer = RecordingObserver::new();
        let weak = Arc::downgrade(&host);
        let barrier = Barrier::new(2);

        let teardown = || {
            barrier.wait();
            handle_idle(&branch, &weak, &observer)
        };
        let results = thread::scope(|scope| {
            let first = scope.spawn(teardown);
            let second = scope.spawn(teardown);
            [first.join().unwrap(), second.join().unwrap()]
        });

        let removed = results.iter().filter(|r| **r == ProbeReturn::Remove).count();
        assert_eq!(removed, 1, "{results:?}");
        assert_eq!(observer.count(Progress::Removed), 1);
        assert!(!branch.is_attached());
        assert_eq!(host.tee().src_pads(), pads);
        assert_eq!(host.linked_output_count(), 1);
    }

    pipeline.set_state(State::Null).unwrap();
}

// ============================================================================
// Mutator
// ============================================================================

/// N ticks give ceil(N/2) adds and floor(N/2) removes.
#[test]
fn test_mutator_ticks_while_playing() {
    let (pipeline, host) = playing_graph("test://?duration=30&fps=50&size=256");
    let observer = Arc::new(RecordingObserver::new());
    let mut mutator = Mutator::new(host.clone(), pipeline.element().clone(), observer.clone(), None);

    for _ in 0..7 {
        assert!(mutator.tick().is_continue());
        thread::sleep(Duration::from_millis(30));
    }

    assert_eq!(observer.count(Progress::Add), 4);
    assert_eq!(observer.count(Progress::Added), 4);
    assert_eq!(observer.count(Progress::Remove), 3);
    assert!(wait_for(|| observer.count(Progress::Removed) == 3));
    assert_eq!(mutator.len(), 1);
    assert_eq!(host.linked_output_count(), 2);

    pipeline.set_state(State::Null).unwrap();
}
