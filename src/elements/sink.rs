//! Shared behaviour of terminal elements.

use crate::buffer::Buffer;
use crate::element::{Element, PropertyValue, StateChange};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::pipeline::Message;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Longest a single buffer may be held back for synchronisation.
const MAX_SYNC_WAIT: Duration = Duration::from_secs(1);

/// Rendering clock and statistics of a sink.
///
/// With `sync` enabled, a buffer is rendered when its timestamp is due: the
/// first buffer after starting anchors stream time to the wall clock, every
/// later one waits until `anchor + (pts - first_pts)`. Waiting only happens
/// while the sink is `Playing` and is cut short when it leaves that state.
pub(crate) struct BaseSink {
    sync: AtomicBool,
    clock: Mutex<ClockState>,
    wakeup: Condvar,
    rendered: AtomicU64,
    bytes: AtomicU64,
}

#[derive(Default)]
struct ClockState {
    playing: bool,
    anchor: Option<(Instant, Duration)>,
}

impl BaseSink {
    pub(crate) fn new(sync: bool) -> Self {
        Self {
            sync: AtomicBool::new(sync),
            clock: Mutex::new(ClockState::default()),
            wakeup: Condvar::new(),
            rendered: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    pub(crate) fn rendered(&self) -> u64 {
        self.rendered.load(Ordering::Relaxed)
    }

    /// Wait until `buffer` is due, then count it as rendered.
    pub(crate) fn render(&self, buffer: &Buffer) {
        if self.sync.load(Ordering::Relaxed) {
            self.wait_until_due(buffer.pts());
        }
        self.rendered.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(buffer.len() as u64, Ordering::Relaxed);
    }

    fn wait_until_due(&self, pts: Duration) {
        let mut clock = self.clock.lock().unwrap();
        if !clock.playing {
            return;
        }
        let now = Instant::now();
        let (anchor, first_pts) = *clock.anchor.get_or_insert((now, pts));
        let deadline = (anchor + pts.saturating_sub(first_pts)).min(now + MAX_SYNC_WAIT);

        while clock.playing {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            clock = self.wakeup.wait_timeout(clock, deadline - now).unwrap().0;
        }
    }

    /// Handle an event reaching the sink.
    pub(crate) fn event(&self, element: &Element, event: Event) -> bool {
        match event {
            Event::Eos => {
                element.mark_eos();
                tracing::debug!(element = %element.name(), rendered = self.rendered(), "sink got eos");
                element.post_message(Message::Eos {
                    src: element.path_string(),
                });
                true
            }
            Event::StreamStart { stream_id } => {
                tracing::trace!(element = %element.name(), %stream_id, "stream started");
                true
            }
        }
    }

    pub(crate) fn change_state(&self, transition: StateChange) {
        let mut clock = self.clock.lock().unwrap();
        match transition {
            StateChange::PausedToPlaying => clock.playing = true,
            StateChange::PlayingToPaused => {
                clock.playing = false;
                self.wakeup.notify_all();
            }
            StateChange::ReadyToPaused | StateChange::PausedToReady => clock.anchor = None,
            _ => {}
        }
    }

    /// Properties common to all sinks. Returns `None` if `name` is not one.
    pub(crate) fn set_property(&self, name: &str, value: &PropertyValue) -> Option<Result<()>> {
        match name {
            "sync" => Some(
                value
                    .as_bool()
                    .map(|sync| self.sync.store(sync, Ordering::Relaxed))
                    .ok_or_else(|| PropertyValue::invalid(name, "bool")),
            ),
            "num-rendered" => Some(Err(Error::InvalidProperty {
                property: name.to_string(),
                reason: "read-only".to_string(),
            })),
            _ => None,
        }
    }

    pub(crate) fn property(&self, name: &str) -> Option<PropertyValue> {
        match name {
            "sync" => Some(self.sync.load(Ordering::Relaxed).into()),
            "num-rendered" => Some(self.rendered().into()),
            "num-bytes" => Some(self.bytes.load(Ordering::Relaxed).into()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsynced_render_counts() {
        let sink = BaseSink::new(false);
        sink.render(&Buffer::new(vec![0u8; 10], 0));
        sink.render(&Buffer::new(vec![0u8; 6], 1));
        assert_eq!(sink.rendered(), 2);
        assert_eq!(sink.property("num-bytes").unwrap().as_u64(), Some(16));
    }

    #[test]
    fn test_sync_waits_for_timestamp() {
        let sink = BaseSink::new(true);
        sink.change_state(StateChange::PausedToPlaying);

        let start = Instant::now();
        sink.render(&Buffer::new(vec![0u8; 4], 0).with_timing(Duration::ZERO, Duration::ZERO));
        sink.render(
            &Buffer::new(vec![0u8; 4], 1)
                .with_timing(Duration::from_millis(30), Duration::from_millis(30)),
        );
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn test_no_wait_when_not_playing() {
        let sink = BaseSink::new(true);
        let start = Instant::now();
        sink.render(&Buffer::new(vec![0u8; 4], 0));
        sink.render(&Buffer::new(vec![0u8; 4], 1).with_timing(Duration::from_secs(5), Duration::ZERO));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_sync_property() {
        let sink = BaseSink::new(true);
        sink.set_property("sync", &false.into()).unwrap().unwrap();
        assert_eq!(sink.property("sync").unwrap().as_bool(), Some(false));
        assert!(sink.set_property("sync", &7u64.into()).unwrap().is_err());
        assert!(sink.set_property("num-rendered", &1u64.into()).unwrap().is_err());
        assert!(sink.set_property("nope", &true.into()).is_none());
    }
}
