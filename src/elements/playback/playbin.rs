//! PlayBin - decodes a URI into a video sink.

use super::source::{MediaSource, SourceError, SourceLocation};
use crate::element::{
    Element, ElementImpl, Pad, PadDirection, PropertyValue, StateChange, WeakElement,
};
use crate::elements::AutoVideoSink;
use crate::error::{Error, FlowError, Result, StateChangeError};
use crate::event::Event;
use crate::pipeline::factory;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A self-contained player: reads the media behind `uri` and pushes decoded
/// frames into `video-sink`.
///
/// The video sink becomes a child of the playbin and is fed through an
/// internal output pad. If no sink has been set when the playbin leaves
/// `Null`, an `autovideosink` is created.
///
/// The source is opened on `Ready -> Paused`; failure to open is posted as an
/// error on the bus and fails the state change. Frames are pushed in real
/// time from a streaming thread that runs while the playbin is `Playing`.
/// At the end of the media an EOS event follows the last frame.
///
/// Properties:
///
/// | Name | Type |
/// |------|------|
/// | `uri` | string |
/// | `video-sink` | element |
pub struct PlayBin {
    settings: Mutex<Settings>,
    /// Internal pad feeding the video sink. Not part of the element's pads.
    video_src: Pad,
    /// Opened source while not streaming.
    source: Mutex<Option<MediaSource>>,
    task: Mutex<Option<JoinHandle<MediaSource>>>,
    control: Arc<TaskControl>,
}

#[derive(Default)]
struct Settings {
    uri: Option<String>,
    video_sink: Option<Element>,
}

/// Stop flag of the streaming thread, waitable so pacing sleeps can be cut
/// short.
#[derive(Default)]
struct TaskControl {
    stopping: Mutex<bool>,
    wakeup: Condvar,
}

impl TaskControl {
    fn reset(&self) {
        *self.stopping.lock().unwrap() = false;
    }

    fn stop(&self) {
        *self.stopping.lock().unwrap() = true;
        self.wakeup.notify_all();
    }

    /// Sleep until `deadline`. Returns `false` if stopped meanwhile.
    fn wait_until(&self, deadline: Instant) -> bool {
        let mut stopping = self.stopping.lock().unwrap();
        loop {
            if *stopping {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            stopping = self.wakeup.wait_timeout(stopping, deadline - now).unwrap().0;
        }
    }
}

impl PlayBin {
    /// Create a new playbin.
    pub fn new() -> Self {
        Self {
            settings: Mutex::new(Settings::default()),
            video_src: Pad::new("video_src", PadDirection::Output),
            source: Mutex::new(None),
            task: Mutex::new(None),
            control: Arc::new(TaskControl::default()),
        }
    }

    fn set_video_sink(&self, element: &Element, sink: &Element) -> Result<()> {
        let sink_pad = sink.static_pad("sink").ok_or_else(|| Error::NoSuchPad {
            element: sink.name().to_string(),
            pad: "sink".to_string(),
        })?;

        let mut settings = self.settings.lock().unwrap();
        if let Some(old) = settings.video_sink.take() {
            self.video_src.unlink_peer();
            if let Err(err) = element.remove(&old) {
                tracing::warn!(element = %element.name(), error = %err, "failed to remove old video sink");
            }
        }

        element.add(sink)?;
        if let Err(reason) = self.video_src.link(&sink_pad) {
            let _ = element.remove(sink);
            return Err(Error::Link {
                src: self.video_src.path(),
                sink: sink_pad.path(),
                reason,
            });
        }
        settings.video_sink = Some(sink.clone());
        tracing::debug!(element = %element.name(), sink = %sink.name(), "video sink set");
        Ok(())
    }

    fn ensure_video_sink(&self, element: &Element) -> Result<()> {
        if self.settings.lock().unwrap().video_sink.is_some() {
            return Ok(());
        }
        let sink = Element::new(
            factory::unique_name("autovideosink"),
            "autovideosink",
            Box::new(AutoVideoSink::new()),
        );
        self.set_video_sink(element, &sink)
    }

    fn open(&self, element: &Element) -> std::result::Result<(), SourceError> {
        let uri = self.settings.lock().unwrap().uri.clone();
        let uri = uri.ok_or_else(|| SourceError::InvalidUri {
            uri: String::new(),
            reason: "no uri set".to_string(),
        })?;
        let source = SourceLocation::parse(&uri)?.open()?;
        tracing::info!(element = %element.name(), %uri, "opened source");
        *self.source.lock().unwrap() = Some(source);
        Ok(())
    }

    fn start(&self, element: &Element) -> std::result::Result<(), StateChangeError> {
        let failed = || StateChangeError {
            element: element.name().to_string(),
            transition: StateChange::PausedToPlaying,
        };
        let source = self.source.lock().unwrap().take().ok_or_else(failed)?;

        self.control.reset();
        let control = self.control.clone();
        let pad = self.video_src.clone();
        let owner = element.downgrade();
        let handle = thread::Builder::new()
            .name(format!("{}:src", element.name()))
            .spawn(move || stream(source, pad, owner, control))
            .map_err(|err| {
                tracing::error!(element = %element.name(), error = %err, "failed to spawn streaming thread");
                failed()
            })?;
        *self.task.lock().unwrap() = Some(handle);
        Ok(())
    }

    fn stop(&self, element: &Element) {
        self.control.stop();
        let Some(handle) = self.task.lock().unwrap().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            tracing::warn!(element = %element.name(), "playbin stopped from its own streaming thread");
            return;
        }
        match handle.join() {
            Ok(source) => *self.source.lock().unwrap() = Some(source),
            Err(_) => tracing::error!(element = %element.name(), "streaming thread panicked"),
        }
    }
}

/// Streaming thread body. Hands the source back when it returns.
fn stream(
    mut source: MediaSource,
    pad: Pad,
    owner: WeakElement,
    control: Arc<TaskControl>,
) -> MediaSource {
    let path = owner.upgrade().map(|e| e.path_string()).unwrap_or_default();
    let _span = crate::observability::instrument_element(&path, "playbin");

    if source.position() == 0 {
        pad.push_event(Event::stream_start(format!("{}/video", path)));
    }
    let start = Instant::now()
        .checked_sub(source.next_pts())
        .unwrap_or_else(Instant::now);

    loop {
        if !control.wait_until(start + source.next_pts()) {
            tracing::debug!("streaming paused");
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(frames = source.position(), "end of media");
                pad.push_event(Event::Eos);
                // Nothing left to push; park until stopped.
                while control.wait_until(Instant::now() + Duration::from_secs(3600)) {}
                break;
            }
            Err(err) => {
                tracing::error!(error = %err, "source failed");
                if let Some(element) = owner.upgrade() {
                    element.post_error(err.to_string(), err.debug_info());
                }
                break;
            }
        };

        crate::observability::trace_buffer_produced(&path, frame.len(), frame.sequence());
        match pad.push(frame) {
            Ok(()) => {}
            Err(FlowError::Flushing) => {
                tracing::debug!("downstream flushing, stopping");
                break;
            }
            Err(FlowError::Eos) => break,
            Err(reason @ (FlowError::NotLinked | FlowError::Error)) => {
                tracing::warn!(%reason, "streaming stopped");
                if let Some(element) = owner.upgrade() {
                    element.post_error(
                        "Internal data stream error.",
                        Some(format!("streaming stopped, reason {}", reason)),
                    );
                }
                break;
            }
        }
    }

    source
}

impl Default for PlayBin {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementImpl for PlayBin {
    fn is_bin(&self) -> bool {
        true
    }

    fn constructed(&self, element: &Element) {
        self.video_src.set_parent(Some(element));
    }

    fn change_state(
        &self,
        element: &Element,
        transition: StateChange,
    ) -> std::result::Result<(), StateChangeError> {
        match transition {
            StateChange::NullToReady => {
                self.ensure_video_sink(element).map_err(|err| {
                    tracing::error!(element = %element.name(), error = %err, "no video sink");
                    StateChangeError {
                        element: element.name().to_string(),
                        transition,
                    }
                })?;
            }
            StateChange::ReadyToPaused => {
                if let Err(err) = self.open(element) {
                    tracing::error!(element = %element.name(), error = %err, "failed to open source");
                    element.post_error(err.to_string(), err.debug_info());
                    return Err(StateChangeError {
                        element: element.name().to_string(),
                        transition,
                    });
                }
                self.video_src.set_active(true);
            }
            StateChange::PausedToPlaying => self.start(element)?,
            StateChange::PlayingToPaused => self.stop(element),
            StateChange::PausedToReady => {
                self.video_src.set_active(false);
                *self.source.lock().unwrap() = None;
            }
            StateChange::ReadyToNull => {}
        }
        Ok(())
    }

    fn set_property(&self, element: &Element, name: &str, value: PropertyValue) -> Result<()> {
        match name {
            "uri" => {
                let uri = value
                    .as_str()
                    .ok_or_else(|| PropertyValue::invalid(name, "string"))?;
                self.settings.lock().unwrap().uri = Some(uri.to_string());
                Ok(())
            }
            "video-sink" => {
                let sink = value
                    .as_element()
                    .ok_or_else(|| PropertyValue::invalid(name, "element"))?;
                self.set_video_sink(element, sink)
            }
            _ => Err(Error::NoSuchProperty {
                element: element.name().to_string(),
                property: name.to_string(),
            }),
        }
    }

    fn property(&self, name: &str) -> Option<PropertyValue> {
        let settings = self.settings.lock().unwrap();
        match name {
            "uri" => settings.uri.clone().map(PropertyValue::from),
            "video-sink" => settings.video_sink.clone().map(PropertyValue::from),
            _ => None,
        }
    }
}

impl Drop for PlayBin {
    fn drop(&mut self) {
        self.control.stop();
        if let Some(handle) = self.task.get_mut().unwrap().take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::element::State;
    use crate::pipeline::{ElementFactory, Message, Pipeline};
    use std::time::Duration;

    #[test]
    fn test_video_sink_becomes_child() {
        let factory = ElementFactory::new();
        let playbin = factory.make("playbin", None).unwrap();
        let sink = factory.make("fakesink", None).unwrap();

        playbin.set_property("video-sink", &sink).unwrap();
        assert_eq!(sink.parent(), Some(playbin.clone()));
        assert!(sink.static_pad("sink").unwrap().is_linked());
        assert_eq!(
            playbin.property("video-sink").unwrap().as_element(),
            Some(&sink)
        );

        let other = factory.make("fakesink", None).unwrap();
        playbin.set_property("video-sink", &other).unwrap();
        assert!(sink.parent().is_none());
        assert!(!sink.static_pad("sink").unwrap().is_linked());
        assert_eq!(playbin.children(), vec![other]);
    }

    #[test]
    fn test_default_video_sink() {
        let playbin = ElementFactory::new().make("playbin", None).unwrap();
        playbin.set_property("uri", "test://?duration=0").unwrap();
        playbin.set_state(State::Ready).unwrap();
        let sink = playbin.property("video-sink").unwrap();
        assert_eq!(sink.as_element().unwrap().factory_name(), "autovideosink");
        playbin.set_state(State::Null).unwrap();
    }

    #[tokio::test]
    async fn test_plays_to_eos() {
        let factory = ElementFactory::new();
        let pipeline = Pipeline::new(None);
        let playbin = factory.make("playbin", None).unwrap();
        let sink = factory.make("fakesink", None).unwrap();
        playbin
            .set_property("uri", "test://?duration=0.2&fps=50&size=32")
            .unwrap();
        playbin.set_property("video-sink", &sink).unwrap();
        pipeline.add(&playbin).unwrap();

        let mut bus = pipeline.subscribe();
        pipeline.set_state(State::Playing).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), bus.wait_eos()).await;
        assert!(matches!(result, Ok(Ok(()))));
        assert_eq!(sink.property("num-rendered").unwrap().as_u64(), Some(10));

        pipeline.set_state(State::Null).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_posts_error() {
        let factory = ElementFactory::new();
        let pipeline = Pipeline::new(None);
        let playbin = factory.make("playbin", None).unwrap();
        playbin
            .set_property("uri", "file:///nonexistent/teeswap/missing.raw")
            .unwrap();
        playbin
            .set_property("video-sink", &factory.make("fakesink", None).unwrap())
            .unwrap();
        pipeline.add(&playbin).unwrap();

        let mut bus = pipeline.subscribe();
        assert!(pipeline.set_state(State::Playing).is_err());

        let err = bus.wait_eos().await.unwrap_err();
        match err {
            Message::Error { src, error, debug } => {
                assert_eq!(src, playbin.path_string());
                assert_eq!(error, "Resource not found.");
                assert!(debug.unwrap().contains("missing.raw"));
            }
            other => panic!("unexpected message {:?}", other),
        }

        pipeline.set_state(State::Null).unwrap();
    }

    #[test]
    fn test_wrong_property_types() {
        let playbin = ElementFactory::new().make("playbin", None).unwrap();
        assert!(playbin.set_property("uri", true).is_err());
        assert!(playbin.set_property("video-sink", "autovideosink").is_err());
        assert!(playbin.set_property("volume", 1u64).is_err());
    }
}
