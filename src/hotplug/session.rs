//! Session supervisor: owns the graph and runs the event loop.

use super::host::FanOutHost;
use super::mutator::Mutator;
use super::progress::{Observer, Progress, StdoutObserver};
use crate::config::SessionConfig;
use crate::element::{Element, State};
use crate::error::{Result, StateChangeError};
use crate::observability::span_session;
use crate::pipeline::{BusReceiver, ElementFactory, Message, Pipeline};
use std::io::Write;
use std::sync::Arc;
use tokio::time::{Instant, interval_at};
use tracing::Instrument;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Every sink reached end-of-stream.
    Eos,
    /// An element posted an error.
    Error {
        /// Path of the element that failed.
        src: String,
        /// Error text.
        message: String,
        /// Optional detail.
        debug: Option<String>,
    },
    /// The bus went away before anything terminal arrived.
    BusClosed,
    /// The graph refused to start and nothing was posted about it.
    StartFailed(StateChangeError),
}

impl Termination {
    /// Whether the session ended on an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Termination::Error { .. } | Termination::StartFailed(_))
    }
}

/// One run of the controller over one source.
///
/// Builds `pipeline ! playbin(video-sink = fan-out host)` up front; nothing
/// streams until [`run`](Self::run).
pub struct Session {
    config: SessionConfig,
    pipeline: Pipeline,
    playbin: Element,
    host: Arc<FanOutHost>,
    bus: BusReceiver,
    mutator: Mutator,
    observer: Arc<dyn Observer>,
}

impl Session {
    /// Build a session reporting progress on stdout.
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_observer(config, Arc::new(StdoutObserver))
    }

    /// Build a session reporting progress to `observer`.
    pub fn with_observer(config: SessionConfig, observer: Arc<dyn Observer>) -> Result<Self> {
        Self::with_factory(config, ElementFactory::new(), observer)
    }

    /// Build a session whose elements come from `factory`.
    pub fn with_factory(
        config: SessionConfig,
        factory: ElementFactory,
        observer: Arc<dyn Observer>,
    ) -> Result<Self> {
        let pipeline = Pipeline::new(None);
        let playbin = factory.make("playbin", None)?;
        playbin.set_property("uri", config.uri.as_str())?;

        let host = Arc::new(FanOutHost::new(factory)?);
        playbin.set_property("video-sink", host.bin())?;
        pipeline.add(&playbin)?;

        let bus = pipeline.subscribe();
        let mutator = Mutator::new(
            Arc::clone(&host),
            pipeline.element().clone(),
            Arc::clone(&observer),
            config.dump_dir.clone(),
        );

        tracing::debug!(uri = %config.uri, pipeline = %pipeline.name(), "session built");
        Ok(Self {
            config,
            pipeline,
            playbin,
            host,
            bus,
            mutator,
            observer,
        })
    }

    /// The top-level graph.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// The decoder.
    pub fn playbin(&self) -> &Element {
        &self.playbin
    }

    /// The fan-out host.
    pub fn host(&self) -> &Arc<FanOutHost> {
        &self.host
    }

    /// Play until end-of-stream or the first error, then shut down.
    ///
    /// Must be polled from a tokio runtime with timers enabled. Bus messages
    /// win over a timer tick that is due at the same time, so a terminal
    /// message is acted on within one loop iteration.
    ///
    /// If the graph cannot reach `Playing`, no branch is ever attached: the
    /// session ends with the error the failing element posted, or with
    /// [`Termination::StartFailed`] when it posted none.
    pub async fn run(mut self) -> Termination {
        let span = span_session(&self.config.uri);
        async move {
            if let Err(err) = self.pipeline.set_state(State::Playing) {
                tracing::warn!(error = %err, "pipeline did not reach playing");
                let termination = self.start_failure(err);
                self.shutdown();
                return termination;
            }

            let period = self.config.interval;
            let mut ticker = interval_at(Instant::now() + period, period);
            let mut ticking = true;

            let termination = loop {
                tokio::select! {
                    biased;
                    message = self.bus.recv() => match message {
                        Some(message) => {
                            if let Some(termination) = self.handle_message(message) {
                                break termination;
                            }
                        }
                        None => break Termination::BusClosed,
                    },
                    _ = ticker.tick(), if ticking => {
                        ticking = self.mutator.tick().is_continue();
                    }
                }
            };

            self.shutdown();
            termination
        }
        .instrument(span)
        .await
    }

    /// Collect what the graph posted while failing to start.
    fn start_failure(&mut self, err: StateChangeError) -> Termination {
        while let Some(message) = self.bus.try_recv() {
            if let Some(termination) = self.handle_message(message) {
                return termination;
            }
        }
        report(&err.element, &err.to_string(), None);
        Termination::StartFailed(err)
    }

    fn handle_message(&self, message: Message) -> Option<Termination> {
        match message {
            Message::Error { src, error, debug } => {
                report(&src, &error, debug.as_deref());
                Some(Termination::Error {
                    src,
                    message: error,
                    debug,
                })
            }
            Message::Warning { src, error, debug } => {
                report(&src, &error, debug.as_deref());
                None
            }
            Message::Eos { .. } => {
                let played = self.pipeline.base_time().map(|base| base.elapsed());
                tracing::info!(?played, "end of stream");
                self.observer.notify(Progress::Eos);
                Some(Termination::Eos)
            }
            Message::StateChanged { .. } => None,
        }
    }

    fn shutdown(&mut self) {
        if let Err(err) = self.pipeline.set_state(State::Null) {
            tracing::warn!(error = %err, "pipeline did not shut down cleanly");
        }
        self.host.release_keepalive();
        tracing::debug!(live_branches = self.mutator.len(), "session shut down");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline.name())
            .field("mutator", &self.mutator)
            .finish()
    }
}

fn report(src: &str, error: &str, debug: Option<&str>) {
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err, "ERROR: from element {src}: {error}");
    if let Some(debug) = debug {
        let _ = writeln!(err, "Additional debug info:\n{debug}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementImpl, PadTemplate, PropertyValue, StateChange};
    use crate::hotplug::progress::RecordingObserver;
    use std::time::Duration;

    /// A sink that refuses to pause without telling anyone.
    struct StuckSink;

    impl ElementImpl for StuckSink {
        fn pad_templates(&self) -> Vec<PadTemplate> {
            vec![PadTemplate::input("sink")]
        }

        fn is_sink(&self) -> bool {
            true
        }

        fn change_state(
            &self,
            element: &Element,
            transition: StateChange,
        ) -> std::result::Result<(), StateChangeError> {
            match transition {
                StateChange::ReadyToPaused => Err(StateChangeError {
                    element: element.name().to_string(),
                    transition,
                }),
                _ => Ok(()),
            }
        }

        fn set_property(&self, _element: &Element, _name: &str, _value: PropertyValue) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_session_layout() {
        let observer = Arc::new(RecordingObserver::new());
        let session = Session::with_observer(SessionConfig::new("test://"), observer).unwrap();

        let sink = session.playbin().property("video-sink").unwrap();
        assert_eq!(sink.as_element(), Some(session.host().bin()));
        assert_eq!(session.playbin().parent().as_ref(), Some(session.pipeline().element()));
        assert_eq!(session.pipeline().state(), State::Null);
    }

    #[test]
    fn test_missing_decoder_fails_construction() {
        let mut factory = ElementFactory::new();
        factory.unregister("playbin");
        let observer = Arc::new(RecordingObserver::new());
        let result = Session::with_factory(SessionConfig::default(), factory, observer);
        assert!(matches!(result, Err(crate::Error::NoSuchFactory(_))));
    }

    #[tokio::test]
    async fn test_short_source_ends_with_eos() {
        let observer = Arc::new(RecordingObserver::new());
        let config = SessionConfig::new("test://?duration=1&fps=20&size=64")
            .interval(Duration::from_millis(150));
        let session = Session::with_observer(config, observer.clone()).unwrap();
        let pipeline = session.pipeline().element().clone();

        let termination = session.run().await;

        assert_eq!(termination, Termination::Eos);
        assert_eq!(observer.events().last(), Some(&Progress::Eos));
        assert!(observer.count(Progress::Add) >= 1);
        assert_eq!(pipeline.state(), State::Null);
    }

    #[tokio::test]
    async fn test_silent_start_failure_ends_session() {
        let mut factory = ElementFactory::new();
        factory.register("fakesink", |name, factory_name| {
            Element::new(name, factory_name, Box::new(StuckSink))
        });
        let observer = Arc::new(RecordingObserver::new());
        let config = SessionConfig::new("test://?duration=1&fps=20&size=64")
            .interval(Duration::from_millis(50));
        let session = Session::with_factory(config, factory, observer.clone()).unwrap();
        let pipeline = session.pipeline().element().clone();
        let keepalive = session.host().keepalive_sink().name().to_string();

        let termination = tokio::time::timeout(Duration::from_secs(5), session.run())
            .await
            .expect("session kept running after a failed start");

        match &termination {
            Termination::StartFailed(err) => {
                assert_eq!(err.transition, StateChange::ReadyToPaused);
                assert_eq!(err.element, keepalive);
            }
            other => panic!("expected a start failure, got {other:?}"),
        }
        assert!(termination.is_error());
        assert!(observer.events().is_empty());
        assert_eq!(pipeline.state(), State::Null);
    }
}
