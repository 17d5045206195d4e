//! Message bus from the graph to the application.
//!
//! Elements post messages from whatever thread they run on; the application
//! receives them asynchronously on its event loop.

use crate::element::State;
use std::fmt;
use tokio::sync::broadcast;

/// Messages posted on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A fatal error in an element.
    Error {
        /// Path of the posting element.
        src: String,
        /// Human readable error text.
        error: String,
        /// Optional extra detail for developers.
        debug: Option<String>,
    },

    /// A non-fatal issue.
    Warning {
        /// Path of the posting element.
        src: String,
        /// Human readable warning text.
        error: String,
        /// Optional extra detail for developers.
        debug: Option<String>,
    },

    /// All sinks of the pipeline received end-of-stream.
    Eos {
        /// Path of the pipeline.
        src: String,
    },

    /// An element completed a state transition.
    StateChanged {
        /// Path of the element.
        src: String,
        /// State before the transition.
        old: State,
        /// State after the transition.
        new: State,
    },
}

impl Message {
    /// Path of the element that posted the message.
    pub fn src(&self) -> &str {
        match self {
            Message::Error { src, .. }
            | Message::Warning { src, .. }
            | Message::Eos { src }
            | Message::StateChanged { src, .. } => src,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Error { src, error, .. } => write!(f, "error from {}: {}", src, error),
            Message::Warning { src, error, .. } => write!(f, "warning from {}: {}", src, error),
            Message::Eos { src } => write!(f, "eos from {}", src),
            Message::StateChanged { src, old, new } => {
                write!(f, "{}: state changed {} -> {}", src, old, new)
            }
        }
    }
}

/// Sending side of the bus, owned by the pipeline.
///
/// Errors, warnings and end-of-stream travel on their own channel, apart from
/// state changes. A burst of state changes can overflow a slow receiver, but
/// it never pushes a terminal message out.
#[derive(Clone)]
pub struct Bus {
    terminal: broadcast::Sender<Message>,
    state: broadcast::Sender<Message>,
}

impl Bus {
    /// Create a bus buffering up to `capacity` messages of each kind per
    /// receiver.
    pub fn new(capacity: usize) -> Self {
        let (terminal, _) = broadcast::channel(capacity);
        let (state, _) = broadcast::channel(capacity);
        Self { terminal, state }
    }

    /// Post a message.
    ///
    /// Returns the number of receivers that got it; 0 when nobody listens.
    pub fn post(&self, message: Message) -> usize {
        let sender = match message {
            Message::StateChanged { .. } => &self.state,
            _ => &self.terminal,
        };
        sender.send(message).unwrap_or(0)
    }

    /// Create a receiver. It sees messages posted from now on.
    pub fn subscribe(&self) -> BusReceiver {
        BusReceiver {
            terminal: self.terminal.subscribe(),
            state: self.state.subscribe(),
        }
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("receivers", &self.terminal.receiver_count())
            .finish()
    }
}

/// Receiving side of the bus.
///
/// Pending errors, warnings and end-of-stream are delivered ahead of pending
/// state changes.
pub struct BusReceiver {
    terminal: broadcast::Receiver<Message>,
    state: broadcast::Receiver<Message>,
}

impl BusReceiver {
    /// Receive the next message.
    ///
    /// Returns `None` once the bus has been dropped.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            tokio::select! {
                biased;
                result = self.terminal.recv() => match result {
                    Ok(message) => return Some(message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::error!(skipped, "bus receiver lagged, terminal messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
                result = self.state.recv() => match result {
                    Ok(message) => return Some(message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "bus receiver lagged, state changes dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Receive a message without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        Self::try_recv_from(&mut self.terminal).or_else(|| Self::try_recv_from(&mut self.state))
    }

    fn try_recv_from(receiver: &mut broadcast::Receiver<Message>) -> Option<Message> {
        loop {
            match receiver.try_recv() {
                Ok(message) => return Some(message),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Wait for end-of-stream or an error.
    ///
    /// Returns `Ok(())` on EOS and the error message on error.
    pub async fn wait_eos(&mut self) -> Result<(), Message> {
        while let Some(message) = self.recv().await {
            match message {
                Message::Eos { .. } => return Ok(()),
                Message::Error { .. } => return Err(message),
                _ => continue,
            }
        }
        Err(Message::Error {
            src: String::new(),
            error: "bus closed".to_string(),
            debug: None,
        })
    }
}
