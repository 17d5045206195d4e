//! Element lifecycle states.
//!
//! ```text
//! Null <──> Ready <──> Paused <──> Playing
//! ```
//!
//! Elements move one step at a time. `set_state(Playing)` on a stopped
//! element walks `NullToReady`, `ReadyToPaused` and `PausedToPlaying` in order.

use std::fmt;

/// Lifecycle state of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum State {
    /// Fully stopped, no resources held.
    #[default]
    Null,
    /// Resources allocated, no data flow.
    Ready,
    /// Pads active, streaming threads may be set up.
    Paused,
    /// Data flowing.
    Playing,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Null => "NULL",
            State::Ready => "READY",
            State::Paused => "PAUSED",
            State::Playing => "PLAYING",
        };
        f.write_str(name)
    }
}

/// A single step between two adjacent states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChange {
    /// Null -> Ready.
    NullToReady,
    /// Ready -> Paused.
    ReadyToPaused,
    /// Paused -> Playing.
    PausedToPlaying,
    /// Playing -> Paused.
    PlayingToPaused,
    /// Paused -> Ready.
    PausedToReady,
    /// Ready -> Null.
    ReadyToNull,
}

impl StateChange {
    /// The next step from `current` on the way to `target`, if any.
    pub fn towards(current: State, target: State) -> Option<Self> {
        use State::*;
        use std::cmp::Ordering;

        match current.cmp(&target) {
            Ordering::Equal => None,
            Ordering::Less => Some(match current {
                Null => StateChange::NullToReady,
                Ready => StateChange::ReadyToPaused,
                Paused | Playing => StateChange::PausedToPlaying,
            }),
            Ordering::Greater => Some(match current {
                Playing => StateChange::PlayingToPaused,
                Paused => StateChange::PausedToReady,
                Ready | Null => StateChange::ReadyToNull,
            }),
        }
    }

    /// State the element is in before this step.
    pub fn current(self) -> State {
        match self {
            StateChange::NullToReady => State::Null,
            StateChange::ReadyToPaused | StateChange::ReadyToNull => State::Ready,
            StateChange::PausedToPlaying | StateChange::PausedToReady => State::Paused,
            StateChange::PlayingToPaused => State::Playing,
        }
    }

    /// State the element is in after this step.
    pub fn next(self) -> State {
        match self {
            StateChange::ReadyToNull => State::Null,
            StateChange::NullToReady | StateChange::PausedToReady => State::Ready,
            StateChange::ReadyToPaused | StateChange::PlayingToPaused => State::Paused,
            StateChange::PausedToPlaying => State::Playing,
        }
    }

    /// Whether this step moves towards `Null`.
    pub fn is_downward(self) -> bool {
        self.next() < self.current()
    }
}

impl fmt::Display for StateChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.current(), self.next())
    }
}
