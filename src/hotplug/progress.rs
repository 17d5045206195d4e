//! Progress reporting of the reconfiguration cycle.

use std::fmt;
use std::io::Write;
use std::sync::Mutex;

/// A step of the add/remove cycle, or the end of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Progress {
    /// A branch is about to be attached.
    Add,
    /// The branch is attached and streaming.
    Added,
    /// A branch was scheduled for removal.
    Remove,
    /// The branch is fully torn down.
    Removed,
    /// The stream ended.
    Eos,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Progress::Add => "add",
            Progress::Added => "added",
            Progress::Remove => "remove",
            Progress::Removed => "removed",
            Progress::Eos => "Got EOS",
        })
    }
}

/// Receives progress notifications.
///
/// `Removed` is reported from whichever thread ran the teardown, usually a
/// streaming thread, so implementations must be thread safe.
pub trait Observer: Send + Sync {
    /// Called once per step.
    fn notify(&self, progress: Progress);
}

/// Prints every step on its own line to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutObserver;

impl Observer for StdoutObserver {
    fn notify(&self, progress: Progress) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", progress);
        let _ = out.flush();
    }
}

/// Keeps every step in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Progress>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All steps so far, in order.
    pub fn events(&self) -> Vec<Progress> {
        self.events.lock().unwrap().clone()
    }

    /// How often `progress` was reported.
    pub fn count(&self, progress: Progress) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|p| **p == progress)
            .count()
    }
}

impl Observer for RecordingObserver {
    fn notify(&self, progress: Progress) {
        self.events.lock().unwrap().push(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_display() {
        let lines: Vec<String> = [
            Progress::Add,
            Progress::Added,
            Progress::Remove,
            Progress::Removed,
            Progress::Eos,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();
        assert_eq!(lines, ["add", "added", "remove", "removed", "Got EOS"]);
    }

    #[test]
    fn test_recording_observer() {
        let observer = RecordingObserver::new();
        observer.notify(Progress::Add);
        observer.notify(Progress::Added);
        observer.notify(Progress::Add);
        assert_eq!(observer.count(Progress::Add), 2);
        assert_eq!(
            observer.events(),
            vec![Progress::Add, Progress::Added, Progress::Add]
        );
    }
}
