//! Timer-driven add/remove toggling.

use super::branch::Branch;
use super::host::FanOutHost;
use super::progress::{Observer, Progress};
use crate::element::Element;
use crate::pipeline::debug_bin_to_dot_file;
use std::collections::VecDeque;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

/// Alternates between attaching one branch and removing one.
///
/// The list of live branches is owned here and only touched by [`tick`],
/// which runs on the session's event loop. A branch leaves the list before
/// its removal probe is installed.
///
/// [`tick`]: Mutator::tick
pub struct Mutator {
    host: Arc<FanOutHost>,
    graph: Element,
    branches: VecDeque<Arc<Branch>>,
    observer: Arc<dyn Observer>,
    dump_dir: Option<PathBuf>,
}

impl Mutator {
    /// Create a mutator for `host`. Graph snapshots are taken of `graph`.
    pub fn new(
        host: Arc<FanOutHost>,
        graph: Element,
        observer: Arc<dyn Observer>,
        dump_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            host,
            graph,
            branches: VecDeque::new(),
            observer,
            dump_dir,
        }
    }

    /// One timer period.
    ///
    /// With no live branch a new one is attached; otherwise the oldest is
    /// scheduled for removal. Always asks to be called again.
    pub fn tick(&mut self) -> ControlFlow<()> {
        match self.branches.pop_front() {
            None => self.add_branch(),
            Some(branch) => {
                self.observer.notify(Progress::Remove);
                branch.begin_remove(&self.host, Arc::clone(&self.observer));
            }
        }
        ControlFlow::Continue(())
    }

    fn add_branch(&mut self) {
        self.dump("before");
        self.observer.notify(Progress::Add);
        match Branch::attach(&self.host) {
            Ok(branch) => {
                self.observer.notify(Progress::Added);
                self.dump("added");
                self.branches.push_back(branch);
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to attach branch");
            }
        }
    }

    fn dump(&self, label: &str) {
        let Some(dir) = &self.dump_dir else {
            return;
        };
        match debug_bin_to_dot_file(&self.graph, dir, label) {
            Ok(path) => tracing::debug!(path = %path.display(), "graph dumped"),
            Err(err) => tracing::warn!(dir = %dir.display(), error = %err, "failed to dump graph"),
        }
    }

    /// Number of live branches.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Whether no branch is live.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Live branches, oldest first.
    pub fn branches(&self) -> impl Iterator<Item = &Arc<Branch>> {
        self.branches.iter()
    }

    /// The fan-out host.
    pub fn host(&self) -> &Arc<FanOutHost> {
        &self.host
    }
}

impl std::fmt::Debug for Mutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutator")
            .field("branches", &self.branches)
            .field("dump_dir", &self.dump_dir)
            .finish()
    }
}
