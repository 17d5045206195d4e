//! Pad probes.
//!
//! A probe is a callback attached to a pad. The only kind supported is the
//! idle probe: it runs while the pad's stream lock is held and no buffer is
//! in flight through the pad, so data on that pad is blocked until the
//! callback returns. Other pads of the same element keep flowing.

use super::Pad;

/// Kind of probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeType {
    /// Fire when the pad has no data in flight.
    Idle,
}

/// What the framework should do with the probe after the callback ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeReturn {
    /// Keep the probe installed; it fires again the next time the pad idles.
    Ok,
    /// Uninstall the probe and drop its callback (and everything it owns).
    Remove,
}

/// Identifier of an installed probe, unique per pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeId(pub(crate) u64);

/// Information handed to a probe callback.
#[derive(Debug, Clone, Copy)]
pub struct ProbeInfo {
    /// Which probe is firing.
    pub id: ProbeId,
    /// Kind of the probe.
    pub probe_type: ProbeType,
}

pub(crate) type ProbeCallback = Box<dyn FnMut(&Pad, &ProbeInfo) -> ProbeReturn + Send>;

pub(crate) struct Probe {
    pub(crate) id: ProbeId,
    pub(crate) probe_type: ProbeType,
    pub(crate) callback: ProbeCallback,
}

impl Probe {
    /// Run the callback, returning whether the probe stays installed.
    pub(crate) fn fire(&mut self, pad: &Pad) -> bool {
        let info = ProbeInfo {
            id: self.id,
            probe_type: self.probe_type,
        };
        (self.callback)(pad, &info) == ProbeReturn::Ok
    }
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe")
            .field("id", &self.id)
            .field("probe_type", &self.probe_type)
            .finish()
    }
}
