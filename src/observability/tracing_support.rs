//! Tracing integration for structured logging and spans.

use crate::element::StateChange;
use tracing::{Level, Span, span};
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "warn,teeswap=info";

/// Install a `tracing` subscriber writing to stderr.
///
/// Verbosity follows `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. Safe to
/// call more than once; later calls are ignored.
pub fn init_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Create a span for a whole session.
///
/// # Example
///
/// ```rust,ignore
/// use teeswap::observability::span_session;
///
/// let span = span_session("test://");
/// let _guard = span.enter();
/// // Session runs here...
/// ```
#[inline]
pub fn span_session(uri: &str) -> Span {
    span!(Level::INFO, "session", uri = %uri)
}

/// Create a span for an element's streaming thread.
#[inline]
pub fn span_element(element: &str, element_type: &str) -> Span {
    span!(
        Level::DEBUG,
        "element",
        element = %element,
        element_type = %element_type
    )
}

/// Enter an element span for the rest of the current scope.
///
/// Streaming threads call this first thing so every log line they emit
/// carries the element path.
pub fn instrument_element(element: &str, element_type: &str) -> tracing::span::EnteredSpan {
    span_element(element, element_type).entered()
}

/// Log a buffer being produced.
#[inline]
pub fn trace_buffer_produced(element: &str, size: usize, sequence: u64) {
    tracing::trace!(
        element = %element,
        size = size,
        sequence = sequence,
        "buffer produced"
    );
}

/// Log end-of-stream.
#[inline]
pub fn trace_eos(pipeline: &str) {
    tracing::info!(pipeline = %pipeline, "end of stream");
}

/// Log an element state change.
#[inline]
pub fn trace_state_change(element: &str, transition: StateChange) {
    tracing::debug!(
        element = %element,
        from = %transition.current(),
        to = %transition.next(),
        "state changed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_can_be_entered() {
        let _session = span_session("test://").entered();
        let _element = instrument_element("/pipeline0/queue0", "queue");
        trace_buffer_produced("/pipeline0/playbin0", 4096, 0);
        trace_state_change("queue0", StateChange::ReadyToPaused);
        trace_eos("pipeline0");
    }

    #[test]
    fn test_init_twice() {
        init_subscriber();
        init_subscriber();
    }
}
