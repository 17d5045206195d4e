//! Error types for teeswap.

use crate::element::StateChange;
use thiserror::Error;

/// Result type alias using teeswap's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for graph construction and mutation.
#[derive(Error, Debug)]
pub enum Error {
    /// No constructor is registered under this factory name.
    #[error("no element factory named '{0}'")]
    NoSuchFactory(String),

    /// An element or branch could not be assembled.
    #[error("construction failed: {0}")]
    Construction(String),

    /// Two pads could not be linked.
    #[error("failed to link {src} to {sink}: {reason}")]
    Link {
        /// Upstream side of the attempted link.
        src: String,
        /// Downstream side of the attempted link.
        sink: String,
        /// Why the link was refused.
        #[source]
        reason: LinkError,
    },

    /// An element has no pad with this name.
    #[error("element '{element}' has no pad '{pad}'")]
    NoSuchPad {
        /// Element that was searched.
        element: String,
        /// Requested pad name.
        pad: String,
    },

    /// An element does not know this property.
    #[error("element '{element}' has no property '{property}'")]
    NoSuchProperty {
        /// Element the property was set on.
        element: String,
        /// Property name.
        property: String,
    },

    /// A property was given a value of the wrong type.
    #[error("invalid value for property '{property}': {reason}")]
    InvalidProperty {
        /// Property name.
        property: String,
        /// What was wrong with the value.
        reason: String,
    },

    /// The element already lives in another container.
    #[error("element '{0}' already has a parent")]
    AlreadyParented(String),

    /// A container already holds a child with this name.
    #[error("bin '{bin}' already contains an element named '{name}'")]
    DuplicateName {
        /// Container name.
        bin: String,
        /// Conflicting child name.
        name: String,
    },

    /// The element is not a child of the given container.
    #[error("element '{element}' is not a child of '{bin}'")]
    NotAChild {
        /// Container name.
        bin: String,
        /// Element name.
        element: String,
    },

    /// A container operation was attempted on a plain element.
    #[error("element '{0}' is not a bin")]
    NotABin(String),

    /// A state transition failed.
    #[error(transparent)]
    StateChange(#[from] StateChangeError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a pad link can be refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Source must be an output pad and sink an input pad.
    #[error("pads have wrong direction")]
    WrongDirection,
    /// One of the pads is already linked.
    #[error("pad was already linked")]
    WasLinked,
    /// The elements do not share a parent.
    #[error("elements are in different containers")]
    WrongHierarchy,
}

/// A failed state transition on one element.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("state change {transition} of element '{element}' failed")]
pub struct StateChangeError {
    /// Name of the element that refused the transition.
    pub element: String,
    /// The transition that failed.
    pub transition: StateChange,
}

/// Outcome of pushing data through a pad.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowError {
    /// The pad has no peer.
    #[error("not-linked")]
    NotLinked,
    /// The pad or its peer is inactive.
    #[error("flushing")]
    Flushing,
    /// Downstream does not accept more data.
    #[error("eos")]
    Eos,
    /// Downstream failed fatally.
    #[error("error")]
    Error,
}

/// Result of a data-flow operation.
pub type FlowResult = std::result::Result<(), FlowError>;
