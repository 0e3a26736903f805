//! Error taxonomy for the serial layer.
//!
//! Every consumer-facing call returns a status through [`SerialError`].
//! `get_line` is the exception: a timeout or a disabled channel is an
//! empty line, not an error. Overflow is not an error either; it is
//! reported to observers as a [`SerialEvent`](crate::events::SerialEvent).

use core::fmt;

use crate::serial::transport::TransportError;

// ---------------------------------------------------------------------------
// Serial error
// ---------------------------------------------------------------------------

/// Status of a failed serial operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// Channel not enabled or the underlying device is unavailable.
    NotReady,
    /// The transmit gate is held by an in-flight send.
    Busy,
    /// Formatted output does not fit the scratch buffer.
    BufferFull,
    /// A fixed-capacity table (observers, delimiters, channel slots) is full.
    NoMemory,
    /// The observer handle does not name a registered observer.
    NotFound,
    /// Unclassified transport failure.
    Unknown,
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "device not ready"),
            Self::Busy => write!(f, "transmitter busy"),
            Self::BufferFull => write!(f, "output buffer full"),
            Self::NoMemory => write!(f, "no free slot"),
            Self::NotFound => write!(f, "not found"),
            Self::Unknown => write!(f, "unknown error"),
        }
    }
}

impl std::error::Error for SerialError {}

impl From<TransportError> for SerialError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::NotConnected | TransportError::NotReady => Self::NotReady,
            TransportError::Busy => Self::Busy,
            TransportError::Unsupported | TransportError::Io(_) => Self::Unknown,
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, SerialError>;
