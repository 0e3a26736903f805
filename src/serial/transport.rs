//! Transport abstraction: the byte pipe underneath a channel.
//!
//! Concrete implementations:
//! - UART (`adapters::uart`), no fragmentation
//! - BLE UART service (`adapters::nus`), fragments to the negotiated MTU
//! - in-memory loopback (`adapters::loopback`), tests and the host demo
//!
//! A channel is generic over `SerialTransport`, so adding a transport
//! requires no changes to framing or multiplexing. Receive is push-based:
//! on `start` the transport gets an [`RxHandle`] and calls
//! [`RxHandle::receive`] from its driver callback for every burst.

use core::fmt;
use std::sync::Arc;

use crate::serial::channel::ChannelKind;

/// Failure reported by a transport primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// No peer connected; data has nowhere to go.
    NotConnected,
    /// The transport cannot accept more data right now.
    Busy,
    /// Device missing or not initialised.
    NotReady,
    /// Operation not available on this transport.
    Unsupported,
    /// Driver error code.
    Io(i32),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Busy => write!(f, "busy"),
            Self::NotReady => write!(f, "not ready"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Io(code) => write!(f, "io error {}", code),
        }
    }
}

impl std::error::Error for TransportError {}

/// Byte-oriented transport driven by a [`SerialChannel`](crate::serial::channel::SerialChannel).
pub trait SerialTransport: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Largest payload accepted by one [`transmit`](Self::transmit).
    fn max_chunk_len(&self) -> usize {
        usize::MAX
    }

    /// Bring the transport up and start delivering received bytes to `rx`.
    fn start(&mut self, rx: RxHandle) -> Result<(), TransportError>;

    /// Stop receiving. The transport drops its `RxHandle`.
    fn stop(&mut self) -> Result<(), TransportError>;

    /// Queue one chunk for transmission. Every accepted chunk must be
    /// followed by exactly one [`RxHandle::transmit_complete`].
    fn transmit(&mut self, chunk: &[u8]) -> Result<(), TransportError>;
}

/// Producer-side half of a channel, as seen by its transport.
pub(crate) trait RxSink: Send + Sync {
    fn receive(&self, data: &[u8]);
    fn transmit_complete(&self);
    fn kind(&self) -> ChannelKind;
}

/// Cloneable handle through which a transport feeds its channel.
///
/// Safe to use from any thread; never blocks.
#[derive(Clone)]
pub struct RxHandle {
    sink: Arc<dyn RxSink>,
}

impl RxHandle {
    pub(crate) fn new(sink: Arc<dyn RxSink>) -> Self {
        Self { sink }
    }

    /// Deliver one received burst.
    pub fn receive(&self, data: &[u8]) {
        self.sink.receive(data);
    }

    /// Signal that the last accepted chunk left the transport.
    pub fn transmit_complete(&self) {
        self.sink.transmit_complete();
    }

    pub fn kind(&self) -> ChannelKind {
        self.sink.kind()
    }
}

impl fmt::Debug for RxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RxHandle").field("kind", &self.kind()).finish()
    }
}

/// A null transport that discards all writes and never receives.
/// Useful as a placeholder channel when no link is wired up.
#[derive(Debug, Default)]
pub struct NullTransport {
    rx: Option<RxHandle>,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SerialTransport for NullTransport {
    fn name(&self) -> &'static str {
        "null"
    }

    fn start(&mut self, rx: RxHandle) -> Result<(), TransportError> {
        self.rx = Some(rx);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        self.rx = None;
        Ok(())
    }

    fn transmit(&mut self, _chunk: &[u8]) -> Result<(), TransportError> {
        if let Some(rx) = &self.rx {
            rx.transmit_complete();
        }
        Ok(())
    }
}
