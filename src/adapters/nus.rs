//! Wireless channel over a BLE UART (Nordic UART Service) link.
//!
//! The BLE stack sits behind [`NusPort`]. Bring-up follows the stack's
//! life cycle:
//!
//! ```text
//!  enable_radio ──Started──────────▶ init_service ──▶ start_advertising
//!        │
//!        └──AlreadyEnabled────────▶ init_service     (another subsystem owns
//!                                                     the radio and advertising)
//! ```
//!
//! ## MTU fragmentation
//!
//! One notification carries at most `mtu - 3` bytes (ATT header). The
//! payload size starts at the BLE 4.x default of 20 bytes and follows
//! every MTU exchange; the channel splits sends accordingly.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, error, info};

use crate::config::{DEFAULT_NUS_PAYLOAD, SerialConfig};
use crate::serial::transport::{RxHandle, SerialTransport, TransportError};

/// ATT protocol header carried in every notification.
pub const ATT_HEADER_LEN: usize = 3;

/// Outcome of [`NusPort::enable_radio`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioState {
    /// The radio was brought up by this call.
    Started,
    /// The radio was already running.
    AlreadyEnabled,
}

/// Event reported by the BLE stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NusEvent<'a> {
    Connected { mtu: u16 },
    Disconnected { reason: u8 },
    MtuExchanged { mtu: u16 },
    /// The peer wrote to the RX characteristic.
    Received(&'a [u8]),
    /// A notification was delivered.
    Sent,
}

/// Stack-side callback registered with [`NusPort::init_service`].
#[derive(Debug, Clone)]
pub struct NusCallback {
    rx: RxHandle,
    payload_len: Arc<AtomicUsize>,
    default_payload: usize,
}

impl NusCallback {
    /// Dispatch one stack event. Never blocks.
    pub fn handle(&self, event: NusEvent<'_>) {
        match event {
            NusEvent::Connected { mtu } => info!("nus: connected (mtu {})", mtu),
            NusEvent::Disconnected { reason } => {
                self.payload_len
                    .store(self.default_payload, Ordering::Relaxed);
                info!("nus: disconnected (reason {})", reason);
            }
            NusEvent::MtuExchanged { mtu } => {
                let payload = payload_for_mtu(mtu);
                self.payload_len.store(payload, Ordering::Relaxed);
                debug!("nus: mtu {} -> payload {}", mtu, payload);
            }
            NusEvent::Received(data) => self.rx.receive(data),
            NusEvent::Sent => self.rx.transmit_complete(),
        }
    }
}

fn payload_for_mtu(mtu: u16) -> usize {
    usize::from(mtu).saturating_sub(ATT_HEADER_LEN).max(1)
}

/// The BLE stack as seen by the serial layer.
pub trait NusPort: Send {
    fn enable_radio(&mut self) -> Result<RadioState, TransportError>;

    /// Register the UART service and route its events to `callback`.
    fn init_service(&mut self, callback: NusCallback) -> Result<(), TransportError>;

    /// Start connectable advertising.
    fn start_advertising(&mut self) -> Result<(), TransportError>;

    /// Tear the service down. Most stacks cannot.
    fn shutdown(&mut self) -> Result<(), TransportError> {
        Err(TransportError::Unsupported)
    }

    /// Send one notification to the connected peer.
    fn notify(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

/// [`SerialTransport`] over a [`NusPort`].
pub struct NusTransport<P> {
    port: P,
    payload_len: Arc<AtomicUsize>,
    default_payload: usize,
}

impl<P: NusPort> NusTransport<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            payload_len: Arc::new(AtomicUsize::new(DEFAULT_NUS_PAYLOAD)),
            default_payload: DEFAULT_NUS_PAYLOAD,
        }
    }

    pub fn with_config(port: P, config: &SerialConfig) -> Self {
        let default_payload = usize::from(config.nus_default_payload).max(1);
        Self {
            port,
            payload_len: Arc::new(AtomicUsize::new(default_payload)),
            default_payload,
        }
    }

    /// Current notification payload size.
    pub fn payload_len(&self) -> usize {
        self.payload_len.load(Ordering::Relaxed)
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

impl<P: NusPort> SerialTransport for NusTransport<P> {
    fn name(&self) -> &'static str {
        "nus"
    }

    fn max_chunk_len(&self) -> usize {
        self.payload_len()
    }

    fn start(&mut self, rx: RxHandle) -> Result<(), TransportError> {
        let callback = NusCallback {
            rx,
            payload_len: Arc::clone(&self.payload_len),
            default_payload: self.default_payload,
        };

        let state = self.port.enable_radio().map_err(|e| {
            error!("nus: radio enable failed: {}", e);
            TransportError::NotReady
        })?;

        self.port.init_service(callback).map_err(|e| {
            error!("nus: could not init service: {}", e);
            TransportError::NotReady
        })?;

        match state {
            RadioState::AlreadyEnabled => {
                info!("nus: radio already enabled, attached to existing interface");
                Ok(())
            }
            RadioState::Started => self.port.start_advertising().map_err(|e| {
                error!("nus: could not start advertising: {}", e);
                TransportError::NotReady
            }),
        }
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        self.port.shutdown()
    }

    fn transmit(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        self.port.notify(chunk)
    }
}
