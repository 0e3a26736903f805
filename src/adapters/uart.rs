//! Wired channel over a UART peripheral.
//!
//! The peripheral itself sits behind [`UartPort`]; this module is the
//! glue between its async event callback and a channel:
//!
//! | UART event   | Effect                                   |
//! |--------------|------------------------------------------|
//! | `RxReady`    | bytes delivered to the channel ring       |
//! | `TxDone`     | transmit gate released                    |
//! | `TxAborted`  | transmit gate released                    |
//! | `RxDisabled` | acknowledges a pending `stop()`           |
//! | `RxStopped`  | logged only                              |
//!
//! Writes are not fragmented: the UART driver accepts any length.

use core::time::Duration;
use std::sync::Arc;

use log::{debug, error, info};

use crate::config::{DEFAULT_UART_DISABLE_TIMEOUT_MS, DEFAULT_UART_RX_TIMEOUT_MS, SerialConfig};
use crate::serial::transport::{RxHandle, SerialTransport, TransportError};
use crate::sync::{BinarySemaphore, Timeout};

/// Event reported by the UART driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartEvent<'a> {
    /// A receive burst completed (buffer filled or rx timeout expired).
    RxReady(&'a [u8]),
    /// Reception stopped because of a line error.
    RxStopped,
    /// Reception is fully disabled.
    RxDisabled,
    /// A write finished.
    TxDone { len: usize },
    /// A write was aborted.
    TxAborted,
}

/// Driver-side callback registered with [`UartPort::enable_rx`].
#[derive(Debug, Clone)]
pub struct UartCallback {
    rx: RxHandle,
    rx_disabled: Arc<BinarySemaphore>,
}

impl UartCallback {
    /// Dispatch one driver event. Never blocks.
    pub fn handle(&self, event: UartEvent<'_>) {
        match event {
            UartEvent::RxReady(data) => self.rx.receive(data),
            UartEvent::RxStopped => debug!("uart: rx stopped"),
            UartEvent::RxDisabled => {
                self.rx_disabled.give();
                info!("uart: rx disabled");
            }
            UartEvent::TxDone { len } => {
                self.rx.transmit_complete();
                debug!("uart: {} bytes sent", len);
            }
            UartEvent::TxAborted => {
                self.rx.transmit_complete();
                debug!("uart: tx aborted");
            }
        }
    }
}

/// The UART peripheral as seen by the serial layer.
pub trait UartPort: Send {
    fn is_ready(&self) -> bool;

    /// Start reception, reporting every event to `callback`. Received
    /// bursts are flushed after `rx_timeout` of line inactivity.
    fn enable_rx(&mut self, callback: UartCallback, rx_timeout: Duration)
    -> Result<(), TransportError>;

    /// Request rx shutdown; completion is reported as `RxDisabled`.
    fn disable_rx(&mut self) -> Result<(), TransportError>;

    /// Start an async write; completion is reported as `TxDone`/`TxAborted`.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;
}

/// [`SerialTransport`] over a [`UartPort`].
pub struct UartTransport<P> {
    port: P,
    rx_disabled: Arc<BinarySemaphore>,
    rx_timeout: Duration,
    disable_timeout: Duration,
}

impl<P: UartPort> UartTransport<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            rx_disabled: Arc::new(BinarySemaphore::new(false)),
            rx_timeout: Duration::from_millis(u64::from(DEFAULT_UART_RX_TIMEOUT_MS)),
            disable_timeout: Duration::from_millis(u64::from(DEFAULT_UART_DISABLE_TIMEOUT_MS)),
        }
    }

    pub fn with_config(port: P, config: &SerialConfig) -> Self {
        Self {
            rx_timeout: config.uart_rx_timeout(),
            disable_timeout: config.uart_disable_timeout(),
            ..Self::new(port)
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }
}

impl<P: UartPort> SerialTransport for UartTransport<P> {
    fn name(&self) -> &'static str {
        "uart"
    }

    fn start(&mut self, rx: RxHandle) -> Result<(), TransportError> {
        if !self.port.is_ready() {
            error!("uart: device not ready");
            return Err(TransportError::NotReady);
        }
        self.rx_disabled.reset();
        let callback = UartCallback {
            rx,
            rx_disabled: Arc::clone(&self.rx_disabled),
        };
        self.port
            .enable_rx(callback, self.rx_timeout)
            .map_err(|e| {
                error!("uart: unable to enable rx: {}", e);
                TransportError::NotReady
            })
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        self.port.disable_rx()?;
        if self.rx_disabled.take(Timeout::After(self.disable_timeout)) {
            Ok(())
        } else {
            error!("uart: rx disable not acknowledged within {:?}", self.disable_timeout);
            Err(TransportError::NotReady)
        }
    }

    fn transmit(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        self.port.write(chunk)
    }
}
