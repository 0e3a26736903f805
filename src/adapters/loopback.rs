//! In-memory transport for host builds and tests.
//!
//! [`LoopbackTransport`] is handed to a channel; the paired
//! [`LoopbackPeer`] plays the remote end: it injects received bytes,
//! collects transmitted chunks and drives transmit completion.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::serial::transport::{RxHandle, SerialTransport, TransportError};

#[derive(Default)]
struct Shared {
    rx: Mutex<Option<RxHandle>>,
    sent: Mutex<Vec<Vec<u8>>>,
    connected: AtomicBool,
    auto_complete: AtomicBool,
    fail_start: Mutex<Option<TransportError>>,
    fail_transmit: Mutex<Option<TransportError>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn rx(&self) -> Option<RxHandle> {
        lock(&self.rx).clone()
    }
}

/// Transport half of a loopback pair.
pub struct LoopbackTransport {
    name: &'static str,
    max_chunk: usize,
    shared: Arc<Shared>,
}

/// Remote half of a loopback pair. Cloneable and usable from any thread.
#[derive(Clone)]
pub struct LoopbackPeer {
    shared: Arc<Shared>,
}

impl LoopbackTransport {
    /// Create a pair. `max_chunk` bounds one transmitted chunk
    /// (`usize::MAX` for no fragmentation). The peer starts connected
    /// and completes every transmit immediately.
    pub fn new(name: &'static str, max_chunk: usize) -> (Self, LoopbackPeer) {
        let shared = Arc::new(Shared::default());
        shared.connected.store(true, Ordering::Relaxed);
        shared.auto_complete.store(true, Ordering::Relaxed);
        let transport = Self {
            name,
            max_chunk: max_chunk.max(1),
            shared: Arc::clone(&shared),
        };
        (transport, LoopbackPeer { shared })
    }
}

impl SerialTransport for LoopbackTransport {
    fn name(&self) -> &'static str {
        self.name
    }

    fn max_chunk_len(&self) -> usize {
        self.max_chunk
    }

    fn start(&mut self, rx: RxHandle) -> Result<(), TransportError> {
        if let Some(e) = lock(&self.shared.fail_start).take() {
            return Err(e);
        }
        *lock(&self.shared.rx) = Some(rx);
        debug!("{}: started", self.name);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        *lock(&self.shared.rx) = None;
        debug!("{}: stopped", self.name);
        Ok(())
    }

    fn transmit(&mut self, chunk: &[u8]) -> Result<(), TransportError> {
        if let Some(e) = lock(&self.shared.fail_transmit).take() {
            return Err(e);
        }
        if !self.shared.connected.load(Ordering::Relaxed) {
            return Err(TransportError::NotConnected);
        }
        lock(&self.shared.sent).push(chunk.to_vec());
        if self.shared.auto_complete.load(Ordering::Relaxed) {
            if let Some(rx) = self.shared.rx() {
                rx.transmit_complete();
            }
        }
        Ok(())
    }
}

impl LoopbackPeer {
    /// Deliver bytes as if received over the link. Dropped while the
    /// transport is stopped.
    pub fn inject(&self, data: &[u8]) -> bool {
        match self.shared.rx() {
            Some(rx) => {
                rx.receive(data);
                true
            }
            None => false,
        }
    }

    /// Report completion of the in-flight transmit.
    pub fn complete_transmit(&self) {
        if let Some(rx) = self.shared.rx() {
            rx.transmit_complete();
        }
    }

    pub fn is_started(&self) -> bool {
        lock(&self.shared.rx).is_some()
    }

    /// Chunks transmitted so far, in order.
    pub fn sent_chunks(&self) -> Vec<Vec<u8>> {
        lock(&self.shared.sent).clone()
    }

    /// All transmitted bytes, concatenated, clearing the record.
    pub fn take_sent(&self) -> Vec<u8> {
        lock(&self.shared.sent).drain(..).flatten().collect()
    }

    pub fn set_connected(&self, connected: bool) {
        self.shared.connected.store(connected, Ordering::Relaxed);
    }

    /// When off, transmits stay in flight until [`complete_transmit`](Self::complete_transmit).
    pub fn set_auto_complete(&self, on: bool) {
        self.shared.auto_complete.store(on, Ordering::Relaxed);
    }

    /// Make the next `start` fail with `err`.
    pub fn fail_next_start(&self, err: TransportError) {
        *lock(&self.shared.fail_start) = Some(err);
    }

    /// Make the next `transmit` fail with `err`.
    pub fn fail_next_transmit(&self, err: TransportError) {
        *lock(&self.shared.fail_transmit) = Some(err);
    }
}
