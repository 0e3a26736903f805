//! Channel adapter: one transport bound to a ring, a framer, two signals
//! and an observer registry.
//!
//! ```text
//!  transport driver ──RxHandle──▶ ChannelShared ──┬─▶ RingBuffer ──▶ LineFramer ──▶ get_line
//!                                 (Arc, shared)   ├─▶ data_ready.give()
//!                                                 └─▶ observers.notify(NewData)
//!
//!  send ──▶ tx_free.take ──▶ transport.transmit(chunk)*  ··· transmit_complete ──▶ tx_free.give
//! ```

use core::fmt::{self, Write as _};
use core::ops::BitOr;
use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{
    DEFAULT_INPUT_BUFFER_SIZE, DEFAULT_OBSERVER_LIMIT, DEFAULT_OUTPUT_BUFFER_SIZE, MAX_DELIMITERS,
};
use crate::error::{Result, SerialError};
use crate::events::{EventObserver, ObserverId, ObserverRegistry, SerialEvent};
use crate::serial::framer::{Line, LineFramer};
use crate::serial::ring::RingBuffer;
use crate::serial::transport::{RxHandle, RxSink, SerialTransport, TransportError};
use crate::sync::{BinarySemaphore, Timeout};

// ── Channel identity ──────────────────────────────────────────

/// Which physical link a channel runs over. Declaration order is the
/// multiplexer's polling priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelKind {
    Wired = 0,
    Wireless = 1,
}

impl ChannelKind {
    pub const COUNT: usize = 2;
    /// All kinds in priority order.
    pub const ALL: [Self; Self::COUNT] = [Self::Wired, Self::Wireless];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn mask(self) -> ChannelMask {
        ChannelMask(1 << (self as u32))
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Wired => "wired",
            Self::Wireless => "wireless",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bit set of channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMask(u32);

impl ChannelMask {
    pub const NONE: Self = Self(0);
    pub const WIRED: Self = ChannelKind::Wired.mask();
    pub const WIRELESS: Self = ChannelKind::Wireless.mask();
    /// Every channel, including ones added in the future.
    pub const ALL: Self = Self(0xFFFF_FFFF);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, kind: ChannelKind) -> bool {
        self.0 & kind.mask().0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, kind: ChannelKind) {
        self.0 |= kind.mask().0;
    }

    pub fn remove(&mut self, kind: ChannelKind) {
        self.0 &= !kind.mask().0;
    }

    /// Known channel kinds in this mask, in priority order.
    pub fn kinds(self) -> impl Iterator<Item = ChannelKind> {
        ChannelKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl From<ChannelKind> for ChannelMask {
    fn from(kind: ChannelKind) -> Self {
        kind.mask()
    }
}

impl BitOr for ChannelMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ── Capability trait ──────────────────────────────────────────

/// Uniform surface of a channel, independent of its transport and
/// buffer sizes. The multiplexer holds channels as `Box<dyn LineChannel>`.
pub trait LineChannel: Send {
    fn kind(&self) -> ChannelKind;

    fn is_enabled(&self) -> bool;

    /// Start the transport and open the transmit gate. No-op when enabled.
    fn enable(&mut self) -> Result<()>;

    /// Stop the transport. No-op when disabled.
    fn disable(&mut self) -> Result<()>;

    fn add_observer(&self, observer: Arc<dyn EventObserver>) -> Result<ObserverId>;

    fn remove_observer(&self, id: ObserverId) -> Result<()>;

    /// Frame the next line, waiting up to `timeout`. Returns its length;
    /// the bytes are available from [`line`](Self::line).
    fn poll_line(&mut self, timeout: Timeout) -> usize;

    /// The line produced by the last [`poll_line`](Self::poll_line).
    fn line(&self) -> Line<'_>;

    /// Wait up to `timeout` for the next line. Empty on timeout or when
    /// the channel is disabled.
    fn get_line(&mut self, timeout: Timeout) -> Line<'_> {
        self.poll_line(timeout);
        self.line()
    }

    fn send(&mut self, timeout: Timeout, data: &[u8]) -> Result<()>;

    fn send_fmt(&mut self, timeout: Timeout, args: fmt::Arguments<'_>) -> Result<()>;

    /// Replace the delimiter set. Empty means any received bytes form a line.
    fn set_delimiters(&mut self, delimiters: &[u8]) -> Result<()>;

    fn delimiters(&self) -> &[u8];
}

// ── Producer-side state ───────────────────────────────────────

/// State shared between the channel and its transport's driver callback.
pub(crate) struct ChannelShared<const IN: usize, const OBS: usize> {
    kind: ChannelKind,
    ring: RingBuffer<IN>,
    data_ready: BinarySemaphore,
    tx_free: BinarySemaphore,
    observers: ObserverRegistry<OBS>,
    receiving: AtomicBool,
}

impl<const IN: usize, const OBS: usize> RxSink for ChannelShared<IN, OBS> {
    fn receive(&self, data: &[u8]) {
        if !self.receiving.load(Ordering::Acquire) {
            warn!("{}: dropping {} bytes, channel not enabled", self.kind, data.len());
            return;
        }
        if data.is_empty() {
            return;
        }
        self.ring.append(data);
        self.data_ready.give();
        self.observers.notify(&SerialEvent::NewData {
            count: data.len(),
            data,
        });
        debug!("{}: rx {} bytes", self.kind, data.len());
    }

    fn transmit_complete(&self) {
        self.tx_free.give();
    }

    fn kind(&self) -> ChannelKind {
        self.kind
    }
}

// ── Channel ───────────────────────────────────────────────────

/// Channel adapter over transport `T`.
///
/// `IN` is the receive ring (and longest line) capacity, `OUT` the
/// formatted-send scratch capacity, `OBS` the observer slot count.
pub struct SerialChannel<
    T,
    const IN: usize = DEFAULT_INPUT_BUFFER_SIZE,
    const OUT: usize = DEFAULT_OUTPUT_BUFFER_SIZE,
    const OBS: usize = DEFAULT_OBSERVER_LIMIT,
> {
    transport: T,
    shared: Arc<ChannelShared<IN, OBS>>,
    framer: LineFramer<IN>,
    delimiters: heapless::Vec<u8, MAX_DELIMITERS>,
    enabled: bool,
}

impl<T, const IN: usize, const OUT: usize, const OBS: usize> SerialChannel<T, IN, OUT, OBS>
where
    T: SerialTransport,
{
    pub fn new(kind: ChannelKind, transport: T) -> Self {
        Self {
            transport,
            shared: Arc::new(ChannelShared {
                kind,
                ring: RingBuffer::new(),
                data_ready: BinarySemaphore::new(false),
                tx_free: BinarySemaphore::new(false),
                observers: ObserverRegistry::new(),
                receiving: AtomicBool::new(false),
            }),
            framer: LineFramer::new(),
            delimiters: heapless::Vec::new(),
            enabled: false,
        }
    }

    /// Same as [`new`](Self::new) with an initial delimiter set.
    pub fn with_delimiters(kind: ChannelKind, transport: T, delimiters: &[u8]) -> Result<Self> {
        let mut channel = Self::new(kind, transport);
        channel.store_delimiters(delimiters)?;
        Ok(channel)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Bytes received and not yet framed into a returned line.
    pub fn pending(&self) -> usize {
        self.shared.ring.count()
    }

    pub fn observer_count(&self) -> usize {
        self.shared.observers.len()
    }

    fn store_delimiters(&mut self, delimiters: &[u8]) -> Result<()> {
        self.delimiters =
            heapless::Vec::from_slice(delimiters).map_err(|()| SerialError::NoMemory)?;
        Ok(())
    }

    fn acquire_tx(&self, timeout: Timeout) -> Result<()> {
        if !self.enabled {
            return Err(SerialError::NotReady);
        }
        if !self.shared.tx_free.take(timeout) {
            warn!("{}: transmitter busy", self.shared.kind);
            return Err(SerialError::Busy);
        }
        Ok(())
    }

    /// Push `data` out in transport-sized chunks. The caller holds the
    /// transmit gate; completion releases it, any failure here does.
    fn transmit_held(&mut self, data: &[u8]) -> Result<()> {
        let kind = self.shared.kind;
        let chunk_len = self.transport.max_chunk_len().max(1);
        for chunk in data.chunks(chunk_len) {
            match self.transport.transmit(chunk) {
                Ok(()) => {}
                Err(TransportError::NotConnected) => {
                    debug!("{}: no peer, dropping {} bytes", kind, data.len());
                    self.shared.tx_free.give();
                    return Ok(());
                }
                Err(TransportError::Busy) => {
                    warn!("{}: transport busy", kind);
                    self.shared.tx_free.give();
                    return Err(SerialError::Busy);
                }
                Err(e) => {
                    error!("{}: send failed: {}", kind, e);
                    self.shared.tx_free.give();
                    return Err(SerialError::NotReady);
                }
            }
        }
        Ok(())
    }
}

impl<T, const IN: usize, const OUT: usize, const OBS: usize> LineChannel
    for SerialChannel<T, IN, OUT, OBS>
where
    T: SerialTransport,
{
    fn kind(&self) -> ChannelKind {
        self.shared.kind
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn enable(&mut self) -> Result<()> {
        if self.enabled {
            return Ok(());
        }
        let kind = self.shared.kind;

        self.shared.receiving.store(true, Ordering::Release);
        let sink: Arc<dyn RxSink> = self.shared.clone();
        if let Err(e) = self.transport.start(RxHandle::new(sink)) {
            self.shared.receiving.store(false, Ordering::Release);
            error!("{}: {} failed to start: {}", kind, self.transport.name(), e);
            return Err(SerialError::NotReady);
        }

        self.shared.tx_free.give();
        self.enabled = true;
        info!("{}: enabled over {}", kind, self.transport.name());
        Ok(())
    }

    fn disable(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let kind = self.shared.kind;

        if let Err(e) = self.transport.stop() {
            error!("{}: {} failed to stop: {}", kind, self.transport.name(), e);
            return Err(e.into());
        }

        self.shared.receiving.store(false, Ordering::Release);
        self.shared.tx_free.reset();
        self.framer.reset();
        self.enabled = false;
        info!("{}: disabled", kind);
        Ok(())
    }

    fn add_observer(&self, observer: Arc<dyn EventObserver>) -> Result<ObserverId> {
        self.shared.observers.add(observer)
    }

    fn remove_observer(&self, id: ObserverId) -> Result<()> {
        self.shared.observers.remove(id)
    }

    fn poll_line(&mut self, timeout: Timeout) -> usize {
        if !self.enabled {
            self.framer.reset();
            debug!("{}: get_line on disabled channel", self.shared.kind);
            return 0;
        }

        let Self {
            shared,
            framer,
            delimiters,
            ..
        } = self;
        let len = framer.extract(
            &shared.ring,
            &shared.data_ready,
            delimiters,
            timeout,
            |event| shared.observers.notify(event),
        );
        if len > 0 {
            debug!("{}: line of {} bytes", shared.kind, len);
        }
        len
    }

    fn line(&self) -> Line<'_> {
        self.framer.line()
    }

    fn send(&mut self, timeout: Timeout, data: &[u8]) -> Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        self.acquire_tx(timeout)?;
        self.transmit_held(data)
    }

    fn send_fmt(&mut self, timeout: Timeout, args: fmt::Arguments<'_>) -> Result<()> {
        self.acquire_tx(timeout)?;
        let mut scratch: heapless::String<OUT> = heapless::String::new();
        if scratch.write_fmt(args).is_err() {
            warn!("{}: formatted output exceeds {} bytes", self.shared.kind, OUT);
            self.shared.tx_free.give();
            return Err(SerialError::BufferFull);
        }
        if scratch.is_empty() {
            self.shared.tx_free.give();
            return Ok(());
        }
        self.transmit_held(scratch.as_bytes())
    }

    fn set_delimiters(&mut self, delimiters: &[u8]) -> Result<()> {
        self.store_delimiters(delimiters)
    }

    fn delimiters(&self) -> &[u8] {
        &self.delimiters
    }
}
