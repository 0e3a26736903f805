//! Multiplexer: several channels behind one line-oriented API.
//!
//! Reads poll every enabled channel without waiting, in priority order
//! (wired before wireless). Only when none has a line does the caller
//! block, on a shared signal that a relay observer on each enabled
//! channel posts whenever new bytes arrive. The signal only shortens
//! the wait; every wake re-polls all channels.
//!
//! Writes go to every enabled channel. Multi-channel operations are
//! best-effort: they stop or continue as documented per method, never
//! roll back, and report a single status.

use core::fmt;
use std::sync::Arc;

use log::{error, info, warn};

use crate::config::{MAX_DELIMITERS, SerialConfig};
use crate::error::{Result, SerialError};
use crate::events::{EventObserver, ObserverId, SerialEvent};
use crate::serial::channel::{ChannelKind, ChannelMask, LineChannel};
use crate::serial::framer::Line;
use crate::sync::{BinarySemaphore, Timeout};

/// Relay observer: any new data on any enabled channel wakes `get_line`.
struct DataRelay {
    signal: Arc<BinarySemaphore>,
}

impl EventObserver for DataRelay {
    fn on_event(&self, event: &SerialEvent<'_>) {
        if let SerialEvent::NewData { .. } = event {
            self.signal.give();
        }
    }
}

pub struct SerialMux {
    slots: [Option<Box<dyn LineChannel>>; ChannelKind::COUNT],
    relay_ids: [Option<ObserverId>; ChannelKind::COUNT],
    enabled: ChannelMask,
    delimiters: heapless::Vec<u8, MAX_DELIMITERS>,
    data_signal: Arc<BinarySemaphore>,
}

impl SerialMux {
    /// Empty multiplexer with no delimiters.
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            relay_ids: [None; ChannelKind::COUNT],
            enabled: ChannelMask::NONE,
            delimiters: heapless::Vec::new(),
            data_signal: Arc::new(BinarySemaphore::new(false)),
        }
    }

    /// Multiplexer seeded with the configured delimiter set.
    pub fn with_config(config: &SerialConfig) -> Self {
        let mut mux = Self::new();
        mux.delimiters.clone_from(&config.delimiters);
        mux
    }

    /// Install a channel into the slot for its kind.
    pub fn attach(&mut self, channel: Box<dyn LineChannel>) -> Result<()> {
        let kind = channel.kind();
        let slot = &mut self.slots[kind.index()];
        if slot.is_some() {
            warn!("mux: {} slot already occupied", kind);
            return Err(SerialError::Busy);
        }
        *slot = Some(channel);
        Ok(())
    }

    pub fn channel(&self, kind: ChannelKind) -> Option<&dyn LineChannel> {
        self.slots[kind.index()].as_deref()
    }

    pub fn channel_mut(&mut self, kind: ChannelKind) -> Option<&mut (dyn LineChannel + 'static)> {
        self.slots[kind.index()].as_deref_mut()
    }

    /// Channels currently enabled through the multiplexer.
    pub fn enabled(&self) -> ChannelMask {
        self.enabled
    }

    pub fn delimiters(&self) -> &[u8] {
        &self.delimiters
    }

    /// Enable every attached channel in `mask`.
    ///
    /// Each channel gets the current delimiters, is enabled, and gets the
    /// relay observer. Stops at the first failure; channels enabled
    /// before it stay enabled.
    pub fn enable(&mut self, mask: ChannelMask) -> Result<()> {
        let mut selected = false;
        for kind in mask.kinds() {
            let Some(channel) = self.slots[kind.index()].as_deref_mut() else {
                continue;
            };
            selected = true;
            if self.enabled.contains(kind) {
                continue;
            }

            channel.set_delimiters(&self.delimiters)?;
            channel.enable().inspect_err(|e| error!("mux: enable {} failed: {}", kind, e))?;
            let relay = Arc::new(DataRelay {
                signal: Arc::clone(&self.data_signal),
            });
            self.relay_ids[kind.index()] = Some(channel.add_observer(relay)?);
            self.enabled.insert(kind);
            info!("mux: {} enabled", kind);
        }

        if selected {
            Ok(())
        } else {
            warn!("mux: enable mask {:#x} selects no channel", mask.bits());
            Err(SerialError::NotReady)
        }
    }

    /// Disable every enabled channel in `mask`. Stops at the first failure.
    pub fn disable(&mut self, mask: ChannelMask) -> Result<()> {
        for kind in mask.kinds() {
            if !self.enabled.contains(kind) {
                continue;
            }
            let Some(channel) = self.slots[kind.index()].as_deref_mut() else {
                continue;
            };

            channel.disable().inspect_err(|e| error!("mux: disable {} failed: {}", kind, e))?;
            if let Some(id) = self.relay_ids[kind.index()].take() {
                if let Err(e) = channel.remove_observer(id) {
                    warn!("mux: {} relay already gone: {}", kind, e);
                }
            }
            self.enabled.remove(kind);
            info!("mux: {} disabled", kind);
        }
        Ok(())
    }

    /// First enabled channel, in priority order, with a line ready now.
    fn poll_ready(&mut self) -> Option<ChannelKind> {
        let enabled = self.enabled;
        self.slots
            .iter_mut()
            .flatten()
            .find_map(|ch| {
                let kind = ch.kind();
                (enabled.contains(kind) && ch.poll_line(Timeout::NoWait) > 0).then_some(kind)
            })
    }

    /// Wait up to `timeout` for a line from any enabled channel.
    /// Empty on timeout or when no channel is enabled.
    pub fn get_line(&mut self, timeout: Timeout) -> Line<'_> {
        let deadline = timeout.deadline();
        let ready = loop {
            if let Some(kind) = self.poll_ready() {
                break Some(kind);
            }
            if self.enabled.is_empty() {
                break None;
            }
            if !self.data_signal.take_until(deadline) {
                break self.poll_ready();
            }
        };

        match ready.and_then(|kind| self.slots[kind.index()].as_deref()) {
            Some(channel) => channel.line(),
            None => Line::EMPTY,
        }
    }

    /// Send `data` on every enabled channel. Returns the status of the last
    /// channel attempted.
    pub fn send(&mut self, timeout: Timeout, data: &[u8]) -> Result<()> {
        self.for_each_enabled(|ch| ch.send(timeout, data))
    }

    /// Format once per channel and send on every enabled channel.
    pub fn send_fmt(&mut self, timeout: Timeout, args: fmt::Arguments<'_>) -> Result<()> {
        self.for_each_enabled(|ch| ch.send_fmt(timeout, args))
    }

    /// Store a new delimiter set and forward it to every enabled channel,
    /// failing on the first channel that rejects it.
    pub fn set_delimiters(&mut self, delimiters: &[u8]) -> Result<()> {
        self.delimiters =
            heapless::Vec::from_slice(delimiters).map_err(|()| SerialError::NoMemory)?;
        let enabled = self.enabled;
        for channel in self.slots.iter_mut().flatten() {
            if enabled.contains(channel.kind()) {
                channel.set_delimiters(delimiters)?;
            }
        }
        Ok(())
    }

    fn for_each_enabled(
        &mut self,
        mut op: impl FnMut(&mut dyn LineChannel) -> Result<()>,
    ) -> Result<()> {
        let enabled = self.enabled;
        let mut status = Err(SerialError::NotReady);
        for channel in self.slots.iter_mut().flatten() {
            let kind = channel.kind();
            if !enabled.contains(kind) {
                continue;
            }
            status = op(channel.as_mut());
            if let Err(e) = status {
                error!("mux: send on {} failed: {}", kind, e);
            }
        }
        status
    }
}

impl Default for SerialMux {
    fn default() -> Self {
        Self::new()
    }
}
