//! Log-based event observer.
//!
//! Implements [`EventObserver`] by writing channel events to the `log`
//! facade. Register one per channel to trace traffic and overruns.

use log::{debug, warn};

use crate::events::{EventObserver, SerialEvent};
use crate::serial::channel::ChannelKind;

/// Observer that logs every [`SerialEvent`] of one channel.
pub struct LogObserver {
    kind: ChannelKind,
}

impl LogObserver {
    pub fn new(kind: ChannelKind) -> Self {
        Self { kind }
    }
}

impl EventObserver for LogObserver {
    fn on_event(&self, event: &SerialEvent<'_>) {
        match event {
            SerialEvent::NewData { count, data } => {
                debug!(
                    "RX    | {} | {} bytes | {:?}",
                    self.kind,
                    count,
                    String::from_utf8_lossy(data)
                );
            }
            SerialEvent::BufferOverflow { lost } => {
                warn!("OVFL  | {} | {} bytes lost", self.kind, lost);
            }
        }
    }
}
