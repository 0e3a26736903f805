//! Line-oriented serial layer.
//!
//! Multiplexes a wired (UART) and a wireless (BLE UART) byte stream
//! behind one API that yields delimiter-terminated lines and sends raw
//! or formatted output. Hardware sits behind port traits in
//! [`adapters`], so everything here also runs on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod config;
pub mod events;
pub mod serial;
pub mod sync;

mod error;

pub use config::SerialConfig;
pub use error::{Result, SerialError};
pub use events::{EventObserver, ObserverId, SerialEvent};
pub use serial::channel::{ChannelKind, ChannelMask, LineChannel, SerialChannel};
pub use serial::framer::Line;
pub use serial::mux::SerialMux;
pub use serial::transport::{RxHandle, SerialTransport, TransportError};
pub use sync::Timeout;
