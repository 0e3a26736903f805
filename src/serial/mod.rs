//! Line-oriented serial subsystem.
//!
//! Bytes arrive from a transport's driver callback, accumulate in a
//! per-channel ring, and are framed into delimiter-terminated lines on
//! demand. The multiplexer hides which channel a line came from.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        Serial Stack                            │
//! │                                                                │
//! │  ┌───────────┐  RxHandle  ┌────────────┐   ┌──────────────┐   │
//! │  │ Transport │───────────▶│ RingBuffer │──▶│ LineFramer   │   │
//! │  │ (trait)   │            │ (SPSC)     │   │ (delimiters) │   │
//! │  └───────────┘            └────────────┘   └──────────────┘   │
//! │       ▲                          │                │           │
//! │       │ transmit                 ▼ events         ▼ lines     │
//! │  ┌────────────────────────────────────────────────────────┐   │
//! │  │ SerialChannel  (one per link: wired, wireless)         │   │
//! │  └────────────────────────────────────────────────────────┘   │
//! │                             ▲                                  │
//! │                             │ Box<dyn LineChannel>             │
//! │                    ┌────────────────┐                          │
//! │                    │   SerialMux    │◀── application           │
//! │                    └────────────────┘                          │
//! └────────────────────────────────────────────────────────────────┘
//! ```

pub mod channel;
pub mod framer;
pub mod mux;
pub mod ring;
pub mod transport;
