//! Adapters: concrete transports and observers for the serial layer.
//!
//! | Adapter     | Implements        | Connects to                    |
//! |-------------|-------------------|--------------------------------|
//! | `uart`      | SerialTransport   | UART peripheral (`UartPort`)   |
//! | `nus`       | SerialTransport   | BLE UART service (`NusPort`)   |
//! | `loopback`  | SerialTransport   | In-memory peer (host, tests)   |
//! | `log_sink`  | EventObserver     | `log` facade                   |

pub mod log_sink;
pub mod loopback;
pub mod nus;
pub mod uart;
