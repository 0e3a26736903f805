//! Serial layer configuration.
//!
//! Buffer capacities are compile-time constants (const generics on the
//! channel types, defaulting to the values below). Everything else is
//! runtime configuration in [`SerialConfig`], loadable from JSON.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::serial::channel::ChannelMask;
use crate::sync::Timeout;

/// Receive ring capacity per channel, and the longest line it can frame.
pub const DEFAULT_INPUT_BUFFER_SIZE: usize = 256;
/// Scratch capacity for formatted sends.
pub const DEFAULT_OUTPUT_BUFFER_SIZE: usize = 256;
/// Observer slots per channel.
pub const DEFAULT_OBSERVER_LIMIT: usize = 4;
/// Longest delimiter set a channel stores.
pub const MAX_DELIMITERS: usize = 8;

/// BLE default ATT payload (23-byte MTU minus 3-byte header).
pub const DEFAULT_NUS_PAYLOAD: usize = 20;
/// How long `disable` waits for the UART to confirm rx is off.
pub const DEFAULT_UART_DISABLE_TIMEOUT_MS: u32 = 10;
/// UART rx inactivity timeout before a partial burst is delivered.
pub const DEFAULT_UART_RX_TIMEOUT_MS: u32 = 100;

/// Validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    ValidationFailed(&'static str),
    Parse,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(why) => write!(f, "invalid config: {}", why),
            Self::Parse => write!(f, "config parse error"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Runtime configuration of the serial layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Line terminators. Empty: any received bytes form a line.
    pub delimiters: heapless::Vec<u8, MAX_DELIMITERS>,
    /// Channels to enable at start.
    pub channels: ChannelMask,
    /// UART rx inactivity timeout (milliseconds).
    pub uart_rx_timeout_ms: u32,
    /// Wait for the UART rx-disabled acknowledgement (milliseconds).
    pub uart_disable_timeout_ms: u32,
    /// BLE payload size before MTU exchange (bytes).
    pub nus_default_payload: u16,
    /// Default transmit-gate wait for sends (milliseconds, 0 = no wait).
    pub send_timeout_ms: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let mut delimiters = heapless::Vec::new();
        // Capacity is MAX_DELIMITERS, two always fit.
        let _ = delimiters.extend_from_slice(b"\r\n");
        Self {
            delimiters,
            channels: ChannelMask::ALL,
            uart_rx_timeout_ms: DEFAULT_UART_RX_TIMEOUT_MS,
            uart_disable_timeout_ms: DEFAULT_UART_DISABLE_TIMEOUT_MS,
            nus_default_payload: DEFAULT_NUS_PAYLOAD as u16,
            send_timeout_ms: 100,
        }
    }
}

impl SerialConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::ValidationFailed("no channel selected"));
        }
        if self.uart_rx_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed("uart rx timeout must be non-zero"));
        }
        if self.uart_disable_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "uart disable timeout must be non-zero",
            ));
        }
        if self.nus_default_payload == 0 {
            return Err(ConfigError::ValidationFailed("nus payload must be non-zero"));
        }
        let mut seen = [false; 256];
        for &d in &self.delimiters {
            if core::mem::replace(&mut seen[d as usize], true) {
                return Err(ConfigError::ValidationFailed("duplicate delimiter"));
            }
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(|_| ConfigError::Parse)
    }

    pub fn send_timeout(&self) -> Timeout {
        Timeout::from_millis(u64::from(self.send_timeout_ms))
    }

    pub fn uart_rx_timeout(&self) -> core::time::Duration {
        core::time::Duration::from_millis(u64::from(self.uart_rx_timeout_ms))
    }

    pub fn uart_disable_timeout(&self) -> core::time::Duration {
        core::time::Duration::from_millis(u64::from(self.uart_disable_timeout_ms))
    }
}
