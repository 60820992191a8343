// Shared transport abstractions.
//
// Serial and network channels both implement `TransportChannel`, so the
// device layer never knows which one it is talking to. `TransportConfig`
// carries the tuning both of them need.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Baud rate the controller firmware listens on.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Which physical path commands travel over.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum TransportKind {
    /// Point-to-point USB serial link.
    #[default]
    #[strum(to_string = "serial")]
    Serial,
    /// HTTP relay on the controller's network interface.
    #[serde(alias = "wifi")]
    #[strum(to_string = "network", serialize = "wifi")]
    Network,
}

/// One strictly synchronous command/response channel to a device.
///
/// Exactly one command is ever in flight: `send_command` takes `&mut self`
/// and does not return until one full reply line has been drained or the
/// timeout fires.
#[async_trait]
pub trait TransportChannel: Send {
    /// Which transport this channel rides on.
    fn kind(&self) -> TransportKind;

    /// Port name or host this channel was opened against.
    fn endpoint(&self) -> &str;

    /// Send one command line and return the single `OK…`/`ERR …` reply line.
    async fn send_command(&mut self, line: &str) -> Result<String, Error>;

    /// Release the underlying resource. Idempotent; later sends fail with
    /// [`Error::NotConnected`].
    async fn close(&mut self);
}

/// Shared transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Serial line speed.
    pub baud_rate: u32,
    /// How long to wait for one reply line.
    pub command_timeout: Duration,
    /// Delay after opening a serial port before talking to it. Opening the
    /// port resets most ESP32 boards.
    pub boot_delay: Duration,
    /// Longest reply line accepted before the codec gives up on it.
    pub max_line_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD,
            command_timeout: Duration::from_secs(3),
            boot_delay: Duration::from_millis(2500),
            max_line_len: 256,
        }
    }
}

impl TransportConfig {
    /// Timeout in whole milliseconds, for error reporting.
    pub fn timeout_ms(&self) -> u64 {
        u64::try_from(self.command_timeout.as_millis()).unwrap_or(u64::MAX)
    }

    /// Build a `reqwest::Client` for the network relay.
    pub fn build_http_client(&self, endpoint: &str) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.command_timeout)
            .user_agent(concat!("ledwall/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::io(endpoint, format!("failed to build HTTP client: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn transport_kind_accepts_wifi_alias() {
        assert_eq!("serial".parse::<TransportKind>().unwrap(), TransportKind::Serial);
        assert_eq!("Network".parse::<TransportKind>().unwrap(), TransportKind::Network);
        assert_eq!("wifi".parse::<TransportKind>().unwrap(), TransportKind::Network);
        assert_eq!(TransportKind::Network.to_string(), "network");
    }

    #[test]
    fn default_timeout_in_ms() {
        assert_eq!(TransportConfig::default().timeout_ms(), 3000);
    }
}
