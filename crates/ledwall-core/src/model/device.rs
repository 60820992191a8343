// ── Device-side types ──

use serde::{Deserialize, Serialize};

use ledwall_api::{Rgb, TransportKind};

/// What the controller reports about itself via `INFO`.
///
/// Refreshed on connect and on demand; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub num_leds: usize,
    pub brightness: u8,
}

impl DeviceInfo {
    /// Parse the payload of an `INFO` reply (`NUM_LEDS <n> BRIGHT <b>`).
    ///
    /// Tokens may come in any order; both are required and `num_leds`
    /// must be positive.
    pub fn parse(payload: &str) -> Option<Self> {
        let tokens: Vec<&str> = payload.split_whitespace().collect();
        let mut num_leds = None;
        let mut brightness = None;
        for pair in tokens.windows(2) {
            match pair {
                ["NUM_LEDS", n] => num_leds = n.parse::<usize>().ok(),
                ["BRIGHT", b] => brightness = b.parse::<u8>().ok(),
                _ => {}
            }
        }
        Some(Self {
            num_leds: num_leds.filter(|n| *n > 0)?,
            brightness: brightness?,
        })
    }
}

/// One pixel address plus its color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixel {
    pub index: usize,
    pub color: Rgb,
}

/// Where to connect: transport plus port name or host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    pub kind: TransportKind,
    pub endpoint: String,
}

impl ConnectionParams {
    pub fn new(kind: TransportKind, endpoint: impl Into<String>) -> Self {
        Self {
            kind,
            endpoint: endpoint.into(),
        }
    }

    pub fn serial(port: impl Into<String>) -> Self {
        Self::new(TransportKind::Serial, port)
    }

    pub fn network(host: impl Into<String>) -> Self {
        Self::new(TransportKind::Network, host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_info_payload() {
        assert_eq!(
            DeviceInfo::parse("NUM_LEDS 35 BRIGHT 32"),
            Some(DeviceInfo {
                num_leds: 35,
                brightness: 32
            })
        );
        assert_eq!(
            DeviceInfo::parse("BRIGHT 0 NUM_LEDS 1"),
            Some(DeviceInfo {
                num_leds: 1,
                brightness: 0
            })
        );
    }

    #[test]
    fn rejects_incomplete_or_zero_info() {
        assert_eq!(DeviceInfo::parse(""), None);
        assert_eq!(DeviceInfo::parse("NUM_LEDS 35"), None);
        assert_eq!(DeviceInfo::parse("NUM_LEDS 0 BRIGHT 10"), None);
        assert_eq!(DeviceInfo::parse("NUM_LEDS 35 BRIGHT 300"), None);
    }
}
