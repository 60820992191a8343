// ── Runtime configuration ──
//
// These types describe how the session talks to the wall and where the
// route catalog lives. They never touch disk themselves; `ledwall-config`
// builds them from files and the environment and hands them in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use ledwall_api::{ColorOrder, TransportConfig};

/// Route levels used when none are configured.
pub const DEFAULT_LEVELS: [u32; 4] = [4, 5, 6, 7];
/// Slots per level used when none are configured.
pub const DEFAULT_SLOTS_PER_LEVEL: u32 = 3;
/// LED count assumed until a device reports its own.
pub const DEFAULT_NUM_LEDS: usize = 35;

/// How `apply_frame` puts a frame on the wall.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum FrameMode {
    /// One `SETN` per pixel followed by a single `SHOW`.
    #[default]
    PerPixel,
    /// A single `FRAME <hex>` command. Needs firmware support.
    Bulk,
}

/// Tuning for [`ConnectionSession`](crate::ConnectionSession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub transport: TransportConfig,
    /// Longest a caller waits for the command lock before `Busy`.
    pub lock_wait: Duration,
    pub color_order: ColorOrder,
    pub frame_mode: FrameMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            lock_wait: Duration::from_secs(2),
            color_order: ColorOrder::default(),
            frame_mode: FrameMode::default(),
        }
    }
}

/// Where and how the route catalog is kept.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub levels: Vec<u32>,
    pub slots_per_level: u32,
    pub num_leds: usize,
    /// Write the built-in catalog when the file does not exist yet.
    pub seed_defaults: bool,
    /// Secret that gates `put`. With none configured every write is refused.
    pub admin_pin: Option<SecretString>,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            levels: DEFAULT_LEVELS.to_vec(),
            slots_per_level: DEFAULT_SLOTS_PER_LEVEL,
            num_leds: DEFAULT_NUM_LEDS,
            seed_defaults: true,
            admin_pin: None,
        }
    }

    pub fn with_admin_pin(mut self, pin: impl Into<String>) -> Self {
        self.admin_pin = Some(SecretString::from(pin.into()));
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn frame_mode_names() {
        assert_eq!(FrameMode::PerPixel.to_string(), "per-pixel");
        assert_eq!("bulk".parse::<FrameMode>().unwrap(), FrameMode::Bulk);
        assert_eq!(
            serde_json::from_str::<FrameMode>("\"per-pixel\"").unwrap(),
            FrameMode::PerPixel
        );
    }

    #[test]
    fn store_defaults() {
        let cfg = StoreConfig::new("/tmp/routes.json");
        assert_eq!(cfg.levels, vec![4, 5, 6, 7]);
        assert_eq!(cfg.slots_per_level, 3);
        assert_eq!(cfg.num_leds, 35);
        assert!(cfg.admin_pin.is_none());
    }
}
