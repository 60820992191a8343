//! Configuration for the ledwall CLI.
//!
//! A TOML file plus `LEDWALL_` environment overrides, admin pin resolution
//! (env var, keyring, plaintext) and translation into the
//! `ledwall_core` session and store configs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use ledwall_api::TransportConfig;
use ledwall_core::{
    ColorOrder, ConnectionParams, FrameMode, SessionConfig, StoreConfig, TransportKind,
};

/// Keyring service name for stored secrets.
pub const KEYRING_SERVICE: &str = "ledwall";
/// Keyring account holding the route catalog admin pin.
pub const KEYRING_ADMIN_PIN: &str = "admin-pin";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub device: DeviceSection,

    #[serde(default)]
    pub routes: RoutesSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    /// Default output format for the CLI.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}

/// How to reach the wall controller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DeviceSection {
    pub transport: TransportKind,
    /// Serial port name (e.g. `/dev/ttyUSB0`, `COM3`).
    pub port: Option<String>,
    /// Network relay host (e.g. `10.0.0.7` or `wall.local:8080`).
    pub host: Option<String>,
    pub baud: u32,
    pub timeout_ms: u64,
    pub boot_delay_ms: u64,
    pub lock_wait_ms: u64,
    pub color_order: ColorOrder,
    pub frame_mode: FrameMode,
}

impl Default for DeviceSection {
    fn default() -> Self {
        let transport = TransportConfig::default();
        Self {
            transport: TransportKind::Serial,
            port: None,
            host: None,
            baud: transport.baud_rate,
            timeout_ms: transport.timeout_ms(),
            boot_delay_ms: u64::try_from(transport.boot_delay.as_millis()).unwrap_or(u64::MAX),
            lock_wait_ms: 2000,
            color_order: ColorOrder::default(),
            frame_mode: FrameMode::default(),
        }
    }
}

/// Where the route catalog lives and who may change it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesSection {
    /// Catalog file. Defaults to `routes.json` in the platform data dir.
    pub path: Option<PathBuf>,
    pub levels: Vec<u32>,
    pub slots_per_level: u32,
    pub num_leds: usize,
    pub seed_defaults: bool,
    /// Admin pin (plaintext; prefer the keyring or an env var).
    pub admin_pin: Option<String>,
    /// Environment variable holding the admin pin.
    pub admin_pin_env: Option<String>,
}

impl Default for RoutesSection {
    fn default() -> Self {
        Self {
            path: None,
            levels: ledwall_core::config::DEFAULT_LEVELS.to_vec(),
            slots_per_level: ledwall_core::config::DEFAULT_SLOTS_PER_LEVEL,
            num_leds: ledwall_core::config::DEFAULT_NUM_LEDS,
            seed_defaults: true,
            admin_pin: None,
            admin_pin_env: Some("LEDWALL_ADMIN_PIN".into()),
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "ledwall", "ledwall")
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ledwall");
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of the route catalog.
pub fn default_routes_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("routes.json"),
        |dirs| dirs.data_dir().join("routes.json"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Layered figment: defaults, then the TOML file, then `LEDWALL_*` env
/// vars (`__` separates nesting, e.g. `LEDWALL_DEVICE__PORT`).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("LEDWALL_").split("__"))
}

/// Load and validate the config at `path`. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment(path).extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to pretty TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Validation and translation ──────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.device;
        if d.baud == 0 {
            return Err(ConfigError::invalid("device.baud", "must be positive"));
        }
        if d.timeout_ms == 0 {
            return Err(ConfigError::invalid("device.timeout_ms", "must be positive"));
        }
        if d.lock_wait_ms == 0 {
            return Err(ConfigError::invalid("device.lock_wait_ms", "must be positive"));
        }

        let r = &self.routes;
        if r.levels.is_empty() {
            return Err(ConfigError::invalid("routes.levels", "at least one level is required"));
        }
        let mut sorted = r.levels.clone();
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != r.levels.len() {
            return Err(ConfigError::invalid("routes.levels", "levels must be unique"));
        }
        if r.slots_per_level == 0 {
            return Err(ConfigError::invalid("routes.slots_per_level", "must be positive"));
        }
        if r.num_leds == 0 {
            return Err(ConfigError::invalid("routes.num_leds", "must be positive"));
        }
        Ok(())
    }

    pub fn transport_config(&self) -> TransportConfig {
        let d = &self.device;
        TransportConfig {
            baud_rate: d.baud,
            command_timeout: Duration::from_millis(d.timeout_ms),
            boot_delay: Duration::from_millis(d.boot_delay_ms),
            ..TransportConfig::default()
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            transport: self.transport_config(),
            lock_wait: Duration::from_millis(self.device.lock_wait_ms),
            color_order: self.device.color_order,
            frame_mode: self.device.frame_mode,
        }
    }

    /// Build the store config, resolving the admin pin.
    pub fn store_config(&self) -> StoreConfig {
        let r = &self.routes;
        StoreConfig {
            path: r.path.clone().unwrap_or_else(default_routes_path),
            levels: r.levels.clone(),
            slots_per_level: r.slots_per_level,
            num_leds: r.num_leds,
            seed_defaults: r.seed_defaults,
            admin_pin: resolve_admin_pin(r),
        }
    }

    /// Where to connect, with an explicit transport overriding the config.
    pub fn connection_params(&self, kind: Option<TransportKind>) -> Result<ConnectionParams, ConfigError> {
        let kind = kind.unwrap_or(self.device.transport);
        let (field, endpoint) = match kind {
            TransportKind::Serial => ("device.port", self.device.port.as_deref()),
            TransportKind::Network => ("device.host", self.device.host.as_deref()),
        };
        let endpoint = endpoint
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ConfigError::invalid(field, format!("required for {kind} transport")))?;
        Ok(ConnectionParams::new(kind, endpoint))
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the admin pin: named env var, then the system keyring, then
/// plaintext in the config. `None` disables route writes.
pub fn resolve_admin_pin(routes: &RoutesSection) -> Option<SecretString> {
    // 1. Env var named in the config
    if let Some(val) = routes
        .admin_pin_env
        .as_deref()
        .and_then(|name| std::env::var(name).ok())
        .filter(|v| !v.is_empty())
    {
        debug!("admin pin from environment");
        return Some(SecretString::from(val));
    }

    // 2. System keyring
    if let Ok(pin) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_ADMIN_PIN)
        .and_then(|entry| entry.get_password())
    {
        debug!("admin pin from keyring");
        return Some(SecretString::from(pin));
    }

    // 3. Plaintext in config
    routes.admin_pin.clone().map(SecretString::from)
}

/// Store the admin pin in the system keyring.
pub fn store_admin_pin(pin: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_ADMIN_PIN)
        .and_then(|entry| entry.set_password(pin))
        .map_err(|e| ConfigError::invalid("keyring", e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_without_a_file() {
        Jail::expect_with(|_jail| {
            let cfg = load_config_from(Path::new("missing.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg, Config::default());
            assert_eq!(cfg.device.baud, 115_200);
            assert_eq!(cfg.routes.levels, vec![4, 5, 6, 7]);
            assert_eq!(cfg.device.color_order, ColorOrder::Brg);
            Ok(())
        });
    }

    #[test]
    fn file_then_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "ledwall.toml",
                r#"
                [device]
                transport = "wifi"
                host = "10.0.0.7"
                color_order = "grb"
                frame_mode = "bulk"

                [routes]
                num_leds = 15
                "#,
            )?;
            jail.set_env("LEDWALL_DEVICE__TIMEOUT_MS", "750");
            jail.set_env("LEDWALL_ROUTES__SLOTS_PER_LEVEL", "5");

            let cfg = load_config_from(Path::new("ledwall.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.device.transport, TransportKind::Network);
            assert_eq!(cfg.device.color_order, ColorOrder::Grb);
            assert_eq!(cfg.device.frame_mode, FrameMode::Bulk);
            assert_eq!(cfg.device.timeout_ms, 750);
            assert_eq!(cfg.routes.slots_per_level, 5);
            assert_eq!(cfg.routes.num_leds, 15);

            let session = cfg.session_config();
            assert_eq!(session.transport.command_timeout, Duration::from_millis(750));
            assert_eq!(session.lock_wait, Duration::from_secs(2));

            let params = cfg.connection_params(None).map_err(|e| e.to_string())?;
            assert_eq!(params, ConnectionParams::network("10.0.0.7"));
            Ok(())
        });
    }

    #[test]
    fn invalid_values_are_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("ledwall.toml", "[routes]\nlevels = [4, 4]\n")?;
            let err = load_config_from(Path::new("ledwall.toml")).unwrap_err();
            assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "routes.levels"));

            jail.create_file("ledwall.toml", "[device]\ntimeout_ms = 0\n")?;
            assert!(load_config_from(Path::new("ledwall.toml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn missing_endpoint_is_validation() {
        let cfg = Config::default();
        let err = cfg.connection_params(Some(TransportKind::Serial)).unwrap_err();
        assert!(err.to_string().contains("device.port"));

        let mut cfg = Config::default();
        cfg.device.port = Some("/dev/ttyUSB0".into());
        assert_eq!(
            cfg.connection_params(None).unwrap(),
            ConnectionParams::serial("/dev/ttyUSB0")
        );
    }

    #[test]
    fn admin_pin_env_wins_over_plaintext() {
        Jail::expect_with(|jail| {
            jail.set_env("TEST_LEDWALL_PIN", "9999");
            let routes = RoutesSection {
                admin_pin: Some("1111".into()),
                admin_pin_env: Some("TEST_LEDWALL_PIN".into()),
                ..RoutesSection::default()
            };
            let pin = resolve_admin_pin(&routes).unwrap();
            assert_eq!(pin.expose_secret(), "9999");
            Ok(())
        });
    }

    #[test]
    fn save_then_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.device.port = Some("/dev/cu.usbserial-10".into());
        cfg.routes.path = Some(dir.path().join("routes.json"));

        save_config_to(&cfg, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[device]"));

        let loaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn store_config_uses_configured_path() {
        let mut cfg = Config::default();
        cfg.routes.path = Some(PathBuf::from("/srv/wall/routes.json"));
        cfg.routes.seed_defaults = false;
        let store = cfg.store_config();
        assert_eq!(store.path, PathBuf::from("/srv/wall/routes.json"));
        assert!(!store.seed_defaults);
        assert_eq!(store.num_leds, 35);
    }
}
