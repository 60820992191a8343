//! CLI-side configuration: file location, flag overrides and redaction.
//!
//! Loading and layering live in `ledwall-config`; this module only folds
//! the global flags on top of the result.

use std::path::PathBuf;

use clap::ValueEnum;
use tracing::{debug, info};

use ledwall_config::Config;
use ledwall_core::{ConnectionParams, TransportKind};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;

/// The config file in effect: `--config` / `LEDWALL_CONFIG`, else the
/// platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(ledwall_config::config_path)
}

/// Load the layered config and apply flag overrides.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_path(global);
    debug!(path = %path.display(), "loading config");
    let mut cfg = ledwall_config::load_config_from(&path)?;

    if let Some(transport) = global.transport {
        cfg.device.transport = transport.into();
    }
    if let Some(ref port) = global.port {
        cfg.device.port = Some(port.clone());
    }
    if let Some(ref host) = global.host {
        cfg.device.host = Some(host.clone());
    }
    Ok(cfg)
}

/// `--output` wins; otherwise the config's `defaults.output`, falling
/// back to a table when that value is unrecognized.
pub fn output_format(global: &GlobalOpts, cfg: &Config) -> OutputFormat {
    global.output.unwrap_or_else(|| {
        OutputFormat::from_str(&cfg.defaults.output, true).unwrap_or(OutputFormat::Table)
    })
}

/// Where to connect, with a pointed error when no endpoint is set.
///
/// A serial transport without a port falls back to the first
/// controller-like port the OS reports.
pub fn connection_params(global: &GlobalOpts, cfg: &Config) -> Result<ConnectionParams, CliError> {
    let kind = cfg.device.transport;
    let (flag, key, endpoint) = match kind {
        TransportKind::Serial => ("port", "device.port", &cfg.device.port),
        TransportKind::Network => ("host", "device.host", &cfg.device.host),
    };
    if endpoint.as_deref().is_none_or(|e| e.trim().is_empty()) {
        if kind == TransportKind::Serial {
            match ledwall_api::resolve_port(None) {
                Ok(port) => {
                    info!(%port, "no port configured, using detected controller");
                    return Ok(ConnectionParams::serial(port));
                }
                Err(e) => debug!(error = %e, "serial auto-detection found nothing"),
            }
        }
        return Err(CliError::NoEndpoint {
            transport: kind.to_string(),
            flag,
            key,
            path: config_path(global).display().to_string(),
        });
    }
    Ok(cfg.connection_params(None)?)
}

/// A copy safe to print: plaintext secrets replaced.
pub fn redacted(cfg: &Config) -> Config {
    let mut out = cfg.clone();
    if out.routes.admin_pin.is_some() {
        out.routes.admin_pin = Some("<redacted>".into());
    }
    out
}
