// ── Core error types ──
//
// User-facing errors from ledwall-core. Transport failures keep their
// `ledwall_api::Error` as the source so the endpoint is never lost;
// everything else is a domain-level variant. `ErrorReport` is the
// serializable shape handed to dispatchers.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Input errors (never reach I/O) ───────────────────────────────
    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Not connected to a device")]
    NotConnected,

    #[error("Transport failure on {endpoint}: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: ledwall_api::Error,
    },

    #[error("Device is busy: command lock not acquired within {waited_ms}ms")]
    Busy { waited_ms: u64 },

    // ── Device errors ────────────────────────────────────────────────
    #[error("Device rejected {command}: {reason}")]
    Device { command: String, reason: String },

    #[error("Frame aborted at pixel {failed_index} ({applied} applied): {cause}")]
    PartialFrame {
        failed_index: usize,
        applied: usize,
        #[source]
        cause: Box<CoreError>,
    },

    // ── Catalog errors ───────────────────────────────────────────────
    #[error("No route stored at level {level}, slot {slot}")]
    NotFound { level: u32, slot: u32 },

    #[error("Failed to persist {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Stable classification for reports and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Auth,
    NotConnected,
    Timeout,
    Io,
    Busy,
    Device,
    PartialFrame,
    NotFound,
    Persistence,
    Config,
}

/// Serializable error summary: what went wrong and what to try next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::NotConnected => ErrorKind::NotConnected,
            Self::Transport { source, .. } => match source.kind() {
                ledwall_api::ErrorKind::Timeout => ErrorKind::Timeout,
                ledwall_api::ErrorKind::Io => ErrorKind::Io,
                ledwall_api::ErrorKind::NotConnected => ErrorKind::NotConnected,
            },
            Self::Busy { .. } => ErrorKind::Busy,
            Self::Device { .. } => ErrorKind::Device,
            Self::PartialFrame { .. } => ErrorKind::PartialFrame,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Persistence { .. } => ErrorKind::Persistence,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Whether the channel behind this error can no longer be trusted.
    ///
    /// A partial frame counts when its cause was a transport failure.
    pub fn is_transport(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::PartialFrame { cause, .. } => cause.is_transport(),
            _ => false,
        }
    }

    /// A short suggestion for the operator, where one exists.
    pub fn hint(&self) -> Option<String> {
        let hint = match self.kind() {
            ErrorKind::Validation => "Check the arguments against the wall's LED count and the catalog's levels and slots",
            ErrorKind::Auth => "Supply the admin pin configured for the route catalog",
            ErrorKind::NotConnected => "Connect to the wall first",
            ErrorKind::Timeout => "The device did not answer in time; check power and cabling, or raise the command timeout",
            ErrorKind::Io => "Check that the port or host is correct and not in use by another program",
            ErrorKind::Busy => "Another command is in progress; try again shortly",
            ErrorKind::Device => return None,
            ErrorKind::PartialFrame => "The wall may show a mix of old and new pixels; re-apply the frame",
            ErrorKind::NotFound => "List the catalog to see which slots are occupied",
            ErrorKind::Persistence => "Check permissions and free space for the routes file",
            ErrorKind::Config => "Run `ledwall config show` to inspect the effective configuration",
        };
        Some(hint.to_owned())
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
            hint: self.hint(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ledwall_api::Error> for CoreError {
    fn from(err: ledwall_api::Error) -> Self {
        match err {
            ledwall_api::Error::InvalidEndpoint { endpoint, reason } => CoreError::Validation {
                message: format!("invalid endpoint '{endpoint}': {reason}"),
            },
            other => CoreError::Transport {
                endpoint: other.endpoint().to_owned(),
                source: other,
            },
        }
    }
}
