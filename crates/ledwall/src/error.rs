//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use ledwall_config::ConfigError;
use ledwall_core::{CoreError, ErrorKind};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const BUSY: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Wall / catalog ───────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(ledwall::wall))]
    Wall {
        kind: ErrorKind,
        message: String,
        #[help]
        hint: Option<String>,
    },

    // ── Connection setup ─────────────────────────────────────────────
    #[error("No {transport} endpoint configured")]
    #[diagnostic(
        code(ledwall::no_endpoint),
        help(
            "Pass --{flag}, or set `{key}` in {path}.\n\
             Run: ledwall ports   to list serial ports"
        )
    )]
    NoEndpoint {
        transport: String,
        flag: &'static str,
        key: &'static str,
        path: String,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ledwall::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(ledwall::config),
        help("Run: ledwall config show   to inspect the effective configuration")
    )]
    Config(ConfigError),

    #[error("Config file already exists at {path}")]
    #[diagnostic(code(ledwall::config_exists), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Could not read the admin pin: {reason}")]
    #[diagnostic(
        code(ledwall::prompt),
        help("Pass --pin or set LEDWALL_PIN in non-interactive contexts.")
    )]
    Prompt { reason: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(ledwall::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render output: {reason}")]
    #[diagnostic(code(ledwall::render))]
    Render { reason: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Wall { kind, .. } => match kind {
                ErrorKind::Validation | ErrorKind::Config => exit_code::USAGE,
                ErrorKind::Auth => exit_code::AUTH,
                ErrorKind::NotFound => exit_code::NOT_FOUND,
                ErrorKind::Busy => exit_code::BUSY,
                ErrorKind::NotConnected | ErrorKind::Io => exit_code::CONNECTION,
                ErrorKind::Timeout => exit_code::TIMEOUT,
                ErrorKind::Device | ErrorKind::PartialFrame | ErrorKind::Persistence => {
                    exit_code::GENERAL
                }
            },
            Self::NoEndpoint { .. }
            | Self::Validation { .. }
            | Self::Config(_)
            | Self::ConfigExists { .. }
            | Self::Json(_) => exit_code::USAGE,
            Self::Prompt { .. } => exit_code::AUTH,
            Self::Io(_) | Self::Render { .. } => exit_code::GENERAL,
        }
    }
}

// ── Lower-layer error mapping ────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let report = err.report();
        CliError::Wall {
            kind: report.kind,
            message: report.message,
            hint: report.hint,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_kind_and_hint() {
        let err = CliError::from(CoreError::NotFound { level: 4, slot: 2 });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert!(err.to_string().contains("level 4, slot 2"));
        let CliError::Wall { hint, .. } = err else {
            panic!("expected wall error");
        };
        assert!(hint.is_some());
    }

    #[test]
    fn busy_and_auth_have_distinct_codes() {
        assert_eq!(CliError::from(CoreError::Busy { waited_ms: 2000 }).exit_code(), exit_code::BUSY);
        assert_eq!(
            CliError::from(CoreError::Auth { message: "wrong pin".into() }).exit_code(),
            exit_code::AUTH
        );
    }

    #[test]
    fn config_validation_becomes_usage_error() {
        let err = CliError::from(ConfigError::Validation {
            field: "routes.levels".into(),
            reason: "levels must be unique".into(),
        });
        assert!(matches!(err, CliError::Validation { .. }));
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
