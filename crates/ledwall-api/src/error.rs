use thiserror::Error;

/// Top-level error type for the `ledwall-api` crate.
///
/// Every variant carries the endpoint (serial port name or network host) it
/// happened on, so callers can surface it without threading extra context.
/// `ledwall-core` folds these into `CoreError::Transport`.
#[derive(Debug, Error)]
pub enum Error {
    // ── Lifecycle ───────────────────────────────────────────────────
    /// The channel was closed (or never opened).
    #[error("Not connected to {endpoint}")]
    NotConnected { endpoint: String },

    /// The endpoint identifier could not be turned into something openable.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The liveness handshake after opening did not answer `OK`.
    #[error("Handshake with {endpoint} failed: expected OK, got {reply:?}")]
    Handshake { endpoint: String, reply: String },

    // ── Exchange ────────────────────────────────────────────────────
    /// No newline-terminated reply arrived within the timeout window.
    #[error("Timed out after {timeout_ms}ms waiting for a reply from {endpoint}")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// Underlying read/write or HTTP failure.
    #[error("I/O error on {endpoint}: {reason}")]
    Io { endpoint: String, reason: String },

    /// A reply arrived but does not match the `OK…` / `ERR …` grammar.
    #[error("Malformed reply from {endpoint}: {line:?}")]
    Malformed { endpoint: String, line: String },
}

/// Coarse classification used by the session layer and error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    Io,
    NotConnected,
}

impl Error {
    /// Classify this error into the three transport failure kinds.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConnected { .. } => ErrorKind::NotConnected,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::InvalidEndpoint { .. }
            | Self::Handshake { .. }
            | Self::Io { .. }
            | Self::Malformed { .. } => ErrorKind::Io,
        }
    }

    /// The endpoint this error occurred on.
    pub fn endpoint(&self) -> &str {
        match self {
            Self::NotConnected { endpoint }
            | Self::InvalidEndpoint { endpoint, .. }
            | Self::Handshake { endpoint, .. }
            | Self::Timeout { endpoint, .. }
            | Self::Io { endpoint, .. }
            | Self::Malformed { endpoint, .. } => endpoint,
        }
    }

    /// Returns `true` if the device simply did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub(crate) fn io(endpoint: &str, reason: impl std::fmt::Display) -> Self {
        Self::Io {
            endpoint: endpoint.to_owned(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_collapse_to_three_classes() {
        let timeout = Error::Timeout {
            endpoint: "/dev/ttyUSB0".into(),
            timeout_ms: 500,
        };
        let malformed = Error::Malformed {
            endpoint: "10.0.0.2".into(),
            line: "READY".into(),
        };
        let closed = Error::NotConnected {
            endpoint: "10.0.0.2".into(),
        };

        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(malformed.kind(), ErrorKind::Io);
        assert_eq!(closed.kind(), ErrorKind::NotConnected);
        assert_eq!(timeout.endpoint(), "/dev/ttyUSB0");
        assert_eq!(ErrorKind::NotConnected.to_string(), "not_connected");
    }
}
