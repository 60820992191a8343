// Network relay transport.
//
// The controller's network interface exposes the line protocol over a single
// HTTP endpoint: `GET /cmd?q=<command>`, the body carrying the reply line.
// Device rejections come back as non-success statuses with an `ERR …` body;
// those are still replies, not transport failures.

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::error::Error;
use crate::protocol::Reply;
use crate::transport::{TransportChannel, TransportConfig, TransportKind};

/// HTTP-relayed command channel.
pub struct NetworkChannel {
    http: reqwest::Client,
    base_url: Url,
    host: String,
    timeout_ms: u64,
    open: bool,
}

impl NetworkChannel {
    /// Create a channel for `host` (`10.0.0.7`, `wall.local:8080` or a full
    /// `http://` URL).
    pub fn open(host: &str, config: &TransportConfig) -> Result<Self, Error> {
        let http = config.build_http_client(host)?;
        let mut channel = Self::with_client(http, host)?;
        channel.timeout_ms = config.timeout_ms();
        Ok(channel)
    }

    /// Create a channel from a pre-built `reqwest::Client`.
    ///
    /// Use this when the client's timeout and TLS settings are managed
    /// elsewhere (tests point it at a mock server).
    pub fn with_client(http: reqwest::Client, host: &str) -> Result<Self, Error> {
        let host = host.trim();
        let base_url = base_url_for(host)?;
        Ok(Self {
            http,
            base_url,
            host: host.to_owned(),
            timeout_ms: TransportConfig::default().timeout_ms(),
            open: true,
        })
    }

    /// The URL a given command line is sent to.
    pub fn command_url(&self, line: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_path("/cmd");
        url.query_pairs_mut().clear().append_pair("q", line);
        url
    }

    fn map_send_error(&self, e: &reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::Timeout {
                endpoint: self.host.clone(),
                timeout_ms: self.timeout_ms,
            }
        } else {
            Error::io(&self.host, e)
        }
    }
}

fn base_url_for(host: &str) -> Result<Url, Error> {
    if host.is_empty() {
        return Err(Error::InvalidEndpoint {
            endpoint: String::new(),
            reason: "host is empty".into(),
        });
    }
    let raw = if host.contains("://") {
        host.to_owned()
    } else {
        format!("http://{host}")
    };
    let url = Url::parse(&raw).map_err(|e| Error::InvalidEndpoint {
        endpoint: host.to_owned(),
        reason: e.to_string(),
    })?;
    if url.host_str().is_none() {
        return Err(Error::InvalidEndpoint {
            endpoint: host.to_owned(),
            reason: "no host name".into(),
        });
    }
    Ok(url)
}

/// First line of `body` that fits the reply grammar.
fn reply_line(body: &str) -> Option<&str> {
    body.lines()
        .map(str::trim)
        .find(|line| Reply::parse(line).is_some())
}

#[async_trait]
impl TransportChannel for NetworkChannel {
    fn kind(&self) -> TransportKind {
        TransportKind::Network
    }

    fn endpoint(&self) -> &str {
        &self.host
    }

    async fn send_command(&mut self, line: &str) -> Result<String, Error> {
        if !self.open {
            return Err(Error::NotConnected {
                endpoint: self.host.clone(),
            });
        }

        let url = self.command_url(line.trim());
        debug!(host = %self.host, %url, "send");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;
        let status = resp.status();
        let body = resp.text().await.map_err(|e| self.map_send_error(&e))?;

        let accepted = reply_line(&body).filter(|reply| {
            status.is_success() || matches!(Reply::parse(reply), Some(Reply::Err(_)))
        });
        if let Some(reply) = accepted {
            debug!(host = %self.host, status = status.as_u16(), reply, "recv");
            return Ok(reply.to_owned());
        }

        if !status.is_success() {
            warn!(host = %self.host, status = status.as_u16(), "relay returned error status");
            return Err(Error::io(
                &self.host,
                format!("HTTP {status}: {}", body.trim()),
            ));
        }
        Err(Error::Malformed {
            endpoint: self.host.clone(),
            line: body.trim().to_owned(),
        })
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            debug!(host = %self.host, "network channel closed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_form_encoded() {
        let channel = NetworkChannel::with_client(reqwest::Client::new(), "10.0.0.7").unwrap();
        let url = channel.command_url("SET 4 255 0 0");
        assert_eq!(url.as_str(), "http://10.0.0.7/cmd?q=SET+4+255+0+0");
    }

    #[test]
    fn explicit_scheme_and_port_are_kept() {
        let channel =
            NetworkChannel::with_client(reqwest::Client::new(), "http://wall.local:8080").unwrap();
        assert_eq!(
            channel.command_url("PING").as_str(),
            "http://wall.local:8080/cmd?q=PING"
        );
    }

    #[test]
    fn empty_host_is_rejected() {
        let err = NetworkChannel::with_client(reqwest::Client::new(), "  ").err().unwrap();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    #[test]
    fn reply_line_skips_noise() {
        assert_eq!(reply_line("READY\nOK\n"), Some("OK"));
        assert_eq!(reply_line("<html>"), None);
    }
}
