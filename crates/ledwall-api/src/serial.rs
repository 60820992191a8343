// Serial transport.
//
// `LineChannel` frames any byte stream with `LinesCodec` and implements the
// one-command/one-reply exchange on top of it. `SerialChannel` is that
// channel over a `tokio-serial` port; tests drive the same code over an
// in-memory duplex pipe.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialPortType, SerialStream};
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::protocol::Reply;
use crate::transport::{TransportChannel, TransportConfig, TransportKind};

/// A serial port speaking the line protocol.
pub type SerialChannel = LineChannel<SerialStream>;

/// Line-framed command channel over an arbitrary byte stream.
pub struct LineChannel<T> {
    framed: Option<Framed<T, LinesCodec>>,
    endpoint: String,
    timeout: Duration,
    max_line_len: usize,
}

impl<T> LineChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-open stream.
    pub fn new(io: T, endpoint: impl Into<String>, config: &TransportConfig) -> Self {
        Self {
            framed: Some(Framed::new(
                io,
                LinesCodec::new_with_max_length(config.max_line_len),
            )),
            endpoint: endpoint.into(),
            timeout: config.command_timeout,
            max_line_len: config.max_line_len,
        }
    }

    fn timeout_ms(&self) -> u64 {
        u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX)
    }
}

#[async_trait]
impl<T> TransportChannel for LineChannel<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_command(&mut self, line: &str) -> Result<String, Error> {
        let timeout_ms = self.timeout_ms();
        let deadline = Instant::now() + self.timeout;
        let endpoint = self.endpoint.as_str();
        let framed = self.framed.as_mut().ok_or_else(|| Error::NotConnected {
            endpoint: endpoint.to_owned(),
        })?;

        discard_stale(framed, endpoint, self.max_line_len);

        let line = line.trim();
        debug!(endpoint, command = line, "send");
        framed
            .send(line)
            .await
            .map_err(|e| Error::io(endpoint, e))?;

        loop {
            let next = tokio::time::timeout_at(deadline, framed.next())
                .await
                .map_err(|_| Error::Timeout {
                    endpoint: endpoint.to_owned(),
                    timeout_ms,
                })?;

            let received = match next {
                Some(Ok(received)) => received,
                Some(Err(e)) => return Err(Error::io(endpoint, e)),
                None => return Err(Error::io(endpoint, "port closed by peer")),
            };

            let received = received.trim();
            if received.is_empty() {
                continue;
            }
            if Reply::parse(received).is_some() {
                debug!(endpoint, reply = received, "recv");
                return Ok(received.to_owned());
            }
            // Boot banners (`READY`) and debug prints share the line.
            warn!(endpoint, line = received, "skipping non-reply line");
        }
    }

    async fn close(&mut self) {
        if self.framed.take().is_some() {
            debug!(endpoint = %self.endpoint, "serial channel closed");
        }
    }
}

/// Drop input that arrived after the previous exchange gave up on it.
///
/// A reply that lands after a timeout would otherwise be taken as the
/// answer to the next command. Whole lines already readable are consumed
/// without waiting; a trailing partial line is cleared along with the
/// codec's scan state.
fn discard_stale<T>(framed: &mut Framed<T, LinesCodec>, endpoint: &str, max_line_len: usize)
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(Some(Ok(stale))) = framed.next().now_or_never() {
        debug!(endpoint, line = stale.trim(), "discarding stale line");
    }
    let partial = framed.read_buffer().len();
    if partial > 0 {
        debug!(endpoint, bytes = partial, "discarding partial line");
        framed.read_buffer_mut().clear();
    }
    *framed.codec_mut() = LinesCodec::new_with_max_length(max_line_len);
}

/// Open a serial port, flush stale input and confirm liveness with `PING`.
pub async fn open_serial(port: &str, config: &TransportConfig) -> Result<SerialChannel, Error> {
    let port = resolve_port(Some(port))?;
    let port = port.as_str();

    let mut stream = tokio_serial::new(port, config.baud_rate)
        .timeout(config.command_timeout)
        .open_native_async()
        .map_err(|e| Error::io(port, e))?;

    // Holding DTR/RTS low keeps some boards out of reset / bootloader mode.
    if let Err(e) = stream.write_data_terminal_ready(false) {
        debug!(port, error = %e, "could not clear DTR");
    }
    if let Err(e) = stream.write_request_to_send(false) {
        debug!(port, error = %e, "could not clear RTS");
    }

    if !config.boot_delay.is_zero() {
        debug!(port, delay = ?config.boot_delay, "waiting for board boot");
        tokio::time::sleep(config.boot_delay).await;
    }

    stream
        .clear(ClearBuffer::Input)
        .map_err(|e| Error::io(port, format!("failed to flush input: {e}")))?;

    let mut channel = LineChannel::new(stream, port, config);
    handshake(&mut channel).await?;
    info!(port, baud = config.baud_rate, "serial channel open");
    Ok(channel)
}

/// Issue `PING` and require a bare `OK`. Closes the channel on failure.
pub(crate) async fn handshake<C: TransportChannel + ?Sized>(channel: &mut C) -> Result<(), Error> {
    let reply = match channel.send_command("PING").await {
        Ok(reply) => reply,
        Err(e) => {
            channel.close().await;
            return Err(e);
        }
    };
    if reply == "OK" {
        return Ok(());
    }
    channel.close().await;
    Err(Error::Handshake {
        endpoint: channel.endpoint().to_owned(),
        reply,
    })
}

// ── Port discovery ──────────────────────────────────────────────────

/// A serial port the OS reports.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PortInfo {
    pub device: String,
    pub description: String,
}

/// Enumerate serial ports, most likely controller boards first.
///
/// On macOS the `/dev/tty.*` call-in devices are folded into their
/// `/dev/cu.*` twins, which are the ones that work for outbound use.
pub fn list_ports() -> Result<Vec<PortInfo>, Error> {
    let ports = tokio_serial::available_ports().map_err(|e| Error::io("<enumerate>", e))?;
    let names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

    let mut out: Vec<PortInfo> = Vec::new();
    for port in ports {
        let device = normalize_port_name(&port.port_name, &names);
        if out.iter().any(|p| p.device == device) {
            continue;
        }
        let description = match port.port_type {
            SerialPortType::UsbPort(usb) => [usb.manufacturer, usb.product]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" "),
            SerialPortType::PciPort => "PCI".into(),
            SerialPortType::BluetoothPort => "Bluetooth".into(),
            SerialPortType::Unknown => String::new(),
        };
        out.push(PortInfo {
            device,
            description,
        });
    }

    out.sort_by_key(|p| (!looks_like_controller(&p.description), p.device.clone()));
    Ok(out)
}

/// Pick the port to open.
///
/// A requested port is normalized to its `cu.` twin when one is listed and
/// must either be listed or exist on disk. With no request, the first
/// controller-like port wins.
pub fn resolve_port(requested: Option<&str>) -> Result<String, Error> {
    let ports = list_ports().unwrap_or_else(|e| {
        debug!(error = %e, "serial port enumeration failed");
        Vec::new()
    });
    select_port(requested, &ports, |device| Path::new(device).exists())
}

fn select_port(
    requested: Option<&str>,
    ports: &[PortInfo],
    exists: impl Fn(&str) -> bool,
) -> Result<String, Error> {
    let Some(requested) = requested else {
        return ports
            .iter()
            .find(|p| looks_like_controller(&p.description))
            .map(|p| {
                info!(port = %p.device, description = %p.description, "auto-selected serial port");
                p.device.clone()
            })
            .ok_or_else(|| Error::InvalidEndpoint {
                endpoint: String::new(),
                reason: format!("no controller-like serial port found; available: {}", available(ports)),
            });
    };

    let requested = requested.trim();
    if requested.is_empty() {
        return Err(Error::InvalidEndpoint {
            endpoint: String::new(),
            reason: "serial port name is empty".into(),
        });
    }

    let names: Vec<String> = ports.iter().map(|p| p.device.clone()).collect();
    let device = normalize_port_name(requested, &names);
    if device != requested {
        debug!(requested, port = %device, "using call-out device");
    }
    if names.contains(&device) || exists(&device) {
        return Ok(device);
    }
    Err(Error::InvalidEndpoint {
        endpoint: device,
        reason: format!("no such serial port; available: {}", available(ports)),
    })
}

fn available(ports: &[PortInfo]) -> String {
    if ports.is_empty() {
        return "none".into();
    }
    ports
        .iter()
        .map(|p| p.device.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

// macOS lists both `/dev/tty.*` and `/dev/cu.*`; only the latter suits
// outbound use. Elsewhere the twin is never listed and this is a no-op.
fn normalize_port_name(device: &str, available: &[String]) -> String {
    if let Some(rest) = device.strip_prefix("/dev/tty.") {
        let cu = format!("/dev/cu.{rest}");
        if available.contains(&cu) {
            return cu;
        }
    }
    device.to_owned()
}

fn looks_like_controller(description: &str) -> bool {
    const KEYWORDS: [&str; 5] = ["usb", "cp210", "ch340", "silicon", "esp"];
    let lower = description.to_lowercase();
    KEYWORDS.iter().any(|k| lower.contains(k))
}
