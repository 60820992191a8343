// In-memory simulated controller.
//
// `SimulatedDevice` is a `TransportChannel` that interprets the line
// protocol the way the controller firmware does. A cloneable `SimHandle`
// shares its state, so tests can inspect pixels and the exact command log
// and inject faults while the device is owned by a session.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::Error;
use crate::protocol::{Rgb, clamp_channel};
use crate::transport::{TransportChannel, TransportKind};

/// Brightness the firmware boots with.
pub const DEFAULT_BRIGHTNESS: u8 = 32;

/// What an injected fault does to the matching command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultAction {
    /// Answer `ERR <reason>` instead of executing.
    Reject(String),
    /// Fail with a transport timeout.
    Timeout,
    /// Fail with a transport I/O error.
    Io,
    /// Execute normally, but only after the given delay.
    Delay(Duration),
}

#[derive(Debug)]
struct Fault {
    verb: String,
    remaining: usize,
    action: FaultAction,
}

#[derive(Debug)]
struct SimState {
    pixels: Vec<Rgb>,
    shown: Vec<Rgb>,
    brightness: u8,
    frame_support: bool,
    commands: Vec<String>,
    wire: Vec<u8>,
    faults: Vec<Fault>,
    open_channels: usize,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared view of a simulated controller.
#[derive(Debug, Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    /// A fresh controller with `num_leds` dark pixels.
    pub fn new(num_leds: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                pixels: vec![Rgb::BLACK; num_leds],
                shown: vec![Rgb::BLACK; num_leds],
                brightness: DEFAULT_BRIGHTNESS,
                frame_support: false,
                commands: Vec::new(),
                wire: Vec::new(),
                faults: Vec::new(),
                open_channels: 0,
            })),
        }
    }

    /// Open a new channel to this controller.
    pub fn open(&self, endpoint: impl Into<String>) -> SimulatedDevice {
        lock(&self.state).open_channels += 1;
        SimulatedDevice {
            state: Arc::clone(&self.state),
            endpoint: endpoint.into(),
            open: true,
        }
    }

    pub fn num_leds(&self) -> usize {
        lock(&self.state).pixels.len()
    }

    /// Pixel buffer, including values not yet shown.
    pub fn pixels(&self) -> Vec<Rgb> {
        lock(&self.state).pixels.clone()
    }

    /// What the strip is currently displaying.
    pub fn shown(&self) -> Vec<Rgb> {
        lock(&self.state).shown.clone()
    }

    pub fn brightness(&self) -> u8 {
        lock(&self.state).brightness
    }

    /// Every command line received, in order.
    pub fn commands(&self) -> Vec<String> {
        lock(&self.state).commands.clone()
    }

    /// Raw bytes as they arrived on the wire.
    pub fn wire(&self) -> Vec<u8> {
        lock(&self.state).wire.clone()
    }

    /// Forget recorded commands and wire bytes.
    pub fn clear_log(&self) {
        let mut state = lock(&self.state);
        state.commands.clear();
        state.wire.clear();
    }

    /// Channels opened and not yet closed or dropped.
    pub fn open_channels(&self) -> usize {
        lock(&self.state).open_channels
    }

    /// Accept the bulk `FRAME <hex>` command.
    pub fn set_frame_support(&self, enabled: bool) {
        lock(&self.state).frame_support = enabled;
    }

    /// Apply `action` to the `n`-th (1-based) command starting with `verb`
    /// received from now on.
    pub fn fail_nth(&self, verb: &str, n: usize, action: FaultAction) {
        lock(&self.state).faults.push(Fault {
            verb: verb.to_ascii_uppercase(),
            remaining: n.max(1),
            action,
        });
    }
}

/// A `TransportChannel` backed by a [`SimHandle`].
#[derive(Debug)]
pub struct SimulatedDevice {
    state: Arc<Mutex<SimState>>,
    endpoint: String,
    open: bool,
}

impl SimulatedDevice {
    /// Convenience constructor for a standalone device.
    pub fn new(num_leds: usize) -> Self {
        SimHandle::new(num_leds).open("sim")
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            let mut state = lock(&self.state);
            state.open_channels = state.open_channels.saturating_sub(1);
        }
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.release();
    }
}

#[async_trait]
impl TransportChannel for SimulatedDevice {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_command(&mut self, line: &str) -> Result<String, Error> {
        if !self.open {
            return Err(Error::NotConnected {
                endpoint: self.endpoint.clone(),
            });
        }

        // Bytes trickle in one at a time so interleaved writers would show up
        // in the wire log.
        for byte in line.bytes().chain(std::iter::once(b'\n')) {
            lock(&self.state).wire.push(byte);
            tokio::task::yield_now().await;
        }

        let line = line.trim().to_ascii_uppercase();
        let action = {
            let mut state = lock(&self.state);
            state.commands.push(line.clone());
            take_fault(&mut state.faults, &line)
        };

        match action {
            Some(FaultAction::Reject(reason)) => return Ok(format!("ERR {reason}")),
            Some(FaultAction::Timeout) => {
                return Err(Error::Timeout {
                    endpoint: self.endpoint.clone(),
                    timeout_ms: 0,
                });
            }
            Some(FaultAction::Io) => return Err(Error::io(&self.endpoint, "simulated I/O failure")),
            Some(FaultAction::Delay(delay)) => tokio::time::sleep(delay).await,
            None => {}
        }

        let reply = interpret(&mut lock(&self.state), &line);
        debug!(endpoint = %self.endpoint, command = %line, %reply, "sim");
        Ok(reply)
    }

    async fn close(&mut self) {
        self.release();
    }
}

fn take_fault(faults: &mut Vec<Fault>, line: &str) -> Option<FaultAction> {
    let verb = line.split_whitespace().next().unwrap_or_default();
    for fault in faults.iter_mut().filter(|f| f.verb == verb) {
        fault.remaining = fault.remaining.saturating_sub(1);
    }
    let pos = faults.iter().position(|f| f.remaining == 0)?;
    Some(faults.remove(pos).action)
}

/// Parse exactly `N` integer arguments.
fn args<const N: usize>(rest: &[&str]) -> Option<[i64; N]> {
    if rest.len() != N {
        return None;
    }
    let mut out = [0; N];
    for (slot, raw) in out.iter_mut().zip(rest) {
        *slot = raw.parse().ok()?;
    }
    Some(out)
}

fn interpret(state: &mut SimState, line: &str) -> String {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((verb, rest)) = tokens.split_first() else {
        return "ERR unknown command".into();
    };

    match *verb {
        "PING" if rest.is_empty() => "OK".into(),
        "INFO" if rest.is_empty() => format!(
            "OK NUM_LEDS {} BRIGHT {}",
            state.pixels.len(),
            state.brightness
        ),
        "SHOW" if rest.is_empty() => {
            state.shown.clone_from(&state.pixels);
            "OK".into()
        }
        "CLEAR" if rest.is_empty() => {
            state.pixels.fill(Rgb::BLACK);
            state.shown.clone_from(&state.pixels);
            "OK".into()
        }
        "BRIGHT" => match args::<1>(rest) {
            Some([b]) => {
                state.brightness = clamp_channel(b);
                state.shown.clone_from(&state.pixels);
                "OK".into()
            }
            None => "ERR usage: BRIGHT <0-255>".into(),
        },
        "FILL" => match args::<3>(rest) {
            Some([r, g, b]) => {
                state.pixels.fill(Rgb::clamped(r, g, b));
                state.shown.clone_from(&state.pixels);
                "OK".into()
            }
            None => "ERR usage: FILL <r> <g> <b>".into(),
        },
        "SET" | "SETN" => {
            let Some([i, r, g, b]) = args::<4>(rest) else {
                return format!("ERR usage: {verb} <index> <r> <g> <b>");
            };
            let Some(pixel) = usize::try_from(i).ok().and_then(|i| state.pixels.get_mut(i))
            else {
                return "ERR index out of range".into();
            };
            *pixel = Rgb::clamped(r, g, b);
            if *verb == "SET" {
                state.shown.clone_from(&state.pixels);
            }
            "OK".into()
        }
        "FRAME" if state.frame_support => {
            let decoded = match rest {
                [payload] => hex::decode(payload).ok(),
                _ => None,
            };
            match decoded {
                Some(bytes) if bytes.len() == state.pixels.len() * 3 => {
                    for (pixel, chunk) in state.pixels.iter_mut().zip(bytes.chunks_exact(3)) {
                        if let &[r, g, b] = chunk {
                            *pixel = Rgb::new(r, g, b);
                        }
                    }
                    state.shown.clone_from(&state.pixels);
                    "OK".into()
                }
                _ => "ERR usage: FRAME <hex>".into(),
            }
        }
        _ => "ERR unknown command".into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_pixel_round_trip() {
        let handle = SimHandle::new(35);
        let mut dev = handle.open("sim");

        assert_eq!(dev.send_command("SET 4 255 0 0").await.unwrap(), "OK");
        assert_eq!(handle.shown()[4], Rgb::new(255, 0, 0));
        assert_eq!(handle.commands(), vec!["SET 4 255 0 0"]);
        assert_eq!(handle.wire(), b"SET 4 255 0 0\n");
    }

    #[tokio::test]
    async fn setn_defers_until_show() {
        let handle = SimHandle::new(4);
        let mut dev = handle.open("sim");

        dev.send_command("SETN 1 1 2 3").await.unwrap();
        assert_eq!(handle.pixels()[1], Rgb::new(1, 2, 3));
        assert_eq!(handle.shown()[1], Rgb::BLACK);
        dev.send_command("SHOW").await.unwrap();
        assert_eq!(handle.shown()[1], Rgb::new(1, 2, 3));
    }

    #[tokio::test]
    async fn firmware_replies() {
        let mut dev = SimulatedDevice::new(35);
        assert_eq!(dev.send_command("info").await.unwrap(), "OK NUM_LEDS 35 BRIGHT 32");
        assert_eq!(
            dev.send_command("SET 35 1 1 1").await.unwrap(),
            "ERR index out of range"
        );
        assert_eq!(dev.send_command("WAT").await.unwrap(), "ERR unknown command");
        assert_eq!(
            dev.send_command("FILL 1 2").await.unwrap(),
            "ERR usage: FILL <r> <g> <b>"
        );
        assert_eq!(dev.send_command("BRIGHT 999").await.unwrap(), "OK");
        assert_eq!(dev.handle().brightness(), 255);
    }

    #[tokio::test]
    async fn frame_is_opt_in() {
        let handle = SimHandle::new(2);
        let mut dev = handle.open("sim");

        assert_eq!(
            dev.send_command("FRAME ff000000ff00").await.unwrap(),
            "ERR unknown command"
        );
        handle.set_frame_support(true);
        assert_eq!(dev.send_command("FRAME ff000000ff00").await.unwrap(), "OK");
        assert_eq!(handle.shown(), vec![Rgb::new(255, 0, 0), Rgb::new(0, 255, 0)]);
        assert_eq!(
            dev.send_command("FRAME ff0000").await.unwrap(),
            "ERR usage: FRAME <hex>"
        );
    }

    #[tokio::test]
    async fn nth_matching_command_fails() {
        let handle = SimHandle::new(10);
        let mut dev = handle.open("sim");
        handle.fail_nth("SETN", 3, FaultAction::Reject("boom".into()));

        assert_eq!(dev.send_command("SETN 0 1 1 1").await.unwrap(), "OK");
        assert_eq!(dev.send_command("SHOW").await.unwrap(), "OK");
        assert_eq!(dev.send_command("SETN 1 1 1 1").await.unwrap(), "OK");
        assert_eq!(dev.send_command("SETN 2 1 1 1").await.unwrap(), "ERR boom");
        assert_eq!(dev.send_command("SETN 3 1 1 1").await.unwrap(), "OK");
        assert_eq!(handle.pixels()[2], Rgb::BLACK);
    }

    #[tokio::test]
    async fn transport_faults_surface_as_errors() {
        let handle = SimHandle::new(1);
        let mut dev = handle.open("sim");
        handle.fail_nth("PING", 1, FaultAction::Timeout);
        handle.fail_nth("INFO", 1, FaultAction::Io);

        assert!(dev.send_command("PING").await.unwrap_err().is_timeout());
        assert!(matches!(
            dev.send_command("INFO").await.unwrap_err(),
            Error::Io { .. }
        ));
    }

    #[tokio::test]
    async fn close_and_drop_release_the_channel() {
        let handle = SimHandle::new(1);
        let mut first = handle.open("a");
        let second = handle.open("b");
        assert_eq!(handle.open_channels(), 2);

        first.close().await;
        first.close().await;
        assert_eq!(handle.open_channels(), 1);
        assert!(matches!(
            first.send_command("PING").await,
            Err(Error::NotConnected { .. })
        ));

        drop(second);
        assert_eq!(handle.open_channels(), 0);
    }
}
