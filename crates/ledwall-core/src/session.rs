// ── Connection session ──
//
// Owns at most one `DeviceController`. Every device operation goes through
// a single `tokio::sync::Mutex` around the controller slot, so commands
// from concurrent callers never interleave on the wire. Waiting for that
// lock is bounded; a caller that cannot get it in time gets `Busy`.
//
// Connection state is published on a `watch` channel. Only methods on this
// type change it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, info, warn};

use ledwall_api::{
    NetworkChannel, SimHandle, TransportChannel, TransportConfig, TransportKind, open_serial,
};

use crate::config::SessionConfig;
use crate::device::DeviceController;
use crate::error::CoreError;
use crate::model::{ConnectionParams, DeviceInfo, Frame, Rgb};

// ── Connectors ───────────────────────────────────────────────────

/// Opens transport channels. The session picks nothing itself; it asks
/// its connector for a channel matching the requested params.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn TransportChannel>, ledwall_api::Error>;
}

/// Opens real serial ports and network relays.
#[derive(Debug, Clone, Default)]
pub struct DefaultConnector {
    transport: TransportConfig,
}

impl DefaultConnector {
    pub fn new(transport: TransportConfig) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Connector for DefaultConnector {
    async fn open(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn TransportChannel>, ledwall_api::Error> {
        let channel: Box<dyn TransportChannel> = match params.kind {
            TransportKind::Serial => Box::new(open_serial(&params.endpoint, &self.transport).await?),
            TransportKind::Network => {
                Box::new(NetworkChannel::open(&params.endpoint, &self.transport)?)
            }
        };
        Ok(channel)
    }
}

/// Every connect opens a fresh channel to the same simulated wall.
#[async_trait]
impl Connector for SimHandle {
    async fn open(
        &self,
        params: &ConnectionParams,
    ) -> Result<Box<dyn TransportChannel>, ledwall_api::Error> {
        Ok(Box::new(SimHandle::open(self, params.endpoint.clone())))
    }
}

// ── Status ───────────────────────────────────────────────────────

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Published for a failed connect, immediately followed by `Disconnected`.
    Error,
}

/// Cached view of the session. Reading it never touches the device.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub kind: Option<TransportKind>,
    pub endpoint: Option<String>,
    pub connected: bool,
    pub info: Option<DeviceInfo>,
}

impl SessionStatus {
    fn with_phase(params: &ConnectionParams, phase: SessionPhase) -> Self {
        Self {
            phase,
            kind: Some(params.kind),
            endpoint: Some(params.endpoint.clone()),
            connected: phase == SessionPhase::Connected,
            info: None,
        }
    }
}

// ── ConnectionSession ────────────────────────────────────────────

/// Exclusive owner of the wall connection.
///
/// Cheaply cloneable via `Arc<SessionInner>`; clones share the same
/// channel, lock and status.
#[derive(Clone)]
pub struct ConnectionSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    device: Mutex<Option<DeviceController>>,
    status: watch::Sender<SessionStatus>,
}

impl ConnectionSession {
    pub fn new(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        let (status, _) = watch::channel(SessionStatus::default());
        Self {
            inner: Arc::new(SessionInner {
                config,
                connector,
                device: Mutex::new(None),
                status,
            }),
        }
    }

    /// A session that opens real serial ports and network relays.
    pub fn with_default_connector(config: SessionConfig) -> Self {
        let connector = Arc::new(DefaultConnector::new(config.transport.clone()));
        Self::new(config, connector)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Current cached status.
    pub fn status(&self) -> SessionStatus {
        self.inner.status.borrow().clone()
    }

    /// Subscribe to status changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.inner.status.subscribe()
    }

    fn publish(&self, status: SessionStatus) {
        self.inner.status.send_replace(status);
    }

    fn publish_disconnected(&self) {
        self.publish(SessionStatus::default());
    }

    async fn lock(&self) -> Result<MutexGuard<'_, Option<DeviceController>>, CoreError> {
        let wait = self.inner.config.lock_wait;
        tokio::time::timeout(wait, self.inner.device.lock())
            .await
            .map_err(|_| CoreError::Busy {
                waited_ms: duration_ms(wait),
            })
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Connect to the wall, replacing any existing connection.
    ///
    /// On success the session is `Connected` with fresh device info. On
    /// failure it passes through `Error` and ends `Disconnected`.
    pub async fn connect(&self, params: ConnectionParams) -> Result<DeviceInfo, CoreError> {
        let endpoint = params.endpoint.trim();
        if endpoint.is_empty() {
            return Err(CoreError::validation(format!(
                "{} endpoint is empty",
                params.kind
            )));
        }
        let params = ConnectionParams::new(params.kind, endpoint);

        let mut slot = self.lock().await?;
        if let Some(mut previous) = slot.take() {
            debug!(endpoint = previous.endpoint(), "closing previous connection");
            previous.close().await;
        }

        self.publish(SessionStatus::with_phase(&params, SessionPhase::Connecting));
        info!(kind = %params.kind, endpoint = %params.endpoint, "connecting");

        match self.open_device(&params).await {
            Ok((device, info)) => {
                *slot = Some(device);
                self.publish(SessionStatus {
                    info: Some(info),
                    ..SessionStatus::with_phase(&params, SessionPhase::Connected)
                });
                info!(
                    endpoint = %params.endpoint,
                    num_leds = info.num_leds,
                    brightness = info.brightness,
                    "connected"
                );
                Ok(info)
            }
            Err(e) => {
                warn!(endpoint = %params.endpoint, error = %e, "connect failed");
                self.publish(SessionStatus::with_phase(&params, SessionPhase::Error));
                self.publish_disconnected();
                Err(e)
            }
        }
    }

    async fn open_device(
        &self,
        params: &ConnectionParams,
    ) -> Result<(DeviceController, DeviceInfo), CoreError> {
        let channel = self.inner.connector.open(params).await?;
        let mut device = DeviceController::new(
            channel,
            self.inner.config.color_order,
            self.inner.config.frame_mode,
        );
        let handshake = async {
            device.ping().await?;
            device.get_info().await
        };
        match handshake.await {
            Ok(info) => Ok((device, info)),
            Err(e) => {
                device.close().await;
                Err(e)
            }
        }
    }

    /// Release the transport, if any. Always ends `Disconnected`.
    pub async fn disconnect(&self) {
        let mut slot = self.inner.device.lock().await;
        if let Some(mut device) = slot.take() {
            device.close().await;
            info!(endpoint = device.endpoint(), "disconnected");
        }
        self.publish_disconnected();
    }

    // ── Device access ────────────────────────────────────────────

    /// Run `op` against the connected device while holding the command lock.
    ///
    /// A transport failure discards the channel and leaves the session
    /// `Disconnected`. Nothing is retried.
    pub async fn with_device<T, F>(&self, op: F) -> Result<T, CoreError>
    where
        T: Send,
        F: for<'d> FnOnce(&'d mut DeviceController) -> BoxFuture<'d, Result<T, CoreError>> + Send,
    {
        let mut slot = self.lock().await?;
        let device = slot.as_mut().ok_or(CoreError::NotConnected)?;
        let result = op(device).await;

        if let Some(e) = result.as_ref().err().filter(|e| e.is_transport()) {
            if let Some(mut device) = slot.take() {
                warn!(endpoint = device.endpoint(), error = %e, "transport failure, disconnecting");
                device.close().await;
            }
            self.publish_disconnected();
        }
        result
    }

    pub async fn ping(&self) -> Result<(), CoreError> {
        self.with_device(|d| Box::pin(d.ping())).await
    }

    pub async fn set_pixel(&self, index: usize, color: Rgb) -> Result<(), CoreError> {
        self.with_device(move |d| Box::pin(d.set_pixel(index, color, true)))
            .await
    }

    pub async fn fill(&self, color: Rgb) -> Result<(), CoreError> {
        self.with_device(move |d| Box::pin(d.fill(color))).await
    }

    pub async fn clear(&self) -> Result<(), CoreError> {
        self.with_device(|d| Box::pin(d.clear_all())).await
    }

    pub async fn show(&self) -> Result<(), CoreError> {
        self.with_device(|d| Box::pin(d.show())).await
    }

    /// Set brightness and refresh the cached value on success.
    pub async fn set_brightness(&self, value: i64) -> Result<u8, CoreError> {
        let applied = self
            .with_device(move |d| Box::pin(d.set_brightness(value)))
            .await?;
        self.inner.status.send_modify(|status| {
            if let Some(info) = status.info.as_mut() {
                info.brightness = applied;
            }
        });
        Ok(applied)
    }

    pub async fn apply_frame(&self, frame: &Frame) -> Result<(), CoreError> {
        let frame = frame.clone();
        self.with_device(move |d| Box::pin(async move { d.apply_frame(&frame).await }))
            .await
    }

    /// Best-effort `INFO` refresh.
    ///
    /// Updates the cached info on success. A failure, even a transport
    /// failure, is returned without tearing the connection down.
    pub async fn poll_info(&self) -> Result<DeviceInfo, CoreError> {
        let mut slot = self.lock().await?;
        let device = slot.as_mut().ok_or(CoreError::NotConnected)?;
        match device.get_info().await {
            Ok(info) => {
                self.inner.status.send_modify(|status| status.info = Some(info));
                Ok(info)
            }
            Err(e) => {
                debug!(endpoint = device.endpoint(), error = %e, "info poll failed");
                Err(e)
            }
        }
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("status", &*self.inner.status.borrow())
            .finish_non_exhaustive()
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ledwall_api::{ColorOrder, FaultAction, SimHandle};
    use pretty_assertions::assert_eq;

    fn session(sim: &SimHandle) -> ConnectionSession {
        let config = SessionConfig {
            lock_wait: Duration::from_millis(100),
            color_order: ColorOrder::Rgb,
            ..SessionConfig::default()
        };
        ConnectionSession::new(config, Arc::new(sim.clone()))
    }

    fn params() -> ConnectionParams {
        ConnectionParams::serial("/dev/ttyFAKE0")
    }

    #[tokio::test]
    async fn starts_disconnected() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        assert_eq!(s.status(), SessionStatus::default());
        assert!(matches!(s.ping().await, Err(CoreError::NotConnected)));
        assert!(sim.commands().is_empty());
    }

    #[tokio::test]
    async fn connect_caches_info() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        let info = s.connect(params()).await.unwrap();
        assert_eq!(info.num_leds, 35);

        let status = s.status();
        assert_eq!(status.phase, SessionPhase::Connected);
        assert!(status.connected);
        assert_eq!(status.kind, Some(TransportKind::Serial));
        assert_eq!(status.endpoint.as_deref(), Some("/dev/ttyFAKE0"));
        assert_eq!(status.info, Some(info));
        assert_eq!(sim.commands(), vec!["PING", "INFO"]);
    }

    #[tokio::test]
    async fn status_is_a_pure_read() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        s.connect(params()).await.unwrap();
        sim.clear_log();
        let _ = s.status();
        let _ = s.status();
        assert!(sim.commands().is_empty());
    }

    #[tokio::test]
    async fn reconnect_closes_prior_transport() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        s.connect(params()).await.unwrap();
        assert_eq!(sim.open_channels(), 1);
        s.connect(ConnectionParams::network("10.0.0.7")).await.unwrap();
        assert_eq!(sim.open_channels(), 1);
        assert_eq!(s.status().endpoint.as_deref(), Some("10.0.0.7"));
    }

    #[tokio::test]
    async fn failed_connect_ends_disconnected() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        let mut rx = s.subscribe();
        sim.fail_nth("INFO", 1, FaultAction::Reject("unknown command".into()));

        let err = s.connect(params()).await.unwrap_err();
        assert!(matches!(err, CoreError::Device { .. }));
        assert_eq!(s.status(), SessionStatus::default());
        assert_eq!(sim.open_channels(), 0);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().phase, SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn empty_endpoint_is_validation() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        let err = s.connect(ConnectionParams::serial("  ")).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
        assert_eq!(sim.open_channels(), 0);
    }

    #[tokio::test]
    async fn transport_failure_disconnects() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        s.connect(params()).await.unwrap();
        sim.fail_nth("FILL", 1, FaultAction::Io);

        let err = s.fill(Rgb::new(1, 2, 3)).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(s.status().phase, SessionPhase::Disconnected);
        assert_eq!(sim.open_channels(), 0);
        // no reconnect attempt
        assert!(matches!(s.clear().await, Err(CoreError::NotConnected)));
    }

    #[tokio::test]
    async fn device_rejection_keeps_connection() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        s.connect(params()).await.unwrap();
        sim.fail_nth("CLEAR", 1, FaultAction::Reject("nope".into()));

        assert!(matches!(s.clear().await, Err(CoreError::Device { .. })));
        assert!(s.status().connected);
    }

    #[tokio::test]
    async fn failed_poll_keeps_connection() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        s.connect(params()).await.unwrap();
        sim.fail_nth("INFO", 1, FaultAction::Timeout);

        let err = s.poll_info().await.unwrap_err();
        assert!(err.is_transport());
        assert!(s.status().connected);
        assert_eq!(sim.open_channels(), 1);

        let info = s.poll_info().await.unwrap();
        assert_eq!(info.num_leds, 35);
    }

    #[tokio::test]
    async fn brightness_updates_cached_status() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        s.connect(params()).await.unwrap();
        s.set_brightness(300).await.unwrap();
        assert_eq!(s.status().info.unwrap().brightness, 255);
        assert_eq!(sim.brightness(), 255);
    }

    #[tokio::test]
    async fn disconnect_releases_transport() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        s.connect(params()).await.unwrap();
        s.disconnect().await;
        assert_eq!(sim.open_channels(), 0);
        assert_eq!(s.status(), SessionStatus::default());
        // idempotent
        s.disconnect().await;
    }

    #[tokio::test]
    async fn busy_lock_yields_busy() {
        let sim = SimHandle::new(35);
        let s = session(&sim);
        s.connect(params()).await.unwrap();
        sim.fail_nth("FILL", 1, FaultAction::Delay(Duration::from_millis(500)));

        let slow = {
            let s = s.clone();
            tokio::spawn(async move { s.fill(Rgb::new(9, 9, 9)).await })
        };
        // let the slow fill take the lock
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = s.set_pixel(0, Rgb::new(1, 1, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::Busy { waited_ms: 100 }));
        slow.await.unwrap().unwrap();
        assert_eq!(sim.shown()[0], Rgb::new(9, 9, 9));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_commands_never_interleave() {
        let sim = SimHandle::new(35);
        let config = SessionConfig {
            lock_wait: Duration::from_secs(10),
            color_order: ColorOrder::Rgb,
            ..SessionConfig::default()
        };
        let s = ConnectionSession::new(config, Arc::new(sim.clone()));
        s.connect(params()).await.unwrap();
        sim.clear_log();

        let mut tasks = Vec::new();
        for i in 0..20u8 {
            let s = s.clone();
            tasks.push(tokio::spawn(async move {
                s.set_pixel(usize::from(i), Rgb::new(i, i, i)).await
            }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }

        let wire = String::from_utf8(sim.wire()).unwrap();
        let lines: Vec<&str> = wire.lines().collect();
        assert_eq!(lines.len(), 20);
        assert_eq!(lines, sim.commands());
        for line in lines {
            let parts: Vec<&str> = line.split(' ').collect();
            assert_eq!(parts.len(), 5, "garbled line {line:?}");
            assert_eq!(parts[0], "SET");
            assert!(parts[2..].iter().all(|p| *p == parts[1]), "garbled line {line:?}");
        }
    }
}
