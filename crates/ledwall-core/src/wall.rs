// ── Wall facade ──
//
// The surface a dispatcher talks to: one session plus one route catalog.
// Cheap to clone; clones share both.

use std::sync::Arc;

use tokio::sync::watch;

use ledwall_api::{Rgb, TransportKind};

use crate::error::CoreError;
use crate::model::{CatalogListing, ConnectionParams, DeviceInfo, Frame, Pixel, Route};
use crate::routes::RouteStore;
use crate::session::{ConnectionSession, SessionStatus};

#[derive(Debug, Clone)]
pub struct Wall {
    session: ConnectionSession,
    store: Arc<RouteStore>,
}

impl Wall {
    pub fn new(session: ConnectionSession, store: RouteStore) -> Self {
        Self {
            session,
            store: Arc::new(store),
        }
    }

    pub fn session(&self) -> &ConnectionSession {
        &self.session
    }

    pub fn store(&self) -> &RouteStore {
        &self.store
    }

    // ── Connection ───────────────────────────────────────────────

    /// Connect and let the catalog adopt the device's LED count.
    pub async fn connect(&self, kind: TransportKind, endpoint: &str) -> Result<DeviceInfo, CoreError> {
        let info = self
            .session
            .connect(ConnectionParams::new(kind, endpoint))
            .await?;
        self.store.set_num_leds(info.num_leds).await?;
        Ok(info)
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.session.subscribe()
    }

    pub async fn poll_info(&self) -> Result<DeviceInfo, CoreError> {
        self.session.poll_info().await
    }

    // ── Device commands ──────────────────────────────────────────

    /// Set one pixel and show it. Channels are clamped to `0..=255`;
    /// the returned pixel carries the color actually sent.
    pub async fn set_pixel(&self, index: usize, r: i64, g: i64, b: i64) -> Result<Pixel, CoreError> {
        let color = Rgb::clamped(r, g, b);
        self.session.set_pixel(index, color).await?;
        Ok(Pixel { index, color })
    }

    pub async fn fill(&self, r: i64, g: i64, b: i64) -> Result<(), CoreError> {
        self.session.fill(Rgb::clamped(r, g, b)).await
    }

    pub async fn clear(&self) -> Result<(), CoreError> {
        self.session.clear().await
    }

    pub async fn set_brightness(&self, value: i64) -> Result<u8, CoreError> {
        self.session.set_brightness(value).await
    }

    pub async fn apply_frame(&self, frame: &Frame) -> Result<(), CoreError> {
        self.session.apply_frame(frame).await
    }

    // ── Routes ───────────────────────────────────────────────────

    pub fn list_routes(&self) -> CatalogListing {
        self.store.list()
    }

    pub fn get_route(&self, level: u32, slot: u32) -> Result<Route, CoreError> {
        self.store.get(level, slot)
    }

    /// Look up a stored route and put it on the wall.
    pub async fn apply_route(&self, level: u32, slot: u32) -> Result<Route, CoreError> {
        let route = self.store.get(level, slot)?;
        self.session.apply_frame(&route.frame).await?;
        Ok(route)
    }

    pub async fn put_route(
        &self,
        level: u32,
        slot: u32,
        name: &str,
        frame: Frame,
        credential: &str,
    ) -> Result<Route, CoreError> {
        self.store.put(level, slot, name, frame, credential).await
    }
}
