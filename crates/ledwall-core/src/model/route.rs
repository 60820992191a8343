// ── Route catalog types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Frame;

/// A named frame stored at `(level, slot)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub level: u32,
    pub slot: u32,
    pub name: String,
    pub frame: Frame,
}

/// Route metadata without the frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSummary {
    pub slot: u32,
    pub name: String,
}

/// Occupied slots of one level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelListing {
    pub level: u32,
    pub routes: Vec<RouteSummary>,
}

/// Catalog metadata returned by `list()`. Frames are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogListing {
    pub num_leds: usize,
    pub updated_at: Option<DateTime<Utc>>,
    pub levels: Vec<LevelListing>,
}

impl CatalogListing {
    /// Total number of stored routes.
    pub fn route_count(&self) -> usize {
        self.levels.iter().map(|l| l.routes.len()).sum()
    }
}
