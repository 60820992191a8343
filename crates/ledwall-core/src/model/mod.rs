// ── Domain model ──
//
// Plain data shared by the session, the route catalog and dispatchers.
// Nothing in here performs I/O.

pub mod device;
pub mod frame;
pub mod route;

// ── Re-exports ──────────────────────────────────────────────────────

pub use device::{ConnectionParams, DeviceInfo, Pixel};
pub use frame::Frame;
pub use route::{CatalogListing, LevelListing, Route, RouteSummary};

pub use ledwall_api::{ColorOrder, Rgb, TransportKind};
