// ledwall-core: device session, route catalog and the wall facade.

pub mod config;
pub mod device;
pub mod error;
pub mod model;
pub mod routes;
pub mod session;
pub mod wall;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{FrameMode, SessionConfig, StoreConfig};
pub use device::DeviceController;
pub use error::{CoreError, ErrorKind, ErrorReport};
pub use routes::RouteStore;
pub use session::{
    ConnectionSession, Connector, DefaultConnector, SessionPhase, SessionStatus,
};
pub use wall::Wall;

pub use model::{
    CatalogListing, ColorOrder, ConnectionParams, DeviceInfo, Frame, LevelListing, Pixel, Rgb,
    Route, RouteSummary, TransportKind,
};
