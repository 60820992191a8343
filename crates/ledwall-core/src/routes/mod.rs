// ── Route catalog ──
//
// Named frames keyed by `(level, slot)`, persisted as one JSON document.
// Readers load an `ArcSwap` snapshot and never block. Writers serialize on
// a catalog-scoped mutex, write the whole document to a temp file in the
// same directory, fsync it and rename it over the old one, then publish
// the new snapshot. A failed write leaves both the file and the snapshot
// untouched.
//
// Stored frames keep the length they were persisted at. A device with a
// different LED count sees them truncated or padded on read; a write only
// ever widens the stored length, so switching walls never loses pixels.

mod credential;
mod defaults;
mod document;

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, SubsecRound, Utc};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::CoreError;
use crate::model::{CatalogListing, Frame, LevelListing, Route, RouteSummary};

use credential::AdminPin;
use document::{Bounds, CatalogDocument, normalize_name};

#[derive(Debug, Clone)]
struct Catalog {
    /// Length of every stored frame, as persisted.
    num_leds: usize,
    /// Length frames are served and accepted at.
    active_leds: usize,
    updated_at: Option<DateTime<Utc>>,
    routes: BTreeMap<(u32, u32), Route>,
}

impl Catalog {
    fn empty(num_leds: usize) -> Self {
        Self {
            num_leds,
            active_leds: num_leds,
            updated_at: None,
            routes: BTreeMap::new(),
        }
    }

    fn view(&self, route: &Route) -> Route {
        let mut route = route.clone();
        route.frame.resize(self.active_leds);
        route
    }

    /// Pad stored frames with black up to `num_leds`. Never truncates.
    fn widened(&self, num_leds: usize) -> Self {
        let mut next = self.clone();
        if num_leds > next.num_leds {
            next.num_leds = num_leds;
            for route in next.routes.values_mut() {
                route.frame.resize(num_leds);
            }
        }
        next
    }
}

/// Persistent, credential-gated catalog of routes.
#[derive(Debug)]
pub struct RouteStore {
    path: PathBuf,
    bounds: Bounds,
    admin: Option<AdminPin>,
    catalog: ArcSwap<Catalog>,
    writer: Mutex<()>,
}

impl RouteStore {
    /// Load the catalog at `config.path`.
    ///
    /// A missing file yields the built-in routes (persisted immediately)
    /// when seeding is on, an empty catalog otherwise. A file that fails
    /// validation is renamed aside and replaced by an empty catalog.
    pub fn open(config: StoreConfig) -> Result<Self, CoreError> {
        if config.levels.is_empty() || config.slots_per_level == 0 {
            return Err(CoreError::Config {
                message: "route catalog needs at least one level and one slot".into(),
            });
        }
        if config.num_leds == 0 {
            return Err(CoreError::Config {
                message: "num_leds must be positive".into(),
            });
        }

        let bounds = Bounds {
            levels: config.levels,
            slots_per_level: config.slots_per_level,
        };
        let path = config.path;
        let catalog = load(&path, &bounds, config.num_leds, config.seed_defaults)?;
        info!(
            path = %path.display(),
            routes = catalog.routes.len(),
            num_leds = catalog.num_leds,
            active_leds = catalog.active_leds,
            "route catalog loaded"
        );

        Ok(Self {
            admin: config.admin_pin.as_ref().map(AdminPin::new),
            path,
            bounds,
            catalog: ArcSwap::from_pointee(catalog),
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The LED count frames are currently served and validated at.
    pub fn num_leds(&self) -> usize {
        self.catalog.load().active_leds
    }

    /// The LED count of the frames on disk.
    pub fn stored_num_leds(&self) -> usize {
        self.catalog.load().num_leds
    }

    pub fn levels(&self) -> &[u32] {
        &self.bounds.levels
    }

    pub fn slots_per_level(&self) -> u32 {
        self.bounds.slots_per_level
    }

    /// Catalog metadata, no frames.
    pub fn list(&self) -> CatalogListing {
        let snapshot = self.catalog.load();
        let levels = self
            .bounds
            .levels
            .iter()
            .map(|&level| LevelListing {
                level,
                routes: snapshot
                    .routes
                    .values()
                    .filter(|r| r.level == level)
                    .map(|r| RouteSummary {
                        slot: r.slot,
                        name: r.name.clone(),
                    })
                    .collect(),
            })
            .collect();
        CatalogListing {
            num_leds: snapshot.active_leds,
            updated_at: snapshot.updated_at,
            levels,
        }
    }

    pub fn get(&self, level: u32, slot: u32) -> Result<Route, CoreError> {
        self.bounds.check(level, slot).map_err(CoreError::validation)?;
        let snapshot = self.catalog.load();
        snapshot
            .routes
            .get(&(level, slot))
            .map(|route| snapshot.view(route))
            .ok_or(CoreError::NotFound { level, slot })
    }

    /// Store a route after checking the admin pin.
    ///
    /// The pin is checked before anything else; on a mismatch storage is
    /// never touched. The frame must match [`RouteStore::num_leds`]. When
    /// that exceeds the stored length every stored frame is padded to it;
    /// a shorter frame is padded to the stored length instead.
    pub async fn put(
        &self,
        level: u32,
        slot: u32,
        name: &str,
        frame: Frame,
        credential: &str,
    ) -> Result<Route, CoreError> {
        let Some(admin) = self.admin.as_ref() else {
            return Err(CoreError::Auth {
                message: "no admin pin is configured; route writes are disabled".into(),
            });
        };
        if !admin.verify(credential) {
            warn!(level, slot, "route write rejected: bad pin");
            return Err(CoreError::Auth {
                message: "invalid admin pin".into(),
            });
        }

        let _guard = self.writer.lock().await;

        self.bounds.check(level, slot).map_err(CoreError::validation)?;
        let name = normalize_name(name)
            .ok_or_else(|| CoreError::validation("route name is required"))?;
        let current = self.catalog.load_full();
        frame.ensure_len(current.active_leds)?;

        let route = Route {
            level,
            slot,
            name,
            frame,
        };
        let mut next = current.widened(current.active_leds);
        let mut stored = route.clone();
        stored.frame.resize(next.num_leds);
        next.updated_at = Some(Utc::now().trunc_subsecs(0));
        next.routes.insert((level, slot), stored);

        persist(&self.path, &next, &self.bounds)?;
        self.catalog.store(Arc::new(next));
        info!(level, slot, name = %route.name, "route saved");
        Ok(route)
    }

    /// Adopt the LED count reported by a device.
    ///
    /// Reads and writes switch to the new count at once. Stored frames are
    /// left alone; see [`RouteStore::put`] for how they widen.
    pub async fn set_num_leds(&self, num_leds: usize) -> Result<(), CoreError> {
        if num_leds == 0 {
            return Err(CoreError::validation("num_leds must be positive"));
        }
        let _guard = self.writer.lock().await;
        let current = self.catalog.load_full();
        if current.active_leds != num_leds {
            debug!(
                from = current.active_leds,
                to = num_leds,
                stored = current.num_leds,
                "catalog LED count changed"
            );
            let mut next = (*current).clone();
            next.active_leds = num_leds;
            self.catalog.store(Arc::new(next));
        }
        Ok(())
    }
}

// ── Loading ──────────────────────────────────────────────────────

fn load(path: &Path, bounds: &Bounds, num_leds: usize, seed: bool) -> Result<Catalog, CoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if !seed {
                debug!(path = %path.display(), "no catalog file, starting empty");
                return Ok(Catalog::empty(num_leds));
            }
            let catalog = Catalog {
                num_leds,
                active_leds: num_leds,
                updated_at: Some(Utc::now().trunc_subsecs(0)),
                routes: defaults::default_routes(&bounds.levels, bounds.slots_per_level, num_leds),
            };
            persist(path, &catalog, bounds)?;
            info!(path = %path.display(), routes = catalog.routes.len(), "seeded default routes");
            return Ok(catalog);
        }
        Err(e) => return Err(persistence(path, &e)),
    };

    let parsed = serde_json::from_str::<CatalogDocument>(&text)
        .map_err(|e| e.to_string())
        .and_then(|doc| doc.validate(bounds).map(|routes| (doc, routes)));

    match parsed {
        Ok((doc, routes)) => {
            if doc.num_leds != num_leds {
                debug!(stored = doc.num_leds, num_leds, "catalog frames differ from configured LED count");
            }
            Ok(Catalog {
                num_leds: doc.num_leds,
                active_leds: num_leds,
                updated_at: doc.updated_at,
                routes,
            })
        }
        Err(reason) => {
            let target = quarantine(path)?;
            warn!(
                path = %path.display(),
                moved_to = %target.display(),
                %reason,
                "invalid route catalog quarantined"
            );
            Ok(Catalog::empty(num_leds))
        }
    }
}

/// Move a rejected document out of the way: `<file>.rejected-<timestamp>`.
fn quarantine(path: &Path) -> Result<PathBuf, CoreError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "routes.json".into());
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
    let target = path.with_file_name(format!("{file_name}.rejected-{stamp}"));
    fs::rename(path, &target).map_err(|e| persistence(path, &e))?;
    Ok(target)
}

// ── Persistence ──────────────────────────────────────────────────

fn persist(path: &Path, catalog: &Catalog, bounds: &Bounds) -> Result<(), CoreError> {
    let doc = CatalogDocument::from_routes(catalog.num_leds, catalog.updated_at, &catalog.routes, bounds);
    let mut bytes = serde_json::to_vec_pretty(&doc).map_err(|e| persistence(path, &e))?;
    bytes.push(b'\n');
    write_atomic(path, &bytes).map_err(|e| persistence(path, &e))
}

/// Temp file in the target directory, fsync, rename over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    sync_dir(dir);
    Ok(())
}

/// Make the rename itself durable where the platform allows it.
#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(handle) = fs::File::open(dir) {
        let _ = handle.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

fn persistence(path: &Path, err: &dyn std::fmt::Display) -> CoreError {
    CoreError::Persistence {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
