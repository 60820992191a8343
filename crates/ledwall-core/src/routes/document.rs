// On-disk catalog schema.
//
// The file is a single JSON document. Levels are listed in configured
// order; unoccupied slots are simply absent. Loading validates the whole
// document before any of it is used.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Frame, Route};

pub(crate) const SCHEMA_VERSION: u32 = 1;
pub(crate) const MAX_NAME_CHARS: usize = 48;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CatalogDocument {
    pub version: u32,
    pub num_leds: usize,
    pub updated_at: Option<DateTime<Utc>>,
    pub levels: Vec<LevelDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LevelDocument {
    pub level: u32,
    pub routes: Vec<RouteDocument>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RouteDocument {
    pub slot: u32,
    pub name: String,
    pub frame: Frame,
}

/// The level/slot grid a catalog must fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Bounds {
    pub levels: Vec<u32>,
    pub slots_per_level: u32,
}

impl Bounds {
    pub(crate) fn check(&self, level: u32, slot: u32) -> Result<(), String> {
        if !self.levels.contains(&level) {
            return Err(format!(
                "unsupported level {level}; expected one of {:?}",
                self.levels
            ));
        }
        if slot == 0 || slot > self.slots_per_level {
            return Err(format!(
                "unsupported slot {slot}; expected 1..={}",
                self.slots_per_level
            ));
        }
        Ok(())
    }
}

/// Collapse whitespace runs, trim, and cap at 48 characters.
/// Returns `None` when nothing is left.
pub(crate) fn normalize_name(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let capped: String = collapsed.chars().take(MAX_NAME_CHARS).collect();
    let capped = capped.trim_end();
    (!capped.is_empty()).then(|| capped.to_owned())
}

impl CatalogDocument {
    /// Build the document for a set of routes, levels in `bounds` order.
    pub(crate) fn from_routes(
        num_leds: usize,
        updated_at: Option<DateTime<Utc>>,
        routes: &BTreeMap<(u32, u32), Route>,
        bounds: &Bounds,
    ) -> Self {
        let levels = bounds
            .levels
            .iter()
            .map(|&level| LevelDocument {
                level,
                routes: routes
                    .values()
                    .filter(|r| r.level == level)
                    .map(|r| RouteDocument {
                        slot: r.slot,
                        name: r.name.clone(),
                        frame: r.frame.clone(),
                    })
                    .collect(),
            })
            .collect();
        Self {
            version: SCHEMA_VERSION,
            num_leds,
            updated_at,
            levels,
        }
    }

    /// Check every invariant and return the routes keyed by `(level, slot)`.
    pub(crate) fn validate(&self, bounds: &Bounds) -> Result<BTreeMap<(u32, u32), Route>, String> {
        if self.version != SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema version {} (expected {SCHEMA_VERSION})",
                self.version
            ));
        }
        if self.num_leds == 0 {
            return Err("num_leds must be positive".into());
        }

        let mut seen_levels = HashSet::new();
        let mut routes = BTreeMap::new();
        for level_doc in &self.levels {
            let level = level_doc.level;
            if !seen_levels.insert(level) {
                return Err(format!("level {level} listed twice"));
            }
            for route in &level_doc.routes {
                let slot = route.slot;
                bounds.check(level, slot)?;
                if route.frame.len() != self.num_leds {
                    return Err(format!(
                        "route {level}/{slot} has {} pixels, expected {}",
                        route.frame.len(),
                        self.num_leds
                    ));
                }
                let name = normalize_name(&route.name)
                    .ok_or_else(|| format!("route {level}/{slot} has an empty name"))?;
                let previous = routes.insert(
                    (level, slot),
                    Route {
                        level,
                        slot,
                        name,
                        frame: route.frame.clone(),
                    },
                );
                if previous.is_some() {
                    return Err(format!("route {level}/{slot} listed twice"));
                }
            }
        }
        Ok(routes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bounds() -> Bounds {
        Bounds {
            levels: vec![4, 5, 6, 7],
            slots_per_level: 3,
        }
    }

    fn doc(json: &str) -> CatalogDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_name("  Sky \t  Ladder\n"), Some("Sky Ladder".into()));
        assert_eq!(normalize_name(" \n "), None);
        let long = "x".repeat(60);
        assert_eq!(normalize_name(&long).unwrap().chars().count(), 48);
        // multibyte characters are counted, not bytes
        let peaks = "⛰".repeat(50);
        assert_eq!(normalize_name(&peaks).unwrap().chars().count(), 48);
    }

    #[test]
    fn bounds_reject_unknown_level_and_slot() {
        let b = bounds();
        assert!(b.check(4, 1).is_ok());
        assert!(b.check(3, 1).is_err());
        assert!(b.check(4, 0).is_err());
        assert!(b.check(4, 4).is_err());
    }

    #[test]
    fn valid_document_round_trips() {
        let d = doc(
            r#"{"version":1,"num_leds":2,"updated_at":"2026-01-01T00:00:00Z",
                "levels":[{"level":5,"routes":[{"slot":2,"name":"A  b","frame":[[1,2,3],[0,0,0]]}]}]}"#,
        );
        let routes = d.validate(&bounds()).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[&(5, 2)].name, "A b");

        let rebuilt = CatalogDocument::from_routes(2, d.updated_at, &routes, &bounds());
        assert_eq!(rebuilt.levels.len(), 4);
        assert_eq!(rebuilt.levels[1].routes[0].slot, 2);
    }

    #[test]
    fn invalid_documents_are_rejected() {
        let cases = [
            r#"{"version":2,"num_leds":1,"updated_at":null,"levels":[]}"#,
            r#"{"version":1,"num_leds":0,"updated_at":null,"levels":[]}"#,
            r#"{"version":1,"num_leds":1,"updated_at":null,
                "levels":[{"level":9,"routes":[{"slot":1,"name":"x","frame":[[0,0,0]]}]}]}"#,
            r#"{"version":1,"num_leds":1,"updated_at":null,
                "levels":[{"level":4,"routes":[{"slot":1,"name":"x","frame":[]}]}]}"#,
            r#"{"version":1,"num_leds":1,"updated_at":null,
                "levels":[{"level":4,"routes":[{"slot":1,"name":"  ","frame":[[0,0,0]]}]}]}"#,
            r#"{"version":1,"num_leds":1,"updated_at":null,
                "levels":[{"level":4,"routes":[{"slot":1,"name":"a","frame":[[0,0,0]]},
                                               {"slot":1,"name":"b","frame":[[0,0,0]]}]}]}"#,
            r#"{"version":1,"num_leds":1,"updated_at":null,
                "levels":[{"level":4,"routes":[]},{"level":4,"routes":[]}]}"#,
        ];
        for json in cases {
            assert!(doc(json).validate(&bounds()).is_err(), "accepted {json}");
        }
    }
}
