// Built-in catalog written on first start when seeding is enabled.

use std::collections::BTreeMap;

use ledwall_api::Rgb;

use crate::model::{Frame, Route};

struct Blueprint {
    name: &'static str,
    lit: &'static [usize],
}

struct LevelBlueprint {
    level: u32,
    color: Rgb,
    routes: [Blueprint; 3],
}

const BLUEPRINTS: [LevelBlueprint; 4] = [
    LevelBlueprint {
        level: 4,
        color: Rgb::new(255, 255, 255),
        routes: [
            Blueprint { name: "Everest", lit: &[4, 9, 13, 18, 22, 27, 31] },
            Blueprint { name: "The Mountain", lit: &[0, 6, 7, 14, 19, 20, 26, 32] },
            Blueprint { name: "Valley Run", lit: &[3, 8, 12, 16, 21, 25, 30, 34] },
        ],
    },
    LevelBlueprint {
        level: 5,
        color: Rgb::new(17, 189, 233),
        routes: [
            Blueprint { name: "Sky Ladder", lit: &[1, 2, 8, 9, 15, 16, 23, 24, 29] },
            Blueprint { name: "Granite Line", lit: &[5, 10, 11, 17, 18, 24, 25, 30] },
            Blueprint { name: "North Face", lit: &[2, 7, 13, 14, 20, 21, 27, 28, 33] },
        ],
    },
    LevelBlueprint {
        level: 6,
        color: Rgb::new(243, 24, 146),
        routes: [
            Blueprint { name: "Crux Corner", lit: &[0, 1, 7, 8, 14, 15, 21, 22, 28, 29] },
            Blueprint { name: "Overhang Pulse", lit: &[4, 5, 11, 12, 18, 19, 25, 26, 32, 33] },
            Blueprint { name: "Iron Traverse", lit: &[3, 4, 9, 10, 16, 17, 23, 24, 30, 31] },
        ],
    },
    LevelBlueprint {
        level: 7,
        color: Rgb::new(255, 167, 38),
        routes: [
            Blueprint { name: "Apex Trial", lit: &[0, 6, 12, 18, 24, 30, 34] },
            Blueprint { name: "Redpoint Prime", lit: &[2, 3, 9, 10, 16, 17, 23, 24, 31] },
            Blueprint { name: "Final Move", lit: &[1, 5, 8, 13, 15, 20, 22, 27, 29, 33] },
        ],
    },
];

/// Default routes that fit the configured bounds, slots numbered from 1.
///
/// Levels outside `levels` and slots past `slots_per_level` are skipped;
/// lit indices past `num_leds` are dropped.
pub(crate) fn default_routes(
    levels: &[u32],
    slots_per_level: u32,
    num_leds: usize,
) -> BTreeMap<(u32, u32), Route> {
    let mut out = BTreeMap::new();
    for lb in BLUEPRINTS.iter().filter(|lb| levels.contains(&lb.level)) {
        for (slot, bp) in (1..=slots_per_level).zip(&lb.routes) {
            out.insert(
                (lb.level, slot),
                Route {
                    level: lb.level,
                    slot,
                    name: bp.name.to_owned(),
                    frame: Frame::lit(num_leds, bp.lit, lb.color),
                },
            );
        }
    }
    out
}
