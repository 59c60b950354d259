//! `look`: nearby objects grouped by what the player can do with them.

use crate::channel::protocol::escape_value;
use crate::classifier::KeywordClassifier;
use crate::config::LookConfig;
use crate::snapshot::{collect_visible, hp_label, is_hostile, perception_range, Nearby};
use hexbridge_core::{ItemType, ObjectKind, SceneryType, WorldObject};
use hexbridge_world::WorldQuery;
use std::fmt::Write as _;

/// Look categories in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookCategory {
    Npcs,
    Items,
    Containers,
    Doors,
    Exits,
    Scenery,
}

impl LookCategory {
    pub const ALL: [LookCategory; 6] = [
        LookCategory::Npcs,
        LookCategory::Items,
        LookCategory::Containers,
        LookCategory::Doors,
        LookCategory::Exits,
        LookCategory::Scenery,
    ];

    pub fn header(self) -> &'static str {
        match self {
            LookCategory::Npcs => "[NPCS]",
            LookCategory::Items => "[ITEMS]",
            LookCategory::Containers => "[CONTAINERS]",
            LookCategory::Doors => "[DOORS]",
            LookCategory::Exits => "[EXITS]",
            LookCategory::Scenery => "[SCENERY]",
        }
    }
}

/// Sorts world objects into [`LookCategory`] buckets.
#[derive(Debug, Clone)]
pub struct LookClassifier {
    scenery: KeywordClassifier,
    exit_pids: std::ops::RangeInclusive<u32>,
}

impl LookClassifier {
    pub fn new(config: &LookConfig) -> Self {
        Self {
            scenery: KeywordClassifier::new(&config.excluded_keywords, &config.included_keywords),
            exit_pids: config.exit_pid_min..=config.exit_pid_max,
        }
    }

    /// Misc marker whose prototype id falls in the exit-grid range.
    pub fn is_exit_grid(&self, object: &WorldObject) -> bool {
        object.kind() == Some(ObjectKind::Misc) && self.exit_pids.contains(&object.pid.0)
    }

    fn is_container(object: &WorldObject) -> bool {
        if object.is_item_type(ItemType::Container) {
            return true;
        }
        match object.kind() {
            Some(ObjectKind::Item) => !object.inventory.is_empty(),
            Some(ObjectKind::Scenery) => !object.is_door() && !object.inventory.is_empty(),
            _ => false,
        }
    }

    fn is_notable_scenery(&self, object: &WorldObject) -> bool {
        if let Some(data) = object.scenery() {
            if matches!(
                data.scenery_type,
                SceneryType::Elevator | SceneryType::LadderUp | SceneryType::LadderDown
            ) {
                return true;
            }
        }
        self.scenery.matches(&object.name)
    }

    /// First matching category, or `None` for objects `look` does not report.
    pub fn classify(&self, object: &WorldObject) -> Option<LookCategory> {
        let kind = object.kind();
        if kind == Some(ObjectKind::Critter) {
            Some(LookCategory::Npcs)
        } else if self.is_exit_grid(object) {
            Some(LookCategory::Exits)
        } else if object.is_door() {
            Some(LookCategory::Doors)
        } else if Self::is_container(object) {
            Some(LookCategory::Containers)
        } else if kind == Some(ObjectKind::Item) {
            Some(LookCategory::Items)
        } else if kind == Some(ObjectKind::Scenery) && self.is_notable_scenery(object) {
            Some(LookCategory::Scenery)
        } else {
            None
        }
    }
}

fn door_state(object: &WorldObject) -> &'static str {
    match object.scenery() {
        Some(data) if data.locked => "locked",
        Some(data) if data.open => "open",
        _ => "closed",
    }
}

/// Full `look` report. Without a player every section is empty.
pub fn look_dump<W: WorldQuery + ?Sized>(world: &W, classifier: &LookClassifier) -> String {
    let mut buckets: [Vec<Nearby<'_>>; 6] = Default::default();
    let player = world.player();
    if let Some(player) = player {
        for entry in collect_visible(world, player, perception_range(world)) {
            if let Some(category) = classifier.classify(entry.object) {
                buckets[category as usize].push(entry);
            }
        }
    }

    let mut sections = Vec::with_capacity(LookCategory::ALL.len());
    for category in LookCategory::ALL {
        let entries = &buckets[category as usize];
        let mut out = String::new();
        let _ = writeln!(out, "{}", category.header());
        let _ = write!(out, "count={}", entries.len());
        for entry in entries {
            let object = entry.object;
            let _ = write!(
                out,
                "\n[{}] name={} distance={} direction={} tile={}",
                object.id,
                escape_value(&object.name),
                entry.distance,
                entry.direction_label(),
                object.tile
            );
            match category {
                LookCategory::Npcs => {
                    let hostile = player.is_some_and(|p| is_hostile(p, object));
                    let _ = write!(out, " hp={} hostile={}", hp_label(object), u8::from(hostile));
                }
                LookCategory::Doors => {
                    let _ = write!(out, " state={}", door_state(object));
                }
                LookCategory::Exits => {
                    let _ = write!(out, " pid={}", object.pid);
                }
                _ => {}
            }
        }
        sections.push(out);
    }
    sections.join("\n\n")
}
