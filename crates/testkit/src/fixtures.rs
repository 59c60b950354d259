//! Builders for sandbox scenarios.
//!
//! The builders emit JSON rather than world-crate types so the kit stays usable from every
//! crate in the workspace, including the world crate's own tests.

use anyhow::{Context, Result};
use hexbridge_core::{
    CritterData, InventoryEntry, ItemData, ItemType, ObjectData, ObjectFlags, ObjectId, Pid,
    SceneryData, SceneryType, Tile, WorldObject,
};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

/// First prototype id of the reserved exit-grid range.
pub const EXIT_GRID_PID_BASE: u32 = 0x0500_0010;

fn base_object(id: i32, pid: u32, name: &str, tile: i32, data: ObjectData) -> WorldObject {
    WorldObject {
        id: ObjectId(id),
        pid: Pid(pid),
        name: name.to_string(),
        description: String::new(),
        tile: Tile(tile),
        elevation: 0,
        flags: ObjectFlags::empty(),
        data,
        inventory: Vec::new(),
    }
}

/// A living critter with `hp` hit points on `team`.
pub fn critter(id: i32, name: &str, tile: i32, hp: i32, team: i32) -> WorldObject {
    base_object(
        id,
        0x0100_0000 | (id as u32 & 0x00ff_ffff),
        name,
        tile,
        ObjectData::Critter(CritterData {
            hp,
            max_hp: hp,
            ap: 8,
            max_ap: 8,
            team,
            dead: false,
        }),
    )
}

/// The player critter, team 0, 30 hit points.
pub fn player(id: i32, tile: i32) -> WorldObject {
    critter(id, "Chosen One", tile, 30, 0)
}

/// An item of `item_type`.
pub fn item(id: i32, name: &str, tile: i32, item_type: ItemType) -> WorldObject {
    base_object(
        id,
        id as u32 & 0x00ff_ffff,
        name,
        tile,
        ObjectData::Item(ItemData {
            item_type,
            ammo: 0,
            ammo_capacity: 0,
            heal: 0,
        }),
    )
}

/// A weapon with an empty magazine of `capacity` rounds.
pub fn weapon(id: i32, name: &str, capacity: i32) -> WorldObject {
    let mut weapon = item(id, name, -1, ItemType::Weapon);
    weapon.data = ObjectData::Item(ItemData {
        item_type: ItemType::Weapon,
        ammo: 0,
        ammo_capacity: capacity,
        heal: 0,
    });
    weapon
}

/// Scenery of the given sub-type.
pub fn scenery(id: i32, name: &str, tile: i32, scenery_type: SceneryType) -> WorldObject {
    base_object(
        id,
        0x0200_0000 | (id as u32 & 0x00ff_ffff),
        name,
        tile,
        ObjectData::Scenery(SceneryData {
            scenery_type,
            locked: false,
            open: false,
        }),
    )
}

/// A closed door.
pub fn door(id: i32, tile: i32, locked: bool) -> WorldObject {
    let mut door = scenery(id, "Door", tile, SceneryType::Door);
    door.data = ObjectData::Scenery(SceneryData {
        scenery_type: SceneryType::Door,
        locked,
        open: false,
    });
    door
}

/// A wall segment.
pub fn wall(id: i32, tile: i32) -> WorldObject {
    base_object(id, 0x0300_0001, "Wall", tile, ObjectData::Plain)
}

/// An exit grid marker; `variant` selects one of the eight reserved prototype ids.
pub fn exit_grid(id: i32, tile: i32, variant: u32) -> WorldObject {
    base_object(
        id,
        EXIT_GRID_PID_BASE + (variant % 8),
        "Exit Grid",
        tile,
        ObjectData::Plain,
    )
}

/// Put `items` (quantity 1 each) into `holder`'s inventory.
pub fn with_inventory(mut holder: WorldObject, items: Vec<WorldObject>) -> WorldObject {
    holder.inventory.extend(
        items
            .into_iter()
            .map(|item| InventoryEntry { item, quantity: 1 }),
    );
    holder
}

/// Fluent builder for scenario JSON.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    root: Map<String, Value>,
    objects: Vec<WorldObject>,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new("testmap")
    }
}

impl ScenarioBuilder {
    /// Empty scenario on a 200x200 grid.
    pub fn new(map_name: &str) -> Self {
        let mut root = Map::new();
        root.insert("map_name".into(), json!(map_name));
        Self {
            root,
            objects: Vec::new(),
        }
    }

    /// Override the grid dimensions.
    pub fn grid(mut self, width: i32, height: i32) -> Self {
        self.root
            .insert("grid".into(), json!({ "width": width, "height": height }));
        self
    }

    /// Add `object` and make it the player.
    pub fn player(mut self, object: WorldObject) -> Self {
        self.root.insert("player".into(), json!(object.id));
        self.objects.push(object);
        self
    }

    /// Add a map object.
    pub fn object(mut self, object: WorldObject) -> Self {
        self.objects.push(object);
        self
    }

    /// Set an arbitrary top-level scenario field.
    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.root.insert(key.to_string(), value);
        self
    }

    /// Open the main menu at startup.
    pub fn main_menu(self) -> Self {
        self.set("interface", json!({ "main_menu": true }))
    }

    /// Start in character creation with `points` unspent.
    pub fn chargen(self, points: i32) -> Self {
        self.set("interface", json!({ "editor": "creation" }))
            .set("chargen", json!({ "character_points": points }))
    }

    /// Start in combat with the player to act.
    pub fn in_combat(self) -> Self {
        self.set("combat", json!({}))
    }

    /// Attach a scripted conversation to `npc`.
    pub fn dialogue(mut self, npc: i32, reply: &str, options: &[&str]) -> Self {
        let script = json!({ "npc": npc, "reply": reply, "options": options });
        match self.root.get_mut("dialogues").and_then(Value::as_array_mut) {
            Some(scripts) => scripts.push(script),
            None => {
                self.root.insert("dialogues".into(), json!([script]));
            }
        }
        self
    }

    /// Final JSON document.
    pub fn build(&self) -> Value {
        let mut root = self.root.clone();
        root.insert("objects".into(), json!(self.objects));
        Value::Object(root)
    }

    /// Pretty-printed JSON text.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(&self.build()).unwrap_or_default()
    }

    /// Write the scenario to `path`.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_json_string())
            .with_context(|| format!("Failed to write scenario {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_emits_player_and_objects() {
        let json = ScenarioBuilder::new("vault")
            .grid(50, 50)
            .player(player(1, 100))
            .object(door(2, 102, true))
            .dialogue(3, "Hi", &["Bye"])
            .build();
        assert_eq!(json["map_name"], "vault");
        assert_eq!(json["player"], 1);
        assert_eq!(json["objects"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["objects"][1]["data"]["proto"], "scenery");
        assert_eq!(json["objects"][1]["data"]["locked"], true);
        assert_eq!(json["dialogues"][0]["options"][0], "Bye");
    }

    #[test]
    fn fixtures_encode_kind_in_pid() {
        assert_eq!(critter(7, "Rat", 0, 4, 1).pid.0 >> 24, 1);
        assert_eq!(door(8, 0, false).pid.0 >> 24, 2);
        assert_eq!(wall(9, 0).pid.0 >> 24, 3);
        assert_eq!(exit_grid(10, 0, 9).pid, Pid(EXIT_GRID_PID_BASE + 1));
    }
}
