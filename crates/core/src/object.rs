//! World object identity and classification.

use crate::hex::{HexGrid, Tile};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable object identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub i32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Prototype identifier. The top byte encodes the object kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pid(pub u32);

impl Pid {
    /// Object kind encoded in the prototype id, if the type byte is known.
    pub fn kind(self) -> Option<ObjectKind> {
        let kind = match self.0 >> 24 {
            0 => ObjectKind::Item,
            1 => ObjectKind::Critter,
            2 => ObjectKind::Scenery,
            3 => ObjectKind::Wall,
            4 => ObjectKind::Tile,
            5 => ObjectKind::Misc,
            _ => return None,
        };
        Some(kind)
    }
}

/// Renders as lowercase hexadecimal with a `0x` prefix.
impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Coarse object classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    /// Carryable item.
    Item,
    /// NPC or player.
    Critter,
    /// Static map furniture, including doors.
    Scenery,
    /// Wall segment.
    Wall,
    /// Floor or roof tile object.
    Tile,
    /// Markers such as exit grids.
    Misc,
}

impl ObjectKind {
    /// All kinds in prototype-type order.
    pub const ALL: [ObjectKind; 6] = [
        ObjectKind::Item,
        ObjectKind::Critter,
        ObjectKind::Scenery,
        ObjectKind::Wall,
        ObjectKind::Tile,
        ObjectKind::Misc,
    ];

    /// Protocol name.
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Item => "item",
            ObjectKind::Critter => "critter",
            ObjectKind::Scenery => "scenery",
            ObjectKind::Wall => "wall",
            ObjectKind::Tile => "tile",
            ObjectKind::Misc => "misc",
        }
    }

    /// Prototype type byte for this kind.
    pub fn type_byte(self) -> u32 {
        match self {
            ObjectKind::Item => 0,
            ObjectKind::Critter => 1,
            ObjectKind::Scenery => 2,
            ObjectKind::Wall => 3,
            ObjectKind::Tile => 4,
            ObjectKind::Misc => 5,
        }
    }
}

bitflags! {
    /// Per-object state flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ObjectFlags: u32 {
        /// Not rendered and ignored by every listing.
        const HIDDEN = 0x0000_0001;
        /// Does not block movement.
        const NO_BLOCK = 0x0000_0010;
        /// Occupies more than one tile.
        const MULTIHEX = 0x0000_0800;
        /// Blocks line of sight.
        const OPAQUE = 0x0000_8000;
        /// Held in the left hand.
        const LEFT_HAND = 0x0100_0000;
        /// Held in the right hand.
        const RIGHT_HAND = 0x0200_0000;
        /// Worn as armor.
        const WORN = 0x0400_0000;
    }
}

/// Prototype-declared item category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Wearable armor.
    Armor,
    /// Holds other items.
    Container,
    /// Consumable drug.
    Drug,
    /// Weapon.
    Weapon,
    /// Ammunition.
    Ammo,
    /// Anything else.
    Misc,
    /// Key.
    Key,
}

/// Prototype-declared scenery category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneryType {
    /// Door or other portal.
    Door,
    /// Stairs.
    Stairs,
    /// Elevator.
    Elevator,
    /// Ladder leading up.
    LadderUp,
    /// Ladder leading down.
    LadderDown,
    /// Generic scenery.
    Generic,
}

/// Critter-specific state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CritterData {
    /// Current hit points.
    pub hp: i32,
    /// Maximum hit points.
    pub max_hp: i32,
    /// Remaining combat action points.
    #[serde(default)]
    pub ap: i32,
    /// Maximum action points.
    #[serde(default = "default_max_ap")]
    pub max_ap: i32,
    /// Combat team; critters on a different team than the player are hostile.
    #[serde(default)]
    pub team: i32,
    /// Dead critters are skipped by combat listings.
    #[serde(default)]
    pub dead: bool,
}

fn default_max_ap() -> i32 {
    8
}

/// Item-specific state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemData {
    /// Item category.
    pub item_type: ItemType,
    /// Loaded rounds for weapons.
    #[serde(default)]
    pub ammo: i32,
    /// Magazine size for weapons.
    #[serde(default)]
    pub ammo_capacity: i32,
    /// Hit points restored when used, for drugs.
    #[serde(default)]
    pub heal: i32,
}

/// Scenery-specific state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneryData {
    /// Scenery category.
    pub scenery_type: SceneryType,
    /// Doors only.
    #[serde(default)]
    pub locked: bool,
    /// Doors only.
    #[serde(default)]
    pub open: bool,
}

/// Kind-specific payload. Objects without a prototype carry `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "proto")]
pub enum ObjectData {
    /// Critter prototype.
    Critter(CritterData),
    /// Item prototype.
    Item(ItemData),
    /// Scenery prototype.
    Scenery(SceneryData),
    /// Prototype without extra data (walls, tiles, misc).
    Plain,
    /// Prototype could not be resolved.
    #[default]
    None,
}

/// A stack of items held in an inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryEntry {
    /// The item object.
    pub item: WorldObject,
    /// Stack size.
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// A world object: critter, item, scenery, wall, tile or marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldObject {
    /// Stable identifier.
    pub id: ObjectId,
    /// Prototype id.
    pub pid: Pid,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Examine text.
    #[serde(default)]
    pub description: String,
    /// Tile the object stands on.
    #[serde(default = "default_tile")]
    pub tile: Tile,
    /// Map layer.
    #[serde(default)]
    pub elevation: i32,
    /// State flags.
    #[serde(default)]
    pub flags: ObjectFlags,
    /// Kind-specific payload.
    #[serde(default)]
    pub data: ObjectData,
    /// Carried items.
    #[serde(default)]
    pub inventory: Vec<InventoryEntry>,
}

fn default_tile() -> Tile {
    Tile(-1)
}

impl WorldObject {
    /// Kind encoded in the prototype id.
    pub fn kind(&self) -> Option<ObjectKind> {
        self.pid.kind()
    }

    /// Critter payload, if this is a critter with a resolved prototype.
    pub fn critter(&self) -> Option<&CritterData> {
        match &self.data {
            ObjectData::Critter(data) => Some(data),
            _ => None,
        }
    }

    /// Mutable critter payload.
    pub fn critter_mut(&mut self) -> Option<&mut CritterData> {
        match &mut self.data {
            ObjectData::Critter(data) => Some(data),
            _ => None,
        }
    }

    /// Item payload, if this is an item with a resolved prototype.
    pub fn item(&self) -> Option<&ItemData> {
        match &self.data {
            ObjectData::Item(data) => Some(data),
            _ => None,
        }
    }

    /// Scenery payload, if this is scenery with a resolved prototype.
    pub fn scenery(&self) -> Option<&SceneryData> {
        match &self.data {
            ObjectData::Scenery(data) => Some(data),
            _ => None,
        }
    }

    /// Whether the prototype could be resolved.
    pub fn has_proto(&self) -> bool {
        !matches!(self.data, ObjectData::None)
    }

    /// Whether the object is a door.
    pub fn is_door(&self) -> bool {
        self.kind() == Some(ObjectKind::Scenery)
            && self
                .scenery()
                .is_some_and(|s| s.scenery_type == SceneryType::Door)
    }

    /// Whether the object is an item of the given type.
    pub fn is_item_type(&self, item_type: ItemType) -> bool {
        self.item().is_some_and(|item| item.item_type == item_type)
    }

    /// Whether the object occupies more than one tile.
    pub fn is_multihex(&self) -> bool {
        self.flags.contains(ObjectFlags::MULTIHEX)
    }

    /// Whether the object is hidden from listings.
    pub fn is_hidden(&self) -> bool {
        self.flags.contains(ObjectFlags::HIDDEN)
    }

    /// Listing label: doors report as `door`, everything else by kind.
    pub fn type_label(&self) -> &'static str {
        match self.kind() {
            Some(ObjectKind::Scenery) if self.is_door() => "door",
            Some(kind) => kind.as_str(),
            None => "unknown",
        }
    }
}

/// Distance between two objects, reduced by one for each multi-hex participant.
pub fn object_distance(grid: &HexGrid, a: &WorldObject, b: &WorldObject) -> i32 {
    let mut distance = grid.distance(a.tile, b.tile);
    if a.is_multihex() {
        distance -= 1;
    }
    if b.is_multihex() {
        distance -= 1;
    }
    distance.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(id: i32, pid: u32, tile: i32) -> WorldObject {
        WorldObject {
            id: ObjectId(id),
            pid: Pid(pid),
            name: String::new(),
            description: String::new(),
            tile: Tile(tile),
            elevation: 0,
            flags: ObjectFlags::empty(),
            data: ObjectData::Plain,
            inventory: Vec::new(),
        }
    }

    #[test]
    fn pid_type_byte_selects_kind() {
        assert_eq!(Pid(0x0000_0010).kind(), Some(ObjectKind::Item));
        assert_eq!(Pid(0x0100_0001).kind(), Some(ObjectKind::Critter));
        assert_eq!(Pid(0x0500_0010).kind(), Some(ObjectKind::Misc));
        assert_eq!(Pid(0x0900_0000).kind(), None);
        assert_eq!(Pid(0x0500_0010).to_string(), "0x5000010");
    }

    #[test]
    fn multihex_reduces_object_distance() {
        let grid = HexGrid::default();
        let a = object(1, 0x0100_0001, 100);
        let mut b = object(2, 0x0100_0002, 103);
        assert_eq!(object_distance(&grid, &a, &b), 3);
        b.flags |= ObjectFlags::MULTIHEX;
        assert_eq!(object_distance(&grid, &a, &b), 2);
        b.tile = Tile(100);
        assert_eq!(object_distance(&grid, &a, &b), 0);
    }

    #[test]
    fn doors_report_door_label() {
        let mut door = object(3, 0x0200_0001, 5);
        door.data = ObjectData::Scenery(SceneryData {
            scenery_type: SceneryType::Door,
            locked: false,
            open: false,
        });
        assert_eq!(door.type_label(), "door");
        assert!(door.is_door());
    }

    #[test]
    fn objects_deserialize_with_defaults() {
        let json = r#"{"id": 7, "pid": 16777217, "name": "Rat", "tile": 12,
            "data": {"proto": "critter", "hp": 4, "max_hp": 6, "team": 1}}"#;
        let obj: WorldObject = serde_json::from_str(json).expect("object parses");
        assert_eq!(obj.kind(), Some(ObjectKind::Critter));
        assert_eq!(obj.critter().map(|c| c.max_ap), Some(8));
        assert!(obj.inventory.is_empty());
    }
}
