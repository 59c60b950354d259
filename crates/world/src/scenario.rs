//! JSON scenario files describing a map, its objects and the interface state at startup.

use crate::facade::{ChargenState, DialogueView, InterfaceState, PlayerStats};
use hexbridge_core::{
    GridError, HexGrid, ObjectData, ObjectId, ObjectKind, Pid, WorldObject, DEFAULT_GRID_HEIGHT,
    DEFAULT_GRID_WIDTH, ELEVATION_COUNT,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors emitted while loading or validating a scenario.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Wrap IO errors when reading scenario files.
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
    /// Wrap serde parsing issues.
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] serde_json::Error),
    /// Grid dimensions were rejected.
    #[error(transparent)]
    Grid(#[from] GridError),
    /// Two objects (map or inventory) share an id.
    #[error("duplicate object id {0}")]
    DuplicateObject(ObjectId),
    /// A map object stands outside the grid.
    #[error("object {id} is on tile {tile}, outside the {tile_count}-tile grid")]
    TileOutOfRange { id: ObjectId, tile: i32, tile_count: i32 },
    /// A map object is on an elevation that does not exist.
    #[error("object {id} is on elevation {elevation}")]
    Elevation { id: ObjectId, elevation: i32 },
    /// `player` names an object that is not on the map.
    #[error("player object {0} not found")]
    UnknownPlayer(ObjectId),
    /// `player` names an object without critter data.
    #[error("player object {0} is not a critter")]
    PlayerNotCritter(ObjectId),
    /// The kind payload disagrees with the prototype id type byte.
    #[error("object {id} has pid {pid} but {payload} data")]
    PidMismatch {
        id: ObjectId,
        pid: Pid,
        payload: &'static str,
    },
    /// A dialogue script is attached to an object that does not exist.
    #[error("dialogue script for unknown object {0}")]
    UnknownDialogueNpc(ObjectId),
}

/// Grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSpec {
    pub width: i32,
    pub height: i32,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_WIDTH,
            height: DEFAULT_GRID_HEIGHT,
        }
    }
}

/// Scripted conversation offered by an NPC when talked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DialogueScript {
    pub npc: ObjectId,
    pub reply: String,
    pub options: Vec<String>,
}

/// Combat already running when the scenario starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CombatSpec {
    pub whose_turn: Option<ObjectId>,
}

/// A worldmap location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TownSpec {
    pub name: String,
    #[serde(default)]
    pub known: bool,
    #[serde(default)]
    pub position: (i32, i32),
}

/// Worldmap state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorldmapSpec {
    pub active: bool,
    pub position: (i32, i32),
    pub towns: Vec<TownSpec>,
}

/// Which hand holds the active item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hand {
    Left,
    #[default]
    Right,
}

/// Everything needed to build a [`crate::SandboxWorld`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    pub map_name: String,
    pub grid: GridSpec,
    pub game_state: i32,
    pub player: Option<ObjectId>,
    pub player_stats: PlayerStats,
    pub interface: InterfaceState,
    pub chargen: ChargenState,
    pub objects: Vec<WorldObject>,
    pub dialogues: Vec<DialogueScript>,
    /// Conversation already open at startup.
    pub dialogue: Option<DialogueView>,
    pub combat: Option<CombatSpec>,
    pub worldmap: WorldmapSpec,
    pub messages: Vec<String>,
    pub active_hand: Hand,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            map_name: "sandbox".to_string(),
            grid: GridSpec::default(),
            game_state: 0,
            player: None,
            player_stats: PlayerStats::default(),
            interface: InterfaceState::default(),
            chargen: ChargenState::default(),
            objects: Vec::new(),
            dialogues: Vec::new(),
            dialogue: None,
            combat: None,
            worldmap: WorldmapSpec::default(),
            messages: Vec::new(),
            active_hand: Hand::default(),
        }
    }
}

impl Scenario {
    /// Parse and validate a scenario from JSON text.
    pub fn from_json(input: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = serde_json::from_str(input)?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Read, parse and validate a scenario file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Validated grid for this scenario.
    pub fn hex_grid(&self) -> Result<HexGrid, ScenarioError> {
        Ok(HexGrid::new(self.grid.width, self.grid.height)?)
    }

    /// Check ids, tiles, elevations, payloads and cross references.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        let grid = self.hex_grid()?;
        let mut seen = BTreeSet::new();

        for object in &self.objects {
            if !grid.contains(object.tile) {
                return Err(ScenarioError::TileOutOfRange {
                    id: object.id,
                    tile: object.tile.0,
                    tile_count: grid.tile_count(),
                });
            }
            if !(0..ELEVATION_COUNT).contains(&object.elevation) {
                return Err(ScenarioError::Elevation {
                    id: object.id,
                    elevation: object.elevation,
                });
            }
            // Inventories nest; walk them with an explicit stack.
            let mut stack = vec![object];
            while let Some(current) = stack.pop() {
                if !seen.insert(current.id) {
                    return Err(ScenarioError::DuplicateObject(current.id));
                }
                check_payload(current)?;
                stack.extend(current.inventory.iter().map(|entry| &entry.item));
            }
        }

        if let Some(player) = self.player {
            let object = self
                .objects
                .iter()
                .find(|object| object.id == player)
                .ok_or(ScenarioError::UnknownPlayer(player))?;
            if object.critter().is_none() {
                return Err(ScenarioError::PlayerNotCritter(player));
            }
        }

        for script in &self.dialogues {
            if !self.objects.iter().any(|object| object.id == script.npc) {
                return Err(ScenarioError::UnknownDialogueNpc(script.npc));
            }
        }

        Ok(())
    }
}

fn check_payload(object: &WorldObject) -> Result<(), ScenarioError> {
    let (expected, payload) = match &object.data {
        ObjectData::Critter(_) => (ObjectKind::Critter, "critter"),
        ObjectData::Item(_) => (ObjectKind::Item, "item"),
        ObjectData::Scenery(_) => (ObjectKind::Scenery, "scenery"),
        ObjectData::Plain | ObjectData::None => return Ok(()),
    };
    if object.kind() != Some(expected) {
        return Err(ScenarioError::PidMismatch {
            id: object.id,
            pid: object.pid,
            payload,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "map_name": "arroyo",
        "grid": {"width": 40, "height": 40},
        "player": 1,
        "objects": [
            {"id": 1, "pid": 16777216, "name": "Chosen One", "tile": 100,
             "data": {"proto": "critter", "hp": 30, "max_hp": 30},
             "inventory": [
                {"item": {"id": 10, "pid": 1, "name": "Knife",
                          "data": {"proto": "item", "item_type": "weapon"}}}
             ]}
        ]
    }"#;

    #[test]
    fn minimal_scenario_loads() {
        let scenario = Scenario::from_json(MINIMAL).expect("scenario parses");
        assert_eq!(scenario.map_name, "arroyo");
        assert_eq!(scenario.player, Some(ObjectId(1)));
        assert_eq!(scenario.objects[0].inventory[0].quantity, 1);
        assert_eq!(scenario.hex_grid().expect("grid").tile_count(), 1600);
    }

    #[test]
    fn omitted_grid_is_two_hundred_square() {
        let json = MINIMAL.replace(r#""grid": {"width": 40, "height": 40},"#, "");
        let scenario = Scenario::from_json(&json).expect("scenario parses");
        assert_eq!(scenario.grid, GridSpec::default());
        assert_eq!((DEFAULT_GRID_WIDTH, DEFAULT_GRID_HEIGHT), (200, 200));
        assert_eq!(scenario.hex_grid().expect("grid").tile_count(), 40_000);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Scenario::from_json(r#"{"map_nam": "typo"}"#).unwrap_err();
        assert!(matches!(err, ScenarioError::Parse(_)), "{err}");
    }

    #[test]
    fn duplicate_inventory_ids_are_rejected() {
        let json = MINIMAL.replace("\"id\": 10", "\"id\": 1");
        let err = Scenario::from_json(&json).unwrap_err();
        assert!(matches!(err, ScenarioError::DuplicateObject(ObjectId(1))), "{err}");
    }

    #[test]
    fn tiles_outside_the_grid_are_rejected() {
        let json = MINIMAL.replace("\"tile\": 100", "\"tile\": 1600");
        let err = Scenario::from_json(&json).unwrap_err();
        assert!(matches!(err, ScenarioError::TileOutOfRange { tile: 1600, .. }), "{err}");
    }

    #[test]
    fn player_must_be_a_critter() {
        let json = MINIMAL.replace("\"player\": 1", "\"player\": 2");
        assert!(matches!(
            Scenario::from_json(&json).unwrap_err(),
            ScenarioError::UnknownPlayer(ObjectId(2))
        ));
    }

    #[test]
    fn payload_must_match_pid() {
        let json = MINIMAL.replace("\"pid\": 1,", "\"pid\": 33554433,");
        assert!(matches!(
            Scenario::from_json(&json).unwrap_err(),
            ScenarioError::PidMismatch { payload: "item", .. }
        ));
    }

    #[test]
    fn shipped_vault_scenario_loads() {
        let scenario = Scenario::from_json(include_str!("../../../scenarios/vault.json"))
            .expect("vault scenario parses");
        assert_eq!(scenario.map_name, "vault13");
        let player = &scenario.objects[0];
        assert_eq!(player.inventory.len(), 3);
        assert!(player.inventory[0]
            .item
            .flags
            .contains(hexbridge_core::ObjectFlags::RIGHT_HAND));
        assert_eq!(scenario.dialogues[0].npc, ObjectId(2));
    }
}
