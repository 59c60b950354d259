#![warn(missing_docs)]
//! Core primitives shared across the bridge workspace.

pub mod hex;
pub mod object;
pub mod stats;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use hex::{Direction, GridError, HexGrid, Tile, DEFAULT_GRID_HEIGHT, DEFAULT_GRID_WIDTH};
pub use object::{
    object_distance, CritterData, InventoryEntry, ItemData, ItemType, ObjectData, ObjectFlags,
    ObjectId, ObjectKind, Pid, SceneryData, SceneryType, WorldObject,
};
pub use stats::{normalize_name, HitLocation, Skill, SpecialStat, Trait};

/// Number of map layers.
pub const ELEVATION_COUNT: i32 = 3;

/// Fixed tick counter driving the headless loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SimTick(pub u64);

impl SimTick {
    /// First tick in any deterministic timeline.
    pub const ZERO: Self = Self(0);

    /// Advance by `delta` ticks.
    pub fn advance(self, delta: u64) -> Self {
        Self(self.0 + delta)
    }
}
