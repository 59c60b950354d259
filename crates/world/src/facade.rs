//! Narrow interfaces the bridge consumes from a running simulation.
//!
//! Read access goes through [`WorldQuery`], routing through [`PathOracle`], movement through
//! [`Animator`] and every other state change through [`Actions`]. A type implementing all four
//! is a [`Simulation`].

use bitflags::bitflags;
use hexbridge_core::{
    Direction, HexGrid, HitLocation, ObjectId, Skill, SpecialStat, Tile, Trait, WorldObject,
};
use serde::{Deserialize, Serialize};

/// Which character editor screen is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorMode {
    /// New character creation.
    Creation,
    /// Character sheet of an existing character.
    Sheet,
}

/// Interface screens that are not tied to a world subsystem.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InterfaceState {
    pub main_menu: bool,
    pub editor: Option<EditorMode>,
    pub inventory_open: bool,
}

/// Character creation bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChargenState {
    pub character_points: i32,
    pub tag_skills_remaining: i32,
    pub traits_remaining: i32,
    pub tagged_skills: Vec<Skill>,
    pub traits: Vec<Trait>,
}

impl Default for ChargenState {
    fn default() -> Self {
        Self {
            character_points: 0,
            tag_skills_remaining: 3,
            traits_remaining: 2,
            tagged_skills: Vec::new(),
            traits: Vec::new(),
        }
    }
}

/// Player-only derived stats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerStats {
    pub special: [i32; 7],
    pub armor_class: i32,
    pub experience: i32,
    pub level: i32,
}

impl Default for PlayerStats {
    fn default() -> Self {
        Self {
            special: [5; 7],
            armor_class: 5,
            experience: 0,
            level: 1,
        }
    }
}

impl PlayerStats {
    pub fn get(&self, stat: SpecialStat) -> i32 {
        self.special[stat.index()]
    }

    /// Any primary stat above the creation cap of 10.
    pub fn special_over_limit(&self) -> bool {
        self.special.iter().any(|value| *value > 10)
    }
}

/// Active conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DialogueView {
    #[serde(default)]
    pub npc: Option<ObjectId>,
    #[serde(default)]
    pub reply: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Active combat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombatView {
    pub whose_turn: Option<ObjectId>,
}

/// A worldmap location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TownView {
    pub index: i32,
    pub name: String,
    pub known: bool,
}

/// Active worldmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldmapView {
    pub position: (i32, i32),
}

/// Equipment slot addressed by `equip`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipSlot {
    LeftHand,
    RightHand,
    Armor,
}

/// Read-only accessors over world state.
pub trait WorldQuery {
    fn grid(&self) -> HexGrid;
    fn map_name(&self) -> &str;
    /// Opaque top-level game state code.
    fn game_state(&self) -> i32;
    fn interface(&self) -> InterfaceState;

    fn player(&self) -> Option<&WorldObject>;
    fn player_stats(&self) -> &PlayerStats;
    fn chargen(&self) -> &ChargenState;

    fn object(&self, id: ObjectId) -> Option<&WorldObject>;
    /// Every map object on `elevation`, hidden ones included, in enumeration order.
    fn objects_at(&self, elevation: i32) -> Vec<&WorldObject>;
    fn can_see(&self, viewer: &WorldObject, target: &WorldObject) -> bool;
    /// Object that keeps `actor` from entering `tile`, if any.
    fn blocker_at(&self, actor: Option<ObjectId>, tile: Tile, elevation: i32) -> Option<ObjectId>;
    fn is_animating(&self, id: ObjectId) -> bool;

    fn dialogue(&self) -> Option<&DialogueView>;
    fn combat(&self) -> Option<CombatView>;
    fn worldmap(&self) -> Option<WorldmapView>;
    fn towns(&self) -> Vec<TownView>;

    /// Up to `limit` most recent display log lines, oldest first.
    fn recent_messages(&self, limit: usize) -> Vec<String>;
    /// Item in the player's active hand.
    fn active_item(&self) -> Option<&WorldObject>;
    /// Whether a shutdown has been requested by a command or a key.
    fn quit_requested(&self) -> bool;
}

bitflags! {
    /// Routing query options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RouteFlags: u8 {
        /// Fail when the goal tile itself is obstructed. Without it the goal is exempt from
        /// the obstruction probe.
        const REQUIRE_OPEN_GOAL = 0x01;
    }
}

/// Result of one routing query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSearch {
    /// Step directions from the start; empty when no route was found.
    pub steps: Vec<Direction>,
    /// Every tile the probe reported as open during the search.
    pub explored: Vec<Tile>,
}

/// Discrete routing oracle.
pub trait PathOracle {
    /// Find a route from `from` to `to`. `probe` returns `true` for obstructed tiles and is
    /// consulted at most once per tile.
    fn find_path(
        &self,
        actor: ObjectId,
        from: Tile,
        to: Tile,
        elevation: i32,
        flags: RouteFlags,
        probe: &dyn Fn(Tile) -> bool,
    ) -> RouteSearch;
}

/// Frame-stepped movement requests.
pub trait Animator {
    /// Advance every running animation by one frame.
    fn animate_frame(&mut self);
    fn begin_request(&mut self) -> anyhow::Result<()>;
    /// Queue a walk to `tile`. `action_points` limits the walk in combat.
    fn register_move(
        &mut self,
        actor: ObjectId,
        tile: Tile,
        elevation: i32,
        action_points: Option<i32>,
    ) -> anyhow::Result<()>;
    /// Commit the queued request.
    fn end_request(&mut self) -> anyhow::Result<()>;
    fn scroll_to(&mut self, tile: Tile);
}

/// State-changing operations delegated to the simulation.
pub trait Actions {
    fn queue_key(&mut self, code: i32);
    fn request_quit(&mut self);
    /// Place `actor` directly on `tile` without walking.
    fn teleport(&mut self, actor: ObjectId, tile: Tile, elevation: i32) -> anyhow::Result<()>;

    /// Raise (`delta > 0`) or lower a primary stat during creation. Returns the new value.
    fn adjust_stat(&mut self, stat: SpecialStat, delta: i32) -> anyhow::Result<i32>;
    fn toggle_tag_skill(&mut self, skill: Skill) -> anyhow::Result<()>;
    fn toggle_trait(&mut self, selected: Trait) -> anyhow::Result<()>;

    fn use_object(&mut self, target: ObjectId) -> anyhow::Result<()>;
    fn talk_to(&mut self, target: ObjectId) -> anyhow::Result<()>;
    fn pick_up(&mut self, target: ObjectId) -> anyhow::Result<()>;
    fn use_skill_on(&mut self, skill: Skill, target: ObjectId) -> anyhow::Result<()>;

    fn advance_time(&mut self, seconds: i32);
    fn rest_heal(&mut self, hours: i32);

    /// Enter combat against `target`, or queue an attack when combat is running.
    fn start_combat(&mut self, target: ObjectId);
    fn attack(&mut self, target: ObjectId, location: HitLocation) -> anyhow::Result<()>;
    fn end_turn(&mut self);
    fn end_combat(&mut self);
    fn reload(&mut self, weapon: ObjectId) -> anyhow::Result<()>;
    fn change_weapon(&mut self) -> anyhow::Result<()>;

    fn select_dialogue_option(&mut self, index: usize) -> anyhow::Result<()>;

    fn wield(&mut self, item: ObjectId, slot: EquipSlot) -> anyhow::Result<()>;
    /// Empty a hand slot. `EquipSlot::Armor` is handled by [`Actions::take_off_armor`].
    fn unwield(&mut self, slot: EquipSlot) -> anyhow::Result<()>;
    fn take_off_armor(&mut self) -> anyhow::Result<()>;
    fn use_item(&mut self, item: ObjectId) -> anyhow::Result<()>;
    fn drop_item(&mut self, item: ObjectId) -> anyhow::Result<()>;

    fn leave_map(&mut self) -> anyhow::Result<()>;
    fn request_travel(&mut self, town: i32);
    fn save_game(&mut self, slot: u32) -> anyhow::Result<()>;
    fn toggle_sneak(&mut self) -> anyhow::Result<()>;
}

/// Everything the bridge needs from a simulation.
pub trait Simulation: WorldQuery + PathOracle + Animator + Actions {}

impl<T: WorldQuery + PathOracle + Animator + Actions> Simulation for T {}
