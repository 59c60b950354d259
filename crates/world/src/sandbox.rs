//! In-memory simulation implementing every facade trait.
//!
//! Collaborator behaviour (combat, dialogue, inventory, worldmap) is shallow: it
//! exists so each bridge command has an observable effect. Movement is the exception; walks
//! are routed with [`HexRouter`] and advance one hex per [`Animator::animate_frame`].

use crate::facade::{
    Actions, Animator, ChargenState, CombatView, DialogueView, EditorMode, EquipSlot,
    InterfaceState, PathOracle, PlayerStats, RouteFlags, RouteSearch, TownView, WorldQuery,
    WorldmapView,
};
use crate::los::line_of_sight;
use crate::pathfinding::HexRouter;
use crate::scenario::{Hand, Scenario, ScenarioError, TownSpec};
use anyhow::{anyhow, bail, Context, Result};
use hexbridge_core::{
    Direction, HexGrid, HitLocation, InventoryEntry, ItemType, ObjectData, ObjectFlags, ObjectId,
    ObjectKind, SceneryType, Skill, SpecialStat, Tile, Trait, WorldObject, ELEVATION_COUNT,
};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::Path;

/// Display log capacity.
pub const MESSAGE_LOG_CAPACITY: usize = 100;

/// Action points spent by a single attack.
pub const ATTACK_AP_COST: i32 = 4;

/// Action points spent reloading in combat.
pub const RELOAD_AP_COST: i32 = 2;

const KEY_RETURN: i32 = 13;
const KEY_ESCAPE: i32 = 27;
const KEY_NAME_ENTRY: i32 = 517;
const MAX_NAME_CHARS: usize = 11;
const SPECIAL_MIN: i32 = 1;
const SPECIAL_MAX: i32 = 10;

#[derive(Debug, Clone)]
struct Walk {
    steps: VecDeque<Direction>,
    consumes_ap: bool,
}

#[derive(Debug, Clone)]
struct PendingMove {
    actor: ObjectId,
    walk: Walk,
}

#[derive(Debug, Clone)]
struct Worldmap {
    active: bool,
    position: (i32, i32),
    towns: Vec<TownSpec>,
}

/// A scenario-driven world.
#[derive(Debug)]
pub struct SandboxWorld {
    grid: HexGrid,
    map_name: String,
    game_state: i32,
    interface: InterfaceState,
    player: Option<ObjectId>,
    player_stats: PlayerStats,
    chargen: ChargenState,
    objects: BTreeMap<ObjectId, WorldObject>,
    dialogue_scripts: BTreeMap<ObjectId, DialogueView>,
    dialogue: Option<DialogueView>,
    combat: Option<CombatView>,
    worldmap: Worldmap,
    messages: VecDeque<String>,
    active_hand: Hand,
    router: HexRouter,

    request: Option<Vec<PendingMove>>,
    walks: BTreeMap<ObjectId, Walk>,

    queued_keys: Vec<i32>,
    name_entry: Option<String>,
    quit_requested: bool,
    game_time_seconds: i64,
    sneaking: bool,
    saved_slots: BTreeSet<u32>,
    travel_request: Option<i32>,
    view_center: Option<Tile>,

    /// Fail every `register_move` call.
    pub reject_moves: bool,
    /// Freeze every running walk so it never finishes.
    pub stall_animation: bool,
}

impl SandboxWorld {
    /// Validate a scenario and build a world from it.
    pub fn from_scenario(scenario: Scenario) -> Result<Self, ScenarioError> {
        scenario.validate()?;
        let grid = scenario.hex_grid()?;
        let objects = scenario
            .objects
            .into_iter()
            .map(|object| (object.id, object))
            .collect();
        let dialogue_scripts = scenario
            .dialogues
            .into_iter()
            .map(|script| {
                (
                    script.npc,
                    DialogueView {
                        npc: Some(script.npc),
                        reply: script.reply,
                        options: script.options,
                    },
                )
            })
            .collect();
        let combat = scenario.combat.map(|spec| CombatView {
            whose_turn: spec.whose_turn.or(scenario.player),
        });

        let mut messages: VecDeque<String> = scenario.messages.into_iter().collect();
        while messages.len() > MESSAGE_LOG_CAPACITY {
            messages.pop_front();
        }

        Ok(Self {
            grid,
            map_name: scenario.map_name,
            game_state: scenario.game_state,
            interface: scenario.interface,
            player: scenario.player,
            player_stats: scenario.player_stats,
            chargen: scenario.chargen,
            objects,
            dialogue_scripts,
            dialogue: scenario.dialogue,
            combat,
            worldmap: Worldmap {
                active: scenario.worldmap.active,
                position: scenario.worldmap.position,
                towns: scenario.worldmap.towns,
            },
            messages,
            active_hand: scenario.active_hand,
            router: HexRouter::default(),
            request: None,
            walks: BTreeMap::new(),
            queued_keys: Vec::new(),
            name_entry: None,
            quit_requested: false,
            game_time_seconds: 0,
            sneaking: false,
            saved_slots: BTreeSet::new(),
            travel_request: None,
            view_center: None,
            reject_moves: false,
            stall_animation: false,
        })
    }

    /// Load a scenario file and build a world from it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        Self::from_scenario(Scenario::from_path(path)?)
    }

    /// Every key code queued so far, oldest first.
    pub fn queued_keys(&self) -> &[i32] {
        &self.queued_keys
    }

    pub fn game_time_seconds(&self) -> i64 {
        self.game_time_seconds
    }

    pub fn sneaking(&self) -> bool {
        self.sneaking
    }

    pub fn saved_slots(&self) -> &BTreeSet<u32> {
        &self.saved_slots
    }

    pub fn travel_request(&self) -> Option<i32> {
        self.travel_request
    }

    /// Tile the view was last centred on.
    pub fn view_center(&self) -> Option<Tile> {
        self.view_center
    }

    /// Append a line to the display log.
    pub fn push_message(&mut self, message: impl Into<String>) {
        self.messages.push_back(message.into());
        while self.messages.len() > MESSAGE_LOG_CAPACITY {
            self.messages.pop_front();
        }
    }

    /// Place an object directly, replacing any object with the same id.
    pub fn insert_object(&mut self, object: WorldObject) {
        self.objects.insert(object.id, object);
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Option<&mut WorldObject> {
        self.objects.get_mut(&id)
    }

    fn player_id(&self) -> Result<ObjectId> {
        self.player.context("no player object")
    }

    fn player_mut(&mut self) -> Result<&mut WorldObject> {
        let id = self.player_id()?;
        self.objects
            .get_mut(&id)
            .ok_or_else(|| anyhow!("player object {id} missing"))
    }

    fn blocks_movement(object: &WorldObject) -> bool {
        if object.is_hidden() || object.flags.contains(ObjectFlags::NO_BLOCK) {
            return false;
        }
        match object.kind() {
            Some(ObjectKind::Critter) => !object.critter().is_some_and(|c| c.dead),
            Some(ObjectKind::Wall) => true,
            Some(ObjectKind::Scenery) => !object.scenery().is_some_and(|s| s.open),
            _ => false,
        }
    }

    fn occludes(&self, tile: Tile, elevation: i32) -> bool {
        self.objects.values().any(|object| {
            object.tile == tile
                && object.elevation == elevation
                && !object.is_hidden()
                && (object.kind() == Some(ObjectKind::Wall)
                    || object.flags.contains(ObjectFlags::OPAQUE)
                    || (object.is_door() && !object.scenery().is_some_and(|s| s.open)))
        })
    }

    fn in_combat(&self) -> bool {
        self.combat.is_some()
    }

    fn players_turn(&self) -> bool {
        match (&self.combat, self.player) {
            (Some(combat), Some(player)) => combat.whose_turn == Some(player),
            _ => false,
        }
    }

    fn spend_player_ap(&mut self, cost: i32) -> Result<()> {
        let critter = self
            .player_mut()?
            .critter_mut()
            .context("player has no critter data")?;
        if critter.ap < cost {
            bail!("not enough action points ({} < {cost})", critter.ap);
        }
        critter.ap -= cost;
        Ok(())
    }

    fn inventory_entry_mut(&mut self, item: ObjectId) -> Result<&mut InventoryEntry> {
        self.player_mut()?
            .inventory
            .iter_mut()
            .find(|entry| entry.item.id == item)
            .ok_or_else(|| anyhow!("item {item} not in inventory"))
    }

    fn handle_name_entry(&mut self, code: i32) -> bool {
        let Some(buffer) = self.name_entry.as_mut() else {
            return false;
        };
        if code == KEY_RETURN {
            let name = std::mem::take(buffer);
            self.name_entry = None;
            if let Ok(player) = self.player_mut() {
                player.name = name;
            }
        } else if (32..=126).contains(&code) && buffer.len() < MAX_NAME_CHARS {
            buffer.push(code as u8 as char);
        }
        true
    }

    fn step_walk(&mut self, actor: ObjectId, walk: &mut Walk) -> bool {
        let Some(dir) = walk.steps.front().copied() else {
            return false;
        };
        let Some(object) = self.objects.get(&actor) else {
            return false;
        };
        let elevation = object.elevation;
        let Some(next) = self.grid.neighbor(object.tile, dir) else {
            return false;
        };
        if self.blocker_at(Some(actor), next, elevation).is_some() {
            tracing::debug!(actor = actor.0, tile = next.0, "walk interrupted");
            return false;
        }
        if walk.consumes_ap && self.in_combat() {
            match self.objects.get_mut(&actor).and_then(|o| o.critter_mut()) {
                Some(critter) if critter.ap > 0 => critter.ap -= 1,
                _ => return false,
            }
        }
        if let Some(object) = self.objects.get_mut(&actor) {
            object.tile = next;
        }
        walk.steps.pop_front();
        !walk.steps.is_empty()
    }
}

impl WorldQuery for SandboxWorld {
    fn grid(&self) -> HexGrid {
        self.grid
    }

    fn map_name(&self) -> &str {
        &self.map_name
    }

    fn game_state(&self) -> i32 {
        self.game_state
    }

    fn interface(&self) -> InterfaceState {
        self.interface.clone()
    }

    fn player(&self) -> Option<&WorldObject> {
        self.player.and_then(|id| self.objects.get(&id))
    }

    fn player_stats(&self) -> &PlayerStats {
        &self.player_stats
    }

    fn chargen(&self) -> &ChargenState {
        &self.chargen
    }

    fn object(&self, id: ObjectId) -> Option<&WorldObject> {
        self.objects.get(&id)
    }

    fn objects_at(&self, elevation: i32) -> Vec<&WorldObject> {
        self.objects
            .values()
            .filter(|object| object.elevation == elevation)
            .collect()
    }

    fn can_see(&self, viewer: &WorldObject, target: &WorldObject) -> bool {
        if viewer.elevation != target.elevation {
            return false;
        }
        let elevation = viewer.elevation;
        line_of_sight(&self.grid, viewer.tile, target.tile, |tile| {
            self.occludes(tile, elevation)
        })
    }

    fn blocker_at(&self, actor: Option<ObjectId>, tile: Tile, elevation: i32) -> Option<ObjectId> {
        self.objects
            .values()
            .find(|object| {
                object.tile == tile
                    && object.elevation == elevation
                    && Some(object.id) != actor
                    && Self::blocks_movement(object)
            })
            .map(|object| object.id)
    }

    fn is_animating(&self, id: ObjectId) -> bool {
        self.walks.get(&id).is_some_and(|walk| !walk.steps.is_empty())
    }

    fn dialogue(&self) -> Option<&DialogueView> {
        self.dialogue.as_ref()
    }

    fn combat(&self) -> Option<CombatView> {
        self.combat.clone()
    }

    fn worldmap(&self) -> Option<WorldmapView> {
        self.worldmap.active.then_some(WorldmapView {
            position: self.worldmap.position,
        })
    }

    fn towns(&self) -> Vec<TownView> {
        self.worldmap
            .towns
            .iter()
            .enumerate()
            .map(|(index, town)| TownView {
                index: index as i32,
                name: town.name.clone(),
                known: town.known,
            })
            .collect()
    }

    fn recent_messages(&self, limit: usize) -> Vec<String> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages.iter().skip(skip).cloned().collect()
    }

    fn active_item(&self) -> Option<&WorldObject> {
        let flag = match self.active_hand {
            Hand::Left => ObjectFlags::LEFT_HAND,
            Hand::Right => ObjectFlags::RIGHT_HAND,
        };
        self.player()?
            .inventory
            .iter()
            .map(|entry| &entry.item)
            .find(|item| item.flags.contains(flag))
    }

    fn quit_requested(&self) -> bool {
        self.quit_requested
    }
}

impl PathOracle for SandboxWorld {
    fn find_path(
        &self,
        _actor: ObjectId,
        from: Tile,
        to: Tile,
        _elevation: i32,
        flags: RouteFlags,
        probe: &dyn Fn(Tile) -> bool,
    ) -> RouteSearch {
        self.router.search(&self.grid, from, to, flags, probe)
    }
}

impl Animator for SandboxWorld {
    fn animate_frame(&mut self) {
        if self.stall_animation {
            return;
        }
        let actors: Vec<ObjectId> = self.walks.keys().copied().collect();
        for actor in actors {
            let Some(mut walk) = self.walks.remove(&actor) else {
                continue;
            };
            if self.step_walk(actor, &mut walk) {
                self.walks.insert(actor, walk);
            }
        }
    }

    fn begin_request(&mut self) -> Result<()> {
        self.request = Some(Vec::new());
        Ok(())
    }

    fn register_move(
        &mut self,
        actor: ObjectId,
        tile: Tile,
        elevation: i32,
        action_points: Option<i32>,
    ) -> Result<()> {
        if self.reject_moves {
            bail!("move requests are disabled");
        }
        if self.request.is_none() {
            bail!("no open animation request");
        }
        if !self.grid.contains(tile) {
            bail!("tile {tile} outside the grid");
        }
        let object = self
            .objects
            .get(&actor)
            .ok_or_else(|| anyhow!("actor {actor} not found"))?;
        if object.elevation != elevation {
            bail!("actor {actor} is not on elevation {elevation}");
        }
        let from = object.tile;

        let probe = |t: Tile| self.blocker_at(Some(actor), t, elevation).is_some();
        let goal_blocked = self.blocker_at(Some(actor), tile, elevation).is_some();
        let mut steps = self
            .router
            .search(&self.grid, from, tile, RouteFlags::empty(), &probe)
            .steps;
        if steps.is_empty() && from != tile {
            bail!("no route from {from} to {tile}");
        }
        if goal_blocked {
            steps.pop();
        }
        let needs_steps = !steps.is_empty();
        if let Some(ap) = action_points {
            steps.truncate(ap.max(0) as usize);
        }
        if needs_steps && steps.is_empty() {
            bail!("not enough action points to move");
        }

        if let Some(request) = self.request.as_mut() {
            request.push(PendingMove {
                actor,
                walk: Walk {
                    steps: steps.into(),
                    consumes_ap: action_points.is_some(),
                },
            });
        }
        Ok(())
    }

    fn end_request(&mut self) -> Result<()> {
        let request = self.request.take().context("no open animation request")?;
        for pending in request {
            if pending.walk.steps.is_empty() {
                continue;
            }
            self.walks.insert(pending.actor, pending.walk);
        }
        Ok(())
    }

    fn scroll_to(&mut self, tile: Tile) {
        self.view_center = Some(tile);
    }
}

impl Actions for SandboxWorld {
    fn queue_key(&mut self, code: i32) {
        self.queued_keys.push(code);
        if self.handle_name_entry(code) {
            return;
        }
        if code == KEY_NAME_ENTRY {
            self.name_entry = Some(String::new());
            return;
        }

        if self.interface.main_menu {
            match u8::try_from(code).ok().map(char::from) {
                Some('n') => {
                    self.interface.main_menu = false;
                    self.interface.editor = Some(EditorMode::Creation);
                }
                Some('l') => self.interface.main_menu = false,
                Some('e') => self.quit_requested = true,
                _ => {}
            }
            return;
        }

        if self.interface.editor.is_some() {
            if code == KEY_RETURN || code == KEY_ESCAPE {
                self.interface.editor = None;
            }
            return;
        }

        match code {
            KEY_ESCAPE if self.interface.inventory_open => self.interface.inventory_open = false,
            KEY_ESCAPE if self.worldmap.active => {}
            _ => match u8::try_from(code).ok().map(char::from) {
                Some('c') => self.interface.editor = Some(EditorMode::Sheet),
                Some('i') => self.interface.inventory_open = !self.interface.inventory_open,
                _ => {}
            },
        }
    }

    fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    fn teleport(&mut self, actor: ObjectId, tile: Tile, elevation: i32) -> Result<()> {
        if !self.grid.contains(tile) || !(0..ELEVATION_COUNT).contains(&elevation) {
            bail!("invalid destination {tile} at elevation {elevation}");
        }
        let object = self
            .objects
            .get_mut(&actor)
            .ok_or_else(|| anyhow!("actor {actor} not found"))?;
        object.tile = tile;
        object.elevation = elevation;
        self.walks.remove(&actor);
        Ok(())
    }

    fn adjust_stat(&mut self, stat: SpecialStat, delta: i32) -> Result<i32> {
        let current = self.player_stats.get(stat);
        let next = current + delta;
        if delta > 0 && self.chargen.character_points < delta {
            bail!("not enough character points");
        }
        if !(SPECIAL_MIN..=SPECIAL_MAX).contains(&next) {
            bail!("{} would leave the {SPECIAL_MIN}..={SPECIAL_MAX} range", stat.name());
        }
        self.player_stats.special[stat.index()] = next;
        self.chargen.character_points -= delta;
        Ok(next)
    }

    fn toggle_tag_skill(&mut self, skill: Skill) -> Result<()> {
        if let Some(pos) = self.chargen.tagged_skills.iter().position(|s| *s == skill) {
            self.chargen.tagged_skills.remove(pos);
            self.chargen.tag_skills_remaining += 1;
            return Ok(());
        }
        if self.chargen.tag_skills_remaining <= 0 {
            bail!("no tag slots left");
        }
        self.chargen.tagged_skills.push(skill);
        self.chargen.tag_skills_remaining -= 1;
        Ok(())
    }

    fn toggle_trait(&mut self, selected: Trait) -> Result<()> {
        if let Some(pos) = self.chargen.traits.iter().position(|t| *t == selected) {
            self.chargen.traits.remove(pos);
            self.chargen.traits_remaining += 1;
            return Ok(());
        }
        if self.chargen.traits_remaining <= 0 {
            bail!("no trait slots left");
        }
        self.chargen.traits.push(selected);
        self.chargen.traits_remaining -= 1;
        Ok(())
    }

    fn use_object(&mut self, target: ObjectId) -> Result<()> {
        self.player_id()?;
        let object = self
            .objects
            .get_mut(&target)
            .ok_or_else(|| anyhow!("object {target} not found"))?;
        let name = object.name.clone();
        let message = match &mut object.data {
            ObjectData::Scenery(scenery) if scenery.scenery_type == SceneryType::Door => {
                if scenery.locked {
                    format!("The {name} is locked.")
                } else {
                    scenery.open = !scenery.open;
                    if scenery.open {
                        format!("You open the {name}.")
                    } else {
                        format!("You close the {name}.")
                    }
                }
            }
            ObjectData::Scenery(_) => format!("You use the {name}."),
            _ => format!("You see nothing special about the {name}."),
        };
        self.push_message(message);
        Ok(())
    }

    fn talk_to(&mut self, target: ObjectId) -> Result<()> {
        let object = self
            .objects
            .get(&target)
            .ok_or_else(|| anyhow!("object {target} not found"))?;
        let critter = object.critter().context("target is not a critter")?;
        if critter.dead {
            bail!("{} is dead", object.name);
        }
        let script = self
            .dialogue_scripts
            .get(&target)
            .cloned()
            .ok_or_else(|| anyhow!("{} has nothing to say", object.name))?;
        self.dialogue = Some(script);
        Ok(())
    }

    fn pick_up(&mut self, target: ObjectId) -> Result<()> {
        let player = self.player_id()?;
        let object = self
            .objects
            .get(&target)
            .ok_or_else(|| anyhow!("object {target} not found"))?;
        if object.kind() != Some(ObjectKind::Item) {
            bail!("object {target} is not an item");
        }
        if target == player {
            bail!("cannot pick up the player");
        }
        let mut item = self
            .objects
            .remove(&target)
            .ok_or_else(|| anyhow!("object {target} not found"))?;
        item.tile = Tile(-1);
        let name = item.name.clone();
        self.player_mut()?.inventory.push(InventoryEntry { item, quantity: 1 });
        self.push_message(format!("You pick up the {name}."));
        Ok(())
    }

    fn use_skill_on(&mut self, skill: Skill, target: ObjectId) -> Result<()> {
        self.player_id()?;
        let object = self
            .objects
            .get_mut(&target)
            .ok_or_else(|| anyhow!("object {target} not found"))?;
        let name = object.name.clone();
        let message = match (skill, &mut object.data) {
            (Skill::Lockpick, ObjectData::Scenery(scenery)) if scenery.locked => {
                scenery.locked = false;
                format!("You unlock the {name}.")
            }
            (Skill::FirstAid | Skill::Doctor, ObjectData::Critter(critter)) => {
                critter.hp = (critter.hp + 5).min(critter.max_hp);
                format!("You treat {name}.")
            }
            _ => "Nothing happens.".to_string(),
        };
        self.push_message(message);
        Ok(())
    }

    fn advance_time(&mut self, seconds: i32) {
        self.game_time_seconds += i64::from(seconds.max(0));
    }

    fn rest_heal(&mut self, hours: i32) {
        if let Ok(player) = self.player_mut() {
            if let Some(critter) = player.critter_mut() {
                critter.hp = critter.hp.saturating_add(hours.max(0)).min(critter.max_hp);
            }
        }
    }

    fn start_combat(&mut self, target: ObjectId) {
        if self.in_combat() {
            if let Err(err) = self.attack(target, HitLocation::Torso) {
                tracing::debug!(target = target.0, %err, "queued attack failed");
            }
            return;
        }
        for object in self.objects.values_mut() {
            if let Some(critter) = object.critter_mut() {
                critter.ap = critter.max_ap;
            }
        }
        self.combat = Some(CombatView {
            whose_turn: self.player,
        });
        self.push_message("Combat started.");
    }

    fn attack(&mut self, target: ObjectId, location: HitLocation) -> Result<()> {
        if !self.players_turn() {
            bail!("not the player's turn");
        }
        let target_object = self
            .objects
            .get(&target)
            .ok_or_else(|| anyhow!("object {target} not found"))?;
        if target_object.critter().map_or(true, |c| c.dead) {
            bail!("target is not a living critter");
        }
        self.spend_player_ap(ATTACK_AP_COST)?;
        let damage = match location {
            HitLocation::Eyes => 8,
            HitLocation::Head => 6,
            HitLocation::Groin => 5,
            _ => 4,
        };
        let Some(object) = self.objects.get_mut(&target) else {
            bail!("object {target} not found");
        };
        let name = object.name.clone();
        let killed = match object.critter_mut() {
            Some(critter) => {
                critter.hp -= damage;
                if critter.hp <= 0 {
                    critter.hp = 0;
                    critter.dead = true;
                }
                critter.dead
            }
            None => false,
        };
        self.push_message(format!("You hit {name} in the {} for {damage}.", location.name()));
        if killed {
            self.push_message(format!("{name} was killed."));
        }
        Ok(())
    }

    fn end_turn(&mut self) {
        if self.combat.is_none() {
            return;
        }
        if let Ok(player) = self.player_mut() {
            if let Some(critter) = player.critter_mut() {
                critter.ap = critter.max_ap;
            }
        }
        self.push_message("Turn ended.");
    }

    fn end_combat(&mut self) {
        if self.combat.take().is_some() {
            self.push_message("Combat ended.");
        }
    }

    fn reload(&mut self, weapon: ObjectId) -> Result<()> {
        let in_combat = self.in_combat();
        if in_combat {
            let ap = self.player().and_then(|p| p.critter()).map_or(0, |c| c.ap);
            if ap < RELOAD_AP_COST {
                bail!("not enough action points to reload");
            }
        }
        let player = self.player_mut()?;
        let ammo_index = player
            .inventory
            .iter()
            .position(|entry| entry.item.is_item_type(ItemType::Ammo) && entry.quantity > 0)
            .context("no ammunition")?;
        let weapon_entry = player
            .inventory
            .iter_mut()
            .find(|entry| entry.item.id == weapon)
            .context("weapon not in inventory")?;
        let ObjectData::Item(data) = &mut weapon_entry.item.data else {
            bail!("weapon has no item data");
        };
        if data.ammo_capacity <= 0 || data.ammo >= data.ammo_capacity {
            bail!("weapon cannot take more ammunition");
        }
        data.ammo = data.ammo_capacity;
        player.inventory[ammo_index].quantity -= 1;
        if player.inventory[ammo_index].quantity <= 0 {
            player.inventory.remove(ammo_index);
        }
        if in_combat {
            self.spend_player_ap(RELOAD_AP_COST)?;
        }
        Ok(())
    }

    fn change_weapon(&mut self) -> Result<()> {
        self.player_id()?;
        self.active_hand = match self.active_hand {
            Hand::Left => Hand::Right,
            Hand::Right => Hand::Left,
        };
        Ok(())
    }

    fn select_dialogue_option(&mut self, index: usize) -> Result<()> {
        let dialogue = self.dialogue.as_ref().context("no active dialogue")?;
        let option = dialogue
            .options
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("option {index} out of range"))?;
        self.dialogue = None;
        self.push_message(option);
        Ok(())
    }

    fn wield(&mut self, item: ObjectId, slot: EquipSlot) -> Result<()> {
        let flag = match slot {
            EquipSlot::LeftHand => ObjectFlags::LEFT_HAND,
            EquipSlot::RightHand => ObjectFlags::RIGHT_HAND,
            EquipSlot::Armor => ObjectFlags::WORN,
        };
        let player = self.player_mut()?;
        let entry = player
            .inventory
            .iter()
            .find(|entry| entry.item.id == item)
            .ok_or_else(|| anyhow!("item {item} not in inventory"))?;
        if slot == EquipSlot::Armor && !entry.item.is_item_type(ItemType::Armor) {
            bail!("item {item} is not armor");
        }
        for entry in &mut player.inventory {
            if entry.item.id == item {
                entry.item.flags.remove(
                    ObjectFlags::LEFT_HAND | ObjectFlags::RIGHT_HAND | ObjectFlags::WORN,
                );
                entry.item.flags.insert(flag);
            } else {
                entry.item.flags.remove(flag);
            }
        }
        Ok(())
    }

    fn unwield(&mut self, slot: EquipSlot) -> Result<()> {
        let flag = match slot {
            EquipSlot::LeftHand => ObjectFlags::LEFT_HAND,
            EquipSlot::RightHand => ObjectFlags::RIGHT_HAND,
            EquipSlot::Armor => return self.take_off_armor(),
        };
        let player = self.player_mut()?;
        let entry = player
            .inventory
            .iter_mut()
            .find(|entry| entry.item.flags.contains(flag))
            .context("slot is empty")?;
        entry.item.flags.remove(flag);
        Ok(())
    }

    fn take_off_armor(&mut self) -> Result<()> {
        let player = self.player_mut()?;
        let entry = player
            .inventory
            .iter_mut()
            .find(|entry| entry.item.flags.contains(ObjectFlags::WORN))
            .context("no armor worn")?;
        entry.item.flags.remove(ObjectFlags::WORN);
        Ok(())
    }

    fn use_item(&mut self, item: ObjectId) -> Result<()> {
        let entry = self.inventory_entry_mut(item)?;
        let heal = match entry.item.item() {
            Some(data) if data.item_type == ItemType::Drug => data.heal,
            _ => bail!("item {item} cannot be used"),
        };
        entry.quantity -= 1;
        let name = entry.item.name.clone();
        let player = self.player_mut()?;
        if let Some(pos) = player
            .inventory
            .iter()
            .position(|entry| entry.item.id == item && entry.quantity <= 0)
        {
            player.inventory.remove(pos);
        }
        if let Some(critter) = player.critter_mut() {
            critter.hp = (critter.hp + heal).min(critter.max_hp);
        }
        self.push_message(format!("You use the {name}."));
        Ok(())
    }

    fn drop_item(&mut self, item: ObjectId) -> Result<()> {
        let player = self.player_mut()?;
        let (tile, elevation) = (player.tile, player.elevation);
        let pos = player
            .inventory
            .iter()
            .position(|entry| entry.item.id == item)
            .ok_or_else(|| anyhow!("item {item} not in inventory"))?;
        let mut dropped = player.inventory.remove(pos).item;
        dropped
            .flags
            .remove(ObjectFlags::LEFT_HAND | ObjectFlags::RIGHT_HAND | ObjectFlags::WORN);
        dropped.tile = tile;
        dropped.elevation = elevation;
        let name = dropped.name.clone();
        self.objects.insert(dropped.id, dropped);
        self.push_message(format!("You drop the {name}."));
        Ok(())
    }

    fn leave_map(&mut self) -> Result<()> {
        if self.worldmap.active {
            bail!("already on the worldmap");
        }
        if self.in_combat() {
            bail!("cannot leave the map during combat");
        }
        self.worldmap.active = true;
        Ok(())
    }

    fn request_travel(&mut self, town: i32) {
        self.travel_request = Some(town);
        if let Some(spec) = usize::try_from(town).ok().and_then(|i| self.worldmap.towns.get(i)) {
            self.worldmap.position = spec.position;
        }
    }

    fn save_game(&mut self, slot: u32) -> Result<()> {
        if slot > 9 {
            bail!("save slot {slot} out of range");
        }
        self.saved_slots.insert(slot);
        self.push_message(format!("Game saved to slot {}.", slot + 1));
        Ok(())
    }

    fn toggle_sneak(&mut self) -> Result<()> {
        self.player_id()?;
        self.sneaking = !self.sneaking;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::GridSpec;
    use hexbridge_core::{CritterData, ItemData, Pid, SceneryData};

    fn critter(id: i32, tile: i32) -> WorldObject {
        WorldObject {
            id: ObjectId(id),
            pid: Pid(0x0100_0000 + id as u32),
            name: format!("critter {id}"),
            description: String::new(),
            tile: Tile(tile),
            elevation: 0,
            flags: ObjectFlags::empty(),
            data: ObjectData::Critter(CritterData {
                hp: 20,
                max_hp: 20,
                ap: 8,
                max_ap: 8,
                team: if id == 1 { 0 } else { 1 },
                dead: false,
            }),
            inventory: Vec::new(),
        }
    }

    fn door(id: i32, tile: i32, locked: bool) -> WorldObject {
        WorldObject {
            id: ObjectId(id),
            pid: Pid(0x0200_0001),
            name: "door".to_string(),
            description: String::new(),
            tile: Tile(tile),
            elevation: 0,
            flags: ObjectFlags::empty(),
            data: ObjectData::Scenery(SceneryData {
                scenery_type: SceneryType::Door,
                locked,
                open: false,
            }),
            inventory: Vec::new(),
        }
    }

    fn world(objects: Vec<WorldObject>) -> SandboxWorld {
        SandboxWorld::from_scenario(Scenario {
            grid: GridSpec {
                width: 30,
                height: 30,
            },
            player: Some(ObjectId(1)),
            objects,
            ..Scenario::default()
        })
        .expect("scenario is valid")
    }

    fn walk_to(world: &mut SandboxWorld, tile: Tile, ap: Option<i32>) {
        world.begin_request().expect("begin");
        world
            .register_move(ObjectId(1), tile, 0, ap)
            .expect("register");
        world.end_request().expect("commit");
        for _ in 0..200 {
            if !world.is_animating(ObjectId(1)) {
                break;
            }
            world.animate_frame();
        }
    }

    #[test]
    fn walks_advance_one_step_per_frame() {
        let mut world = world(vec![critter(1, 100)]);
        world.begin_request().expect("begin");
        world
            .register_move(ObjectId(1), Tile(103), 0, None)
            .expect("register");
        world.end_request().expect("commit");
        assert!(world.is_animating(ObjectId(1)));
        world.animate_frame();
        assert_eq!(world.player().map(|p| p.tile), Some(Tile(101)));
        world.animate_frame();
        world.animate_frame();
        assert_eq!(world.player().map(|p| p.tile), Some(Tile(103)));
        assert!(!world.is_animating(ObjectId(1)));
    }

    #[test]
    fn walking_onto_a_blocked_tile_stops_adjacent() {
        let mut world = world(vec![critter(1, 100), critter(2, 104)]);
        walk_to(&mut world, Tile(104), None);
        assert_eq!(world.player().map(|p| p.tile), Some(Tile(103)));
    }

    #[test]
    fn combat_moves_spend_action_points() {
        let mut world = world(vec![critter(1, 100), critter(2, 120)]);
        world.start_combat(ObjectId(2));
        walk_to(&mut world, Tile(110), Some(3));
        let player = world.player().expect("player");
        assert_eq!(player.tile, Tile(103));
        assert_eq!(player.critter().map(|c| c.ap), Some(5));
    }

    #[test]
    fn register_without_request_fails() {
        let mut world = world(vec![critter(1, 100)]);
        assert!(world.register_move(ObjectId(1), Tile(101), 0, None).is_err());
        world.reject_moves = true;
        world.begin_request().expect("begin");
        assert!(world.register_move(ObjectId(1), Tile(101), 0, None).is_err());
    }

    #[test]
    fn closed_doors_block_and_open_doors_do_not() {
        let mut world = world(vec![critter(1, 100), door(5, 102, false)]);
        assert_eq!(world.blocker_at(Some(ObjectId(1)), Tile(102), 0), Some(ObjectId(5)));
        world.use_object(ObjectId(5)).expect("door opens");
        assert_eq!(world.blocker_at(Some(ObjectId(1)), Tile(102), 0), None);
        assert_eq!(world.blocker_at(Some(ObjectId(1)), Tile(100), 0), None);
        assert_eq!(world.blocker_at(None, Tile(100), 0), Some(ObjectId(1)));
    }

    #[test]
    fn locked_doors_need_lockpick() {
        let mut world = world(vec![critter(1, 100), door(5, 102, true)]);
        world.use_object(ObjectId(5)).expect("use succeeds");
        assert!(world.blocker_at(None, Tile(102), 0).is_some());
        world
            .use_skill_on(Skill::Lockpick, ObjectId(5))
            .expect("lockpick succeeds");
        world.use_object(ObjectId(5)).expect("door opens");
        assert!(world.blocker_at(None, Tile(102), 0).is_none());
    }

    #[test]
    fn walls_block_sight_between_critters() {
        let mut world = world(vec![critter(1, 100), critter(2, 106)]);
        let viewer = world.player().cloned().expect("player");
        let target = world.object(ObjectId(2)).cloned().expect("target");
        assert!(world.can_see(&viewer, &target));
        let mut wall = door(9, 103, false);
        wall.pid = Pid(0x0300_0001);
        wall.data = ObjectData::Plain;
        world.insert_object(wall);
        assert!(!world.can_see(&viewer, &target));
    }

    #[test]
    fn pickup_then_drop_moves_item_between_map_and_inventory() {
        let knife = WorldObject {
            id: ObjectId(30),
            pid: Pid(0x0000_0004),
            name: "Knife".to_string(),
            description: String::new(),
            tile: Tile(101),
            elevation: 0,
            flags: ObjectFlags::empty(),
            data: ObjectData::Item(ItemData {
                item_type: ItemType::Weapon,
                ammo: 0,
                ammo_capacity: 0,
                heal: 0,
            }),
            inventory: Vec::new(),
        };
        let mut world = world(vec![critter(1, 100), knife]);
        world.pick_up(ObjectId(30)).expect("pickup");
        assert!(world.object(ObjectId(30)).is_none());
        world
            .wield(ObjectId(30), EquipSlot::RightHand)
            .expect("wield");
        assert_eq!(world.active_item().map(|i| i.id), Some(ObjectId(30)));
        world.drop_item(ObjectId(30)).expect("drop");
        let dropped = world.object(ObjectId(30)).expect("on map");
        assert_eq!(dropped.tile, Tile(100));
        assert!(!dropped.flags.contains(ObjectFlags::RIGHT_HAND));
    }

    #[test]
    fn chargen_keys_and_name_entry() {
        let mut world = SandboxWorld::from_scenario(Scenario {
            player: Some(ObjectId(1)),
            objects: vec![critter(1, 100)],
            interface: InterfaceState {
                main_menu: true,
                ..InterfaceState::default()
            },
            ..Scenario::default()
        })
        .expect("scenario");
        world.queue_key(i32::from(b'n'));
        assert_eq!(world.interface().editor, Some(EditorMode::Creation));
        world.queue_key(KEY_NAME_ENTRY);
        for ch in "Aradesh".bytes() {
            world.queue_key(i32::from(ch));
        }
        world.queue_key(KEY_RETURN);
        assert_eq!(world.player().map(|p| p.name.as_str()), Some("Aradesh"));
        assert_eq!(world.interface().editor, Some(EditorMode::Creation));
        world.queue_key(KEY_RETURN);
        assert_eq!(world.interface().editor, None);
    }

    #[test]
    fn stat_adjustments_spend_points() {
        let mut world = world(vec![critter(1, 100)]);
        world.chargen.character_points = 1;
        assert_eq!(world.adjust_stat(SpecialStat::Luck, 1).expect("inc"), 6);
        assert!(world.adjust_stat(SpecialStat::Luck, 1).is_err());
        assert_eq!(world.adjust_stat(SpecialStat::Luck, -1).expect("dec"), 5);
        assert_eq!(world.chargen().character_points, 1);
    }

    #[test]
    fn message_log_is_capped() {
        let mut world = world(vec![critter(1, 100)]);
        for i in 0..150 {
            world.push_message(format!("line {i}"));
        }
        let recent = world.recent_messages(3);
        assert_eq!(recent, vec!["line 147", "line 148", "line 149"]);
        assert_eq!(world.recent_messages(usize::MAX).len(), MESSAGE_LOG_CAPACITY);
    }
}
