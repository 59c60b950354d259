//! Deterministic text snapshots of world state.

use crate::channel::protocol::escape_value;
use crate::config::SnapshotConfig;
use hexbridge_core::{
    Direction, InventoryEntry, ObjectFlags, ObjectId, ObjectKind, SpecialStat, WorldObject,
};
use hexbridge_world::{EditorMode, WorldQuery};
use std::collections::HashSet;
use std::fmt::Write as _;

/// Deepest container nesting walked by inventory listings.
pub const MAX_CONTAINER_DEPTH: usize = 16;

/// Current interaction mode, first match wins.
pub fn mode<W: WorldQuery + ?Sized>(world: &W) -> &'static str {
    let interface = world.interface();
    if interface.main_menu {
        return "mainmenu";
    }
    match interface.editor {
        Some(EditorMode::Creation) => return "chargen",
        Some(EditorMode::Sheet) => return "character",
        None => {}
    }
    if world.worldmap().is_some() {
        "worldmap"
    } else if world.dialogue().is_some() {
        "dialogue"
    } else if interface.inventory_open {
        "inventory"
    } else if world.combat().is_some() {
        "combat"
    } else {
        "exploration"
    }
}

/// Sight radius of the player.
pub fn perception_range<W: WorldQuery + ?Sized>(world: &W) -> i32 {
    (world.player_stats().get(SpecialStat::Perception) * 3).max(6)
}

/// One object in a proximity listing.
#[derive(Debug, Clone, Copy)]
pub struct Nearby<'a> {
    pub object: &'a WorldObject,
    pub distance: i32,
    /// `None` when the object shares the viewer's tile.
    pub direction: Option<Direction>,
}

impl Nearby<'_> {
    pub fn direction_label(&self) -> &'static str {
        self.direction.map_or("here", Direction::as_str)
    }
}

/// Build a proximity entry relative to `viewer`.
pub fn nearby<'a, W: WorldQuery + ?Sized>(
    world: &W,
    viewer: &WorldObject,
    object: &'a WorldObject,
) -> Nearby<'a> {
    let grid = world.grid();
    let distance = grid.distance(viewer.tile, object.tile);
    let direction = if distance == 0 {
        None
    } else {
        grid.direction(viewer.tile, object.tile)
    };
    Nearby {
        object,
        distance,
        direction,
    }
}

/// Sort by distance, then object id.
pub fn sort_nearby(entries: &mut [Nearby<'_>]) {
    entries.sort_by_key(|entry| (entry.distance, entry.object.id));
}

/// Non-hidden objects on the viewer's elevation within `radius`, excluding the viewer.
///
/// Objects on the viewer's own tile are always listed; anything farther must be in line of
/// sight. The result is sorted.
pub fn collect_visible<'a, W: WorldQuery + ?Sized>(
    world: &'a W,
    viewer: &WorldObject,
    radius: i32,
) -> Vec<Nearby<'a>> {
    let mut entries: Vec<Nearby<'a>> = world
        .objects_at(viewer.elevation)
        .into_iter()
        .filter(|object| object.id != viewer.id && !object.is_hidden())
        .map(|object| nearby(world, viewer, object))
        .filter(|entry| entry.distance <= radius)
        .filter(|entry| entry.distance == 0 || world.can_see(viewer, entry.object))
        .collect();
    sort_nearby(&mut entries);
    entries
}

/// Hostile when the critter is on a different team than the viewer.
pub fn is_hostile(viewer: &WorldObject, object: &WorldObject) -> bool {
    match (viewer.critter(), object.critter()) {
        (Some(a), Some(b)) => a.team != b.team,
        _ => false,
    }
}

/// `cur/max` hit points, `0/0` for objects without critter data.
pub fn hp_label(object: &WorldObject) -> String {
    object
        .critter()
        .map_or_else(|| "0/0".to_string(), |c| format!("{}/{}", c.hp, c.max_hp))
}

fn equipped_slots(item: &WorldObject) -> Vec<&'static str> {
    [
        (ObjectFlags::LEFT_HAND, "left_hand"),
        (ObjectFlags::RIGHT_HAND, "right_hand"),
        (ObjectFlags::WORN, "armor"),
    ]
    .into_iter()
    .filter(|(flag, _)| item.flags.contains(*flag))
    .map(|(_, label)| label)
    .collect()
}

/// `count=` line followed by one row per carried item, nested containers included.
///
/// `count` is the number of top-level stacks. Rows inside a container carry `container=<id>`.
pub fn inventory_lines(holder: Option<&WorldObject>) -> String {
    let mut out = String::new();
    let Some(holder) = holder else {
        out.push_str("count=0\n");
        return out;
    };
    let _ = writeln!(out, "count={}", holder.inventory.len());

    let mut visited: HashSet<ObjectId> = HashSet::new();
    visited.insert(holder.id);
    let mut work: Vec<(&InventoryEntry, Option<ObjectId>, usize)> = holder
        .inventory
        .iter()
        .rev()
        .map(|entry| (entry, None, 0))
        .collect();

    while let Some((entry, container, depth)) = work.pop() {
        let item = &entry.item;
        let _ = write!(
            out,
            "[{}] name={} quantity={}",
            item.id,
            escape_value(&item.name),
            entry.quantity
        );
        let slots = equipped_slots(item);
        if !slots.is_empty() {
            let _ = write!(out, " equipped={}", slots.join(","));
        }
        if let Some(container) = container {
            let _ = write!(out, " container={container}");
        }
        out.push('\n');

        if depth + 1 >= MAX_CONTAINER_DEPTH || !visited.insert(item.id) {
            continue;
        }
        work.extend(
            item.inventory
                .iter()
                .rev()
                .map(|inner| (inner, Some(item.id), depth + 1)),
        );
    }
    out
}

/// Find a carried item anywhere in `holder`'s inventory tree.
pub fn find_carried(holder: &WorldObject, id: ObjectId) -> Option<&WorldObject> {
    let mut work: Vec<(&WorldObject, usize)> = holder
        .inventory
        .iter()
        .map(|entry| (&entry.item, 0))
        .collect();
    while let Some((item, depth)) = work.pop() {
        if item.id == id {
            return Some(item);
        }
        if depth + 1 < MAX_CONTAINER_DEPTH {
            work.extend(item.inventory.iter().map(|entry| (&entry.item, depth + 1)));
        }
    }
    None
}

fn slot_label(item: Option<&WorldObject>) -> String {
    item.map_or_else(
        || "none".to_string(),
        |item| format!("[{}] {}", item.id, escape_value(&item.name)),
    )
}

fn equipped(holder: &WorldObject, flag: ObjectFlags) -> Option<&WorldObject> {
    holder
        .inventory
        .iter()
        .map(|entry| &entry.item)
        .find(|item| item.flags.contains(flag))
}

/// Strip leading whitespace and list bullets from a dialogue option.
pub fn strip_option_prefix(text: &str) -> &str {
    text.trim_start_matches(|ch: char| ch.is_whitespace() || ch == '\u{95}' || ch == '\u{2022}')
}

/// Full `state` report.
pub fn state_dump<W: WorldQuery + ?Sized>(world: &W, config: &SnapshotConfig) -> String {
    let mut out = String::new();
    let player = world.player();

    out.push_str("[MODE]\n");
    let _ = writeln!(out, "mode={}", mode(world));
    let _ = writeln!(out, "game_state={}", world.game_state());
    let _ = writeln!(out, "map={}", escape_value(world.map_name()));

    out.push_str("\n[PLAYER]\n");
    match player {
        None => out.push_str("present=0\n"),
        Some(player) => {
            let stats = world.player_stats();
            let (hp, max_hp, ap, max_ap) = player
                .critter()
                .map_or((0, 0, 0, 0), |c| (c.hp, c.max_hp, c.ap, c.max_ap));
            let ap = if world.combat().is_some() { ap } else { max_ap };
            let _ = writeln!(out, "name={}", escape_value(&player.name));
            let _ = writeln!(out, "tile={}", player.tile);
            let _ = writeln!(out, "elevation={}", player.elevation);
            let _ = writeln!(out, "hp={hp}/{max_hp}");
            let _ = writeln!(out, "ap={ap}/{max_ap}");
            for stat in SpecialStat::ALL {
                let _ = writeln!(out, "{}={}", stat.key(), stats.get(stat));
            }
            let _ = writeln!(out, "ac={}", stats.armor_class);
            let _ = writeln!(out, "xp={}", stats.experience);
            let _ = writeln!(out, "level={}", stats.level);
        }
    }

    out.push_str("\n[EQUIPMENT]\n");
    let slot = |flag| player.and_then(|p| equipped(p, flag));
    let _ = writeln!(out, "left_hand={}", slot_label(slot(ObjectFlags::LEFT_HAND)));
    let _ = writeln!(out, "right_hand={}", slot_label(slot(ObjectFlags::RIGHT_HAND)));
    let _ = writeln!(out, "armor={}", slot_label(slot(ObjectFlags::WORN)));

    out.push_str("\n[INVENTORY]\n");
    out.push_str(&inventory_lines(player));

    out.push_str("\n[SURROUNDINGS]\n");
    let radius = perception_range(world);
    match player {
        None => out.push_str("count=0\n"),
        Some(player) => {
            let visible = collect_visible(world, player, radius);
            let _ = writeln!(out, "range={radius}");
            let _ = writeln!(out, "count={}", visible.len());
            for entry in &visible {
                let object = entry.object;
                let _ = write!(
                    out,
                    "[{}] name={} type={} distance={} direction={}",
                    object.id,
                    escape_value(&object.name),
                    object.type_label(),
                    entry.distance,
                    entry.direction_label()
                );
                if object.kind() == Some(ObjectKind::Critter) {
                    let _ = write!(
                        out,
                        " hp={} hostile={}",
                        hp_label(object),
                        u8::from(is_hostile(player, object))
                    );
                }
                out.push('\n');
            }
        }
    }

    if let Some(dialogue) = world.dialogue() {
        out.push_str("\n[DIALOGUE]\n");
        match dialogue.npc.and_then(|id| world.object(id)) {
            Some(npc) => {
                let _ = writeln!(out, "npc={}", escape_value(&npc.name));
                let _ = writeln!(out, "npc_id={}", npc.id);
            }
            None => out.push_str("npc=none\n"),
        }
        let _ = writeln!(out, "reply={}", escape_value(&dialogue.reply));
        let _ = writeln!(out, "option_count={}", dialogue.options.len());
        for (index, option) in dialogue.options.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}={}",
                index + 1,
                escape_value(strip_option_prefix(option))
            );
        }
    }

    if let Some(combat) = world.combat() {
        out.push_str("\n[COMBAT]\n");
        let turn = combat.whose_turn.and_then(|id| world.object(id));
        let _ = writeln!(out, "turn={}", slot_label(turn));
        if let Some(player) = player {
            let ap = player.critter().map_or(0, |c| c.ap);
            let _ = writeln!(out, "remaining_ap={ap}");

            let mut enemies: Vec<Nearby<'_>> = world
                .objects_at(player.elevation)
                .into_iter()
                .filter(|object| object.id != player.id && !object.is_hidden())
                .filter(|object| {
                    object.kind() == Some(ObjectKind::Critter)
                        && object.critter().is_some_and(|c| !c.dead)
                        && is_hostile(player, object)
                })
                .map(|object| nearby(world, player, object))
                .filter(|entry| entry.distance <= radius)
                .collect();
            sort_nearby(&mut enemies);

            let _ = writeln!(out, "enemy_count={}", enemies.len());
            for entry in &enemies {
                let _ = writeln!(
                    out,
                    "[{}] name={} hp={} distance={} direction={}",
                    entry.object.id,
                    escape_value(&entry.object.name),
                    hp_label(entry.object),
                    entry.distance,
                    entry.direction_label()
                );
            }
        }
    }

    if let Some(worldmap) = world.worldmap() {
        out.push_str("\n[WORLDMAP]\n");
        let (x, y) = worldmap.position;
        let _ = writeln!(out, "position={x},{y}");
        let known: Vec<_> = world.towns().into_iter().filter(|town| town.known).collect();
        let _ = writeln!(out, "known_count={}", known.len());
        for town in known {
            let _ = writeln!(out, "[{}] {}", town.index, escape_value(&town.name));
        }
    }

    out.push_str("\n[DISPLAY_LOG]\n");
    let lines = world.recent_messages(config.log_lines);
    let _ = writeln!(out, "lines={}", lines.len());
    for (index, line) in lines.iter().enumerate() {
        let _ = writeln!(out, "{}={}", index + 1, escape_value(line));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hexbridge_core::ItemType;
    use hexbridge_testkit::{
        body_fields, critter, entry_ids, item, player, section_lines, wall, with_inventory,
        ScenarioBuilder,
    };
    use hexbridge_world::{SandboxWorld, Scenario};
    use serde_json::json;

    fn sandbox(builder: ScenarioBuilder) -> SandboxWorld {
        let scenario = Scenario::from_json(&builder.to_json_string()).expect("scenario parses");
        SandboxWorld::from_scenario(scenario).expect("scenario valid")
    }

    #[test]
    fn mode_follows_priority_order() {
        let world = sandbox(ScenarioBuilder::default().player(player(1, 100)));
        assert_eq!(mode(&world), "exploration");

        let world = sandbox(ScenarioBuilder::default().player(player(1, 100)).in_combat());
        assert_eq!(mode(&world), "combat");

        let world = sandbox(ScenarioBuilder::default().player(player(1, 100)).main_menu());
        assert_eq!(mode(&world), "mainmenu");

        let world = sandbox(ScenarioBuilder::default().player(player(1, 100)).chargen(5));
        assert_eq!(mode(&world), "chargen");
    }

    #[test]
    fn equal_distance_sorts_by_lower_id() {
        let world = sandbox(
            ScenarioBuilder::default()
                .player(player(1, 100))
                .object(critter(9, "Rat", 102, 4, 1))
                .object(critter(5, "Dog", 98, 6, 0))
                .object(critter(7, "Gecko", 101, 3, 1)),
        );
        let dump = state_dump(&world, &SnapshotConfig::default());
        let rows = section_lines(&dump, "[SURROUNDINGS]");
        assert_eq!(entry_ids(&rows), vec![7, 5, 9]);
        assert!(rows.iter().any(|row| row.starts_with("[5] name=Dog type=critter distance=2 direction=w hp=6/6 hostile=0")));
    }

    #[test]
    fn surroundings_skip_hidden_far_and_occluded_objects() {
        let mut hidden = critter(20, "Ghost", 101, 1, 1);
        hidden.flags = ObjectFlags::HIDDEN;
        let world = sandbox(
            ScenarioBuilder::default()
                .player(player(1, 100))
                .object(hidden)
                .object(critter(21, "Far", 150, 1, 1))
                .object(wall(22, 103))
                .object(critter(23, "Behind", 105, 1, 1))
                .object(item(24, "Coin", 100, ItemType::Misc)),
        );
        let dump = state_dump(&world, &SnapshotConfig::default());
        let rows = section_lines(&dump, "[SURROUNDINGS]");
        assert_eq!(entry_ids(&rows), vec![24, 22]);
        assert_eq!(rows[2], "[24] name=Coin type=item distance=0 direction=here");
        assert_eq!(rows[3], "[22] name=Wall type=wall distance=3 direction=e");
        let fields = body_fields(&rows.join("\n"));
        assert_eq!(fields["range"], "15");
        assert_eq!(fields["count"], "2");
    }

    #[test]
    fn missing_player_reports_absent_sections() {
        let world = sandbox(ScenarioBuilder::default());
        let dump = state_dump(&world, &SnapshotConfig::default());
        assert_eq!(section_lines(&dump, "[PLAYER]")[0], "present=0");
        assert_eq!(section_lines(&dump, "[EQUIPMENT]")[0], "left_hand=none");
        assert_eq!(section_lines(&dump, "[INVENTORY]")[0], "count=0");
        assert_eq!(section_lines(&dump, "[SURROUNDINGS]")[0], "count=0");
    }

    #[test]
    fn nested_inventory_rows_name_their_container() {
        let mut pistol = item(31, "Pistol", -1, ItemType::Weapon);
        pistol.flags = ObjectFlags::RIGHT_HAND;
        let pouch = with_inventory(
            item(32, "Pouch", -1, ItemType::Container),
            vec![item(33, "Key", -1, ItemType::Key)],
        );
        let bag = with_inventory(item(34, "Bag", -1, ItemType::Container), vec![pouch]);
        let hero = with_inventory(player(1, 100), vec![pistol, bag]);

        let text = inventory_lines(Some(&hero));
        assert_eq!(
            text,
            "count=2\n\
             [31] name=Pistol quantity=1 equipped=right_hand\n\
             [34] name=Bag quantity=1\n\
             [32] name=Pouch quantity=1 container=34\n\
             [33] name=Key quantity=1 container=32\n"
        );
        assert_eq!(find_carried(&hero, ObjectId(33)).map(|i| i.name.as_str()), Some("Key"));
    }

    #[test]
    fn dialogue_options_lose_their_bullets() {
        let world = sandbox(
            ScenarioBuilder::default()
                .player(player(1, 100))
                .object(critter(7, "Overseer", 102, 10, 0))
                .set(
                    "dialogue",
                    json!({ "npc": 7, "reply": "Well?\nSpeak.", "options": ["\u{95} Water chip?", "  Goodbye."] }),
                ),
        );
        let dump = state_dump(&world, &SnapshotConfig::default());
        let rows = section_lines(&dump, "[DIALOGUE]");
        assert_eq!(
            rows[..6],
            [
                "npc=Overseer",
                "npc_id=7",
                "reply=Well?\\nSpeak.",
                "option_count=2",
                "1=Water chip?",
                "2=Goodbye."
            ]
        );
    }

    #[test]
    fn combat_lists_living_hostiles() {
        let mut corpse = critter(12, "Corpse", 103, 0, 1);
        if let Some(c) = corpse.critter_mut() {
            c.dead = true;
        }
        let world = sandbox(
            ScenarioBuilder::default()
                .player(player(1, 100))
                .object(critter(10, "Raider", 104, 12, 1))
                .object(critter(11, "Ian", 101, 20, 0))
                .object(corpse)
                .in_combat(),
        );
        let dump = state_dump(&world, &SnapshotConfig::default());
        let rows = section_lines(&dump, "[COMBAT]");
        assert_eq!(rows[0], "turn=[1] Chosen One");
        assert_eq!(rows[1], "remaining_ap=8");
        assert_eq!(rows[2], "enemy_count=1");
        assert_eq!(rows[3], "[10] name=Raider hp=12/12 distance=4 direction=e");
    }

    #[test]
    fn display_log_keeps_the_newest_lines() {
        let mut world = sandbox(ScenarioBuilder::default().player(player(1, 100)));
        for n in 0..12 {
            world.push_message(format!("line {n}"));
        }
        let dump = state_dump(&world, &SnapshotConfig::default());
        let rows = section_lines(&dump, "[DISPLAY_LOG]");
        assert_eq!(rows[0], "lines=8");
        assert_eq!(rows[1], "1=line 4");
        assert_eq!(rows[8], "8=line 11");
    }

    #[test]
    fn state_is_deterministic() {
        let world = sandbox(
            ScenarioBuilder::default()
                .player(player(1, 100))
                .object(critter(2, "Rat", 101, 4, 1)),
        );
        let config = SnapshotConfig::default();
        assert_eq!(state_dump(&world, &config), state_dump(&world, &config));
    }
}
