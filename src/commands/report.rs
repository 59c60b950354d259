use super::{CommandResult, Interpreter};
use crate::channel::protocol::escape_value;
use crate::look::look_dump;
use crate::snapshot::{hp_label, inventory_lines, is_hostile, nearby, sort_nearby, state_dump};
use hexbridge_core::{ObjectKind, ELEVATION_COUNT};
use hexbridge_world::Simulation;
use std::fmt::Write as _;

impl<S: Simulation> Interpreter<S> {
    pub(super) fn state(&self) -> CommandResult {
        Ok(state_dump(&self.world, &self.config.snapshot))
    }

    pub(super) fn look(&self) -> CommandResult {
        self.player()?;
        Ok(look_dump(&self.world, &self.look))
    }

    pub(super) fn inventory(&self) -> CommandResult {
        Ok(inventory_lines(self.world.player()))
    }

    /// Per-elevation dump of every non-hidden object, capped per elevation.
    pub(super) fn debug_objects(&self) -> CommandResult {
        let world = &self.world;
        let grid = world.grid();
        let limit = self.config.snapshot.debug_objects_limit;
        let player = world.player();

        let mut out = String::new();
        let _ = writeln!(out, "player_tile={}", player.map_or(-1, |p| p.tile.0));
        let _ = write!(out, "player_elevation={}", player.map_or(-1, |p| p.elevation));

        let mut count = 0usize;
        let mut shown = 0usize;
        let mut per_kind = [0usize; ObjectKind::ALL.len()];
        let mut truncated = false;

        for elevation in 0..ELEVATION_COUNT {
            let _ = writeln!(out, "\n\n[elevation {elevation}]");
            let mut listed = 0usize;
            for object in world.objects_at(elevation) {
                if object.is_hidden() {
                    continue;
                }
                count += 1;
                if let Some(kind) = object.kind() {
                    if let Some(slot) = ObjectKind::ALL.iter().position(|k| *k == kind) {
                        per_kind[slot] += 1;
                    }
                }
                if listed >= limit {
                    truncated = true;
                    continue;
                }
                listed += 1;
                let distance = player.map_or(-1, |p| grid.distance(p.tile, object.tile));
                let _ = writeln!(
                    out,
                    "[{}] pid={} type={} name={} tile={} elevation={} flags={:#x} distance={}",
                    object.id,
                    object.pid,
                    object.kind().map_or("unknown", ObjectKind::as_str),
                    escape_value(&object.name),
                    object.tile,
                    object.elevation,
                    object.flags.bits(),
                    distance
                );
            }
            shown += listed;
        }

        let _ = writeln!(out, "count={count}");
        let _ = writeln!(out, "shown={shown}");
        for (kind, total) in ObjectKind::ALL.iter().zip(per_kind) {
            let _ = writeln!(out, "type_{}={total}", kind.as_str());
        }
        let _ = write!(out, "truncated={}", u8::from(truncated));
        Ok(out)
    }

    /// Every non-hidden object on the player's elevation within range, visibility ignored.
    pub(super) fn debug_nearby(&self) -> CommandResult {
        let player = self.player()?;
        let range = self.config.snapshot.debug_nearby_range;
        let mut entries: Vec<_> = self
            .world
            .objects_at(player.elevation)
            .into_iter()
            .filter(|object| object.id != player.id && !object.is_hidden())
            .map(|object| nearby(&self.world, player, object))
            .filter(|entry| entry.distance <= range)
            .collect();
        sort_nearby(&mut entries);

        let mut out = String::new();
        let _ = writeln!(out, "range={range}");
        let _ = writeln!(out, "count={}", entries.len());
        for entry in &entries {
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
        Ok(out)
    }
}
