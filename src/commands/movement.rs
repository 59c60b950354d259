use super::{parse_int, CommandError, CommandResult, Interpreter};
use crate::navigation::{self, submit_move};
use hexbridge_core::{Direction, Tile, WorldObject};
use hexbridge_world::Simulation;
use std::fmt::Write as _;

impl<S: Simulation> Interpreter<S> {
    /// Register a walk and return immediately; the run loop animates it.
    fn request_walk(&mut self, destination: Tile) -> CommandResult {
        let player = self.player()?;
        let (actor, elevation) = (player.id, player.elevation);
        let action_points = self.move_points();
        submit_move(&mut self.world, actor, destination, elevation, action_points).map_err(
            |err| {
                tracing::debug!(tile = destination.0, err = %format!("{err:#}"), "move rejected");
                CommandError::Failed("move_failed")
            },
        )?;
        self.world.scroll_to(destination);
        Ok(format!("destination_tile={destination}"))
    }

    pub(super) fn step(&mut self, args: &[String]) -> CommandResult {
        let token = args.first().ok_or(CommandError::Usage("move <direction>"))?;
        let from = self.player()?.tile;
        let direction =
            Direction::parse(token).ok_or(CommandError::Rejected("invalid_direction"))?;
        let destination = self
            .world
            .grid()
            .neighbor(from, direction)
            .ok_or(CommandError::Failed("move_failed"))?;
        self.request_walk(destination)
    }

    pub(super) fn move_to(&mut self, args: &[String]) -> CommandResult {
        let token = args.first().ok_or(CommandError::Usage("move_to <tile>"))?;
        self.player()?;
        let tile = Tile(parse_int(token).ok_or(CommandError::Rejected("invalid_tile"))?);
        if !self.world.grid().contains(tile) {
            return Err(CommandError::Rejected("tile_out_of_range"));
        }
        self.request_walk(tile)
    }

    pub(super) fn goto(&mut self, args: &[String]) -> CommandResult {
        let token = args
            .first()
            .ok_or(CommandError::Usage("goto <object_id_or_tile>"))?;
        self.player()?;
        let raw = parse_int(token).ok_or(CommandError::Rejected("invalid_target"))?;
        Ok(navigation::goto(&mut self.world, &self.config.navigation, raw)?)
    }

    /// Exit markers on the player's elevation within the debug range, nearest first.
    fn exit_grids(&self, player: &WorldObject) -> Vec<(i32, &WorldObject)> {
        let grid = self.world.grid();
        let range = self.config.snapshot.debug_nearby_range;
        let mut exits: Vec<(i32, &WorldObject)> = self
            .world
            .objects_at(player.elevation)
            .into_iter()
            .filter(|object| self.look.is_exit_grid(object))
            .map(|object| (grid.distance(player.tile, object.tile), object))
            .filter(|(distance, _)| *distance <= range)
            .collect();
        exits.sort_by_key(|(distance, object)| (*distance, object.id));
        exits
    }

    /// Step onto the nearest exit marker.
    pub(super) fn enter(&mut self) -> CommandResult {
        let player = self.player()?;
        let (actor, elevation) = (player.id, player.elevation);
        let (distance, exit) = self
            .exit_grids(player)
            .first()
            .map(|(distance, exit)| (*distance, (exit.id, exit.pid, exit.tile)))
            .ok_or(CommandError::Rejected("exit_grid_not_found"))?;
        let (exit_id, exit_pid, exit_tile) = exit;

        let mut out = String::new();
        let _ = writeln!(out, "exit_grid_pid={exit_pid}");
        let _ = writeln!(out, "exit_grid_tile={exit_tile}");
        let _ = writeln!(out, "exit_grid_distance={distance}");
        let _ = writeln!(out, "exit_grid_object_id={exit_id}");

        if let Err(err) = self.world.teleport(actor, exit_tile, elevation) {
            tracing::debug!(tile = exit_tile.0, err = %format!("{err:#}"), "exit grid teleport failed");
            out.push_str("entered_exit_grid=0");
            return Err(CommandError::Report(out));
        }
        let _ = write!(out, "entered_exit_grid=1\nobject_id={exit_id}\ntile={exit_tile}");
        Ok(out)
    }

    pub(super) fn scan_exits(&self) -> CommandResult {
        let player = self.player()?;
        let exits = self.exit_grids(player);
        let mut out = format!("count={}", exits.len());
        for (distance, exit) in exits {
            let _ = write!(
                out,
                "\n[{}] pid={} tile={} distance={distance}",
                exit.id, exit.pid, exit.tile
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::test_support::*;
    use hexbridge_core::{ObjectFlags, ObjectId, Tile};
    use hexbridge_testkit::{body_fields, critter, exit_grid, player, wall, ScenarioBuilder};
    use hexbridge_world::{Animator, WorldQuery};

    #[test]
    fn move_registers_a_single_step() {
        let mut it = interpreter(ScenarioBuilder::default().player(player(1, 100)));
        assert_eq!(error(&mut it, "move"), "usage=move <direction>");
        assert_eq!(error(&mut it, "move up"), "invalid_direction");
        assert_eq!(ok(&mut it, "move E"), "destination_tile=101");
        assert_eq!(it.world().player().map(|p| p.tile), Some(Tile(100)));
        assert_eq!(it.world().view_center(), Some(Tile(101)));
        it.world_mut().animate_frame();
        assert_eq!(it.world().player().map(|p| p.tile), Some(Tile(101)));
    }

    #[test]
    fn move_off_the_grid_edge_fails() {
        let mut it = interpreter(ScenarioBuilder::default().player(player(1, 0)));
        assert_eq!(error(&mut it, "move w"), "move_failed");
    }

    #[test]
    fn move_to_validates_the_tile() {
        let mut it = interpreter(ScenarioBuilder::default().player(player(1, 100)));
        assert_eq!(error(&mut it, "move_to"), "usage=move_to <tile>");
        assert_eq!(error(&mut it, "move_to here"), "invalid_tile");
        assert_eq!(error(&mut it, "move_to 40000"), "tile_out_of_range");
        assert_eq!(error(&mut it, "move_to -1"), "tile_out_of_range");
        assert_eq!(ok(&mut it, "move_to 0x68"), "destination_tile=104");
    }

    #[test]
    fn move_in_combat_is_limited_by_action_points() {
        let mut it = interpreter(ScenarioBuilder::default().player(player(1, 100)).in_combat());
        if let Some(critter) = it.world_mut().object_mut(ObjectId(1)).and_then(|p| p.critter_mut()) {
            critter.ap = 0;
        }
        assert_eq!(error(&mut it, "move_to 105"), "move_failed");
    }

    #[test]
    fn goto_walks_to_a_tile() {
        let mut it = interpreter(ScenarioBuilder::default().player(player(1, 100)));
        assert_eq!(error(&mut it, "goto"), "usage=goto <object_id_or_tile>");
        assert_eq!(error(&mut it, "goto door"), "invalid_target");
        let fields = body_fields(&ok(&mut it, "goto 105"));
        assert_eq!(fields["target_kind"], "tile");
        assert_eq!(fields["destination_tile"], "105");
        assert_eq!(fields["planned_steps"], "5");
        assert_eq!(fields["final_tile"], "105");
        assert_eq!(error(&mut it, "goto 9999999"), "tile_out_of_range");
    }

    #[test]
    fn goto_reports_elevation_mismatch() {
        let mut upstairs = critter(7, "Guard", 300, 10, 0);
        upstairs.elevation = 1;
        let mut it = interpreter(ScenarioBuilder::default().player(player(1, 100)).object(upstairs));
        assert_eq!(
            error(&mut it, "goto 7"),
            "different_elevation\nplayer_elevation=0\ntarget_elevation=1"
        );
    }

    #[test]
    fn enter_picks_the_nearest_exit_with_lowest_id() {
        let mut it = interpreter(
            ScenarioBuilder::default()
                .player(player(1, 100))
                .object(exit_grid(51, 98, 1))
                .object(exit_grid(50, 102, 0))
                .object(exit_grid(52, 110, 2)),
        );
        assert_eq!(
            ok(&mut it, "enter"),
            "exit_grid_pid=0x5000010\nexit_grid_tile=102\nexit_grid_distance=2\n\
             exit_grid_object_id=50\nentered_exit_grid=1\nobject_id=50\ntile=102"
        );
        assert_eq!(it.world().player().map(|p| p.tile), Some(Tile(102)));
    }

    #[test]
    fn enter_reports_the_exit_grid_not_the_player() {
        let mut it = interpreter(
            ScenarioBuilder::default()
                .player(player(1, 100))
                .object(exit_grid(77, 305, 5)),
        );
        let fields = body_fields(&ok(&mut it, "enter"));
        assert_eq!(fields["exit_grid_object_id"], "77");
        assert_eq!(fields["object_id"], "77");
        assert_eq!(fields["tile"], "305");
        assert_eq!(fields["exit_grid_tile"], "305");
        assert_eq!(it.world().player().map(|p| p.tile), Some(Tile(305)));
    }

    #[test]
    fn enter_without_exits_fails() {
        let mut it = interpreter(ScenarioBuilder::default().player(player(1, 100)).object(wall(2, 101)));
        assert_eq!(error(&mut it, "enter"), "exit_grid_not_found");
    }

    #[test]
    fn scan_exits_lists_sorted_markers_on_the_player_elevation() {
        let mut hidden = exit_grid(53, 104, 3);
        hidden.flags = ObjectFlags::HIDDEN;
        let mut upstairs = exit_grid(54, 101, 4);
        upstairs.elevation = 1;
        let mut it = interpreter(
            ScenarioBuilder::default()
                .player(player(1, 100))
                .object(exit_grid(52, 110, 2))
                .object(hidden)
                .object(upstairs),
        );
        assert_eq!(
            ok(&mut it, "scan_exits"),
            "count=2\n[53] pid=0x5000013 tile=104 distance=4\n[52] pid=0x5000012 tile=110 distance=10"
        );
    }
}
