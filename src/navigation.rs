//! The `goto` planner: goal resolution, bounded plans and the closest-reachable fallback.

use crate::config::NavigationConfig;
use hexbridge_core::{object_distance, Direction, HexGrid, ObjectId, Tile};
use hexbridge_world::{Animator, PathOracle, RouteFlags, Simulation};
use std::fmt::Write as _;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Most steps a single `goto` will walk.
pub const MAX_PATH_LENGTH: usize = 100;

/// Planning and execution failures. `Display` is the response body.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavError {
    #[error("player_unavailable")]
    PlayerUnavailable,
    #[error("animation_timeout")]
    AnimationTimeout,
    #[error("different_elevation\nplayer_elevation={player}\ntarget_elevation={target}")]
    DifferentElevation { player: i32, target: i32 },
    #[error("tile_out_of_range")]
    TileOutOfRange,
    #[error("unreachable\nclosest_tile={closest}\ndistance_from_target={distance}")]
    Unreachable { closest: Tile, distance: i32 },
    #[error("move_failed")]
    MoveFailed,
}

/// What `goto` is heading for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Goal {
    Object {
        id: ObjectId,
        tile: Tile,
        elevation: i32,
        multihex: bool,
        /// Object distance from the actor, multi-hex adjusted.
        distance: i32,
    },
    Tile(Tile),
}

impl Goal {
    pub fn tile(&self) -> Tile {
        match self {
            Goal::Object { tile, .. } => *tile,
            Goal::Tile(tile) => *tile,
        }
    }
}

/// A bounded, steppable movement plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathPlan {
    pub destination: Tile,
    pub planned_steps: usize,
    /// The route was longer than `planned_steps`.
    pub capped: bool,
    /// A best-effort tile was substituted for the goal.
    pub partial: bool,
    pub arrived_adjacent: bool,
}

impl PathPlan {
    fn stay(at: Tile) -> Self {
        Self {
            destination: at,
            planned_steps: 0,
            capped: false,
            partial: false,
            arrived_adjacent: false,
        }
    }
}

/// Closest open tile seen by the obstruction probe during one routing query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTrackingState {
    pub active: bool,
    pub target: Tile,
    pub best_tile: Option<Tile>,
    pub best_distance: i32,
}

impl PathTrackingState {
    pub fn begin(target: Tile) -> Self {
        Self {
            active: true,
            target,
            best_tile: None,
            best_distance: i32::MAX,
        }
    }

    /// Score an open tile. Ties go to the lower tile index.
    pub fn observe(&mut self, grid: &HexGrid, tile: Tile) {
        if !self.active {
            return;
        }
        let distance = grid.distance(tile, self.target);
        let better = match self.best_tile {
            None => true,
            Some(best) => {
                distance < self.best_distance || (distance == self.best_distance && tile < best)
            }
        };
        if better {
            self.best_tile = Some(tile);
            self.best_distance = distance;
        }
    }

    /// Best tile seen, or `fallback` when nothing was observed.
    pub fn finish(self, fallback: Tile) -> Tile {
        self.best_tile.unwrap_or(fallback)
    }
}

/// Everything a plan depends on: the oracle, the actor's position and its obstruction test.
pub struct RouteContext<'a> {
    pub oracle: &'a dyn PathOracle,
    pub grid: HexGrid,
    pub actor: ObjectId,
    pub from: Tile,
    pub elevation: i32,
    /// `true` when the actor cannot enter the tile.
    pub blocked: &'a dyn Fn(Tile) -> bool,
}

impl RouteContext<'_> {
    /// Routing query instrumented with the closest-tile tracker.
    fn tracked_route(&self, to: Tile, flags: RouteFlags) -> (Vec<Direction>, Tile) {
        let mut tracking = PathTrackingState::begin(to);
        let search = self
            .oracle
            .find_path(self.actor, self.from, to, self.elevation, flags, self.blocked);
        for tile in &search.explored {
            tracking.observe(&self.grid, *tile);
        }
        let closest = tracking.finish(self.from);
        (search.steps, closest)
    }

    fn route(&self, to: Tile) -> Vec<Direction> {
        self.oracle
            .find_path(
                self.actor,
                self.from,
                to,
                self.elevation,
                RouteFlags::empty(),
                self.blocked,
            )
            .steps
    }

    /// The closest tile if a route to it exists, else the actor's own tile.
    fn validate_closest(&self, closest: Tile) -> Tile {
        if closest == self.from || self.route(closest).is_empty() {
            self.from
        } else {
            closest
        }
    }

    /// Walk at most [`MAX_PATH_LENGTH`] of the first `wanted` steps.
    fn capped(&self, steps: &[Direction], wanted: usize) -> PathPlan {
        let planned = wanted.min(MAX_PATH_LENGTH).min(steps.len());
        PathPlan {
            destination: self.grid.advance(self.from, &steps[..planned]),
            planned_steps: planned,
            capped: planned < wanted,
            partial: false,
            arrived_adjacent: false,
        }
    }

    /// Best-effort move toward `closest`, if it is a different, reachable tile.
    fn fallback(&self, closest: Tile) -> Option<PathPlan> {
        if closest == self.from {
            return None;
        }
        let steps = self.route(closest);
        if steps.is_empty() {
            return None;
        }
        let plan = PathPlan {
            partial: true,
            ..self.capped(&steps, steps.len())
        };
        (plan.planned_steps > 0).then_some(plan)
    }

    fn unreachable(&self, closest: Tile, goal: Tile) -> NavError {
        NavError::Unreachable {
            closest,
            distance: self.grid.distance(closest, goal),
        }
    }

    /// Plan toward `goal`. Nothing is moved.
    pub fn plan(&self, goal: Goal) -> Result<PathPlan, NavError> {
        match goal {
            Goal::Object {
                tile,
                elevation,
                multihex,
                distance,
                ..
            } => {
                if elevation != self.elevation {
                    return Err(NavError::DifferentElevation {
                        player: self.elevation,
                        target: elevation,
                    });
                }
                if distance <= 1 {
                    return Ok(PathPlan {
                        arrived_adjacent: true,
                        ..PathPlan::stay(self.from)
                    });
                }

                let (steps, closest) = self.tracked_route(tile, RouteFlags::empty());
                let closest = self.validate_closest(closest);
                if steps.is_empty() {
                    return self
                        .fallback(closest)
                        .ok_or_else(|| self.unreachable(closest, tile));
                }

                let stop_distance = if multihex { 2 } else { 1 };
                if steps.len() <= stop_distance {
                    return Ok(PathPlan {
                        arrived_adjacent: true,
                        ..PathPlan::stay(self.from)
                    });
                }
                Ok(self.capped(&steps, steps.len() - stop_distance))
            }
            Goal::Tile(tile) => {
                if !self.grid.contains(tile) {
                    return Err(NavError::TileOutOfRange);
                }
                if tile == self.from {
                    return Ok(PathPlan::stay(self.from));
                }

                let goal_blocked = (self.blocked)(tile);
                let flags = if goal_blocked {
                    RouteFlags::empty()
                } else {
                    RouteFlags::REQUIRE_OPEN_GOAL
                };
                let (steps, closest) = self.tracked_route(tile, flags);
                let closest = self.validate_closest(closest);

                if steps.is_empty() {
                    return self
                        .fallback(closest)
                        .ok_or_else(|| self.unreachable(closest, tile));
                }
                if goal_blocked {
                    // Stop on the last open tile before the obstruction.
                    return Ok(self.capped(&steps, steps.len() - 1));
                }
                Ok(self.capped(&steps, steps.len()))
            }
        }
    }
}

/// Poll `actor`'s animation to completion, stepping the animator every poll.
///
/// Returns `false` when `wait.wait_timeout_ms` elapses first.
pub fn wait_for_animation<S: Simulation + ?Sized>(
    world: &mut S,
    actor: ObjectId,
    wait: &NavigationConfig,
) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(wait.wait_timeout_ms);
    let step = Duration::from_millis(wait.wait_step_ms);
    while world.is_animating(actor) {
        world.animate_frame();
        if start.elapsed() > timeout {
            return false;
        }
        if !step.is_zero() {
            thread::sleep(step);
        }
    }
    true
}

/// Submit one walk inside a begin/commit pair.
pub fn submit_move<S: Animator + ?Sized>(
    world: &mut S,
    actor: ObjectId,
    tile: Tile,
    elevation: i32,
    action_points: Option<i32>,
) -> anyhow::Result<()> {
    world.begin_request()?;
    if let Err(err) = world.register_move(actor, tile, elevation, action_points) {
        let _ = world.end_request();
        return Err(err);
    }
    world.end_request()
}

/// Resolve `raw` (object id first, else tile index), plan, walk and report.
///
/// Runs to completion on the caller's thread: the animation waits block, and no other command
/// may touch the world until this returns.
pub fn goto<S: Simulation>(
    world: &mut S,
    wait: &NavigationConfig,
    raw: i32,
) -> Result<String, NavError> {
    let actor = world.player().ok_or(NavError::PlayerUnavailable)?.id;
    if !wait_for_animation(world, actor, wait) {
        return Err(NavError::AnimationTimeout);
    }

    let player = world.player().ok_or(NavError::PlayerUnavailable)?.clone();
    let grid = world.grid();
    let goal = match world.object(ObjectId(raw)) {
        Some(target) => Goal::Object {
            id: target.id,
            tile: target.tile,
            elevation: target.elevation,
            multihex: target.is_multihex(),
            distance: object_distance(&grid, &player, target),
        },
        None => Goal::Tile(Tile(raw)),
    };

    let plan = {
        let blocked = |tile: Tile| {
            world
                .blocker_at(Some(player.id), tile, player.elevation)
                .is_some()
        };
        let context = RouteContext {
            oracle: &*world,
            grid,
            actor: player.id,
            from: player.tile,
            elevation: player.elevation,
            blocked: &blocked,
        };
        context.plan(goal)?
    };
    tracing::debug!(
        tile = goal.tile().0,
        steps = plan.planned_steps,
        capped = plan.capped,
        partial = plan.partial,
        "goto planned"
    );

    if plan.planned_steps > 0 {
        let action_points = world
            .combat()
            .and_then(|_| player.critter().map(|critter| critter.ap));
        if let Err(err) = submit_move(
            world,
            player.id,
            plan.destination,
            player.elevation,
            action_points,
        ) {
            tracing::debug!(%err, tile = plan.destination.0, "goto move rejected");
            return Err(NavError::MoveFailed);
        }
        if !wait_for_animation(world, player.id, wait) {
            return Err(NavError::AnimationTimeout);
        }
        if let Some(moved) = world.player() {
            let tile = moved.tile;
            world.scroll_to(tile);
        }
    }

    let moved = world.player().ok_or(NavError::PlayerUnavailable)?;
    let final_tile = moved.tile;
    let arrived_adjacent = match goal {
        Goal::Object { id, .. } => world
            .object(id)
            .is_some_and(|target| object_distance(&grid, moved, target) <= 1),
        Goal::Tile(_) => plan.arrived_adjacent,
    };

    let mut out = String::new();
    if plan.partial {
        out.push_str("result=partial\n");
    }
    match goal {
        Goal::Object { id, .. } => {
            out.push_str("target_kind=object\n");
            let _ = writeln!(out, "target_object_id={id}");
        }
        Goal::Tile(_) => out.push_str("target_kind=tile\n"),
    }
    let _ = writeln!(out, "target_tile={}", goal.tile());
    let _ = writeln!(out, "destination_tile={}", plan.destination);
    let _ = writeln!(out, "planned_steps={}", plan.planned_steps);
    let _ = writeln!(out, "capped={}", u8::from(plan.capped));
    let _ = writeln!(out, "final_tile={final_tile}");
    let _ = writeln!(
        out,
        "distance_from_target={}",
        grid.distance(final_tile, goal.tile())
    );
    let _ = write!(out, "arrived_adjacent={}", u8::from(arrived_adjacent));
    Ok(out)
}
