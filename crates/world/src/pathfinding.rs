use crate::facade::{RouteFlags, RouteSearch};
use hexbridge_core::{Direction, HexGrid, Tile};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};

/// Longest route the router will return; longer routes are reported as not found.
pub const MAX_ROUTE_STEPS: usize = 800;

/// Default bound on node expansions per query.
pub const DEFAULT_MAX_EXPANSIONS: usize = 65_536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    /// Total estimated cost.
    f: i32,
    /// Cost so far.
    g: i32,
    tile: Tile,
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert comparisons so the smallest (f, g, tile) is popped first.
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.g.cmp(&self.g))
            .then_with(|| other.tile.cmp(&self.tile))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Deterministic 6-neighbor A* over a hex grid.
///
/// Tie-breaking is fixed: open-set priority is `(f, g, tile)` and neighbours are expanded in
/// [`Direction::ALL`] order. The probe is called at most once per tile, and every tile it
/// reports as open is recorded in [`RouteSearch::explored`] in discovery order.
#[derive(Debug, Clone, Copy)]
pub struct HexRouter {
    pub max_expansions: usize,
}

impl Default for HexRouter {
    fn default() -> Self {
        Self {
            max_expansions: DEFAULT_MAX_EXPANSIONS,
        }
    }
}

impl HexRouter {
    pub fn search(
        &self,
        grid: &HexGrid,
        from: Tile,
        to: Tile,
        flags: RouteFlags,
        probe: &dyn Fn(Tile) -> bool,
    ) -> RouteSearch {
        let mut explored = Vec::new();
        if from == to || !grid.contains(from) || !grid.contains(to) {
            return RouteSearch::default();
        }

        let mut probed: BTreeMap<Tile, bool> = BTreeMap::new();
        let mut is_blocked = |tile: Tile, explored: &mut Vec<Tile>| -> bool {
            *probed.entry(tile).or_insert_with(|| {
                let blocked = probe(tile);
                if !blocked {
                    explored.push(tile);
                }
                blocked
            })
        };

        if flags.contains(RouteFlags::REQUIRE_OPEN_GOAL) && is_blocked(to, &mut explored) {
            return RouteSearch {
                steps: Vec::new(),
                explored,
            };
        }

        let mut open = BinaryHeap::new();
        open.push(OpenNode {
            f: grid.distance(from, to),
            g: 0,
            tile: from,
        });

        let mut came_from: BTreeMap<Tile, (Tile, Direction)> = BTreeMap::new();
        let mut g_score: BTreeMap<Tile, i32> = BTreeMap::new();
        g_score.insert(from, 0);
        let mut closed: BTreeMap<Tile, ()> = BTreeMap::new();

        let mut expansions = 0usize;
        while let Some(node) = open.pop() {
            if closed.insert(node.tile, ()).is_some() {
                continue;
            }

            if node.tile == to {
                let steps = reconstruct(&came_from, from, to);
                if steps.len() > MAX_ROUTE_STEPS {
                    tracing::debug!(len = steps.len(), "route exceeds step buffer");
                    return RouteSearch {
                        steps: Vec::new(),
                        explored,
                    };
                }
                return RouteSearch { steps, explored };
            }

            expansions += 1;
            if expansions > self.max_expansions {
                break;
            }
            if node.g as usize >= MAX_ROUTE_STEPS {
                continue;
            }

            for dir in Direction::ALL {
                let Some(next) = grid.neighbor(node.tile, dir) else {
                    continue;
                };
                if closed.contains_key(&next) {
                    continue;
                }
                let exempt_goal = next == to && !flags.contains(RouteFlags::REQUIRE_OPEN_GOAL);
                if !exempt_goal && is_blocked(next, &mut explored) {
                    continue;
                }

                let tentative_g = node.g.saturating_add(1);
                let best_g = g_score.get(&next).copied().unwrap_or(i32::MAX);
                if tentative_g >= best_g {
                    continue;
                }

                came_from.insert(next, (node.tile, dir));
                g_score.insert(next, tentative_g);
                open.push(OpenNode {
                    f: tentative_g.saturating_add(grid.distance(next, to)),
                    g: tentative_g,
                    tile: next,
                });
            }
        }

        RouteSearch {
            steps: Vec::new(),
            explored,
        }
    }
}

fn reconstruct(came_from: &BTreeMap<Tile, (Tile, Direction)>, from: Tile, to: Tile) -> Vec<Direction> {
    let mut steps = Vec::new();
    let mut cur = to;
    while cur != from {
        match came_from.get(&cur) {
            Some((prev, dir)) => {
                steps.push(*dir);
                cur = *prev;
            }
            None => return Vec::new(),
        }
    }
    steps.reverse();
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn grid() -> HexGrid {
        HexGrid::new(30, 30).expect("valid grid")
    }

    #[test]
    fn straight_route_in_open_space() {
        let grid = grid();
        let route = HexRouter::default().search(&grid, Tile(100), Tile(105), RouteFlags::empty(), &|_| false);
        assert_eq!(route.steps, vec![Direction::East; 5]);
        assert_eq!(grid.advance(Tile(100), &route.steps), Tile(105));
    }

    #[test]
    fn blocked_goal_is_exempt_without_flag() {
        let grid = grid();
        let goal = Tile(104);
        let probe = |tile: Tile| tile == goal;
        let router = HexRouter::default();

        let open = router.search(&grid, Tile(100), goal, RouteFlags::empty(), &probe);
        assert_eq!(open.steps.len(), 4);

        let strict = router.search(&grid, Tile(100), goal, RouteFlags::REQUIRE_OPEN_GOAL, &probe);
        assert!(strict.steps.is_empty());
        assert!(strict.explored.is_empty());
    }

    #[test]
    fn routes_detour_around_walls_deterministically() {
        let grid = grid();
        let wall: BTreeSet<Tile> = (0..29).map(|row| Tile(row * 30 + 10)).collect();
        let probe = |tile: Tile| wall.contains(&tile);
        let router = HexRouter::default();
        let first = router.search(&grid, Tile(5 * 30 + 5), Tile(5 * 30 + 15), RouteFlags::empty(), &probe);
        let second = router.search(&grid, Tile(5 * 30 + 5), Tile(5 * 30 + 15), RouteFlags::empty(), &probe);
        assert!(!first.steps.is_empty());
        assert_eq!(first, second);
        let mut tile = Tile(5 * 30 + 5);
        for dir in &first.steps {
            tile = grid.neighbor(tile, *dir).expect("on grid");
            assert!(!wall.contains(&tile));
        }
        assert_eq!(tile, Tile(5 * 30 + 15));
    }

    #[test]
    fn enclosed_goal_reports_explored_tiles() {
        let grid = grid();
        let goal = Tile(15 * 30 + 15);
        let ring: BTreeSet<Tile> = Direction::ALL
            .iter()
            .filter_map(|dir| grid.neighbor(goal, *dir))
            .collect();
        let probe = |tile: Tile| ring.contains(&tile) || tile == goal;
        let route = HexRouter::default().search(&grid, Tile(15 * 30 + 10), goal, RouteFlags::REQUIRE_OPEN_GOAL, &probe);
        assert!(route.steps.is_empty());
        let route = HexRouter::default().search(&grid, Tile(15 * 30 + 10), goal, RouteFlags::empty(), &probe);
        assert!(route.steps.is_empty());
        assert!(!route.explored.is_empty());
        assert!(route.explored.iter().all(|t| !ring.contains(t)));
    }

    #[test]
    fn overlong_routes_are_rejected() {
        let grid = HexGrid::new(1000, 1).expect("valid grid");
        let route = HexRouter {
            max_expansions: 10_000,
        }
        .search(&grid, Tile(0), Tile(900), RouteFlags::empty(), &|_| false);
        assert!(route.steps.is_empty());
        let route = HexRouter::default().search(&grid, Tile(0), Tile(800), RouteFlags::empty(), &|_| false);
        assert_eq!(route.steps.len(), 800);
    }
}
