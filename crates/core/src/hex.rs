//! Hex grid geometry.
//!
//! Tiles are numbered row-major (`row * width + col`) on a pointy-top grid where odd rows are
//! shifted half a tile to the east. Row 0 is the northern edge.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Default grid width in tiles.
pub const DEFAULT_GRID_WIDTH: i32 = 200;
/// Default grid height in tiles.
pub const DEFAULT_GRID_HEIGHT: i32 = 200;

/// Index of a single hex tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tile(pub i32);

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the six hex step directions, in clockwise order starting north-east.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// North-east.
    NorthEast,
    /// East.
    East,
    /// South-east.
    SouthEast,
    /// South-west.
    SouthWest,
    /// West.
    West,
    /// North-west.
    NorthWest,
}

impl Direction {
    /// All directions in rotation order.
    pub const ALL: [Direction; 6] = [
        Direction::NorthEast,
        Direction::East,
        Direction::SouthEast,
        Direction::SouthWest,
        Direction::West,
        Direction::NorthWest,
    ];

    /// Short protocol name (`ne`, `e`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::NorthEast => "ne",
            Direction::East => "e",
            Direction::SouthEast => "se",
            Direction::SouthWest => "sw",
            Direction::West => "w",
            Direction::NorthWest => "nw",
        }
    }

    /// Parse a direction name, case-insensitive. `n` and `s` alias `ne` and `sw`.
    pub fn parse(name: &str) -> Option<Self> {
        let dir = match name.to_ascii_lowercase().as_str() {
            "n" | "ne" => Direction::NorthEast,
            "e" => Direction::East,
            "se" => Direction::SouthEast,
            "s" | "sw" => Direction::SouthWest,
            "w" => Direction::West,
            "nw" => Direction::NorthWest,
            _ => return None,
        };
        Some(dir)
    }

    /// Rotation index (0..6).
    pub fn index(self) -> usize {
        self as usize
    }

    /// Direction pointing the other way.
    pub fn opposite(self) -> Self {
        Self::ALL[(self.index() + 3) % 6]
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced when constructing a grid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    /// Width or height was zero or negative.
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: i32,
        /// Requested height.
        height: i32,
    },
    /// The tile count does not fit in an `i32` index.
    #[error("grid {width}x{height} is too large")]
    TooLarge {
        /// Requested width.
        width: i32,
        /// Requested height.
        height: i32,
    },
}

/// Rectangular hex grid dimensions plus the geometry queries built on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HexGrid {
    width: i32,
    height: i32,
}

impl Default for HexGrid {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_WIDTH,
            height: DEFAULT_GRID_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cube {
    x: i32,
    y: i32,
    z: i32,
}

impl HexGrid {
    /// Create a grid, validating the dimensions.
    pub fn new(width: i32, height: i32) -> Result<Self, GridError> {
        if width <= 0 || height <= 0 {
            return Err(GridError::InvalidDimensions { width, height });
        }
        if width.checked_mul(height).is_none() {
            return Err(GridError::TooLarge { width, height });
        }
        Ok(Self { width, height })
    }

    /// Width in tiles.
    pub fn width(&self) -> i32 {
        self.width
    }

    /// Height in tiles.
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Number of addressable tiles.
    pub fn tile_count(&self) -> i32 {
        self.width * self.height
    }

    /// Whether `tile` is a valid index on this grid.
    pub fn contains(&self, tile: Tile) -> bool {
        tile.0 >= 0 && tile.0 < self.tile_count()
    }

    /// Tile at `(col, row)`, if inside the grid.
    pub fn tile_at(&self, col: i32, row: i32) -> Option<Tile> {
        if col < 0 || row < 0 || col >= self.width || row >= self.height {
            return None;
        }
        Some(Tile(row * self.width + col))
    }

    /// `(col, row)` of a tile. Callers are expected to pass tiles inside the grid.
    pub fn coords(&self, tile: Tile) -> (i32, i32) {
        (tile.0.rem_euclid(self.width), tile.0.div_euclid(self.width))
    }

    /// Neighbouring tile one step in `dir`, or `None` at the grid edge.
    pub fn neighbor(&self, tile: Tile, dir: Direction) -> Option<Tile> {
        if !self.contains(tile) {
            return None;
        }
        let (col, row) = self.coords(tile);
        let odd = row & 1 == 1;
        let (dc, dr) = match (dir, odd) {
            (Direction::East, _) => (1, 0),
            (Direction::West, _) => (-1, 0),
            (Direction::NorthEast, false) => (0, -1),
            (Direction::NorthEast, true) => (1, -1),
            (Direction::NorthWest, false) => (-1, -1),
            (Direction::NorthWest, true) => (0, -1),
            (Direction::SouthEast, false) => (0, 1),
            (Direction::SouthEast, true) => (1, 1),
            (Direction::SouthWest, false) => (-1, 1),
            (Direction::SouthWest, true) => (0, 1),
        };
        self.tile_at(col + dc, row + dr)
    }

    /// Walk `steps` from `start`. Steps that would leave the grid are skipped.
    pub fn advance(&self, start: Tile, steps: &[Direction]) -> Tile {
        steps
            .iter()
            .fold(start, |tile, dir| self.neighbor(tile, *dir).unwrap_or(tile))
    }

    /// Minimum number of single steps between two tiles.
    pub fn distance(&self, a: Tile, b: Tile) -> i32 {
        let ca = self.cube(a);
        let cb = self.cube(b);
        (ca.x - cb.x)
            .abs()
            .max((ca.y - cb.y).abs())
            .max((ca.z - cb.z).abs())
    }

    /// Compass direction from `from` towards `to`, or `None` when they are the same tile.
    ///
    /// Targets that are not on a straight line resolve to the 60-degree sector containing them.
    pub fn direction(&self, from: Tile, to: Tile) -> Option<Direction> {
        if from == to {
            return None;
        }
        let (fx, fy) = self.center(from);
        let (tx, ty) = self.center(to);
        // Screen y grows southward; flip it so angles run counter-clockwise from east.
        let angle = (-(ty - fy)).atan2(tx - fx).to_degrees();
        let sector = ((angle / 60.0).round() as i32).rem_euclid(6);
        let dir = match sector {
            0 => Direction::East,
            1 => Direction::NorthEast,
            2 => Direction::NorthWest,
            3 => Direction::West,
            4 => Direction::SouthWest,
            _ => Direction::SouthEast,
        };
        Some(dir)
    }

    /// Tiles on the straight line from `a` to `b`, both ends included.
    pub fn line(&self, a: Tile, b: Tile) -> Vec<Tile> {
        let n = self.distance(a, b);
        if n == 0 {
            return vec![a];
        }
        let ca = self.cube(a);
        let cb = self.cube(b);
        // Nudge off exact edges so ties between two tiles resolve consistently.
        let (ax, ay, az) = (
            ca.x as f64 + 1e-6,
            ca.y as f64 + 2e-6,
            ca.z as f64 - 3e-6,
        );
        let (bx, by, bz) = (
            cb.x as f64 + 1e-6,
            cb.y as f64 + 2e-6,
            cb.z as f64 - 3e-6,
        );
        let mut out = Vec::with_capacity(n as usize + 1);
        for i in 0..=n {
            let t = i as f64 / n as f64;
            let cube = cube_round(
                ax + (bx - ax) * t,
                ay + (by - ay) * t,
                az + (bz - az) * t,
            );
            if let Some(tile) = self.from_cube(cube) {
                if out.last() != Some(&tile) {
                    out.push(tile);
                }
            }
        }
        out
    }

    /// Every tile within `radius` steps of `center` that lies on the grid, in index order.
    pub fn tiles_within(&self, center: Tile, radius: i32) -> Vec<Tile> {
        let (col, row) = self.coords(center);
        let mut out = Vec::new();
        for r in (row - radius).max(0)..=(row + radius).min(self.height - 1) {
            for c in (col - radius - 1).max(0)..=(col + radius + 1).min(self.width - 1) {
                let tile = Tile(r * self.width + c);
                if self.distance(center, tile) <= radius {
                    out.push(tile);
                }
            }
        }
        out
    }

    fn cube(&self, tile: Tile) -> Cube {
        let (col, row) = self.coords(tile);
        let x = col - (row - (row & 1)) / 2;
        let z = row;
        Cube { x, y: -x - z, z }
    }

    fn from_cube(&self, cube: Cube) -> Option<Tile> {
        let row = cube.z;
        let col = cube.x + (row - (row & 1)) / 2;
        self.tile_at(col, row)
    }

    fn center(&self, tile: Tile) -> (f64, f64) {
        let (col, row) = self.coords(tile);
        let x = 3f64.sqrt() * (col as f64 + 0.5 * (row & 1) as f64);
        let y = 1.5 * row as f64;
        (x, y)
    }
}

fn cube_round(x: f64, y: f64, z: f64) -> Cube {
    let mut rx = x.round();
    let mut ry = y.round();
    let mut rz = z.round();
    let dx = (rx - x).abs();
    let dy = (ry - y).abs();
    let dz = (rz - z).abs();
    if dx > dy && dx > dz {
        rx = -ry - rz;
    } else if dy > dz {
        ry = -rx - rz;
    } else {
        rz = -rx - ry;
    }
    Cube {
        x: rx as i32,
        y: ry as i32,
        z: rz as i32,
    }
}
