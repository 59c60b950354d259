use hexbridge_core::{HexGrid, Tile};

/// Whether `to` can be seen from `from`.
///
/// Only the tiles strictly between the two endpoints are tested; an occluder standing on
/// either endpoint does not hide it.
pub fn line_of_sight(grid: &HexGrid, from: Tile, to: Tile, occludes: impl Fn(Tile) -> bool) -> bool {
    if from == to {
        return true;
    }
    let line = grid.line(from, to);
    if line.len() <= 2 {
        return true;
    }
    !line[1..line.len() - 1].iter().any(|tile| occludes(*tile))
}
