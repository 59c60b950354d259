//! Simulation side of the bridge: facade traits plus an in-memory sandbox implementing them.

mod facade;
mod los;
mod pathfinding;
mod sandbox;
mod scenario;

pub use facade::*;
pub use los::*;
pub use pathfinding::*;
pub use sandbox::*;
pub use scenario::*;
