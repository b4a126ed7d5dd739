//! Simulation data model shared by the server and the client.
//!
//! Everything here is plain data: the server mutates it under the engine
//! lock, clones it into snapshots, and ships the clones over the wire.
//! `GameState` deliberately owns every container it holds so that
//! `clone()` is a structurally independent deep copy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_BOMB_CAPACITY: u32 = 1;
pub const DEFAULT_BOMB_RANGE: i32 = 2;

/// A single cell of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tile {
    Empty,
    /// Indestructible.
    HardWall,
    /// Destroyed by explosions.
    SoftWall,
}

/// Grid coordinate. Signed so that candidate positions can go out of
/// bounds before the bounds check rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Unit offset of the direction in board coordinates (y grows down).
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Move,
    PlaceBomb,
}

/// A queued player intent, applied by the engine on the next tick.
#[derive(Debug, Clone)]
pub struct Action {
    pub player_id: String,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Move(Direction),
    PlaceBomb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub pos: Position,
    pub alive: bool,
    /// Max simultaneous bombs.
    pub bomb_max: u32,
    /// Explosion range in tiles.
    pub bomb_range: i32,
    /// Currently active bombs. Invariant: `bombs_used <= bomb_max`.
    pub bombs_used: u32,
    /// Cosmetic color index (0-3).
    pub color: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bomb {
    pub owner_id: String,
    pub pos: Position,
    /// Copied from the owner at placement time, not live-linked.
    pub range: i32,
    pub placed_at: u64,
    pub expires_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fire {
    pub pos: Position,
    pub expires_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Players may join, no simulation runs.
    Lobby,
    Running,
    /// Terminal. `winner` is set on a decisive win, `None` on a draw.
    Over,
}

/// Configurable parameters for a game session. Immutable once the engine
/// is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub width: i32,
    pub height: i32,
    pub bomb_fuse_ms: u64,
    pub fire_duration_ms: u64,
    /// Ticks per second.
    pub tick_rate: u32,
    pub max_players: usize,
    /// Probability (0.0-1.0) that an eligible empty tile becomes a soft wall.
    pub soft_wall_density: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            width: 15,
            height: 13,
            bomb_fuse_ms: 3_000,
            fire_duration_ms: 500,
            tick_rate: 20,
            max_players: 4,
            soft_wall_density: 0.4,
        }
    }
}

impl GameConfig {
    /// Bumps even dimensions up to the next odd value so the pillar
    /// pattern stays symmetric.
    pub fn normalized(mut self) -> Self {
        if self.width % 2 == 0 {
            self.width += 1;
        }
        if self.height % 2 == 0 {
            self.height += 1;
        }
        self
    }
}

/// Corner spawn positions. Corners cycle if more than four players join.
pub fn spawn_positions(width: i32, height: i32) -> [Position; 4] {
    [
        Position::new(1, 1),
        Position::new(width - 2, 1),
        Position::new(1, height - 2),
        Position::new(width - 2, height - 2),
    ]
}

/// The full simulation state. The engine owns the only live instance;
/// everything that leaves the engine is a `clone()` of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    /// `height` rows of `width` tiles, indexed `board[y][x]`.
    pub board: Vec<Vec<Tile>>,
    pub players: HashMap<String, Player>,
    pub bombs: Vec<Bomb>,
    pub fires: Vec<Fire>,
    pub width: i32,
    pub height: i32,
    pub phase: Phase,
    pub winner: Option<String>,
}

impl GameState {
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.x < self.width && pos.y >= 0 && pos.y < self.height
    }

    /// Tile at `pos`, or `None` when out of bounds.
    pub fn tile(&self, pos: Position) -> Option<Tile> {
        if !self.in_bounds(pos) {
            return None;
        }
        Some(self.board[pos.y as usize][pos.x as usize])
    }

    pub fn set_tile(&mut self, pos: Position, tile: Tile) {
        if self.in_bounds(pos) {
            self.board[pos.y as usize][pos.x as usize] = tile;
        }
    }

    /// Index of the bomb occupying `pos`, if any. At most one bomb can
    /// occupy a tile.
    pub fn bomb_at(&self, pos: Position) -> Option<usize> {
        self.bombs.iter().position(|b| b.pos == pos)
    }

    pub fn fire_at(&self, pos: Position) -> bool {
        self.fires.iter().any(|f| f.pos == pos)
    }

    pub fn alive_players(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }
}
