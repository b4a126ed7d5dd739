//! Board generation: deterministic wall structure, randomized soft-wall fill.

use rand::Rng;
use shared::game::{spawn_positions, GameConfig, Position, Tile};
use std::collections::HashSet;

/// Generates a fresh board for `config` using the thread RNG.
///
/// Layout rules:
/// - every border cell is a hard wall
/// - every interior cell with both coordinates even is a hard wall
///   (the pillar grid)
/// - remaining cells become soft walls with probability
///   `soft_wall_density`, except the spawn safe set
pub fn generate(config: &GameConfig) -> Vec<Vec<Tile>> {
    generate_with(config, &mut rand::thread_rng())
}

/// Same as [`generate`] but with a caller-supplied RNG, so tests can seed it.
pub fn generate_with<R: Rng>(config: &GameConfig, rng: &mut R) -> Vec<Vec<Tile>> {
    let width = config.width as usize;
    let height = config.height as usize;

    let mut board = vec![vec![Tile::Empty; width]; height];
    for (y, row) in board.iter_mut().enumerate() {
        for (x, tile) in row.iter_mut().enumerate() {
            let border = x == 0 || y == 0 || x == width - 1 || y == height - 1;
            if border || (x % 2 == 0 && y % 2 == 0) {
                *tile = Tile::HardWall;
            }
        }
    }

    let safe = safe_set(config.width, config.height);
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            if board[y][x] != Tile::Empty {
                continue;
            }
            if safe.contains(&Position::new(x as i32, y as i32)) {
                continue;
            }
            if rng.gen::<f64>() < config.soft_wall_density {
                board[y][x] = Tile::SoftWall;
            }
        }
    }

    board
}

/// Tiles that must stay clear of soft walls: each spawn corner plus its
/// four orthogonal neighbors, so every spawning player has a legal first move.
pub fn safe_set(width: i32, height: i32) -> HashSet<Position> {
    let mut safe = HashSet::new();
    for spawn in spawn_positions(width, height) {
        safe.insert(spawn);
        safe.insert(Position::new(spawn.x + 1, spawn.y));
        safe.insert(Position::new(spawn.x - 1, spawn.y));
        safe.insert(Position::new(spawn.x, spawn.y + 1));
        safe.insert(Position::new(spawn.x, spawn.y - 1));
    }
    safe
}
