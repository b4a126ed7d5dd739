//! Simulation rules applied by the engine each tick: movement, bomb
//! placement, detonation with chain reactions, fire decay, win evaluation.
//!
//! All functions operate on the live `GameState` and are only called while
//! the engine holds its lock. Rejected operations leave the state untouched.

use shared::game::{Action, ActionKind, Bomb, Direction, Fire, GameState, Phase, Position, Tile};
use std::collections::HashSet;

const CARDINALS: [(i32, i32); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];

pub(crate) fn apply_action(state: &mut GameState, action: &Action, bomb_fuse_ms: u64, now: u64) {
    match action.kind {
        ActionKind::Move(dir) => move_player(state, &action.player_id, dir),
        ActionKind::PlaceBomb => place_bomb(state, &action.player_id, bomb_fuse_ms, now),
    }
}

/// Moves a player one tile. Blocked by board edges, walls and bombs.
/// Stepping onto an active fire tile kills the player immediately.
pub(crate) fn move_player(state: &mut GameState, player_id: &str, dir: Direction) {
    let current = match state.players.get(player_id) {
        Some(p) if p.alive => p.pos,
        _ => return,
    };

    let (dx, dy) = dir.offset();
    let target = Position::new(current.x + dx, current.y + dy);

    if !matches!(state.tile(target), Some(Tile::Empty)) {
        return;
    }
    if state.bomb_at(target).is_some() {
        return;
    }

    let into_fire = state.fire_at(target);
    if let Some(p) = state.players.get_mut(player_id) {
        p.pos = target;
        if into_fire {
            p.alive = false;
        }
    }
}

/// Places a bomb at the player's current tile. Rejected when the player is
/// dead, at capacity, or the tile already holds a bomb.
pub(crate) fn place_bomb(state: &mut GameState, player_id: &str, bomb_fuse_ms: u64, now: u64) {
    let (pos, range) = match state.players.get(player_id) {
        Some(p) if p.alive && p.bombs_used < p.bomb_max => (p.pos, p.bomb_range),
        _ => return,
    };
    if state.bomb_at(pos).is_some() {
        return;
    }

    state.bombs.push(Bomb {
        owner_id: player_id.to_string(),
        pos,
        range,
        placed_at: now,
        expires_at: now + bomb_fuse_ms,
    });
    if let Some(p) = state.players.get_mut(player_id) {
        p.bombs_used += 1;
    }
}

/// Detonates every bomb whose fuse has run out, resolving chain reactions
/// within the same pass, then kills players caught in fire and returns
/// capacity to the owners of the removed bombs.
pub(crate) fn resolve_bombs(state: &mut GameState, fire_duration_ms: u64, now: u64) {
    let mut detonated = vec![false; state.bombs.len()];
    let expired: Vec<usize> = state
        .bombs
        .iter()
        .enumerate()
        .filter(|(_, b)| now >= b.expires_at)
        .map(|(i, _)| i)
        .collect();
    if expired.is_empty() {
        return;
    }

    for &i in &expired {
        detonated[i] = true;
    }
    let fire_expiry = now + fire_duration_ms;
    for &i in &expired {
        explode(state, i, &mut detonated, fire_expiry);
    }

    // All chains for this tick are resolved; evaluate every fire tile at once
    // so simultaneous multi-explosion kills are consistent.
    kill_players_in_fire(state);

    let bombs = std::mem::take(&mut state.bombs);
    for (i, bomb) in bombs.into_iter().enumerate() {
        if detonated[i] {
            if let Some(p) = state.players.get_mut(&bomb.owner_id) {
                p.bombs_used = p.bombs_used.saturating_sub(1);
            }
        } else {
            state.bombs.push(bomb);
        }
    }
}

/// Expands one explosion outward in the four cardinal directions.
///
/// Per direction: a hard wall stops expansion with no fire; a soft wall is
/// converted to empty, receives fire, and stops expansion; empty tiles
/// receive fire and keep the expansion going. Fire landing on a bomb that
/// has not yet detonated triggers it recursively within this same pass.
fn explode(state: &mut GameState, bomb_idx: usize, detonated: &mut Vec<bool>, fire_expiry: u64) {
    let (center, range) = {
        let bomb = &state.bombs[bomb_idx];
        (bomb.pos, bomb.range)
    };

    state.fires.push(Fire {
        pos: center,
        expires_at: fire_expiry,
    });

    for (dx, dy) in CARDINALS {
        for dist in 1..=range {
            let pos = Position::new(center.x + dx * dist, center.y + dy * dist);
            match state.tile(pos) {
                None | Some(Tile::HardWall) => break,
                Some(Tile::SoftWall) => {
                    state.set_tile(pos, Tile::Empty);
                    state.fires.push(Fire {
                        pos,
                        expires_at: fire_expiry,
                    });
                    break;
                }
                Some(Tile::Empty) => {
                    state.fires.push(Fire {
                        pos,
                        expires_at: fire_expiry,
                    });
                    if let Some(j) = state.bomb_at(pos) {
                        if !detonated[j] {
                            detonated[j] = true;
                            explode(state, j, detonated, fire_expiry);
                        }
                    }
                }
            }
        }
    }
}

fn kill_players_in_fire(state: &mut GameState) {
    let fire_set: HashSet<Position> = state.fires.iter().map(|f| f.pos).collect();
    for p in state.players.values_mut() {
        if p.alive && fire_set.contains(&p.pos) {
            p.alive = false;
        }
    }
}

/// Drops fire tiles whose lifetime has passed. No partial decay.
pub(crate) fn clear_expired_fires(state: &mut GameState, now: u64) {
    state.fires.retain(|f| f.expires_at > now);
}

/// Ends the game when at most one player is left alive. A lobby that was
/// started with a single player never auto-wins.
pub(crate) fn check_win(state: &mut GameState) {
    if state.phase != Phase::Running {
        return;
    }

    let alive: Vec<&str> = state
        .players
        .values()
        .filter(|p| p.alive)
        .map(|p| p.id.as_str())
        .collect();

    match alive.len() {
        0 if state.players.len() >= 2 => {
            state.phase = Phase::Over;
            state.winner = None;
        }
        1 if state.players.len() > 1 => {
            state.phase = Phase::Over;
            state.winner = Some(alive[0].to_string());
        }
        _ => {}
    }
}
