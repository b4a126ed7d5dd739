//! Plain-text board renderer for the terminal client.
//!
//! One character per tile: `#` indestructible wall, `+` destructible wall,
//! `o` bomb, `*` fire, a digit for each player (their color slot), `@` for
//! the local player, `.` for a dead player's last position. A status block
//! under the board tracks the phase and the player roster.

use shared::game::{GameState, Phase, Position, Tile};
use std::fmt::Write;

pub fn render(state: &GameState, my_id: &str) -> String {
    let mut out = String::new();

    for y in 0..state.height {
        for x in 0..state.width {
            out.push(tile_char(state, my_id, Position::new(x, y)));
        }
        out.push('\n');
    }

    out.push('\n');
    match state.phase {
        Phase::Lobby => {
            let _ = writeln!(out, "waiting in lobby ({} joined)", state.players.len());
        }
        Phase::Running => {
            let _ = writeln!(out, "game on ({} alive)", state.alive_players());
        }
        Phase::Over => match &state.winner {
            Some(id) => {
                let name = state.players.get(id).map(|p| p.name.as_str()).unwrap_or(id);
                if id == my_id {
                    let _ = writeln!(out, "you win!");
                } else {
                    let _ = writeln!(out, "{} wins", name);
                }
            }
            None => {
                let _ = writeln!(out, "draw");
            }
        },
    }

    let mut roster: Vec<_> = state.players.values().collect();
    roster.sort_by_key(|p| p.color);
    for player in roster {
        let marker = if player.id == my_id { "@" } else { " " };
        let fate = if player.alive { "alive" } else { "dead" };
        let _ = writeln!(out, "{}{} {} [{}]", marker, player.color, player.name, fate);
    }

    out
}

fn tile_char(state: &GameState, my_id: &str, pos: Position) -> char {
    // Players draw over fire so a death is visible for the frame it happens.
    if let Some(player) = state.players.values().find(|p| p.pos == pos) {
        if !player.alive {
            return '.';
        }
        if player.id == my_id {
            return '@';
        }
        return char::from_digit(player.color as u32 % 10, 10).unwrap_or('?');
    }
    if state.fire_at(pos) {
        return '*';
    }
    if state.bomb_at(pos).is_some() {
        return 'o';
    }
    match state.tile(pos) {
        Some(Tile::HardWall) => '#',
        Some(Tile::SoftWall) => '+',
        _ => ' ',
    }
}
