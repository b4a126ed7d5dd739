//! Maps typed commands to game intents. WASD for movement, `b` drops a
//! bomb, `start` begins the match, `q`/`quit` leaves.

use shared::game::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move(Direction),
    PlaceBomb,
    Start,
    Quit,
}

/// Parses one line of input. Unrecognized input yields `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    match line.trim().to_lowercase().as_str() {
        "w" | "up" => Some(Command::Move(Direction::Up)),
        "s" | "down" => Some(Command::Move(Direction::Down)),
        "a" | "left" => Some(Command::Move(Direction::Left)),
        "d" | "right" => Some(Command::Move(Direction::Right)),
        "b" | "bomb" => Some(Command::PlaceBomb),
        "start" => Some(Command::Start),
        "q" | "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}
