//! Types and protocol shared between the game server and client.
//!
//! Three concerns live here:
//! - `game`: the serializable simulation model (`GameState` and friends).
//! - `protocol`: the framed wire format and its typed payloads.
//! - `discovery`: best-effort LAN room advertisement, independent of both.

pub mod discovery;
pub mod game;
pub mod protocol;

pub use game::{
    Action, ActionKind, ActionType, Bomb, Direction, Fire, GameConfig, GameState, Phase, Player,
    Position, Tile,
};
pub use protocol::{Envelope, ProtocolError};
