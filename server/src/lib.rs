//! Authoritative game server for the bomber arena.
//!
//! The [`engine`] module owns the simulation: a fixed-rate tick loop over a
//! mutex-guarded [`shared::game::GameState`], fed by a bounded intent queue
//! and publishing deep-copy snapshots to a subscriber. [`network`] wraps it
//! in a TCP front end speaking the length-prefixed frame protocol from
//! [`shared::protocol`], with a writer task per connection so broadcasting
//! never blocks on one slow peer.

pub mod board;
pub mod engine;
pub mod network;
pub mod registry;
pub mod rules;
pub mod utils;
