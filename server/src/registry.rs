//! Registry of connected players and their outbound senders.
//!
//! Each connection runs a dedicated writer task fed through an unbounded
//! channel; the registry maps player IDs to those channel senders and owns
//! all the locking needed to insert, remove, and fan out. Broadcast keeps
//! going when an individual sender has gone away — one dead connection
//! never blocks delivery to the rest.

use log::warn;
use shared::game::GameState;
use shared::protocol::WelcomeMsg;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A frame queued for a connection's writer task.
#[derive(Debug)]
pub enum Outbound {
    Welcome(WelcomeMsg),
    State(GameState),
    Error(String),
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;

#[derive(Default)]
pub struct ClientRegistry {
    senders: Mutex<HashMap<String, OutboundSender>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, player_id: String, sender: OutboundSender) {
        if let Ok(mut senders) = self.senders.lock() {
            senders.insert(player_id, sender);
        }
    }

    /// Drops the sender, which ends the connection's writer task.
    pub fn remove(&self, player_id: &str) {
        if let Ok(mut senders) = self.senders.lock() {
            senders.remove(player_id);
        }
    }

    pub fn len(&self) -> usize {
        self.senders.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Disconnects everyone by dropping every sender.
    pub fn clear(&self) {
        if let Ok(mut senders) = self.senders.lock() {
            senders.clear();
        }
    }

    /// Queues the same snapshot for every registered connection. Failures
    /// are logged per connection and the stale senders dropped afterwards.
    pub fn broadcast_state(&self, state: &GameState) {
        let mut dead = Vec::new();
        {
            let senders = match self.senders.lock() {
                Ok(senders) => senders,
                Err(_) => return,
            };
            for (player_id, sender) in senders.iter() {
                if sender.send(Outbound::State(state.clone())).is_err() {
                    warn!("failed to queue state for {}, dropping sender", player_id);
                    dead.push(player_id.clone());
                }
            }
        }
        for player_id in dead {
            self.remove(&player_id);
        }
    }
}
