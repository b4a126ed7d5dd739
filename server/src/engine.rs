//! The authoritative game engine: owns the live `GameState`, drains the
//! intent queue each tick, runs the simulation rules, and publishes
//! deep-copy snapshots.
//!
//! Concurrency contract: `state` is guarded by one exclusive lock held only
//! across the pure computation of a tick (or an accessor call). The tick
//! clones the state while locked, releases the lock, and only then invokes
//! the subscriber — so the subscriber may freely re-enter the engine's
//! public surface without deadlocking. `enqueue_action` touches only the
//! queue and never blocks.

use crate::board;
use crate::rules;
use crate::utils::now_millis;
use log::debug;
use shared::game::{
    spawn_positions, Action, GameConfig, GameState, Phase, Player, DEFAULT_BOMB_CAPACITY,
    DEFAULT_BOMB_RANGE,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::{interval, MissedTickBehavior};

/// Queued intents beyond this are dropped rather than blocking submitters.
const ACTION_QUEUE_DEPTH: usize = 256;

/// Subscriber invoked after every tick with an owned snapshot.
pub type TickHandler = Box<dyn Fn(GameState) + Send + Sync + 'static>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("game is full ({current}/{max} players)")]
    GameFull { current: usize, max: usize },
    #[error("game already in progress")]
    AlreadyRunning,
    #[error("player {0} already registered")]
    DuplicateId(String),
    #[error("need at least one player to start")]
    NoPlayers,
}

pub struct Engine {
    config: GameConfig,
    state: Mutex<GameState>,
    actions_tx: mpsc::Sender<Action>,
    actions_rx: Mutex<mpsc::Receiver<Action>>,
    on_tick: OnceLock<TickHandler>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Engine {
    /// Builds an engine with a freshly generated board. Even board
    /// dimensions are normalized up to odd.
    pub fn new(config: GameConfig) -> Self {
        let config = config.normalized();
        let state = GameState {
            board: board::generate(&config),
            players: HashMap::new(),
            bombs: Vec::new(),
            fires: Vec::new(),
            width: config.width,
            height: config.height,
            phase: Phase::Lobby,
            winner: None,
        };

        let (actions_tx, actions_rx) = mpsc::channel(ACTION_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            config,
            state: Mutex::new(state),
            actions_tx,
            actions_rx: Mutex::new(actions_rx),
            on_tick: OnceLock::new(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Registers the snapshot subscriber. Only one handler is supported;
    /// later registrations are ignored. Call before `run`.
    pub fn on_tick(&self, handler: TickHandler) {
        let _ = self.on_tick.set(handler);
    }

    /// Registers a player and assigns the next spawn corner (corners cycle
    /// past four players) with the default loadout.
    pub async fn add_player(&self, id: &str, name: &str) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;

        if state.phase != Phase::Lobby {
            return Err(EngineError::AlreadyRunning);
        }
        if state.players.len() >= self.config.max_players {
            return Err(EngineError::GameFull {
                current: state.players.len(),
                max: self.config.max_players,
            });
        }
        if state.players.contains_key(id) {
            return Err(EngineError::DuplicateId(id.to_string()));
        }

        let spawns = spawn_positions(self.config.width, self.config.height);
        let idx = state.players.len() % spawns.len();
        state.players.insert(
            id.to_string(),
            Player {
                id: id.to_string(),
                name: name.to_string(),
                pos: spawns[idx],
                alive: true,
                bomb_max: DEFAULT_BOMB_CAPACITY,
                bomb_range: DEFAULT_BOMB_RANGE,
                bombs_used: 0,
                color: idx,
            },
        );
        Ok(())
    }

    /// Unconditional removal; a no-op for unknown IDs. Safe at any phase.
    pub async fn remove_player(&self, id: &str) {
        let mut state = self.state.lock().await;
        state.players.remove(id);
    }

    /// Queues an intent for the next tick. Never blocks; when the queue is
    /// saturated the intent is dropped in favor of future input.
    pub fn enqueue_action(&self, action: Action) {
        if self.actions_tx.try_send(action).is_err() {
            debug!("action queue full, dropping intent");
        }
    }

    /// Lobby -> Running. Fails when no players are registered or the game
    /// already left the lobby.
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        match state.phase {
            Phase::Lobby if state.players.is_empty() => Err(EngineError::NoPlayers),
            Phase::Lobby => {
                state.phase = Phase::Running;
                Ok(())
            }
            _ => Err(EngineError::AlreadyRunning),
        }
    }

    /// Deep copy of the current state; callable from any task at any time.
    pub async fn snapshot(&self) -> GameState {
        self.state.lock().await.clone()
    }

    /// Drives ticks at the configured rate until `stop()` is called.
    pub async fn run(&self) {
        let mut ticker = interval(Duration::from_secs_f64(1.0 / self.config.tick_rate as f64));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    /// Halts the tick loop. Idempotent.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// One simulation step: apply queued intents in arrival order, resolve
    /// bombs and fires, evaluate the win condition, then publish a snapshot
    /// with the lock released.
    pub(crate) async fn tick(&self) {
        let snapshot = {
            let mut actions = self.actions_rx.lock().await;
            let mut state = self.state.lock().await;

            if state.phase == Phase::Running {
                let now = now_millis();
                while let Ok(action) = actions.try_recv() {
                    rules::apply_action(&mut state, &action, self.config.bomb_fuse_ms, now);
                }
                rules::resolve_bombs(&mut state, self.config.fire_duration_ms, now);
                rules::clear_expired_fires(&mut state, now);
                rules::check_win(&mut state);
            }

            state.clone()
        };

        // Lock released; the handler may re-enter the engine.
        if let Some(handler) = self.on_tick.get() {
            handler(snapshot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::game::{ActionKind, Direction, Position};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn bare_config() -> GameConfig {
        GameConfig {
            soft_wall_density: 0.0,
            ..GameConfig::default()
        }
    }

    #[tokio::test]
    async fn players_join_at_cycling_spawn_corners() {
        let engine = Engine::new(bare_config());
        for (i, id) in ["p1", "p2", "p3", "p4"].iter().enumerate() {
            engine.add_player(id, "name").await.unwrap();
            let state = engine.snapshot().await;
            assert_eq!(state.players[*id].color, i);
        }

        let state = engine.snapshot().await;
        let spawns = spawn_positions(state.width, state.height);
        assert_eq!(state.players["p1"].pos, spawns[0]);
        assert_eq!(state.players["p4"].pos, spawns[3]);
    }

    #[tokio::test]
    async fn join_rejections() {
        let config = GameConfig {
            max_players: 2,
            ..bare_config()
        };
        let engine = Engine::new(config);

        engine.add_player("p1", "Alice").await.unwrap();
        assert_eq!(
            engine.add_player("p1", "Alice again").await,
            Err(EngineError::DuplicateId("p1".to_string()))
        );

        engine.add_player("p2", "Bob").await.unwrap();
        assert_eq!(
            engine.add_player("p3", "Carol").await,
            Err(EngineError::GameFull { current: 2, max: 2 })
        );

        engine.start().await.unwrap();
        engine.remove_player("p2").await;
        assert_eq!(
            engine.add_player("p3", "Carol").await,
            Err(EngineError::AlreadyRunning)
        );
    }

    #[tokio::test]
    async fn start_requires_lobby_with_players() {
        let engine = Engine::new(bare_config());
        assert_eq!(engine.start().await, Err(EngineError::NoPlayers));

        engine.add_player("p1", "Alice").await.unwrap();
        engine.start().await.unwrap();
        assert_eq!(engine.snapshot().await.phase, Phase::Running);
        assert_eq!(engine.start().await, Err(EngineError::AlreadyRunning));
    }

    #[tokio::test]
    async fn tick_applies_intents_in_fifo_order() {
        let engine = Engine::new(bare_config());
        engine.add_player("p1", "Alice").await.unwrap();
        engine.start().await.unwrap();

        for dir in [
            Direction::Right,
            Direction::Right,
            Direction::Down,
            Direction::Down,
        ] {
            engine.enqueue_action(Action {
                player_id: "p1".to_string(),
                kind: ActionKind::Move(dir),
            });
        }
        engine.tick().await;

        // (1,1) -> (2,1) -> (3,1) -> (3,2) -> (3,3)
        let state = engine.snapshot().await;
        assert_eq!(state.players["p1"].pos, Position::new(3, 3));
    }

    #[tokio::test]
    async fn intents_are_ignored_in_lobby() {
        let engine = Engine::new(bare_config());
        engine.add_player("p1", "Alice").await.unwrap();
        engine.enqueue_action(Action {
            player_id: "p1".to_string(),
            kind: ActionKind::Move(Direction::Right),
        });

        engine.tick().await;
        let state = engine.snapshot().await;
        assert_eq!(state.players["p1"].pos, Position::new(1, 1));
        assert_eq!(state.phase, Phase::Lobby);
    }

    #[tokio::test]
    async fn snapshots_publish_every_tick_and_reenter_safely() {
        let engine = Arc::new(Engine::new(bare_config()));
        let published = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&published);
        engine.on_tick(Box::new(move |state| {
            assert_eq!(state.phase, Phase::Lobby);
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        engine.tick().await;
        engine.tick().await;
        assert_eq!(published.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn queue_overflow_drops_newest_without_blocking() {
        let engine = Engine::new(bare_config());
        engine.add_player("p1", "Alice").await.unwrap();

        for _ in 0..(ACTION_QUEUE_DEPTH + 50) {
            engine.enqueue_action(Action {
                player_id: "p1".to_string(),
                kind: ActionKind::PlaceBomb,
            });
        }
        // Reaching this point at all proves enqueue never blocked.
        engine.start().await.unwrap();
        engine.tick().await;
        let state = engine.snapshot().await;
        assert_eq!(state.bombs.len(), 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let engine = Arc::new(Engine::new(bare_config()));
        let runner = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run().await })
        };
        engine.stop();
        engine.stop();
        runner.await.unwrap();
    }
}
