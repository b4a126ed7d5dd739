//! TCP connection layer: accepts clients, runs the join handshake, bridges
//! decoded intents into the engine, and fans engine snapshots back out.
//!
//! Each accepted connection gets two tasks: a reader that decodes frames
//! and feeds the engine, and a writer that drains an outbound channel onto
//! the socket. The engine's tick callback only queues onto those channels,
//! so a slow connection never stalls the simulation or its peers.

use crate::engine::Engine;
use crate::registry::{ClientRegistry, Outbound};
use crate::utils::next_player_id;
use log::{error, info, warn};
use shared::discovery::Broadcaster;
use shared::game::{Action, ActionKind, ActionType, GameConfig};
use shared::protocol::{
    msg_type, read_frame, write_frame, ActionMsg, ErrorMsg, JoinMsg, StateMsg, WelcomeMsg,
};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};

pub struct GameServer {
    engine: Arc<Engine>,
    registry: Arc<ClientRegistry>,
    broadcaster: OnceLock<Arc<Broadcaster>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GameServer {
    pub fn new(config: GameConfig) -> Self {
        let engine = Arc::new(Engine::new(config));
        let registry = Arc::new(ClientRegistry::new());

        // Engine publishes each tick's snapshot to every connected sender.
        // The engine lock is already released when this runs.
        let fanout = Arc::clone(&registry);
        engine.on_tick(Box::new(move |state| fanout.broadcast_state(&state)));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            engine,
            registry,
            broadcaster: OnceLock::new(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Attaches the discovery broadcaster that should receive player-count
    /// updates. Call before `start`.
    pub fn attach_broadcaster(&self, broadcaster: Arc<Broadcaster>) {
        let _ = self.broadcaster.set(broadcaster);
    }

    /// Binds the listener, launches the engine tick loop and the accept
    /// loop, and returns the bound address.
    pub async fn start(&self, addr: &str) -> std::io::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("listening on {}", local_addr);

        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move { engine.run().await });

        let engine = Arc::clone(&self.engine);
        let registry = Arc::clone(&self.registry);
        let broadcaster = self.broadcaster.get().cloned();
        let mut shutdown = self.shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                let engine = Arc::clone(&engine);
                                let registry = Arc::clone(&registry);
                                let broadcaster = broadcaster.clone();
                                let shutdown = shutdown.clone();
                                tokio::spawn(async move {
                                    handle_connection(
                                        engine, registry, broadcaster, stream, peer, shutdown,
                                    )
                                    .await;
                                });
                            }
                            Err(e) => error!("accept error: {}", e),
                        }
                    }
                }
            }
        });

        Ok(local_addr)
    }

    /// Halts the tick loop, closes the listener, and drops every connected
    /// sender. Idempotent.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        self.engine.stop();
        self.registry.clear();
    }
}

async fn handle_connection(
    engine: Arc<Engine>,
    registry: Arc<ClientRegistry>,
    broadcaster: Option<Arc<Broadcaster>>,
    stream: TcpStream,
    peer: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) {
    let (mut reader, mut writer) = stream.into_split();

    // The first frame must be a join.
    let envelope = match read_frame(&mut reader).await {
        Ok(env) => env,
        Err(e) => {
            warn!("failed to read join from {}: {}", peer, e);
            return;
        }
    };
    if envelope.msg_type != msg_type::JOIN {
        warn!("{} sent {:?} before joining", peer, envelope.msg_type);
        send_error(&mut writer, "expected join message").await;
        return;
    }
    let join: JoinMsg = match envelope.decode_payload() {
        Ok(join) => join,
        Err(e) => {
            warn!("malformed join from {}: {}", peer, e);
            return;
        }
    };

    let player_id = next_player_id();
    if let Err(e) = engine.add_player(&player_id, &join.name).await {
        info!("rejected join from {} ({}): {}", peer, join.name, e);
        send_error(&mut writer, &e.to_string()).await;
        return;
    }

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let writer_task = tokio::spawn(write_loop(writer, outbound_rx, player_id.clone()));

    registry.insert(player_id.clone(), outbound_tx.clone());
    if let Some(b) = &broadcaster {
        b.update_player_count(registry.len());
    }
    info!("player joined: {} ({}) from {}", join.name, player_id, peer);

    let _ = outbound_tx.send(Outbound::Welcome(WelcomeMsg {
        player_id: player_id.clone(),
        config: engine.config().clone(),
    }));
    let _ = outbound_tx.send(Outbound::State(engine.snapshot().await));

    read_loop(&engine, &mut reader, &outbound_tx, &player_id, &mut shutdown).await;

    registry.remove(&player_id);
    engine.remove_player(&player_id).await;
    if let Some(b) = &broadcaster {
        b.update_player_count(registry.len());
    }
    drop(outbound_tx);
    let _ = writer_task.await;
    info!("player removed: {}", player_id);
}

/// Decodes frames from one connection until it closes, fails, or the
/// server shuts down.
async fn read_loop(
    engine: &Engine,
    reader: &mut OwnedReadHalf,
    outbound_tx: &mpsc::UnboundedSender<Outbound>,
    player_id: &str,
    shutdown: &mut watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            result = read_frame(reader) => {
                let envelope = match result {
                    Ok(env) => env,
                    Err(e) => {
                        info!("player {} disconnected: {}", player_id, e);
                        return;
                    }
                };
                match envelope.msg_type.as_str() {
                    msg_type::ACTION => {
                        let msg: ActionMsg = match envelope.decode_payload() {
                            Ok(msg) => msg,
                            Err(e) => {
                                warn!("invalid action payload from {}: {}", player_id, e);
                                continue;
                            }
                        };
                        let kind = match (msg.action_type, msg.direction) {
                            (ActionType::Move, Some(dir)) => ActionKind::Move(dir),
                            (ActionType::Move, None) => {
                                warn!("move without direction from {}", player_id);
                                continue;
                            }
                            (ActionType::PlaceBomb, _) => ActionKind::PlaceBomb,
                        };
                        engine.enqueue_action(Action {
                            player_id: player_id.to_string(),
                            kind,
                        });
                    }
                    msg_type::START => {
                        if let Err(e) = engine.start().await {
                            let _ = outbound_tx.send(Outbound::Error(e.to_string()));
                        }
                    }
                    other => warn!("unknown message type {:?} from {}", other, player_id),
                }
            }
        }
    }
}

/// Drains a connection's outbound queue onto the socket. Ends when the
/// queue closes (deregistration) or a write fails.
async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<Outbound>,
    player_id: String,
) {
    while let Some(outbound) = outbound_rx.recv().await {
        let result = match outbound {
            Outbound::Welcome(welcome) => {
                write_frame(&mut writer, msg_type::WELCOME, &welcome).await
            }
            Outbound::State(state) => {
                write_frame(&mut writer, msg_type::STATE, &StateMsg { state }).await
            }
            Outbound::Error(message) => {
                write_frame(&mut writer, msg_type::ERROR, &ErrorMsg { message }).await
            }
        };
        if let Err(e) = result {
            warn!("send to {} failed: {}", player_id, e);
            return;
        }
    }
}

async fn send_error(writer: &mut OwnedWriteHalf, message: &str) {
    let _ = write_frame(
        writer,
        msg_type::ERROR,
        &ErrorMsg {
            message: message.to_string(),
        },
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::StartMsg;

    fn bare_config() -> GameConfig {
        GameConfig {
            soft_wall_density: 0.0,
            ..GameConfig::default()
        }
    }

    #[tokio::test]
    async fn first_frame_must_be_join() {
        let server = GameServer::new(bare_config());
        let addr = server.start("127.0.0.1:0").await.unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(&mut stream, msg_type::START, &StartMsg)
            .await
            .unwrap();

        let reply = read_frame(&mut stream).await.unwrap();
        assert_eq!(reply.msg_type, msg_type::ERROR);
        server.stop();
    }

    #[tokio::test]
    async fn join_handshake_yields_welcome_then_state() {
        let server = GameServer::new(bare_config());
        let addr = server.start("127.0.0.1:0").await.unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        write_frame(
            &mut stream,
            msg_type::JOIN,
            &JoinMsg {
                name: "Alice".to_string(),
            },
        )
        .await
        .unwrap();

        let welcome = read_frame(&mut stream).await.unwrap();
        assert_eq!(welcome.msg_type, msg_type::WELCOME);
        let welcome: WelcomeMsg = welcome.decode_payload().unwrap();
        assert!(!welcome.player_id.is_empty());
        assert_eq!(welcome.config, bare_config());

        let state = read_frame(&mut stream).await.unwrap();
        assert_eq!(state.msg_type, msg_type::STATE);
        let state: StateMsg = state.decode_payload().unwrap();
        assert_eq!(state.state.players.len(), 1);
        server.stop();
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let server = GameServer::new(bare_config());
        let _ = server.start("127.0.0.1:0").await.unwrap();
        server.stop();
        server.stop();
    }
}
