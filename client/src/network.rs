//! Client side of the game connection: join handshake, a background task
//! that decodes server frames, and a watch slot that always holds the
//! latest snapshot. Callers render from the slot; an older snapshot is
//! silently replaced by a newer one rather than queued behind it.

use log::{info, warn};
use shared::game::{ActionType, Direction, GameConfig, GameState};
use shared::protocol::{
    msg_type, read_frame, write_frame, ActionMsg, ErrorMsg, JoinMsg, ProtocolError, StartMsg,
    StateMsg, WelcomeMsg,
};
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("timed out connecting to server")]
    ConnectTimeout,
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("server rejected join: {0}")]
    Rejected(String),
    #[error("unexpected reply of type {0:?} during handshake")]
    UnexpectedReply(String),
}

pub struct Client {
    writer: Mutex<OwnedWriteHalf>,
    player_id: String,
    config: GameConfig,
    state_rx: watch::Receiver<Option<GameState>>,
    shutdown_tx: watch::Sender<bool>,
}

impl Client {
    /// Dials the server, joins under `name`, and spawns the receive loop.
    /// The handshake reply decides the outcome: a welcome yields a client,
    /// an error frame carries the server's rejection reason.
    pub async fn connect(addr: &str, name: &str) -> Result<Self, ClientError> {
        let stream = timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::ConnectTimeout)??;
        let (mut reader, mut writer) = stream.into_split();

        write_frame(
            &mut writer,
            msg_type::JOIN,
            &JoinMsg {
                name: name.to_string(),
            },
        )
        .await?;

        let reply = read_frame(&mut reader).await?;
        let welcome: WelcomeMsg = match reply.msg_type.as_str() {
            msg_type::WELCOME => reply.decode_payload()?,
            msg_type::ERROR => {
                let err: ErrorMsg = reply.decode_payload()?;
                return Err(ClientError::Rejected(err.message));
            }
            _ => return Err(ClientError::UnexpectedReply(reply.msg_type)),
        };
        info!("joined as {} ({})", name, welcome.player_id);

        let (state_tx, state_rx) = watch::channel(None);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(receive_loop(reader, state_tx, shutdown_rx));

        Ok(Self {
            writer: Mutex::new(writer),
            player_id: welcome.player_id,
            config: welcome.config,
            state_rx,
            shutdown_tx,
        })
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Watch handle over incoming snapshots; `None` until the first one
    /// arrives.
    pub fn state_receiver(&self) -> watch::Receiver<Option<GameState>> {
        self.state_rx.clone()
    }

    pub fn latest_state(&self) -> Option<GameState> {
        self.state_rx.borrow().clone()
    }

    pub async fn send_action(
        &self,
        action_type: ActionType,
        direction: Option<Direction>,
    ) -> Result<(), ClientError> {
        let mut writer = self.writer.lock().await;
        write_frame(
            &mut *writer,
            msg_type::ACTION,
            &ActionMsg {
                action_type,
                direction,
            },
        )
        .await?;
        Ok(())
    }

    pub async fn send_start(&self) -> Result<(), ClientError> {
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, msg_type::START, &StartMsg).await?;
        Ok(())
    }

    /// Stops the receive loop and closes the write half. Idempotent.
    pub async fn close(&self) {
        let _ = self.shutdown_tx.send(true);
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
    }
}

/// Decodes server frames until the connection drops or `close` is called.
/// State frames replace the watch slot; error frames are surfaced in the
/// log but do not end the session.
async fn receive_loop(
    mut reader: OwnedReadHalf,
    state_tx: watch::Sender<Option<GameState>>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            result = read_frame(&mut reader) => {
                let envelope = match result {
                    Ok(env) => env,
                    Err(e) => {
                        info!("connection closed: {}", e);
                        return;
                    }
                };
                match envelope.msg_type.as_str() {
                    msg_type::STATE => match envelope.decode_payload::<StateMsg>() {
                        Ok(msg) => {
                            let _ = state_tx.send(Some(msg.state));
                        }
                        Err(e) => warn!("dropping malformed state frame: {}", e),
                    },
                    msg_type::ERROR => match envelope.decode_payload::<ErrorMsg>() {
                        Ok(err) => warn!("server: {}", err.message),
                        Err(e) => warn!("dropping malformed error frame: {}", e),
                    },
                    other => warn!("ignoring unexpected message type {:?}", other),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::protocol::Envelope;
    use tokio::net::TcpListener;

    async fn accept_and_handshake(listener: TcpListener) -> TcpStream {
        let (mut stream, _) = listener.accept().await.unwrap();
        let join = read_frame(&mut stream).await.unwrap();
        assert_eq!(join.msg_type, msg_type::JOIN);
        write_frame(
            &mut stream,
            msg_type::WELCOME,
            &WelcomeMsg {
                player_id: "p1".to_string(),
                config: GameConfig::default(),
            },
        )
        .await
        .unwrap();
        stream
    }

    #[tokio::test]
    async fn handshake_and_state_delivery() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut stream = accept_and_handshake(listener).await;
            let state = GameState {
                board: Vec::new(),
                players: std::collections::HashMap::new(),
                bombs: Vec::new(),
                fires: Vec::new(),
                width: 15,
                height: 13,
                phase: shared::game::Phase::Lobby,
                winner: None,
            };
            write_frame(&mut stream, msg_type::STATE, &StateMsg { state })
                .await
                .unwrap();
            stream
        });

        let client = Client::connect(&addr.to_string(), "Alice").await.unwrap();
        assert_eq!(client.player_id(), "p1");
        assert_eq!(client.config(), &GameConfig::default());

        let mut rx = client.state_receiver();
        rx.changed().await.unwrap();
        let state = rx.borrow().clone().unwrap();
        assert_eq!(state.width, 15);

        client.close().await;
        let _ = server.await.unwrap();
    }

    #[tokio::test]
    async fn rejection_surfaces_the_server_reason() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_frame(&mut stream).await.unwrap();
            write_frame(
                &mut stream,
                msg_type::ERROR,
                &ErrorMsg {
                    message: "game is full (4/4 players)".to_string(),
                },
            )
            .await
            .unwrap();
        });

        match Client::connect(&addr.to_string(), "Late").await {
            Err(ClientError::Rejected(reason)) => {
                assert_eq!(reason, "game is full (4/4 players)")
            }
            other => panic!("expected rejection, got {:?}", other.map(|c| c.player_id)),
        }
    }

    #[tokio::test]
    async fn unexpected_handshake_reply_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_frame(&mut stream).await.unwrap();
            write_frame(&mut stream, msg_type::START, &StartMsg)
                .await
                .unwrap();
        });

        assert!(matches!(
            Client::connect(&addr.to_string(), "Alice").await,
            Err(ClientError::UnexpectedReply(t)) if t == msg_type::START
        ));
    }

    #[tokio::test]
    async fn actions_reach_the_wire() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut stream = accept_and_handshake(listener).await;
            let mut frames: Vec<Envelope> = Vec::new();
            for _ in 0..2 {
                frames.push(read_frame(&mut stream).await.unwrap());
            }
            frames
        });

        let client = Client::connect(&addr.to_string(), "Alice").await.unwrap();
        client
            .send_action(ActionType::Move, Some(Direction::Up))
            .await
            .unwrap();
        client.send_start().await.unwrap();

        let frames = server.await.unwrap();
        assert_eq!(frames[0].msg_type, msg_type::ACTION);
        let action: ActionMsg = frames[0].decode_payload().unwrap();
        assert_eq!(action.direction, Some(Direction::Up));
        assert_eq!(frames[1].msg_type, msg_type::START);
        client.close().await;
    }
}
