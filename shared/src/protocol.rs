//! Wire protocol: length-prefixed bincode frames carrying a typed envelope.
//!
//! Every message on the stream is `[4-byte big-endian length][envelope]`,
//! where the envelope is `{ msg_type, payload }` and the payload is the
//! bincode encoding of one of the typed messages below. The envelope is
//! decoded first so a reader can discriminate on `msg_type` before
//! committing to a payload schema.

use crate::game::{ActionType, Direction, GameConfig, GameState};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Hard cap on the size of a single frame body. Larger length headers are
/// a decode failure, not an allocation.
pub const MAX_FRAME_LEN: u32 = 1024 * 1024;

pub mod msg_type {
    pub const JOIN: &str = "join";
    pub const WELCOME: &str = "welcome";
    pub const ACTION: &str = "action";
    pub const STATE: &str = "state";
    pub const ERROR: &str = "error";
    pub const START: &str = "start";
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec: {0}")]
    Codec(#[from] bincode::Error),
    #[error("frame of {0} bytes exceeds the {MAX_FRAME_LEN} byte limit")]
    FrameTooLarge(u32),
}

/// Typed wrapper around an opaque payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub msg_type: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn decode_payload<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        Ok(bincode::deserialize(&self.payload)?)
    }
}

// --- Client -> Server ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMsg {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionMsg {
    pub action_type: ActionType,
    /// Present only for move actions.
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartMsg;

// --- Server -> Client ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomeMsg {
    pub player_id: String,
    pub config: GameConfig,
}

/// Full snapshot broadcast, not a delta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMsg {
    pub state: GameState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub message: String,
}

/// Encodes `payload` into an envelope and writes one frame.
pub async fn write_frame<W, T>(
    writer: &mut W,
    msg_type: &str,
    payload: &T,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(payload)?;
    let body = bincode::serialize(&Envelope {
        msg_type: msg_type.to_string(),
        payload,
    })?;

    if body.len() as u64 > MAX_FRAME_LEN as u64 {
        return Err(ProtocolError::FrameTooLarge(body.len() as u32));
    }

    writer.write_u32(body.len() as u32).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one length-prefixed frame and decodes the envelope.
pub async fn read_frame<R>(reader: &mut R) -> Result<Envelope, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_u32().await?;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len as usize];
    reader.read_exact(&mut body).await?;
    Ok(bincode::deserialize(&body)?)
}
