//! Wire messages and length-prefixed `bincode` framing for the four RPC
//! surfaces (spec.md §6 "Command RPC" / "Chain RPC" / management RPC).
//!
//! Framing: a `u32` big-endian length prefix followed by a `bincode`
//! payload, the same "custom binary wire protocol, not JSON-over-HTTP"
//! shape the teacher's workspace carries (`bincode` sits in the
//! workspace dependency table already).

use bytes::Bytes;
use jiffy_chain::ChainRole;
use jiffy_types::{ArgList, BlockId, ClientId, CommandId, SequenceId};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Requests on the command surface (spec.md §6 "Command RPC").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandRequest {
    GetClientId,
    RegisterClientId { block: BlockId, client: ClientId },
    Command {
        client_seq: i64,
        block: BlockId,
        cmd: CommandId,
        args: ArgList,
    },
}

/// Responses on the command surface. `Pushed` is the server-initiated
/// callback delivery for responses that complete asynchronously at the
/// tail (spec.md §6 "Responses stream back on a server-initiated
/// callback channel").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandResponse {
    ClientId(ClientId),
    Registered,
    Accepted,
    Immediate(ArgList),
    Pushed { client: ClientId, response: ArgList },
    Error(String),
}

/// Chain-forward surface (spec.md §6 "Chain RPC", next direction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainForwardRequest {
    pub block: BlockId,
    pub seq: SequenceId,
    pub client: ClientId,
    pub cmd: CommandId,
    pub args: ArgList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChainForwardResponse {
    Ok,
    Error(String),
}

/// A non-stamped proxy call, used for `forward_all` and accessor
/// forwarding (spec.md §4.2 "run_command").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCommandRequest {
    pub block: BlockId,
    pub cmd: CommandId,
    pub args: ArgList,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunCommandResponse {
    Response(ArgList),
    Error(String),
}

/// Chain-response surface (spec.md §6 "Chain RPC", previous direction).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainAckMessage {
    pub block: BlockId,
    pub seq: SequenceId,
}

/// Wire-safe mirror of [`jiffy_chain::ChainRole`] (that type isn't
/// `Serialize`/`Deserialize` — it never needs to be except at this
/// boundary).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WireRole {
    Singleton,
    Head,
    Mid,
    Tail,
}

impl From<WireRole> for ChainRole {
    fn from(role: WireRole) -> Self {
        match role {
            WireRole::Singleton => ChainRole::Singleton,
            WireRole::Head => ChainRole::Head,
            WireRole::Mid => ChainRole::Mid,
            WireRole::Tail => ChainRole::Tail,
        }
    }
}

impl From<ChainRole> for WireRole {
    fn from(role: ChainRole) -> Self {
        match role {
            ChainRole::Singleton => WireRole::Singleton,
            ChainRole::Head => WireRole::Head,
            ChainRole::Mid => WireRole::Mid,
            ChainRole::Tail => WireRole::Tail,
        }
    }
}

/// Management surface (spec.md §6 "Management RPC").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ManagementRequest {
    SetupBlock {
        block: BlockId,
        partition_type: String,
        partition_name: String,
        partition_metadata: String,
        chain: Vec<String>,
        role: WireRole,
        next_block_name: Option<String>,
    },
    Path { block: BlockId },
    Load { block: BlockId, backing_path: String },
    Sync { block: BlockId, backing_path: String },
    Dump { block: BlockId, backing_path: String },
    Reset { block: BlockId },
    StorageCapacity { block: BlockId },
    StorageSize { block: BlockId },
    ResendPending { block: BlockId },
    ForwardAll { block: BlockId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ManagementResponse {
    Ok,
    Path(String),
    Size(usize),
    Synced(bool),
    Error(String),
}

pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> std::io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    let payload = bincode::serialize(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "frame too large"))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(&payload).await?;
    writer.flush().await
}

pub async fn read_frame<R, T>(reader: &mut R) -> std::io::Result<T>
where
    R: tokio::io::AsyncRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "frame exceeds max size",
        ));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    bincode::deserialize(&payload).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Blocking mirror of [`write_frame`]/[`read_frame`], used by the
/// synchronous [`crate::network_link`] implementations that back
/// [`jiffy_chain::NextLink`]/[`jiffy_chain::PrevLink`] — those traits
/// are called from inside the chain engine's own `&self` methods, which
/// are not `async`.
pub mod blocking {
    use super::MAX_FRAME_BYTES;
    use serde::{Deserialize, Serialize};
    use std::io::{Read, Write};

    pub fn write_frame<W: Write, T: Serialize>(writer: &mut W, value: &T) -> std::io::Result<()> {
        let payload = bincode::serialize(value)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "frame too large"))?;
        writer.write_all(&len.to_be_bytes())?;
        writer.write_all(&payload)?;
        writer.flush()
    }

    pub fn read_frame<R: Read, T: for<'de> Deserialize<'de>>(reader: &mut R) -> std::io::Result<T> {
        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf);
        if len > MAX_FRAME_BYTES {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "frame exceeds max size",
            ));
        }
        let mut payload = vec![0u8; len as usize];
        reader.read_exact(&mut payload)?;
        bincode::deserialize(&payload)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}
