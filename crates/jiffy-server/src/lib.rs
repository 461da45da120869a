//! # jiffy-server: storage-server process
//!
//! Hosts a fixed pool of block slots (spec.md §2), each wrapping a
//! [`jiffy_chain::ChainEngine`], and exposes the four RPC surfaces over
//! length-prefixed `bincode` frames (spec.md §6): command, chain-forward,
//! chain-ack, and management. Network-facing neighbor links
//! ([`network_link::TcpNextLink`]/[`network_link::TcpPrevLink`]) are
//! blocking, since [`jiffy_chain::ChainEngine`]'s own methods are
//! synchronous by design; the listener tasks bridge into them via
//! `tokio::task::spawn_blocking`.

mod block_slot;
mod client_registry;
mod error;
mod handler;
mod network_link;
mod server;
mod wire;

pub use block_slot::BlockSlotTable;
pub use client_registry::ClientRegistry;
pub use error::{FatalError, ProtocolError, ServerError, ServerResult};
pub use handler::Handler;
pub use network_link::{TcpDestinationClient, TcpNextLink, TcpPrevLink};
pub use server::StorageServer;
pub use wire::{
    ChainAckMessage, ChainForwardRequest, ChainForwardResponse, CommandRequest, CommandResponse,
    ManagementRequest, ManagementResponse, RunCommandRequest, RunCommandResponse, WireRole,
};
