//! The storage-server process (spec.md §2 "Server process").
//!
//! Binds the four RPC surfaces on their configured ports and spawns one
//! task per accepted connection. Each surface's connection loop decodes
//! wire frames, calls into [`Handler`], and writes the matching response
//! frame back — the `ChainEngine` calls underneath are synchronous, so
//! they run inside [`tokio::task::spawn_blocking`] rather than blocking
//! the surface's own task.

use std::sync::Arc;

use jiffy_config::ServerConfig;
use jiffy_types::ClientId;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, instrument, warn};

use crate::handler::Handler;
use crate::wire::{
    self, ChainAckMessage, ChainForwardRequest, ChainForwardResponse, CommandRequest,
    CommandResponse, ManagementRequest, ManagementResponse,
};

/// Owns the four listeners; `run` drives them all until one exits with an
/// error (a bind failure) or the process is killed.
pub struct StorageServer {
    config: ServerConfig,
    handler: Arc<Handler>,
}

impl StorageServer {
    pub fn new(config: ServerConfig, handler: Arc<Handler>) -> Self {
        Self { config, handler }
    }

    pub async fn run(self) -> std::io::Result<()> {
        let host = self.config.bind_host.clone();
        let command = TcpListener::bind((host.as_str(), self.config.service_port)).await?;
        let chain_forward = TcpListener::bind((host.as_str(), self.config.chain_port)).await?;
        let chain_ack = TcpListener::bind((host.as_str(), self.config.notif_port)).await?;
        let management = TcpListener::bind((host.as_str(), self.config.mgmt_port)).await?;

        info!(
            service = self.config.service_port,
            chain = self.config.chain_port,
            ack = self.config.notif_port,
            mgmt = self.config.mgmt_port,
            "storage server listening"
        );

        tokio::try_join!(
            accept_loop(command, self.handler.clone(), serve_command),
            accept_loop(chain_forward, self.handler.clone(), serve_chain_forward),
            accept_loop(chain_ack, self.handler.clone(), serve_chain_ack),
            accept_loop(management, self.handler.clone(), serve_management),
        )?;
        Ok(())
    }
}

async fn accept_loop<F, Fut>(
    listener: TcpListener,
    handler: Arc<Handler>,
    serve: F,
) -> std::io::Result<()>
where
    F: Fn(TcpStream, Arc<Handler>) -> Fut + Copy + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    loop {
        let (stream, peer) = listener.accept().await?;
        let handler = handler.clone();
        tokio::spawn(async move {
            serve(stream, handler).await;
        });
        tracing::trace!(%peer, "accepted connection");
    }
}

/// Command surface: `GetClientId` / `RegisterClientId` / `Command`
/// (spec.md §6 "Command RPC"). One connection serves exactly one client
/// identity, allocated on its first `GetClientId` call; a background task
/// pumps that client's push channel back down this same connection so
/// `CommandResponse::Pushed` frames reach it once the tail answers
/// asynchronously (spec.md §6 "server-initiated callback channel").
#[instrument(skip(stream, handler))]
async fn serve_command(stream: TcpStream, handler: Arc<Handler>) {
    let (mut read_half, write_half) = stream.into_split();
    let write_half = Arc::new(AsyncMutex::new(write_half));
    let mut client_id: Option<ClientId> = None;
    let mut pump: Option<tokio::task::JoinHandle<()>> = None;

    loop {
        let req: CommandRequest = match wire::read_frame(&mut read_half).await {
            Ok(req) => req,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                error!(error = %e, "command surface read failed");
                break;
            }
        };

        let response = match req {
            CommandRequest::GetClientId => {
                let (id, mut rx) = handler.get_client_id();
                client_id = Some(id);
                let writer = write_half.clone();
                pump = Some(tokio::spawn(async move {
                    while let Some(response) = rx.recv().await {
                        let frame = CommandResponse::Pushed { client: id, response };
                        let mut guard = writer.lock().await;
                        if wire::write_frame(&mut *guard, &frame).await.is_err() {
                            break;
                        }
                    }
                }));
                CommandResponse::ClientId(id)
            }
            CommandRequest::RegisterClientId { block, client } => {
                match handler.register_client_id(block, client) {
                    Ok(()) => CommandResponse::Registered,
                    Err(e) => CommandResponse::Error(e.to_string()),
                }
            }
            CommandRequest::Command { client_seq, block, cmd, args } => match client_id {
                None => CommandResponse::Error(
                    "command sent before GetClientId on this connection".to_string(),
                ),
                Some(client) => {
                    let handler = handler.clone();
                    match tokio::task::spawn_blocking(move || {
                        handler.command_request(block, client, client_seq, cmd, args)
                    })
                    .await
                    {
                        Ok(Ok(resp)) => resp,
                        Ok(Err(e)) => CommandResponse::Error(e.to_string()),
                        Err(e) => CommandResponse::Error(e.to_string()),
                    }
                }
            },
        };

        let mut guard = write_half.lock().await;
        if let Err(e) = wire::write_frame(&mut *guard, &response).await {
            error!(error = %e, "command surface write failed");
            break;
        }
        drop(guard);
    }

    if let Some(p) = pump {
        p.abort();
    }
    if let Some(id) = client_id {
        handler.unregister_client(id);
    }
}

/// Chain-forward surface (spec.md §6 "Chain RPC", next direction).
#[instrument(skip(stream, handler))]
async fn serve_chain_forward(mut stream: TcpStream, handler: Arc<Handler>) {
    loop {
        let req: ChainForwardRequest = match wire::read_frame(&mut stream).await {
            Ok(req) => req,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                error!(error = %e, "chain-forward read failed");
                break;
            }
        };
        let handler = handler.clone();
        let response = match tokio::task::spawn_blocking(move || handler.chain_forward(req)).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => ChainForwardResponse::Error(e.to_string()),
            Err(e) => ChainForwardResponse::Error(e.to_string()),
        };
        if let Err(e) = wire::write_frame(&mut stream, &response).await {
            error!(error = %e, "chain-forward write failed");
            break;
        }
    }
}

/// Chain-ack surface (spec.md §6 "Chain RPC", previous direction). Fire
/// and forget: no response frame, matching
/// [`crate::network_link::TcpPrevLink::ack`].
#[instrument(skip(stream, handler))]
async fn serve_chain_ack(mut stream: TcpStream, handler: Arc<Handler>) {
    loop {
        let msg: ChainAckMessage = match wire::read_frame(&mut stream).await {
            Ok(msg) => msg,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                error!(error = %e, "chain-ack read failed");
                break;
            }
        };
        let handler = handler.clone();
        match tokio::task::spawn_blocking(move || handler.chain_ack(msg)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "chain-ack failed"),
            Err(e) => {
                error!(error = %e, "chain-ack task panicked");
                break;
            }
        }
    }
}

/// Management surface (spec.md §6 "Management RPC").
#[instrument(skip(stream, handler))]
async fn serve_management(mut stream: TcpStream, handler: Arc<Handler>) {
    loop {
        let req: ManagementRequest = match wire::read_frame(&mut stream).await {
            Ok(req) => req,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => {
                error!(error = %e, "management read failed");
                break;
            }
        };
        let handler = handler.clone();
        let response: ManagementResponse = tokio::task::spawn_blocking(move || handler.management(req))
            .await
            .unwrap_or_else(|e| ManagementResponse::Error(e.to_string()));
        if let Err(e) = wire::write_frame(&mut stream, &response).await {
            error!(error = %e, "management write failed");
            break;
        }
    }
}
