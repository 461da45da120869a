//! End-to-end smoke test: a client talks to a live [`StorageServer`] over
//! real TCP sockets, round-tripping a `put`/`get` through the command
//! surface exactly as a remote client would (spec.md §8 scenario 1,
//! "single-node put then get returns the same value").
//!
//! The client side here hand-rolls the wire framing rather than reaching
//! into `jiffy_server`'s internals, the same way any out-of-process
//! client has to.

use std::sync::Arc;

use jiffy::{
    default_partition_registry, BlockSlotTable, ChainRole, ClientRegistry, CommandRequest,
    CommandResponse, Handler, NullSink, StorageServer,
};
use jiffy_kernel::{GET, PUT};
use jiffy_types::BlockId;
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn write_frame<T: Serialize>(stream: &mut TcpStream, value: &T) {
    let payload = bincode::serialize(value).unwrap();
    stream.write_all(&(payload.len() as u32).to_be_bytes()).await.unwrap();
    stream.write_all(&payload).await.unwrap();
    stream.flush().await.unwrap();
}

async fn read_frame<T: DeserializeOwned>(stream: &mut TcpStream) -> T {
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf).await.unwrap();
    let len = u32::from_be_bytes(len_buf) as usize;
    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await.unwrap();
    bincode::deserialize(&payload).unwrap()
}

async fn free_ports(n: usize) -> Vec<u16> {
    let mut ports = Vec::with_capacity(n);
    for _ in 0..n {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        ports.push(listener.local_addr().unwrap().port());
    }
    ports
}

#[tokio::test]
async fn put_then_get_round_trips_through_the_command_surface() {
    let ports = free_ports(4).await;
    let mut config = jiffy_config::JiffyConfig::default();
    config.server.bind_host = "127.0.0.1".to_string();
    config.server.service_port = ports[0];
    config.server.mgmt_port = ports[1];
    config.server.notif_port = ports[2];
    config.server.chain_port = ports[3];
    config.server.block_slots = 4;

    let registry = default_partition_registry();
    let blocks = Arc::new(BlockSlotTable::new(config.server.block_slots, registry));
    blocks
        .setup_block(BlockId::new(0), "hashtable", "0_65536", "regular", vec![], ChainRole::Singleton)
        .unwrap();

    let self_addr = (
        config.server.bind_host.clone(),
        config.server.service_port,
        config.server.mgmt_port,
        config.server.notif_port,
        config.server.chain_port,
    );
    let handler = Arc::new(Handler::new(blocks, Arc::new(ClientRegistry::new()), Arc::new(NullSink), self_addr));
    let server = StorageServer::new(config.server.clone(), handler);
    tokio::spawn(server.run());

    // Give the listeners a moment to bind.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let mut stream = TcpStream::connect(("127.0.0.1", config.server.service_port)).await.unwrap();

    write_frame(&mut stream, &CommandRequest::GetClientId).await;
    let client = match read_frame::<CommandResponse>(&mut stream).await {
        CommandResponse::ClientId(id) => id,
        other => panic!("expected ClientId, got {other:?}"),
    };

    write_frame(
        &mut stream,
        &CommandRequest::Command {
            client_seq: 1,
            block: BlockId::new(0),
            cmd: PUT,
            args: vec![bytes::Bytes::from_static(b"k"), bytes::Bytes::from_static(b"v")],
        },
    )
    .await;
    match read_frame::<CommandResponse>(&mut stream).await {
        CommandResponse::Immediate(_) => {}
        other => panic!("expected Immediate response to put, got {other:?}"),
    }

    write_frame(
        &mut stream,
        &CommandRequest::Command {
            client_seq: 2,
            block: BlockId::new(0),
            cmd: GET,
            args: vec![bytes::Bytes::from_static(b"k")],
        },
    )
    .await;
    match read_frame::<CommandResponse>(&mut stream).await {
        CommandResponse::Immediate(args) => assert_eq!(&args[0][..], b"v"),
        other => panic!("expected Immediate response to get, got {other:?}"),
    }

    let _ = client;
}
