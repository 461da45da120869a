//! Network-backed implementations of the chain engine's neighbor traits
//! (spec.md §9 "Reverse chain callback").
//!
//! [`ChainEngine`](jiffy_chain::ChainEngine) calls these from inside its
//! own `&self` methods, which are synchronous by design (they mirror the
//! original `chain_module`'s direct virtual-method calls) — so the
//! neighbor connections here are plain blocking `std::net::TcpStream`s,
//! each guarded by a `std::sync::Mutex` and dialed lazily on first use,
//! rather than async connections that would force the engine itself to
//! become `async`.
//!
//! `ack`'s upstream hop is implemented as its own connection to the
//! previous replica's chain-response surface rather than the reverse
//! half of the forward connection the DESIGN NOTES sketch as one
//! "portable realization" — simpler to reason about, same observable
//! ordering.

use std::net::TcpStream;
use std::sync::Mutex;

use jiffy_chain::{DestinationClient, LinkError, NextLink, PrevLink};
use jiffy_types::{ArgList, BlockId, ClientId, CommandId, SequenceId};

use crate::wire::blocking::{read_frame, write_frame};
use crate::wire::{
    ChainAckMessage, ChainForwardRequest, ChainForwardResponse, CommandRequest, CommandResponse,
    RunCommandRequest, RunCommandResponse,
};

fn io_err(e: impl std::fmt::Display) -> LinkError {
    LinkError::Unreachable(e.to_string())
}

/// Connects to the next replica's chain-forward surface. `None` models
/// the `"nil"` block-name sentinel (tail has no next link).
pub struct TcpNextLink {
    target: Option<(String, BlockId)>,
    conn: Mutex<Option<TcpStream>>,
}

impl TcpNextLink {
    pub fn new(addr: impl Into<String>, block: BlockId) -> Self {
        Self {
            target: Some((addr.into(), block)),
            conn: Mutex::new(None),
        }
    }

    pub fn nil() -> Self {
        Self { target: None, conn: Mutex::new(None) }
    }

    fn ensure_connected<'a>(
        &self,
        guard: &'a mut Option<TcpStream>,
        addr: &str,
    ) -> Result<&'a mut TcpStream, LinkError> {
        if guard.is_none() {
            *guard = Some(TcpStream::connect(addr).map_err(io_err)?);
        }
        Ok(guard.as_mut().expect("just set"))
    }
}

impl NextLink for TcpNextLink {
    fn chain_request(
        &self,
        seq: SequenceId,
        client: ClientId,
        cmd: CommandId,
        args: &ArgList,
    ) -> Result<(), LinkError> {
        let Some((addr, block)) = &self.target else {
            return Err(LinkError::NotConnected);
        };
        let req = ChainForwardRequest { block: *block, seq, client, cmd, args: args.clone() };
        let mut guard = self.conn.lock().unwrap();
        let stream = self.ensure_connected(&mut guard, addr)?;
        write_frame(stream, &req).map_err(io_err)?;
        match read_frame::<_, ChainForwardResponse>(stream).map_err(io_err)? {
            ChainForwardResponse::Ok => Ok(()),
            ChainForwardResponse::Error(e) => Err(LinkError::Unreachable(e)),
        }
    }

    fn run_command(&self, cmd: CommandId, args: &ArgList) -> Result<ArgList, LinkError> {
        let Some((addr, block)) = &self.target else {
            return Err(LinkError::NotConnected);
        };
        let req = RunCommandRequest { block: *block, cmd, args: args.clone() };
        let mut guard = self.conn.lock().unwrap();
        let stream = self.ensure_connected(&mut guard, addr)?;
        write_frame(stream, &req).map_err(io_err)?;
        match read_frame::<_, RunCommandResponse>(stream).map_err(io_err)? {
            RunCommandResponse::Response(r) => Ok(r),
            RunCommandResponse::Error(e) => Err(LinkError::Unreachable(e)),
        }
    }

    fn is_connected(&self) -> bool {
        self.target.is_some()
    }
}

/// Connects to the previous replica's chain-response surface to deliver
/// `chain_ack`. Fire-and-forget: a lost ack is recovered by the
/// directory's `resend_pending` (spec.md §5 "Failure recovery"), not by
/// retrying here.
pub struct TcpPrevLink {
    target: Option<(String, BlockId)>,
    conn: Mutex<Option<TcpStream>>,
}

impl TcpPrevLink {
    pub fn new(addr: impl Into<String>, block: BlockId) -> Self {
        Self {
            target: Some((addr.into(), block)),
            conn: Mutex::new(None),
        }
    }

    pub fn nil() -> Self {
        Self { target: None, conn: Mutex::new(None) }
    }
}

impl PrevLink for TcpPrevLink {
    fn ack(&self, seq: SequenceId) -> Result<(), LinkError> {
        let Some((addr, block)) = &self.target else {
            return Err(LinkError::NotConnected);
        };
        let mut guard = self.conn.lock().unwrap();
        if guard.is_none() {
            *guard = Some(TcpStream::connect(addr).map_err(io_err)?);
        }
        let stream = guard.as_mut().expect("just set");
        write_frame(stream, &ChainAckMessage { block: *block, seq }).map_err(io_err)
    }

    fn is_connected(&self) -> bool {
        self.target.is_some()
    }
}

/// Connects to an arbitrary chain's head command surface, used by
/// [`jiffy_chain::scaling::ScaleCoordinator`] to push drained keys and
/// drive `update_partition` on the destination during a split/merge
/// (spec.md §4.4).
pub struct TcpDestinationClient {
    addr: String,
    block: BlockId,
    conn: Mutex<Option<TcpStream>>,
}

impl TcpDestinationClient {
    pub fn new(addr: impl Into<String>, block: BlockId) -> Self {
        Self { addr: addr.into(), block, conn: Mutex::new(None) }
    }

    fn call(&self, req: &CommandRequest) -> Result<CommandResponse, LinkError> {
        let mut guard = self.conn.lock().unwrap();
        if guard.is_none() {
            *guard = Some(TcpStream::connect(&self.addr).map_err(io_err)?);
        }
        let stream = guard.as_mut().expect("just set");
        write_frame(stream, req).map_err(io_err)?;
        read_frame(stream).map_err(io_err)
    }
}

impl DestinationClient for TcpDestinationClient {
    fn scale_put(&self, key: &[u8], value: &[u8]) -> Result<(), LinkError> {
        let req = CommandRequest::Command {
            client_seq: 0,
            block: self.block,
            cmd: jiffy_kernel::SCALE_PUT,
            args: vec![bytes::Bytes::copy_from_slice(key), bytes::Bytes::copy_from_slice(value)],
        };
        match self.call(&req)? {
            CommandResponse::Error(e) => Err(LinkError::Unreachable(e)),
            _ => Ok(()),
        }
    }

    fn update_partition(&self, new_name: &str, new_metadata: &str) -> Result<(), LinkError> {
        let req = CommandRequest::Command {
            client_seq: 0,
            block: self.block,
            cmd: jiffy_kernel::UPDATE_PARTITION,
            args: vec![
                bytes::Bytes::copy_from_slice(new_name.as_bytes()),
                bytes::Bytes::copy_from_slice(new_metadata.as_bytes()),
            ],
        };
        match self.call(&req)? {
            CommandResponse::Error(e) => Err(LinkError::Unreachable(e)),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::net::TcpListener as StdListener;
    use std::thread;

    #[test]
    fn next_link_chain_request_round_trips_over_loopback() {
        let listener = StdListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let req: ChainForwardRequest = read_frame(&mut stream).unwrap();
            assert_eq!(req.block, BlockId::new(3));
            write_frame(&mut stream, &ChainForwardResponse::Ok).unwrap();
        });

        let link = TcpNextLink::new(addr, BlockId::new(3));
        link.chain_request(
            SequenceId::from_client(1).stamped(1),
            ClientId::new(9),
            CommandId::new(1),
            &vec![Bytes::from_static(b"k")],
        )
        .unwrap();

        server.join().unwrap();
    }

    #[test]
    fn prev_link_ack_is_fire_and_forget() {
        let listener = StdListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let msg: ChainAckMessage = read_frame(&mut stream).unwrap();
            assert_eq!(msg.seq.server_seq, 42);
        });

        let link = TcpPrevLink::new(addr, BlockId::new(0));
        link.ack(SequenceId::from_client(1).stamped(42)).unwrap();

        server.join().unwrap();
    }

    #[test]
    fn nil_links_are_not_connected() {
        assert!(!TcpNextLink::nil().is_connected());
        assert!(!TcpPrevLink::nil().is_connected());
    }
}
