//! Shared UDP socket helpers (§4.9, §5). Every bound socket in this crate
//! goes through [`bind_reuse`] so multiple deploys/listeners on the same
//! host can share a port the way the spec's commitment and shutdown
//! listeners require.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use workflow_engine_core::channel::BASE_EVENT_PORT;
use workflow_engine_core::error::{Result, WorkflowError};
use workflow_engine_core::facts::RuleFactStore;
use workflow_engine_core::token_xml::write_token_xml;
use workflow_engine_core::types::Token;

use crate::orchestrator::TokenDispatcher;

/// Bind a UDP socket with `SO_REUSEADDR` set (§4.9's dedicated-listener
/// requirement: several binaries on one host may each want the same
/// confirm/shutdown port across restarts without waiting out TIME_WAIT).
pub fn bind_reuse(port: u32) -> Result<UdpSocket> {
    let addr: SocketAddr = format!("0.0.0.0:{port}").parse().expect("well-formed loopback addr");
    let socket = socket2::Socket::new(socket2::Domain::IPV4, socket2::Type::DGRAM, None)
        .map_err(WorkflowError::Io)?;
    socket.set_reuse_address(true).map_err(WorkflowError::Io)?;
    socket.bind(&addr.into()).map_err(WorkflowError::Io)?;
    Ok(socket.into())
}

/// Send `payload` to `addr:port` over a fresh ephemeral-port socket — used
/// for one-shot sends (rule payload push, ack datagrams) where the sender
/// doesn't need a stable local port.
pub fn send_to(addr: &str, port: u32, payload: &[u8]) -> Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0").map_err(WorkflowError::Io)?;
    socket.send_to(payload, (addr, port as u16)).map_err(WorkflowError::Io)?;
    Ok(())
}

/// Block for at most `timeout` waiting for one datagram on `socket`,
/// returning the payload as a `String` (every wire format in this system
/// is ASCII/XML text).
pub fn recv_with_timeout(socket: &UdpSocket, timeout: Duration) -> Result<Option<String>> {
    socket.set_read_timeout(Some(timeout)).map_err(WorkflowError::Io)?;
    let mut buf = [0u8; 65536];
    match socket.recv(&mut buf) {
        Ok(n) => Ok(Some(String::from_utf8_lossy(&buf[..n]).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
        Err(e) => Err(WorkflowError::Io(e)),
    }
}

/// Sends tokens over the event bus by resolving their destination through
/// the fact store and writing the token XML to a fresh UDP datagram
/// (§4.6 `dispatch_decision`, §4.8). The real counterpart to the
/// in-memory `RecordingDispatcher` orchestrator tests use.
pub struct UdpTokenDispatcher {
    facts: std::sync::Arc<dyn RuleFactStore>,
}

impl UdpTokenDispatcher {
    pub fn new(facts: std::sync::Arc<dyn RuleFactStore>) -> Self {
        Self { facts }
    }
}

impl TokenDispatcher for UdpTokenDispatcher {
    fn dispatch(&self, next_service: &str, next_operation: &str, token: &Token) -> Result<()> {
        let resolved = workflow_engine_core::channel::resolve_channel(
            self.facts.as_ref(),
            next_service,
            next_operation,
            BASE_EVENT_PORT,
        )?;
        let xml = write_token_xml(token)?;
        send_to(&resolved.normalized_addr, resolved.target_port, xml.as_bytes())
    }
}
