//! Two-phase, all-or-nothing connect protocol.
//!
//! Phase 1 connects the outbound channel, phase 2 the inbound channel,
//! each under [`CONNECT_TIMEOUT`](crate::CONNECT_TIMEOUT). A phase 2
//! failure rolls phase 1 back, so the caller either gets both sockets
//! or neither. Each failing channel is reported exactly once as a
//! communication-error event.

use std::net::IpAddr;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::CONNECT_TIMEOUT;
use crate::error::LinkError;
use crate::events::{Channel, FaultReporter};

pub(crate) struct ConnectionEstablisher<'a> {
    pub address: IpAddr,
    pub port_to: u16,
    pub port_from: u16,
    pub faults: &'a FaultReporter,
}

impl ConnectionEstablisher<'_> {
    /// Runs the connect protocol.
    ///
    /// Blocks the calling task for up to twice the per-channel bound in
    /// the worst case (two sequential waits). Returns `None` after a
    /// failure on either channel; no sockets remain live in that case.
    pub(crate) async fn establish(&self) -> Option<(TcpStream, TcpStream)> {
        // Phase 1: outbound channel.
        let socket_to = match self.connect_channel(self.port_to).await {
            Ok(socket) => socket,
            Err(e) => {
                self.faults.connect_failed(Channel::Outbound, &e);
                return None;
            }
        };
        debug!(address = %self.address, port = self.port_to, "outbound channel connected");

        // Phase 2: inbound channel.
        let socket_from = match self.connect_channel(self.port_from).await {
            Ok(socket) => socket,
            Err(e) => {
                self.faults.connect_failed(Channel::Inbound, &e);
                // Roll back phase 1 — never leave exactly one live socket.
                let mut socket_to = socket_to;
                let _ = socket_to.shutdown().await;
                debug!(port = self.port_to, "rolled back outbound channel");
                return None;
            }
        };
        debug!(address = %self.address, port = self.port_from, "inbound channel connected");

        Some((socket_to, socket_from))
    }

    async fn connect_channel(&self, port: u16) -> Result<TcpStream, LinkError> {
        match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((self.address, port))).await
        {
            Ok(Ok(socket)) => Ok(socket),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(LinkError::Timeout),
        }
    }
}
