//! The wire endpoint. One bind-only UDP socket per session, framing raw
//! datagrams as [`Packet`]s. The socket is deliberately *not* OS-connected
//! to the peer: a connected UDP socket has its kernel delivery path drop
//! any datagram whose source doesn't match the connected address before it
//! ever reaches `recv_from`, which would make the wrong-TID datagram
//! invisible to the application and the `ERR(UnknownTID)` reply
//! unreachable. Instead the peer-address check happens here, in user
//! space, against `peer_addr()`, so the caller can observe and answer a
//! wrong-TID sender instead of having it silently dropped underneath it.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use crate::packet::{Packet, RECV_BUFFER_SIZE};

use crate::error::{Result, TftpError};

/// A bind-only UDP socket paired with the address it treats as its peer.
pub struct Endpoint {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl Endpoint {
    /// Bind a fresh ephemeral socket for a session whose peer is `peer`.
    /// The socket is bound but never OS-connected, so datagrams from any
    /// source still reach `recv_raw` — the peer-address match is applied
    /// by the caller.
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Endpoint { socket, peer })
    }

    /// Wrap an already-bound socket with a known peer address. Used in
    /// tests to build an `Endpoint` over a loopback socket pair.
    pub fn from_bound(socket: UdpSocket, peer: SocketAddr) -> Self {
        Endpoint { socket, peer }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Send to the session's peer address.
    pub async fn send(&self, packet: &Packet) -> Result<()> {
        let bytes = packet.encode();
        self.socket.send_to(&bytes, self.peer).await?;
        Ok(())
    }

    /// Send a packet to an address other than the peer — used only to
    /// answer a wrong-TID sender with `ERR(UnknownTID)` without disturbing
    /// the session's own peer.
    pub async fn send_to(&self, packet: &Packet, addr: SocketAddr) -> Result<()> {
        let bytes = packet.encode();
        self.socket.send_to(&bytes, addr).await?;
        Ok(())
    }

    /// Wait up to `timeout` for one datagram and report who sent it,
    /// without decoding it yet. The caller (the session's retry loop)
    /// needs the sender address to apply the TID check *before* deciding
    /// whether a decode failure matters.
    pub async fn recv_raw(&self, timeout: Duration) -> Result<(Vec<u8>, SocketAddr)> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let (n, from) = tokio::time::timeout(timeout, self.socket.recv_from(&mut buf))
            .await
            .map_err(|_| TftpError::Timeout)??;
        Ok((buf[..n].to_vec(), from))
    }
}
