//! The welcome socket. Binds the well-known port, decodes the initial
//! datagram, and spawns a [`Session`] on a fresh ephemeral socket for every
//! RRQ/WRQ it sees. No batch receive, buffer pooling, or platform socket
//! tuning — a plain `recv_from`-then-`tokio::spawn` loop is all this core
//! needs.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{info, warn};

use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::handler::Handler;
use crate::packet::{Packet, RECV_BUFFER_SIZE};
use crate::session::Session;

pub struct Listener {
    socket: UdpSocket,
    handler: Arc<dyn Handler>,
}

impl Listener {
    pub async fn bind(addr: SocketAddr, handler: Arc<dyn Handler>) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!(%addr, "TFTP server listening");
        Ok(Listener { socket, handler })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Accept requests until a fatal I/O error occurs on the welcome
    /// socket. Per-datagram decode failures are logged and do not stop the
    /// loop.
    pub async fn serve(&self) -> Result<()> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            let (n, peer) = self.socket.recv_from(&mut buf).await?;

            let packet = match Packet::decode(&buf[..n]) {
                Ok(p) => p,
                Err(e) => {
                    warn!(%peer, error = %e, "discarding malformed datagram on welcome socket");
                    continue;
                }
            };

            match packet {
                Packet::Rrq { .. } | Packet::Wrq { .. } => {
                    let handler = self.handler.clone();
                    match Endpoint::connect(peer).await {
                        Ok(endpoint) => {
                            info!(%peer, "accepted session");
                            let session = Session::new(endpoint, handler);
                            tokio::spawn(session.run(packet));
                        }
                        Err(e) => {
                            warn!(%peer, error = %e, "failed to bind session socket");
                        }
                    }
                }
                other => {
                    warn!(%peer, packet = ?other, "discarding non-request packet on welcome socket");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryHandler;
    use tokio::net::UdpSocket as ClientSocket;

    #[tokio::test]
    async fn accepts_rrq_and_spawns_an_independent_session() {
        let handler = Arc::new(MemoryHandler::new());
        handler.seed("a", b"hello".to_vec()).await;

        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), handler)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.serve().await;
        });

        let client = ClientSocket::bind("127.0.0.1:0").await.unwrap();
        client
            .send_to(
                &Packet::Rrq {
                    filename: "a".into(),
                    mode: "octet".into(),
                }
                .encode(),
                addr,
            )
            .await
            .unwrap();

        let mut buf = [0u8; 1500];
        let (n, session_addr) = client.recv_from(&mut buf).await.unwrap();
        assert_eq!(
            Packet::decode(&buf[..n]).unwrap(),
            Packet::Data {
                block: 1,
                payload: b"hello".to_vec()
            }
        );
        // the session answered from a fresh ephemeral port, not the welcome port
        assert_ne!(session_addr.port(), addr.port());

        client
            .send_to(&Packet::ack(1).encode(), session_addr)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn malformed_datagram_on_welcome_socket_is_dropped_not_fatal() {
        let handler = Arc::new(MemoryHandler::new());
        handler.seed("a", b"x".to_vec()).await;

        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), handler)
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = listener.serve().await;
        });

        let client = ClientSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&[0xFF, 0xFF], addr).await.unwrap();
        client
            .send_to(
                &Packet::Rrq {
                    filename: "a".into(),
                    mode: "octet".into(),
                }
                .encode(),
                addr,
            )
            .await
            .unwrap();

        let mut buf = [0u8; 1500];
        let (n, _session_addr) = client.recv_from(&mut buf).await.unwrap();
        assert!(matches!(
            Packet::decode(&buf[..n]).unwrap(),
            Packet::Data { block: 1, .. }
        ));
    }
}
