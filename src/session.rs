//! The per-transfer state machine. One [`Session`] per accepted RRQ or
//! WRQ, owning a single ephemeral socket and driving stop-and-wait
//! exchanges to completion.
//!
//! Both transfer directions share one retry/retransmit primitive,
//! [`Session::transact`], parameterized by a duplicate-detection predicate
//! rather than duplicating the send-and-wait loop for RRQ and WRQ
//! separately.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::endpoint::Endpoint;
use crate::error::{ErrorCode, Result, TftpError};
use crate::handler::{ByteSource, Handler, HandlerError};
use crate::packet::{Packet, BLOCK_SIZE};

/// Per-datagram wait before retransmitting.
pub const TIMEOUT: Duration = Duration::from_secs(5);
/// Number of send attempts before a session gives up silently.
pub const RETRY_LIMIT: u32 = 3;

pub struct Session {
    endpoint: Endpoint,
    handler: Arc<dyn Handler>,
}

impl Session {
    pub fn new(endpoint: Endpoint, handler: Arc<dyn Handler>) -> Self {
        Session { endpoint, handler }
    }

    /// Drive the session to completion. `opening` is the RRQ/WRQ the
    /// listener already decoded; it selects sender or receiver mode and is
    /// not itself re-sent. Never panics on protocol input — all failure
    /// paths log and return.
    pub async fn run(mut self, opening: Packet) {
        let peer = self.endpoint.peer_addr();
        let result = match &opening {
            Packet::Rrq { filename, .. } => self.serve_rrq(filename).await,
            Packet::Wrq { filename, .. } => self.serve_wrq(filename).await,
            other => {
                warn!(%peer, packet = ?other, "listener handed session a non-request packet");
                return;
            }
        };
        match result {
            Ok(()) => info!(%peer, "session completed"),
            Err(TftpError::Timeout) => {
                info!(%peer, "retry limit exceeded, giving up silently")
            }
            Err(e) => warn!(%peer, error = %e, "session terminated"),
        }
    }

    async fn serve_rrq(&mut self, filename: &str) -> Result<()> {
        self.serve_rrq_from(filename, 1).await
    }

    /// `start_block` is always 1 in production (`serve_rrq`); split out so
    /// tests can exercise the 65535-to-0 wrap without transferring a 32 MiB
    /// file.
    async fn serve_rrq_from(&mut self, filename: &str, start_block: u16) -> Result<()> {
        let mut source = match self.handler.read_file(filename).await {
            Ok(source) => source,
            Err(HandlerError::NotFound) => {
                self.send_error(ErrorCode::FileNotFound, None).await;
                return Ok(());
            }
            Err(e) => {
                self.send_error(ErrorCode::NotDefined, Some(e.to_string()))
                    .await;
                return Ok(());
            }
        };

        let mut block: u16 = start_block;
        loop {
            let payload = read_block(&mut source).await?;
            let is_final = payload.len() < BLOCK_SIZE;
            let stimulus = Packet::data(block, payload);

            let response = self
                .transact(&stimulus, |p| {
                    matches!(p, Packet::Ack { block: b } if is_stale(block, *b))
                })
                .await?;

            match response {
                Packet::Ack { block: b } if b == block => {}
                other => {
                    self.send_error(ErrorCode::IllegalOperation, None).await;
                    return Err(TftpError::UnexpectedPacket(other));
                }
            }

            if is_final {
                return Ok(());
            }
            block = block.wrapping_add(1);
        }
    }

    async fn serve_wrq(&mut self, filename: &str) -> Result<()> {
        if self.handler.file_exists(filename).await {
            self.send_error(ErrorCode::FileAlreadyExists, None).await;
            return Ok(());
        }

        let mut block: u16 = 0;
        let mut buffer = Vec::new();
        loop {
            let expected_next = block.wrapping_add(1);
            let stimulus = Packet::ack(block);

            let response = self
                .transact(&stimulus, |p| {
                    matches!(p, Packet::Data { block: b, .. } if is_stale(expected_next, *b))
                })
                .await?;

            let (data_block, payload) = match response {
                Packet::Data { block: b, payload } if b == expected_next => (b, payload),
                other => {
                    self.send_error(ErrorCode::IllegalOperation, None).await;
                    return Err(TftpError::UnexpectedPacket(other));
                }
            };

            let is_final = payload.len() < BLOCK_SIZE;
            buffer.extend_from_slice(&payload);
            block = data_block;

            if !is_final {
                continue;
            }

            self.endpoint.send(&Packet::ack(block)).await?;
            match self.handler.write_file(filename, buffer).await {
                Ok(()) => return Ok(()),
                Err(HandlerError::AlreadyExists) => {
                    self.send_error(ErrorCode::FileAlreadyExists, None).await;
                    return Ok(());
                }
                Err(e) => {
                    self.send_error(ErrorCode::NotDefined, Some(e.to_string()))
                        .await;
                    return Ok(());
                }
            }
        }
    }

    async fn send_error(&self, code: ErrorCode, detail: Option<String>) {
        let message = detail.unwrap_or_else(|| code.message().to_string());
        if let Err(e) = self
            .endpoint
            .send(&Packet::error(code.code(), message))
            .await
        {
            warn!(peer = %self.endpoint.peer_addr(), error = %e, "failed to send ERR to peer");
        }
    }

    /// Send `stimulus`, then wait for a matching response: peer `ERR`
    /// aborts the session, wrong-TID senders get an
    /// `UnknownTID` reply and are otherwise ignored, malformed datagrams
    /// are dropped, `is_duplicate` hits are dropped, anything else
    /// (matching or not) is returned to the caller. Retransmits `stimulus`
    /// up to [`RETRY_LIMIT`] times, each with a [`TIMEOUT`] window.
    async fn transact(
        &self,
        stimulus: &Packet,
        is_duplicate: impl Fn(&Packet) -> bool,
    ) -> Result<Packet> {
        let peer = self.endpoint.peer_addr();

        for attempt in 0..RETRY_LIMIT {
            self.endpoint.send(stimulus).await?;
            if attempt > 0 {
                debug!(%peer, attempt, "retransmitting");
            }

            let deadline = Instant::now() + TIMEOUT;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }

                let (raw, from) = match self.endpoint.recv_raw(remaining).await {
                    Ok(v) => v,
                    Err(TftpError::Timeout) => break,
                    Err(e) => return Err(e),
                };

                if from != peer {
                    warn!(%from, %peer, "datagram from wrong TID");
                    let unknown_tid = Packet::error(
                        ErrorCode::UnknownTransferId.code(),
                        ErrorCode::UnknownTransferId.message(),
                    );
                    let _ = self.endpoint.send_to(&unknown_tid, from).await;
                    continue;
                }

                let packet = match Packet::decode(&raw) {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                if let Packet::Error { code, message } = &packet {
                    return Err(TftpError::PeerAborted {
                        code: *code,
                        message: message.clone(),
                    });
                }

                if is_duplicate(&packet) {
                    debug!(%peer, "dropping duplicate of previous stimulus");
                    continue;
                }

                return Ok(packet);
            }
        }

        Err(TftpError::Timeout)
    }
}

/// Is `candidate` a stale (already-acknowledged) block number relative to
/// `current`, accounting for 16-bit wraparound? Plain `candidate < current`
/// breaks the moment `current` has wrapped past 0 — a retransmitted
/// `ACK{65535}` arriving late while the session now expects block `0` would
/// read as `65535 < 0`, which is false. Comparing circular distance via
/// `wrapping_sub` instead treats anything within the trailing half of the
/// `u16` range as behind `current`, which is correct both before and after
/// a wrap.
fn is_stale(current: u16, candidate: u16) -> bool {
    let distance = current.wrapping_sub(candidate);
    distance != 0 && distance < 0x8000
}

/// Read up to one block's worth of bytes, looping until the buffer is full
/// or the source is exhausted — a single `AsyncRead::read` call may return
/// short even mid-stream, and a short read here must only ever mean EOF.
async fn read_block(source: &mut ByteSource) -> Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut filled = 0;
    while filled < BLOCK_SIZE {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}
