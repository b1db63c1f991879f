//! RFC 1350 packet framing: the five TFTP packet shapes and their wire
//! encoding. No RFC 2347 option parsing here — mode `octet` only, and an
//! opcode outside 1..=5 is always `MalformedPacket`.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{Result, TftpError};

/// Maximum `DATA` payload per RFC 1350 (fixed block size, no blksize option).
pub const BLOCK_SIZE: usize = 512;

/// 2-byte opcode + 2-byte block + up to 512 bytes of payload.
pub const MAX_DATA_PACKET_SIZE: usize = 4 + BLOCK_SIZE;

/// Ethernet v2 MTU upper bound for IPv4 — the receive staging buffer size
/// used by the wire endpoint (C2), not a limit on any packet this codec
/// produces.
pub const RECV_BUFFER_SIZE: usize = 1500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Opcode {
    Rrq = 1,
    Wrq = 2,
    Data = 3,
    Ack = 4,
    Error = 5,
}

impl Opcode {
    fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Opcode::Rrq),
            2 => Some(Opcode::Wrq),
            3 => Some(Opcode::Data),
            4 => Some(Opcode::Ack),
            5 => Some(Opcode::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Rrq { filename: String, mode: String },
    Wrq { filename: String, mode: String },
    Data { block: u16, payload: Vec<u8> },
    Ack { block: u16 },
    Error { code: u16, message: String },
}

impl Packet {
    pub fn ack(block: u16) -> Self {
        Packet::Ack { block }
    }

    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Packet::Error {
            code,
            message: message.into(),
        }
    }

    pub fn data(block: u16, payload: Vec<u8>) -> Self {
        Packet::Data { block, payload }
    }

    /// Decode one packet from a raw UDP datagram.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut buf = BytesMut::from(bytes);
        if buf.remaining() < 2 {
            return Err(TftpError::MalformedPacket("packet too small".into()));
        }
        let opcode = buf.get_u16();
        let opcode = Opcode::from_u16(opcode)
            .ok_or_else(|| TftpError::MalformedPacket(format!("unknown opcode {opcode}")))?;

        match opcode {
            Opcode::Rrq | Opcode::Wrq => {
                let filename = read_cstr(&mut buf)?;
                if filename.is_empty() {
                    return Err(TftpError::MalformedPacket("empty filename".into()));
                }
                let mode = read_cstr(&mut buf)?;
                if !mode.eq_ignore_ascii_case("octet") {
                    return Err(TftpError::InvalidMode(mode));
                }
                if opcode == Opcode::Rrq {
                    Ok(Packet::Rrq { filename, mode })
                } else {
                    Ok(Packet::Wrq { filename, mode })
                }
            }
            Opcode::Ack => {
                if buf.remaining() != 2 {
                    return Err(TftpError::MalformedPacket(
                        "ACK must carry exactly one block number".into(),
                    ));
                }
                Ok(Packet::Ack {
                    block: buf.get_u16(),
                })
            }
            Opcode::Data => {
                if buf.remaining() < 2 {
                    return Err(TftpError::MalformedPacket("DATA missing block number".into()));
                }
                let block = buf.get_u16();
                if buf.remaining() > BLOCK_SIZE {
                    return Err(TftpError::MalformedPacket(format!(
                        "DATA payload of {} bytes exceeds {} byte block size",
                        buf.remaining(),
                        BLOCK_SIZE
                    )));
                }
                Ok(Packet::Data {
                    block,
                    payload: buf.to_vec(),
                })
            }
            Opcode::Error => {
                if buf.remaining() < 2 {
                    return Err(TftpError::MalformedPacket("ERR missing error code".into()));
                }
                let code = buf.get_u16();
                let message = read_cstr(&mut buf)?;
                Ok(Packet::Error { code, message })
            }
        }
    }

    /// Encode this packet to its wire representation.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        match self {
            Packet::Rrq { filename, mode } => {
                buf.put_u16(Opcode::Rrq as u16);
                write_cstr(&mut buf, filename);
                write_cstr(&mut buf, mode);
            }
            Packet::Wrq { filename, mode } => {
                buf.put_u16(Opcode::Wrq as u16);
                write_cstr(&mut buf, filename);
                write_cstr(&mut buf, mode);
            }
            Packet::Data { block, payload } => {
                buf.put_u16(Opcode::Data as u16);
                buf.put_u16(*block);
                buf.put_slice(payload);
            }
            Packet::Ack { block } => {
                buf.put_u16(Opcode::Ack as u16);
                buf.put_u16(*block);
            }
            Packet::Error { code, message } => {
                buf.put_u16(Opcode::Error as u16);
                buf.put_u16(*code);
                write_cstr(&mut buf, message);
            }
        }
        buf.to_vec()
    }
}

fn read_cstr(buf: &mut BytesMut) -> Result<String> {
    let nul = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| TftpError::MalformedPacket("missing NUL terminator".into()))?;
    let chunk = buf.split_to(nul);
    buf.advance(1); // skip the NUL
    String::from_utf8(chunk.to_vec())
        .map_err(|e| TftpError::MalformedPacket(format!("invalid ASCII string: {e}")))
}

fn write_cstr(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_u8(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_rrq() {
        let p = Packet::Rrq {
            filename: "file1".into(),
            mode: "octet".into(),
        };
        let encoded = p.encode();
        assert_eq!(Packet::decode(&encoded).unwrap(), p);
    }

    #[test]
    fn round_trips_wrq() {
        let p = Packet::Wrq {
            filename: "b".into(),
            mode: "octet".into(),
        };
        assert_eq!(Packet::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn round_trips_data_full_and_short_block() {
        for len in [0usize, 5, 511, 512] {
            let p = Packet::Data {
                block: 42,
                payload: vec![7u8; len],
            };
            assert_eq!(Packet::decode(&p.encode()).unwrap(), p);
        }
    }

    #[test]
    fn round_trips_ack() {
        let p = Packet::Ack { block: 513 };
        assert_eq!(Packet::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn round_trips_error() {
        let p = Packet::Error {
            code: 1,
            message: "File not found.".into(),
        };
        assert_eq!(Packet::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn encodes_rrq_framing_exactly() {
        let p = Packet::Rrq {
            filename: "file1".into(),
            mode: "octet".into(),
        };
        assert_eq!(
            p.encode(),
            vec![
                0x00, 0x01, b'f', b'i', b'l', b'e', b'1', 0x00, b'o', b'c', b't', b'e', b't', 0x00,
            ]
        );
    }

    #[test]
    fn encodes_ack_framing_exactly() {
        let p = Packet::Ack { block: 513 };
        assert_eq!(p.encode(), vec![0x00, 0x04, 0x02, 0x01]);
    }

    #[test]
    fn encodes_data_framing_exactly() {
        let p = Packet::Data {
            block: 1,
            payload: vec![0x00, 0x01, 0x02, 0x03, 0x04],
        };
        assert_eq!(
            p.encode(),
            vec![0x00, 0x03, 0x00, 0x01, 0x00, 0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn rejects_non_octet_mode() {
        let mut bytes = vec![0x00, 0x01];
        bytes.extend_from_slice(b"file\x00netascii\x00");
        match Packet::decode(&bytes) {
            Err(TftpError::InvalidMode(m)) => assert_eq!(m, "netascii"),
            other => panic!("expected InvalidMode, got {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_trailing_nul() {
        let mut bytes = vec![0x00, 0x01];
        bytes.extend_from_slice(b"file\x00octet"); // no trailing NUL
        assert!(matches!(
            Packet::decode(&bytes),
            Err(TftpError::MalformedPacket(_))
        ));
    }

    #[test]
    fn rejects_oversized_data_payload() {
        let mut bytes = vec![0x00, 0x03, 0x00, 0x01];
        bytes.extend(std::iter::repeat(0u8).take(BLOCK_SIZE + 1));
        assert!(matches!(
            Packet::decode(&bytes),
            Err(TftpError::MalformedPacket(_))
        ));
    }

    #[test]
    fn rejects_unknown_opcode() {
        let bytes = vec![0x00, 0x09];
        assert!(matches!(
            Packet::decode(&bytes),
            Err(TftpError::MalformedPacket(_))
        ));
    }

    #[test]
    fn mode_comparison_is_case_insensitive() {
        let mut bytes = vec![0x00, 0x01];
        bytes.extend_from_slice(b"file\x00OCTET\x00");
        assert!(matches!(Packet::decode(&bytes), Ok(Packet::Rrq { .. })));
    }
}
