use thiserror::Error;

use crate::packet::Packet;

/// Errors internal to this process: transport failures, codec failures, and
/// session-level protocol violations. None of these are wire formats in
/// themselves — the session maps the ones that must become an `ERR` packet
/// onto an [`crate::ErrorCode`] at the point of sending (see `session.rs`).
#[derive(Error, Debug)]
pub enum TftpError {
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    #[error("invalid transfer mode: {0}")]
    InvalidMode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for peer")]
    Timeout,

    #[error("peer aborted transfer: error {code}: {message}")]
    PeerAborted { code: u16, message: String },

    #[error("unexpected packet from peer: {0:?}")]
    UnexpectedPacket(Packet),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, TftpError>;

/// The 8 RFC 1350 error codes carried in an `ERR` packet's first two bytes.
///
/// Message text matches the original server's error table exactly
/// (`examples/original_source/tftp/handler.go`), not a paraphrase of the
/// RFC — peers that pattern-match on these strings see the same wording a
/// reference TFTP server would send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    NotDefined = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    UnknownTransferId = 5,
    FileAlreadyExists = 6,
    NoSuchUser = 7,
}

impl ErrorCode {
    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::NotDefined => "Not defined, see error message (if any).",
            ErrorCode::FileNotFound => "File not found.",
            ErrorCode::AccessViolation => "Access violation.",
            ErrorCode::DiskFull => "Disk full or allocation exceeded.",
            ErrorCode::IllegalOperation => "Illegal TFTP operation.",
            ErrorCode::UnknownTransferId => "Unknown transfer ID.",
            ErrorCode::FileAlreadyExists => "File already exists.",
            ErrorCode::NoSuchUser => "No such user.",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}
