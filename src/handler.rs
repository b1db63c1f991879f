//! The contract a process-wide storage backend implements. The session
//! never touches a filesystem, a database, or any other concrete storage —
//! only this trait.

use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Error a handler reports back from `read_file`/`write_file`. The session
/// classifies these at the boundary and maps them onto the peer-visible
/// [`crate::error::ErrorCode`].
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("file not found")]
    NotFound,

    #[error("file already exists")]
    AlreadyExists,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// One open read-side transfer. Bytes stream out via [`tokio::io::AsyncRead`]
/// rather than a one-shot buffer, since a read source may be arbitrarily
/// large; [`Handler::write_file`] is still a single buffer, matching the
/// one-shot WRQ accumulation contract this core specifies.
pub type ByteSource = Box<dyn AsyncRead + Send + Unpin>;

/// A process-wide, stateless storage backend. Implementations MUST tolerate
/// concurrent calls from multiple sessions — the core shares one `Arc<dyn
/// Handler>` across every session it spawns.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Open `name` for reading. Returns [`HandlerError::NotFound`] if it
    /// does not exist; any other failure should be `Other`.
    async fn read_file(&self, name: &str) -> Result<ByteSource, HandlerError>;

    /// Store the complete contents of a file that has just finished a WRQ
    /// transfer. Called exactly once per successful write.
    async fn write_file(&self, name: &str, data: Vec<u8>) -> Result<(), HandlerError>;

    /// Pre-check used at WRQ acceptance, before any data has been
    /// exchanged, so the session can reject with `ERR(FileExists)` up
    /// front rather than after transferring the whole file.
    async fn file_exists(&self, name: &str) -> bool;
}
