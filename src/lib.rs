pub mod config;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod listener;
pub mod memory;
pub mod packet;
pub mod session;

pub use config::Config;
pub use endpoint::Endpoint;
pub use error::{ErrorCode, Result, TftpError};
pub use handler::{ByteSource, Handler, HandlerError};
pub use listener::Listener;
pub use memory::MemoryHandler;
pub use packet::{Opcode, Packet, BLOCK_SIZE};
pub use session::Session;
