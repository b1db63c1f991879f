//! A reference [`Handler`] backed entirely by process memory. Grounded in
//! the original server's `map[string]*file` store guarded by a
//! `sync.Mutex` (`examples/original_source/cmd/server/main.go`), generalized
//! to the complete `read_file`/`write_file`/`file_exists` contract that
//! source's drafts never finished (its `ReadFile`/`WriteFile` there return
//! stubs that don't actually move bytes).

use std::collections::HashMap;
use std::io::Cursor;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::handler::{ByteSource, Handler, HandlerError};

/// `name -> file bytes`, one entry per completed WRQ. `RwLock` rather than
/// `Mutex` since reads (RRQ) vastly outnumber writes (WRQ) under concurrent
/// sessions.
#[derive(Default)]
pub struct MemoryHandler {
    store: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store before serving — useful for tests and for preloading
    /// files a deployment wants to offer for read without a prior WRQ.
    pub async fn seed(&self, name: impl Into<String>, data: Vec<u8>) {
        self.store.write().await.insert(name.into(), data);
    }
}

#[async_trait]
impl Handler for MemoryHandler {
    async fn read_file(&self, name: &str) -> Result<ByteSource, HandlerError> {
        let store = self.store.read().await;
        let data = store.get(name).ok_or(HandlerError::NotFound)?.clone();
        Ok(Box::new(Cursor::new(data)))
    }

    async fn write_file(&self, name: &str, data: Vec<u8>) -> Result<(), HandlerError> {
        let mut store = self.store.write().await;
        if store.contains_key(name) {
            return Err(HandlerError::AlreadyExists);
        }
        store.insert(name.to_string(), data);
        Ok(())
    }

    async fn file_exists(&self, name: &str) -> bool {
        self.store.read().await.contains_key(name)
    }
}
