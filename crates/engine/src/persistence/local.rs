//! Device-local storage strategies backed by the filesystem.

use std::path::PathBuf;

use async_trait::async_trait;

use cartkit_core::Cart;

use super::{CartStore, decode, encode};
use crate::error::{EngineError, Result};

/// Durable-local storage: one JSON document at a fixed path.
///
/// Writes go through a temp file and an atomic rename so a crash mid-write
/// never leaves a torn document behind.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store the cart document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_err(context: &str, err: &std::io::Error) -> EngineError {
        EngineError::Persistence(format!("{context}: {err}"))
    }
}

#[async_trait]
impl CartStore for JsonFileStore {
    async fn save(&self, cart: &Cart) -> Result<()> {
        let encoded = encode(cart)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_err("create storage directory", &e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, encoded)
            .await
            .map_err(|e| Self::io_err("write cart document", &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Self::io_err("commit cart document", &e))
    }

    async fn load(&self) -> Result<Option<Cart>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => decode(&raw).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_err("read cart document", &e)),
        }
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err("remove cart document", &e)),
        }
    }
}

/// Device-indexed storage: one JSON document per cart key in a directory.
///
/// Larger capacity than the single-file strategy; suited to hosts keeping
/// multiple carts (e.g. per-session keys) on the same device.
#[derive(Debug, Clone)]
pub struct IndexedDirStore {
    dir: PathBuf,
    cart_key: String,
}

impl IndexedDirStore {
    /// Store documents under `dir`, this instance owning `cart_key`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, cart_key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            cart_key: cart_key.into(),
        }
    }

    fn document_path(&self) -> PathBuf {
        // Keys may contain separators (e.g. "cartkit:cart"); keep filenames flat.
        let file = self.cart_key.replace([':', '/', '\\'], "_");
        self.dir.join(format!("{file}.json"))
    }
}

#[async_trait]
impl CartStore for IndexedDirStore {
    async fn save(&self, cart: &Cart) -> Result<()> {
        JsonFileStore::new(self.document_path()).save(cart).await
    }

    async fn load(&self) -> Result<Option<Cart>> {
        JsonFileStore::new(self.document_path()).load().await
    }

    async fn clear(&self) -> Result<()> {
        JsonFileStore::new(self.document_path()).clear().await
    }
}
