//! Storage abstraction for durable key-value persistence.
//!
//! The core is single-threaded and event-driven, so the trait is synchronous;
//! backends that need real asynchrony live behind the host shell, not here.

mod memory;
mod recovery;

#[cfg(not(target_arch = "wasm32"))]
mod file;

pub use memory::MemoryStorage;
pub use recovery::{
    RecoveryManager, RecoverySnapshot, RECOVERY_KEY, SNAPSHOT_MAX_AGE_MILLIS,
};

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Key not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for durable key-value backends.
///
/// Values are opaque strings (JSON in practice). Implementations exist for
/// memory (tests, ephemeral sessions) and the filesystem; a browser host
/// would back this with local storage.
pub trait Storage: Send + Sync {
    /// Store a value under a key, replacing any previous value.
    fn save(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Load the value for a key.
    fn load(&self, key: &str) -> StorageResult<String>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Check whether a key exists.
    fn exists(&self, key: &str) -> StorageResult<bool>;
}
