//! In-memory storage implementation.

use super::{Storage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn save(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {e}")))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn load(&self, key: &str) -> StorageResult<String> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {e}")))?;
        entries
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {e}")))?;
        entries.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> StorageResult<bool> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {e}")))?;
        Ok(entries.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        storage.save("test", "value").unwrap();
        assert_eq!(storage.load("test").unwrap(), "value");
    }

    #[test]
    fn test_not_found() {
        let storage = MemoryStorage::new();
        assert!(matches!(
            storage.load("nonexistent"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_overwrite() {
        let storage = MemoryStorage::new();
        storage.save("key", "first").unwrap();
        storage.save("key", "second").unwrap();
        assert_eq!(storage.load("key").unwrap(), "second");
    }

    #[test]
    fn test_delete() {
        let storage = MemoryStorage::new();
        storage.save("key", "value").unwrap();
        assert!(storage.exists("key").unwrap());

        storage.delete("key").unwrap();
        assert!(!storage.exists("key").unwrap());

        // Deleting again is fine.
        storage.delete("key").unwrap();
    }
}
