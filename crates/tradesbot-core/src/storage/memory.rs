use std::{collections::BTreeMap, io, sync::Mutex};

use async_trait::async_trait;

use crate::{errors::Error, ports::ObjectStore, Result};

/// In-process object store (tests, dry runs).
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.lock().insert(path.into(), bytes.into());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A poisoned map is still a valid map.
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn write_blob(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.lock().insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read_blob(&self, path: &str) -> Result<Vec<u8>> {
        self.get(path).ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such blob: {path}"),
            ))
        })
    }

    async fn list_blobs(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn append_blob(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.lock()
            .entry(path.to_string())
            .or_default()
            .extend_from_slice(bytes);
        Ok(())
    }
}
