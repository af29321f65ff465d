use std::{
    io,
    path::{Component, Path, PathBuf},
};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::{errors::Error, ports::ObjectStore, Result};

/// Object store rooted at a local directory.
///
/// Blob paths map 1:1 onto relative file paths under `root`.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, blob: &str) -> Result<PathBuf> {
        let rel = Path::new(blob);
        let escapes = rel.components().any(|c| {
            !matches!(c, Component::Normal(_) | Component::CurDir)
        });
        if blob.is_empty() || escapes {
            return Err(Error::InvalidPath {
                path: rel.to_path_buf(),
                reason: "blob paths must be relative and stay inside the store".to_string(),
            });
        }
        Ok(self.root.join(rel))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn write_blob(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        Self::ensure_parent(&full).await?;
        tokio::fs::write(&full, bytes).await?;
        Ok(())
    }

    async fn read_blob(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::read(&full).await?)
    }

    async fn list_blobs(&self, prefix: &str) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut stack = vec![self.root.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(v) => v,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    stack.push(path);
                    continue;
                }
                let Ok(rel) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let name = rel
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if name.starts_with(prefix) {
                    out.push(name);
                }
            }
        }

        out.sort();
        Ok(out)
    }

    async fn append_blob(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        Self::ensure_parent(&full).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}
