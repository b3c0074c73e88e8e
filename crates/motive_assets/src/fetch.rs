use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Context;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use motive_core::AssetId;

/// Storage backend the loader pulls raw asset bytes from.
pub trait AssetFetcher: Send + Sync + 'static {
    fn fetch(&self, id: AssetId) -> impl Future<Output = anyhow::Result<Vec<u8>>> + Send;
}

/// Reads `<root>/<uuid>.<extension>` from the local filesystem.
pub struct FileFetcher {
    root: PathBuf,
    extension: String,
}

impl FileFetcher {
    pub fn new(root: impl AsRef<Path>, extension: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            extension: extension.into(),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn path_for(&self, id: AssetId) -> PathBuf {
        self.root.join(format!("{id}.{}", self.extension))
    }
}

impl AssetFetcher for FileFetcher {
    async fn fetch(&self, id: AssetId) -> anyhow::Result<Vec<u8>> {
        let path = self.path_for(id);
        let data = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        Ok(data)
    }
}

/// Serves bytes from memory. Used by tools and tests.
#[derive(Default)]
pub struct MemoryFetcher {
    entries: RwLock<FxHashMap<AssetId, Vec<u8>>>,
}

impl MemoryFetcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: AssetId, bytes: Vec<u8>) {
        self.entries.write().insert(id, bytes);
    }

    pub fn remove(&self, id: AssetId) -> Option<Vec<u8>> {
        self.entries.write().remove(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl AssetFetcher for MemoryFetcher {
    async fn fetch(&self, id: AssetId) -> anyhow::Result<Vec<u8>> {
        self.entries
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no bytes stored for {id}"))
    }
}
