//! In-process blob store, used by tests and dry runs.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};

use super::{check_name, BlobStore};

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, container: &str, name: &str, data: &[u8]) -> Result<()> {
        check_name(container)?;
        check_name(name)?;
        self.blobs
            .write()
            .map_err(|_| anyhow!("blob store lock poisoned"))?
            .insert((container.to_string(), name.to_string()), data.to_vec());
        Ok(())
    }

    fn get(&self, container: &str, name: &str) -> Result<Option<Vec<u8>>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| anyhow!("blob store lock poisoned"))?;
        Ok(blobs
            .get(&(container.to_string(), name.to_string()))
            .cloned())
    }

    fn exists(&self, container: &str, name: &str) -> Result<bool> {
        Ok(self.get(container, name)?.is_some())
    }

    fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>> {
        let blobs = self
            .blobs
            .read()
            .map_err(|_| anyhow!("blob store lock poisoned"))?;
        Ok(blobs
            .keys()
            .filter(|(c, n)| c == container && n.starts_with(prefix))
            .map(|(_, n)| n.clone())
            .collect())
    }
}
