//! Filesystem-backed blob store: one directory per container.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use super::{check_name, BlobStore};

pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, container: &str, name: &str) -> Result<PathBuf> {
        check_name(container)?;
        check_name(name)?;
        Ok(self.root.join(container).join(name))
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, container: &str, name: &str, data: &[u8]) -> Result<()> {
        let path = self.blob_path(container, name)?;
        let dir = self.root.join(container);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create container {}", dir.display()))?;

        // Write-then-rename so readers never observe a partial blob
        let tmp = dir.join(format!(".{}.tmp", name));
        fs::write(&tmp, data).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move blob into {}", path.display()))?;

        debug!("Stored {} bytes at {}/{}", data.len(), container, name);
        Ok(())
    }

    fn get(&self, container: &str, name: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(container, name)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    fn exists(&self, container: &str, name: &str) -> Result<bool> {
        Ok(self.blob_path(container, name)?.is_file())
    }

    fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>> {
        check_name(container)?;
        let dir = self.root.join(container);

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", dir.display()))
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(prefix) && !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
