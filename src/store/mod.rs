//! Blob storage for feature collections.
//!
//! Blobs are addressed by a container name plus a blob name. The pipeline core never
//! touches the store; only the glue in [`crate::pipeline`] does.

mod fs;
mod memory;

use anyhow::Result;

use crate::error::PipelineError;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

/// Named-container object store
pub trait BlobStore: Send + Sync {
    /// Write a blob, replacing any previous content. Creates the container if needed.
    fn put(&self, container: &str, name: &str, data: &[u8]) -> Result<()>;

    /// Read a blob, `None` if it does not exist
    fn get(&self, container: &str, name: &str) -> Result<Option<Vec<u8>>>;

    fn exists(&self, container: &str, name: &str) -> Result<bool>;

    /// Names in a container starting with `prefix`, sorted
    fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>>;
}

/// Reject names that could escape their container
pub(crate) fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(PipelineError::Validation(format!(
            "invalid blob or container name: '{}'",
            name
        ))
        .into());
    }
    Ok(())
}
