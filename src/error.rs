//! Typed failures returned by the pipeline core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed input, missing required fields, or out-of-range coordinates
    #[error("validation failed: {0}")]
    Validation(String),

    /// Route synthesis needs at least two usable points
    #[error("at least 2 points are needed to build a route, found {found}")]
    InsufficientData { found: usize },

    /// A referenced collection does not exist in the store
    #[error("'{name}' not found in container '{container}'")]
    NotFound { container: String, name: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
