// Error kinds surfaced by the upload workflow. The three domain variants
// carry a human readable message that the UI shows verbatim.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A required input is missing: name, files or repository settings.
    #[error("{0}")]
    Validation(String),

    /// Initializing, re-pointing or fetching the local checkout failed.
    #[error("{0}")]
    RepositorySync(String),

    /// Staging, committing or pushing failed.
    #[error("{0}")]
    Push(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
