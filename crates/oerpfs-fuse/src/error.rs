use oerpfs_core::RemoteError;
use thiserror::Error;

/// Errors raised by the tree engines.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("no such entry: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("read-only tree: {0}")]
    ReadOnly(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("import into '{model}' failed: {source}")]
    Import {
        model: String,
        #[source]
        source: ImportError,
    },
}

/// Why an uploaded file did not make it into the store.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("file is empty, expected a header row")]
    Empty,

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("store refused the data: {0}")]
    Rejected(String),

    #[error(transparent)]
    Remote(RemoteError),
}

impl TreeError {
    pub(crate) fn import(model: &str, source: ImportError) -> Self {
        TreeError::Import {
            model: model.to_string(),
            source,
        }
    }
}
