//! Bridge between synchronous FUSE callbacks and the async store client.
//!
//! The runtime is single-threaded: each callback blocks the filesystem
//! thread until its remote calls finish, and calls never overlap.

use std::future::Future;
use std::sync::OnceLock;

use tokio::runtime::{Builder, Runtime};

/// Global tokio runtime for FUSE callbacks.
///
/// Stores the result of runtime creation so that initialization errors are
/// propagated without panicking.
static RUNTIME: OnceLock<Result<Runtime, String>> = OnceLock::new();

/// Initialize the async runtime for FUSE operations.
pub fn init_runtime() -> Result<&'static Runtime, FuseError> {
    let result = RUNTIME.get_or_init(|| {
        Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| e.to_string())
    });
    match result {
        Ok(rt) => Ok(rt),
        Err(e) => Err(FuseError::Runtime(format!(
            "failed to create async runtime: {}",
            e
        ))),
    }
}

/// Get the runtime, returning an error if not initialized.
pub fn runtime() -> Result<&'static Runtime, FuseError> {
    match RUNTIME.get() {
        Some(Ok(rt)) => Ok(rt),
        Some(Err(e)) => Err(FuseError::Runtime(format!(
            "async runtime failed to initialize: {}",
            e
        ))),
        None => Err(FuseError::Runtime(
            "async runtime not initialized - call init_runtime first".to_string(),
        )),
    }
}

/// Run an async operation to completion on the calling thread.
///
/// ```ignore
/// let listing = block_on(async { tree.list(path).await })??;
/// ```
pub fn block_on<F, T>(future: F) -> Result<T, FuseError>
where
    F: Future<Output = T>,
{
    let rt = runtime()?;
    Ok(rt.block_on(future))
}

/// Errors from the FUSE layer itself rather than from a tree.
#[derive(Debug, thiserror::Error)]
pub enum FuseError {
    /// The async runtime is missing or could not be built.
    #[error("{0}")]
    Runtime(String),
    /// Configuration rejected before mounting.
    #[error(transparent)]
    Config(#[from] oerpfs_config::ConfigError),
    /// Store client could not be built.
    #[error(transparent)]
    Remote(#[from] oerpfs_core::RemoteError),
    /// Mounting or serving failed.
    #[error("mount failed: {0}")]
    Io(#[from] std::io::Error),
}
