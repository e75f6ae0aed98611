//! Filesystem primitives shared by the loaders.

pub mod staging;

pub use staging::{copy_tree, promote_dir_contents, unique_staging_dir};

use std::path::Path;

use crate::error::{HydrationError, HydrationResult};

/// Create a directory and its parents.
pub async fn ensure_dir(path: &Path) -> HydrationResult<()> {
    tokio::fs::create_dir_all(path).await.map_err(|e| {
        HydrationError::io(format!("Failed to create directory: {}", path.display()), e)
    })
}

/// Run blocking filesystem work off the async executor.
pub async fn blocking<T, F>(work: F) -> HydrationResult<T>
where
    F: FnOnce() -> HydrationResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        HydrationError::new(crate::error::ErrorKind::Io, "Filesystem task failed").with_source(e)
    })?
}
