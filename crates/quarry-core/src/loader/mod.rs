//! Kind-specific hydration strategies and the facade that dispatches to them.

mod facade;
mod git;
mod local;
mod npm;

pub use facade::ResourceLoaderFacade;
pub use git::GitLoader;
pub use local::LocalLoader;
pub use npm::NpmLoader;

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::HydrationResult;
use crate::resource::ResourceDescriptor;

/// One hydration, as handed to a loader.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub descriptor: ResourceDescriptor,
    /// Citation key of the resource.
    pub key: String,
    /// Directory the loader owns for this resource. Ignored by loaders
    /// whose content already lives elsewhere.
    pub dir: PathBuf,
}

/// A hydration strategy for one descriptor kind.
///
/// Returns the directory holding the hydrated content.
#[async_trait]
pub trait ResourceLoader: Send + Sync {
    async fn load(
        &self,
        request: &LoadRequest,
        cancel: &CancellationToken,
    ) -> HydrationResult<PathBuf>;
}

fn kind_mismatch(loader: &str, request: &LoadRequest) -> crate::error::HydrationError {
    crate::error::HydrationError::invalid_descriptor(format!(
        "The {loader} loader cannot hydrate {} resource '{}'",
        request.descriptor.kind(),
        request.descriptor.name()
    ))
}
