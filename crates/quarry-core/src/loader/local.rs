use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{LoadRequest, ResourceLoader, kind_mismatch};
use crate::error::{HydrationError, HydrationResult};
use crate::resource::ResourceDescriptor;

/// Serves directories already on this machine. Nothing is copied, and the
/// engine never owns (or removes) the path.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalLoader;

#[async_trait]
impl ResourceLoader for LocalLoader {
    async fn load(
        &self,
        request: &LoadRequest,
        _cancel: &CancellationToken,
    ) -> HydrationResult<PathBuf> {
        let ResourceDescriptor::Local(local) = &request.descriptor else {
            return Err(kind_mismatch("local", request));
        };
        let path = &local.path;

        let meta = tokio::fs::metadata(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                HydrationError::not_found(format!(
                    "Local resource '{}' does not exist: {}",
                    local.common.name,
                    path.display()
                ))
            } else {
                HydrationError::io(format!("Failed to stat {}", path.display()), e)
            }
        })?;
        if !meta.is_dir() {
            return Err(HydrationError::invalid_descriptor(format!(
                "Local resource '{}' is not a directory: {}",
                local.common.name,
                path.display()
            )));
        }
        tokio::fs::read_dir(path).await.map_err(|e| {
            HydrationError::io(format!("Local resource is not readable: {}", path.display()), e)
        })?;

        debug!(path = %path.display(), "local resource ready");
        Ok(path.clone())
    }
}
