use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{LoadRequest, ResourceLoader, kind_mismatch};
use crate::cache::{CacheMeta, can_reuse_npm};
use crate::config::{InstallSettings, RegistrySettings};
use crate::error::{HydrationError, HydrationResult};
use crate::net::NetworkFetcher;
use crate::npm::{
    self, LISTING_FILE, NpmPackage, OVERVIEW_FILE, OverviewInput, fetch_listing_page,
    install_package, render_overview, resolve_version,
};
use crate::process::ProcessRunner;
use crate::resource::ResourceDescriptor;

/// Hydrates npm registry packages.
///
/// Pinned, persistent requests are served from the directory when its cache
/// metadata matches. Everything else resolves the version against the
/// registry, installs into a scratch directory, promotes the package and
/// writes the overview, listing page and cache metadata beside it.
#[derive(Clone)]
pub struct NpmLoader {
    runner: Arc<dyn ProcessRunner>,
    fetcher: Arc<dyn NetworkFetcher>,
    registry: RegistrySettings,
    install: InstallSettings,
}

impl NpmLoader {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        fetcher: Arc<dyn NetworkFetcher>,
        registry: RegistrySettings,
        install: InstallSettings,
    ) -> Self {
        Self {
            runner,
            fetcher,
            registry,
            install,
        }
    }

    async fn write_artifact(dir: &Path, file: &str, content: &str) -> HydrationResult<()> {
        let path = dir.join(file);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| HydrationError::io(format!("Failed to write {}", path.display()), e))
    }
}

#[async_trait]
impl ResourceLoader for NpmLoader {
    async fn load(
        &self,
        request: &LoadRequest,
        cancel: &CancellationToken,
    ) -> HydrationResult<PathBuf> {
        let ResourceDescriptor::Npm(resource) = &request.descriptor else {
            return Err(kind_mismatch("npm", request));
        };
        let dir = &request.dir;
        let package = NpmPackage::parse(&resource.package)?;
        let package_name = package.full_name();
        let requested = resource.version.as_deref();

        let meta = CacheMeta::read(dir).await;
        if can_reuse_npm(&package_name, requested, resource.common.ephemeral, meta.as_ref()) {
            info!(package = %package_name, version = ?requested, "cache hit");
            return Ok(dir.clone());
        }
        debug!(package = %package_name, version = ?requested, "cache miss");

        let document = npm::fetch_document(
            self.fetcher.as_ref(),
            &self.registry.url,
            &package,
            cancel,
        )
        .await?;
        let resolved = resolve_version(&document, requested)?;
        info!(package = %package_name, version = %resolved, "installing");

        install_package(
            self.runner.as_ref(),
            &self.install,
            &package,
            &resolved,
            dir,
            cancel,
        )
        .await?;

        let package_url = npm::package_url(&self.registry.website_url, &package);
        let listing_url = npm::listing_url(&self.registry.website_url, &package, &resolved);
        let metadata_url = npm::metadata_url(&self.registry.url, &package);

        let listing =
            fetch_listing_page(self.fetcher.as_ref(), &listing_url, &package_name, cancel).await?;

        let overview = render_overview(&OverviewInput {
            package_name: &package_name,
            resolved_version: &resolved,
            package_url: &package_url,
            listing_url: &listing_url,
            metadata_url: &metadata_url,
            manifest: document.versions.get(&resolved),
        });

        Self::write_artifact(dir, OVERVIEW_FILE, &overview).await?;
        Self::write_artifact(dir, LISTING_FILE, &listing).await?;
        CacheMeta {
            package_name,
            requested_version: requested.map(str::to_string),
            resolved_version: resolved,
            package_url,
            listing_url,
            fetched_at: Utc::now(),
        }
        .write(dir)
        .await?;

        Ok(dir.clone())
    }
}
