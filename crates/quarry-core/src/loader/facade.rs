use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{GitLoader, LoadRequest, LocalLoader, NpmLoader, ResourceLoader};
use crate::cache::KeyLocks;
use crate::config::EngineConfig;
use crate::error::{HydrationError, HydrationResult};
use crate::naming::directory_name;
use crate::net::{HttpFetcher, NetworkFetcher};
use crate::process::{ProcessRunner, SystemProcessRunner};
use crate::resource::{EphemeralCleanup, HydratedResource, ResourceDescriptor};
use crate::safety::SafetyGuard;

/// Single entry point turning descriptors into hydrated resources.
///
/// Dispatches on the descriptor kind, so callers never need kind-specific
/// knowledge. Owned directories are checked by the [`SafetyGuard`] and
/// hydrated under a per-directory lock.
pub struct ResourceLoaderFacade {
    config: EngineConfig,
    resources_root: PathBuf,
    guard: SafetyGuard,
    locks: KeyLocks,
    git: GitLoader,
    npm: NpmLoader,
    local: LocalLoader,
}

impl ResourceLoaderFacade {
    pub fn new(
        config: EngineConfig,
        runner: Arc<dyn ProcessRunner>,
        fetcher: Arc<dyn NetworkFetcher>,
        guard: SafetyGuard,
    ) -> HydrationResult<Self> {
        config.validate()?;
        let resources_root = config.resources_root()?;
        Ok(Self {
            git: GitLoader::new(runner.clone(), config.git.clone()),
            npm: NpmLoader::new(
                runner,
                fetcher,
                config.registry.clone(),
                config.install.clone(),
            ),
            local: LocalLoader,
            resources_root,
            guard,
            locks: KeyLocks::new(),
            config,
        })
    }

    /// Wire up the system process runner and HTTP client.
    pub fn from_config(config: EngineConfig) -> HydrationResult<Self> {
        let fetcher = HttpFetcher::new(config.http.timeout(), &config.http.user_agent)?;
        let guard = SafetyGuard::new(dirs::home_dir(), config.project_root()?);
        Self::new(config, Arc::new(SystemProcessRunner), Arc::new(fetcher), guard)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resources_root(&self) -> &Path {
        &self.resources_root
    }

    /// Directory an owned resource hydrates into; `None` for local ones.
    pub fn resource_dir(&self, descriptor: &ResourceDescriptor) -> Option<PathBuf> {
        if matches!(descriptor, ResourceDescriptor::Local(_)) {
            return None;
        }
        Some(self.base_dir(descriptor).join(directory_name(&descriptor.resource_key())))
    }

    /// Parent of a resource's directory: the ephemeral root or the
    /// resources root.
    fn base_dir(&self, descriptor: &ResourceDescriptor) -> PathBuf {
        if descriptor.is_ephemeral() {
            self.resources_root.join(crate::config::EPHEMERAL_DIR)
        } else {
            self.resources_root.clone()
        }
    }

    /// Hydrate one descriptor.
    ///
    /// Ephemeral registry and git resources come back with a cleanup
    /// attached; the caller runs it once the owning request completes. If
    /// hydration of an ephemeral resource fails, its directory is removed
    /// immediately.
    pub async fn hydrate(
        &self,
        descriptor: &ResourceDescriptor,
        cancel: &CancellationToken,
    ) -> HydrationResult<HydratedResource> {
        descriptor.validate()?;
        let key = descriptor.resource_key();
        info!(name = descriptor.name(), kind = %descriptor.kind(), "hydrating");

        let Some(dir) = self.resource_dir(descriptor) else {
            let request = LoadRequest {
                descriptor: descriptor.clone(),
                key: key.clone(),
                dir: PathBuf::new(),
            };
            let path = self.local.load(&request, cancel).await?;
            info!(name = descriptor.name(), path = %path.display(), "hydrated");
            return Ok(HydratedResource::new(descriptor, key, path));
        };

        self.guard.check_within(&self.base_dir(descriptor), &dir)?;
        let request = LoadRequest {
            descriptor: descriptor.clone(),
            key: key.clone(),
            dir: dir.clone(),
        };

        let loaded = {
            let _lock = self.locks.acquire(&dir).await;
            match descriptor {
                ResourceDescriptor::Git(_) => self.git.load(&request, cancel).await,
                ResourceDescriptor::Npm(_) => self.npm.load(&request, cancel).await,
                ResourceDescriptor::Local(_) => self.local.load(&request, cancel).await,
            }
        };

        let path = match loaded {
            Ok(path) => path,
            Err(e) => {
                if descriptor.is_ephemeral()
                    && let Err(cleanup_err) = self.guard.remove_dir(&dir).await
                {
                    warn!(path = %dir.display(), error = %cleanup_err, "failed to remove ephemeral directory");
                }
                return Err(e);
            }
        };
        info!(name = descriptor.name(), path = %path.display(), "hydrated");

        let hydrated = HydratedResource::new(descriptor, key, path);
        if descriptor.is_ephemeral() {
            return Ok(hydrated.with_cleanup(EphemeralCleanup::new(dir, self.guard.clone())));
        }
        Ok(hydrated)
    }

    /// Hydrate a configured resource by name.
    pub async fn hydrate_named(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> HydrationResult<HydratedResource> {
        let descriptor = self.config.find_resource(name).ok_or_else(|| {
            HydrationError::not_found(format!("No resource named '{name}' is configured"))
                .with_hint("Run `quarry list` to see configured resources")
        })?;
        self.hydrate(descriptor, cancel).await
    }

    /// Hydrate every configured resource in order, stopping at the first
    /// failure.
    pub async fn hydrate_all(
        &self,
        cancel: &CancellationToken,
    ) -> HydrationResult<Vec<HydratedResource>> {
        let mut hydrated = Vec::with_capacity(self.config.resources.len());
        for descriptor in &self.config.resources {
            hydrated.push(self.hydrate(descriptor, cancel).await?);
        }
        Ok(hydrated)
    }

    /// Remove the on-disk directory of a configured resource.
    ///
    /// Local resources are never removed.
    pub async fn remove(&self, name: &str) -> HydrationResult<()> {
        let descriptor = self.config.find_resource(name).ok_or_else(|| {
            HydrationError::not_found(format!("No resource named '{name}' is configured"))
        })?;
        let Some(dir) = self.resource_dir(descriptor) else {
            return Ok(());
        };
        self.guard.check_within(&self.base_dir(descriptor), &dir)?;
        let _lock = self.locks.acquire(&dir).await;
        self.guard.remove_dir(&dir).await
    }

    /// Wipe the whole resources root, ephemeral resources included.
    pub async fn clear_all(&self) -> HydrationResult<()> {
        info!(path = %self.resources_root.display(), "clearing all resources");
        self.guard.remove_dir(&self.resources_root).await
    }

    /// Remove leftover ephemeral resources, e.g. after a crash.
    pub async fn clear_ephemeral(&self) -> HydrationResult<()> {
        let root = self.resources_root.join(crate::config::EPHEMERAL_DIR);
        self.guard.remove_dir(&root).await
    }
}
