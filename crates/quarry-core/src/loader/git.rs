use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{LoadRequest, ResourceLoader, kind_mismatch};
use crate::cache::git_checkout_present;
use crate::config::GitSettings;
use crate::error::{HydrationError, HydrationResult};
use crate::fs;
use crate::process::{CommandSpec, ProcessRunner, path_arg};
use crate::resource::{GitResource, ResourceDescriptor};

/// Shallow clones and re-syncs remote repositories.
///
/// A missing checkout is cloned at depth 1 into a sibling staging directory
/// and renamed into place. An existing checkout fetches the branch at depth
/// 1 and hard-resets onto it. Sub-paths are recorded, never filtered.
#[derive(Clone)]
pub struct GitLoader {
    runner: Arc<dyn ProcessRunner>,
    settings: GitSettings,
}

impl GitLoader {
    pub fn new(runner: Arc<dyn ProcessRunner>, settings: GitSettings) -> Self {
        Self { runner, settings }
    }

    async fn clone_fresh(
        &self,
        repo: &GitResource,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> HydrationResult<()> {
        let parent = dir.parent().ok_or_else(|| {
            HydrationError::unsafe_path(format!("{} has no parent directory", dir.display()))
        })?;
        fs::ensure_dir(parent).await?;

        // Anything at the target that is not a checkout is stale.
        if dir.exists() {
            debug!(path = %dir.display(), "removing stale non-checkout directory");
            tokio::fs::remove_dir_all(dir).await.map_err(|e| {
                HydrationError::io(format!("Failed to remove {}", dir.display()), e)
            })?;
        }

        let staging = fs::unique_staging_dir(parent, "clone");
        let mut command = CommandSpec::git(&self.settings.program)
            .args(["clone", "--depth", "1", "--branch"])
            .arg(&repo.branch);
        if repo.quiet {
            command = command.arg("--quiet");
        }
        let command = command.arg(&repo.url).arg(path_arg(&staging)?);

        let result = self.run_git(&command, "clone", repo, cancel).await;
        if result.is_err() {
            match tokio::fs::remove_dir_all(&staging).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                    warn!(path = %staging.display(), error = %e, "failed to remove clone staging directory");
                }
                _ => {}
            }
            return result;
        }

        tokio::fs::rename(&staging, dir).await.map_err(|e| {
            HydrationError::io(
                format!("Failed to move clone into {}", dir.display()),
                e,
            )
        })
    }

    async fn resync(
        &self,
        repo: &GitResource,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> HydrationResult<()> {
        let mut fetch = CommandSpec::git(&self.settings.program)
            .args(["fetch", "--depth", "1"]);
        if repo.quiet {
            fetch = fetch.arg("--quiet");
        }
        let fetch = fetch.arg("origin").arg(&repo.branch).current_dir(dir);
        self.run_git(&fetch, "fetch", repo, cancel).await?;

        let mut reset = CommandSpec::git(&self.settings.program).args(["reset", "--hard"]);
        if repo.quiet {
            reset = reset.arg("--quiet");
        }
        let reset = reset.arg("FETCH_HEAD").current_dir(dir);
        self.run_git(&reset, "reset", repo, cancel).await
    }

    async fn run_git(
        &self,
        command: &CommandSpec,
        action: &str,
        repo: &GitResource,
        cancel: &CancellationToken,
    ) -> HydrationResult<()> {
        let output = self.runner.run(command, cancel).await?;
        if output.success() {
            return Ok(());
        }
        Err(HydrationError::process(format!(
            "git {action} of {} (branch {}) failed with exit code {}",
            repo.url, repo.branch, output.exit_code
        ))
        .with_hint("Check the repository URL, branch name and your access to it")
        .with_source(output.failure(command)))
    }
}

#[async_trait]
impl ResourceLoader for GitLoader {
    async fn load(
        &self,
        request: &LoadRequest,
        cancel: &CancellationToken,
    ) -> HydrationResult<PathBuf> {
        let ResourceDescriptor::Git(repo) = &request.descriptor else {
            return Err(kind_mismatch("git", request));
        };
        let dir = &request.dir;

        if git_checkout_present(dir) {
            info!(url = %repo.url, branch = %repo.branch, "re-syncing checkout");
            self.resync(repo, dir, cancel).await?;
        } else {
            info!(url = %repo.url, branch = %repo.branch, "cloning");
            self.clone_fresh(repo, dir, cancel).await?;
        }
        Ok(dir.clone())
    }
}
