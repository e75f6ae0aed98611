//! Staged package installs.
//!
//! The package manager runs inside a scratch directory under the resource
//! directory against a throwaway manifest. Only a verified package
//! directory is promoted; the scratch directory is removed on every path.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::spec::NpmPackage;
use crate::config::InstallSettings;
use crate::error::{ErrorKind, HydrationError, HydrationResult};
use crate::fs;
use crate::process::{CommandSpec, ProcessRunner};

/// Label used in scratch directory names.
const STAGING_LABEL: &str = "install";

/// Install `package@version` and promote its contents into `resource_dir`.
pub async fn install_package(
    runner: &dyn ProcessRunner,
    settings: &InstallSettings,
    package: &NpmPackage,
    version: &str,
    resource_dir: &Path,
    cancel: &CancellationToken,
) -> HydrationResult<()> {
    fs::ensure_dir(resource_dir).await?;
    let scratch = fs::unique_staging_dir(resource_dir, STAGING_LABEL);
    fs::ensure_dir(&scratch).await?;

    let result = stage_and_promote(runner, settings, package, version, resource_dir, &scratch, cancel).await;

    match tokio::fs::remove_dir_all(&scratch).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            warn!(path = %scratch.display(), error = %e, "failed to remove install scratch directory");
        }
        _ => {}
    }
    result
}

async fn stage_and_promote(
    runner: &dyn ProcessRunner,
    settings: &InstallSettings,
    package: &NpmPackage,
    version: &str,
    resource_dir: &Path,
    scratch: &Path,
    cancel: &CancellationToken,
) -> HydrationResult<()> {
    let spec = format!("{}@{}", package.full_name(), version);

    write_manifest(scratch, package, version).await?;

    let command = CommandSpec::new(settings.program())
        .args(settings.package_manager.add_exact_args(&spec))
        .current_dir(scratch);
    let output = runner.run(&command, cancel).await.map_err(|e| {
        if e.kind() == ErrorKind::Cancelled {
            e
        } else {
            HydrationError::process(format!("Failed to install {spec}"))
                .with_hint("Check that the package manager is installed")
                .with_source(e)
        }
    })?;
    if !output.success() {
        return Err(HydrationError::process(format!(
            "Failed to install {spec} (exit code {})",
            output.exit_code
        ))
        .with_hint("Clear the cached resource and retry")
        .with_source(output.failure(&command)));
    }

    let installed = package.node_modules_path(scratch);
    if !installed.is_dir() {
        return Err(HydrationError::verification(format!(
            "Install of {spec} reported success but {} is missing",
            installed.display()
        ))
        .with_hint("The install may have been interrupted; retry the request"));
    }
    debug!(package = %spec, path = %installed.display(), "install verified, promoting");

    let keep = vec![scratch_name(scratch)];
    let from = installed.clone();
    let into: PathBuf = resource_dir.to_path_buf();
    fs::blocking(move || fs::promote_dir_contents(&from, &into, &keep)).await
}

/// Minimal manifest naming only the target package at its exact version.
async fn write_manifest(scratch: &Path, package: &NpmPackage, version: &str) -> HydrationResult<()> {
    let manifest = serde_json::json!({
        "name": "quarry-staging",
        "private": true,
        "dependencies": { (package.full_name()): version },
    });
    let path = scratch.join("package.json");
    let bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| HydrationError::parse("Failed to serialize staging manifest").with_source(e))?;
    tokio::fs::write(&path, bytes).await.map_err(|e| {
        HydrationError::io(format!("Failed to write {}", path.display()), e)
    })
}

fn scratch_name(scratch: &Path) -> OsString {
    scratch.file_name().map(OsString::from).unwrap_or_default()
}
