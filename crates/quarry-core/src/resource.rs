//! Resource descriptors and the hydrated-resource contract.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HydrationError, HydrationResult};
use crate::naming;
use crate::safety::SafetyGuard;

/// Default branch for git resources that do not name one.
pub const DEFAULT_BRANCH: &str = "main";

/// Fields shared by every descriptor kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCommon {
    /// Stable identifier, unique within the active configuration.
    pub name: String,
    /// Opaque text passed through to the downstream consumer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub special_agent_instructions: String,
    /// Discovered inline in a single request; removed when it completes.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ephemeral: bool,
    /// Overrides the derived on-disk folder name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_directory_key: Option<String>,
}

/// A remote version-controlled repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitResource {
    #[serde(flatten)]
    pub common: ResourceCommon,
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Subdirectories the indexer should later restrict itself to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repo_sub_paths: Vec<String>,
    #[serde(default)]
    pub quiet: bool,
}

/// A package published to the npm registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpmResource {
    #[serde(flatten)]
    pub common: ResourceCommon,
    /// Package name, possibly scoped (`@scope/name`).
    pub package: String,
    /// Explicit version or dist-tag; `None` means latest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// A directory already present on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalResource {
    #[serde(flatten)]
    pub common: ResourceCommon,
    /// Already-resolved path.
    pub path: PathBuf,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

/// What to hydrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResourceDescriptor {
    Git(GitResource),
    Npm(NpmResource),
    Local(LocalResource),
}

/// Kind tag of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Git,
    Npm,
    Local,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Npm => write!(f, "npm"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl ResourceDescriptor {
    pub fn common(&self) -> &ResourceCommon {
        match self {
            Self::Git(r) => &r.common,
            Self::Npm(r) => &r.common,
            Self::Local(r) => &r.common,
        }
    }

    pub fn name(&self) -> &str {
        &self.common().name
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Git(_) => ResourceKind::Git,
            Self::Npm(_) => ResourceKind::Npm,
            Self::Local(_) => ResourceKind::Local,
        }
    }

    pub fn is_ephemeral(&self) -> bool {
        self.common().ephemeral
    }

    /// Citation-safe key, also the basis of the on-disk folder name.
    ///
    /// Named resources use their sanitized name; an explicit directory key
    /// is sanitized the same way. Anonymous ones derive the
    /// key from what they point at so two requests for the same package or
    /// repository share a folder and different ones never collide.
    pub fn resource_key(&self) -> String {
        let common = self.common();
        if let Some(key) = &common.local_directory_key {
            return naming::sanitize_override(key);
        }
        if common.ephemeral {
            match self {
                Self::Npm(r) => return naming::anonymous_npm_key(&r.package, r.version.as_deref()),
                Self::Git(r) => return naming::anonymous_git_key(&r.url),
                Self::Local(_) => {}
            }
        }
        naming::sanitize_key(&common.name)
    }

    /// Sub-paths recorded for the indexer; only git resources carry them.
    pub fn repo_sub_paths(&self) -> &[String] {
        match self {
            Self::Git(r) => &r.repo_sub_paths,
            _ => &[],
        }
    }

    /// Reject descriptors that cannot possibly hydrate.
    pub fn validate(&self) -> HydrationResult<()> {
        if self.name().trim().is_empty() {
            return Err(HydrationError::invalid_descriptor(
                "Resource name cannot be empty",
            ));
        }
        match self {
            Self::Git(r) => {
                if r.url.trim().is_empty() {
                    return Err(HydrationError::invalid_descriptor(format!(
                        "Git resource '{}' is missing a url",
                        r.common.name
                    )));
                }
                if r.branch.trim().is_empty() {
                    return Err(HydrationError::invalid_descriptor(format!(
                        "Git resource '{}' has an empty branch",
                        r.common.name
                    )));
                }
                if let Some(bad) = r
                    .repo_sub_paths
                    .iter()
                    .find(|p| Path::new(p).is_absolute() || p.split('/').any(|s| s == ".."))
                {
                    return Err(HydrationError::invalid_descriptor(format!(
                        "Git resource '{}' has a sub-path outside the repository: {}",
                        r.common.name, bad
                    )));
                }
            }
            Self::Npm(r) => {
                if r.package.trim().is_empty() {
                    return Err(HydrationError::invalid_descriptor(format!(
                        "Package resource '{}' is missing a package name",
                        r.common.name
                    )));
                }
            }
            Self::Local(r) => {
                if r.path.as_os_str().is_empty() {
                    return Err(HydrationError::invalid_descriptor(format!(
                        "Local resource '{}' is missing a path",
                        r.common.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Removes an ephemeral resource's directory once its request completes.
///
/// Running it more than once is a no-op.
#[derive(Debug, Clone)]
pub struct EphemeralCleanup {
    path: PathBuf,
    guard: SafetyGuard,
}

impl EphemeralCleanup {
    pub(crate) fn new(path: PathBuf, guard: SafetyGuard) -> Self {
        Self { path, guard }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort recursive removal.
    pub async fn run(&self) -> HydrationResult<()> {
        self.guard.remove_dir(&self.path).await
    }
}

/// Uniform output of every loader, consumed by the indexing layer.
#[derive(Debug, Clone)]
pub struct HydratedResource {
    pub name: String,
    /// Sanitized alias used for citations and the on-disk folder.
    pub fs_name: String,
    pub kind: ResourceKind,
    pub repo_sub_paths: Vec<String>,
    pub special_agent_instructions: String,
    path: PathBuf,
    cleanup: Option<EphemeralCleanup>,
}

impl HydratedResource {
    pub(crate) fn new(descriptor: &ResourceDescriptor, fs_name: String, path: PathBuf) -> Self {
        let common = descriptor.common();
        Self {
            name: common.name.clone(),
            fs_name,
            kind: descriptor.kind(),
            repo_sub_paths: descriptor.repo_sub_paths().to_vec(),
            special_agent_instructions: common.special_agent_instructions.clone(),
            path,
            cleanup: None,
        }
    }

    pub(crate) fn with_cleanup(mut self, cleanup: EphemeralCleanup) -> Self {
        self.cleanup = Some(cleanup);
        self
    }

    /// Absolute directory holding the hydrated content.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Present only on ephemeral resources the engine owns.
    pub fn cleanup(&self) -> Option<&EphemeralCleanup> {
        self.cleanup.as_ref()
    }

    pub fn is_ephemeral(&self) -> bool {
        self.cleanup.is_some()
    }
}
