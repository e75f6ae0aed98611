//! Guards destructive filesystem operations.
//!
//! Before anything under the resources root is re-fetched or wiped, the
//! target must not resolve to a filesystem root, the home directory, the
//! active project root, or an ancestor of either.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{HydrationError, HydrationResult};

/// Decides whether a path may be written into or deleted.
#[derive(Debug, Clone)]
pub struct SafetyGuard {
    home_dir: Option<PathBuf>,
    project_root: PathBuf,
}

impl SafetyGuard {
    pub fn new(home_dir: Option<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            home_dir: home_dir.map(|p| resolve(&p)),
            project_root: resolve(&project_root.into()),
        }
    }

    /// Guard for the current user and working directory.
    pub fn for_current_dir() -> HydrationResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| HydrationError::io("Failed to read current directory", e))?;
        Ok(Self::new(dirs::home_dir(), cwd))
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Reject targets that would destroy something the engine does not own.
    pub fn check(&self, target: &Path) -> HydrationResult<()> {
        let resolved = resolve(target);

        if resolved.parent().is_none() {
            return Err(refuse(target, "it is a filesystem root"));
        }

        if let Some(home) = &self.home_dir {
            if &resolved == home {
                return Err(refuse(target, "it is the home directory"));
            }
            if contains(&resolved, home) {
                return Err(refuse(target, "it contains the home directory"));
            }
        }

        if resolved == self.project_root {
            return Err(refuse(target, "it is the active project root"));
        }
        if contains(&resolved, &self.project_root) {
            return Err(refuse(target, "it is an ancestor of the active project root"));
        }

        Ok(())
    }

    /// Like [`check`](Self::check), and additionally require `target` to lie
    /// strictly inside `base`.
    ///
    /// Used for per-resource directories, which must never resolve to the
    /// resources root itself or escape it.
    pub fn check_within(&self, base: &Path, target: &Path) -> HydrationResult<()> {
        let resolved_base = resolve(base);
        let resolved = resolve(target);
        if resolved == resolved_base {
            return Err(refuse(target, "it is the resources root itself"));
        }
        if !contains(&resolved_base, &resolved) {
            return Err(refuse(
                target,
                &format!("it is outside {}", base.display()),
            ));
        }
        self.check(target)
    }

    /// Check the target, then remove it recursively.
    ///
    /// Removing a path that does not exist is a no-op.
    pub async fn remove_dir(&self, target: &Path) -> HydrationResult<()> {
        self.check(target)?;
        match tokio::fs::remove_dir_all(target).await {
            Ok(()) => {
                debug!(path = %target.display(), "removed directory");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(HydrationError::io(
                format!("Failed to remove directory: {}", target.display()),
                e,
            )),
        }
    }
}

fn refuse(target: &Path, reason: &str) -> HydrationError {
    HydrationError::unsafe_path(format!(
        "Refusing to modify {}: {}",
        target.display(),
        reason
    ))
    .with_hint("Point the resources root at a dedicated directory")
}

/// True when `other` lies strictly inside `ancestor`.
///
/// Equivalent to the relative path from `ancestor` to `other` being
/// non-empty and not starting with `..`.
fn contains(ancestor: &Path, other: &Path) -> bool {
    other != ancestor && other.starts_with(ancestor)
}

/// Absolute and lexically normalized, with the deepest existing ancestor
/// canonicalized so existing and not-yet-created paths compare alike.
fn resolve(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let normalized = normalize(&absolute);

    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(canonical) = std::fs::canonicalize(existing) {
            return missing
                .iter()
                .rev()
                .fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Resolve `.` and `..` without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
