//! Stage-then-promote helpers.
//!
//! Work lands in a scratch directory first and is only moved into the
//! resource directory once verified, so a half-finished fetch or install is
//! never visible under its final name.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::error::{HydrationError, HydrationResult};

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fresh, not-yet-existing scratch path under `parent`.
///
/// Names embed the process id and a per-process counter, so concurrent
/// requests and concurrent processes never share a scratch directory.
pub fn unique_staging_dir(parent: &Path, label: &str) -> PathBuf {
    loop {
        let n = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
        let candidate = parent.join(format!(".{}-staging-{}-{}", label, std::process::id(), n));
        if !candidate.exists() {
            return candidate;
        }
    }
}

/// Replace the contents of `into` with the contents of `from`.
///
/// Entries of `into` whose names appear in `keep` are left alone (the
/// staging directory itself usually lives there). Each entry is moved with
/// a rename, falling back to a copy when `from` and `into` sit on different
/// filesystems.
pub fn promote_dir_contents(from: &Path, into: &Path, keep: &[OsString]) -> HydrationResult<()> {
    std::fs::create_dir_all(into).map_err(|e| {
        HydrationError::io(format!("Failed to create directory: {}", into.display()), e)
    })?;

    for entry in read_dir(into)? {
        if keep.contains(&entry.file_name()) {
            continue;
        }
        remove_entry(&entry.path())?;
    }

    for entry in read_dir(from)? {
        let src = entry.path();
        let dst = into.join(entry.file_name());
        if std::fs::rename(&src, &dst).is_ok() {
            continue;
        }
        debug!(src = %src.display(), "rename failed, copying instead");
        let file_type = entry.file_type().map_err(|e| {
            HydrationError::io(format!("Failed to stat {}", src.display()), e)
        })?;
        if file_type.is_dir() {
            copy_tree(&src, &dst)?;
        } else if file_type.is_file() {
            copy_file(&src, &dst)?;
        }
    }
    Ok(())
}

/// Recursively copy `src` into `dst`. Symlinks are skipped.
pub fn copy_tree(src: &Path, dst: &Path) -> HydrationResult<()> {
    std::fs::create_dir_all(dst).map_err(|e| {
        HydrationError::io(format!("Failed to create directory: {}", dst.display()), e)
    })?;
    for entry in read_dir(src)? {
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| {
            HydrationError::io(format!("Failed to stat {}", src_path.display()), e)
        })?;
        if file_type.is_dir() {
            copy_tree(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            copy_file(&src_path, &dst_path)?;
        } else {
            debug!(path = %src_path.display(), "skipping symlink");
        }
    }
    Ok(())
}

fn copy_file(src: &Path, dst: &Path) -> HydrationResult<()> {
    std::fs::copy(src, dst).map(|_| ()).map_err(|e| {
        HydrationError::io(
            format!("Failed to copy {} to {}", src.display(), dst.display()),
            e,
        )
    })
}

fn read_dir(dir: &Path) -> HydrationResult<Vec<std::fs::DirEntry>> {
    std::fs::read_dir(dir)
        .and_then(|entries| entries.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HydrationError::io(format!("Failed to read directory: {}", dir.display()), e))
}

fn remove_entry(path: &Path) -> HydrationResult<()> {
    let meta = std::fs::symlink_metadata(path)
        .map_err(|e| HydrationError::io(format!("Failed to stat {}", path.display()), e))?;
    let result = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| HydrationError::io(format!("Failed to remove {}", path.display()), e))
}
