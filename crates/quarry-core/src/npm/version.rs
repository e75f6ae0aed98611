//! Version and dist-tag resolution against a registry document.

use tracing::debug;

use super::types::PackageDocument;
use crate::error::{HydrationError, HydrationResult};

/// Tag resolved when no version is requested.
pub const LATEST_TAG: &str = "latest";

/// Resolve a requested version or tag to a published version.
///
/// No request resolves the `latest` tag. Otherwise an exact published
/// version wins over a tag of the same spelling.
pub fn resolve_version(
    document: &PackageDocument,
    requested: Option<&str>,
) -> HydrationResult<String> {
    let Some(requested) = requested else {
        return document
            .dist_tags
            .get(LATEST_TAG)
            .cloned()
            .ok_or_else(|| {
                HydrationError::version_not_found(format!(
                    "Package {} has no \"{LATEST_TAG}\" tag",
                    document.name
                ))
                .with_hint("Request an explicit version")
            });
    };

    if document.versions.contains_key(requested) {
        debug!(package = %document.name, version = requested, "exact version match");
        return Ok(requested.to_string());
    }
    if let Some(version) = document.dist_tags.get(requested) {
        debug!(package = %document.name, tag = requested, version = %version, "resolved tag");
        return Ok(version.clone());
    }

    let mut tags: Vec<&str> = document.dist_tags.keys().map(String::as_str).collect();
    tags.sort_unstable();
    Err(HydrationError::version_not_found(format!(
        "Version or tag \"{requested}\" not found for package {}",
        document.name
    ))
    .with_hint(format!("Available tags: {}", tags.join(", "))))
}
