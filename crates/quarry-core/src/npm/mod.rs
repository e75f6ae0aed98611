//! npm registry packages: metadata, version resolution, staged installs and
//! the artifacts written beside them.

pub mod install;
pub mod listing;
pub mod overview;
pub mod spec;
pub mod types;
pub mod version;

pub use install::install_package;
pub use listing::{LISTING_UNAVAILABLE, fetch_listing_page};
pub use overview::{OverviewInput, render_overview};
pub use spec::{NpmPackage, NpmSpec};
pub use types::{PackageDocument, VersionManifest};
pub use version::resolve_version;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{HydrationError, HydrationResult};
use crate::net::{ACCEPT_JSON, FetchFailure, NetworkFetcher};

/// Generated overview document.
pub const OVERVIEW_FILE: &str = "PACKAGE_OVERVIEW.md";

/// Captured listing page (or its placeholder).
pub const LISTING_FILE: &str = "npm-page.html";

/// Registry metadata URL for a package.
pub fn metadata_url(registry_url: &str, package: &NpmPackage) -> String {
    format!("{}/{}", registry_url.trim_end_matches('/'), package.registry_path())
}

/// Public package page.
pub fn package_url(website_url: &str, package: &NpmPackage) -> String {
    format!("{}/package/{}", website_url.trim_end_matches('/'), package.full_name())
}

/// Public page of one published version.
pub fn listing_url(website_url: &str, package: &NpmPackage, version: &str) -> String {
    format!("{}/v/{}", package_url(website_url, package), version)
}

/// Fetch and decode the full registry document.
pub async fn fetch_document(
    fetcher: &dyn NetworkFetcher,
    registry_url: &str,
    package: &NpmPackage,
    cancel: &CancellationToken,
) -> HydrationResult<PackageDocument> {
    let url = metadata_url(registry_url, package);
    debug!(url = %url, "fetching registry document");

    let response = match fetcher.get(&url, Some(ACCEPT_JSON), cancel).await {
        Ok(response) => response,
        Err(FetchFailure::Cancelled) => {
            return Err(HydrationError::cancelled(format!(
                "Registry request for {package} was cancelled"
            )));
        }
        Err(e) => {
            return Err(HydrationError::network(format!(
                "Failed to fetch registry metadata for {package}"
            ))
            .with_hint("Check your network connection and registry URL")
            .with_source(e));
        }
    };

    if response.status == 404 {
        return Err(HydrationError::not_found(format!(
            "Package {package} not found in registry"
        ))
        .with_hint("Check the package name for typos"));
    }
    if !response.is_success() {
        return Err(HydrationError::http_status(format!(
            "Registry returned status {} for {package}",
            response.status
        )));
    }

    let mut document: PackageDocument = serde_json::from_str(&response.body).map_err(|e| {
        HydrationError::parse(format!("Failed to parse registry metadata for {package}"))
            .with_source(e)
    })?;
    if document.name.is_empty() {
        document.name = package.full_name();
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_for_scoped_package() {
        let p = NpmPackage::parse("@scope/example").unwrap();
        assert_eq!(
            metadata_url("https://registry.npmjs.org/", &p),
            "https://registry.npmjs.org/@scope%2Fexample"
        );
        assert_eq!(
            package_url("https://www.npmjs.com", &p),
            "https://www.npmjs.com/package/@scope/example"
        );
        assert_eq!(
            listing_url("https://www.npmjs.com", &p, "2.10.1"),
            "https://www.npmjs.com/package/@scope/example/v/2.10.1"
        );
    }
}
