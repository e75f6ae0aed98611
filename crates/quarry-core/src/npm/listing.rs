//! Public listing page capture.
//!
//! The page is enrichment only: any failure is recorded as a placeholder
//! comment instead of failing the hydration. Cancellation still propagates.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{HydrationError, HydrationResult};
use crate::net::{FetchFailure, NetworkFetcher};

/// Marker text present in every placeholder.
pub const LISTING_UNAVAILABLE: &str = "listing page unavailable";

/// Why the listing page could not be captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingFailure {
    RequestFailed,
    Status(u16),
    ReadFailed,
}

impl std::fmt::Display for ListingFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed => write!(f, "request failed"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::ReadFailed => write!(f, "response read failed"),
        }
    }
}

/// Placeholder document stored instead of the page.
pub fn placeholder(package_name: &str, reason: &ListingFailure) -> String {
    format!("<!-- {LISTING_UNAVAILABLE} for \"{package_name}\" ({reason}) -->\n")
}

/// Fetch the listing page, degrading to a placeholder on failure.
pub async fn fetch_listing_page(
    fetcher: &dyn NetworkFetcher,
    url: &str,
    package_name: &str,
    cancel: &CancellationToken,
) -> HydrationResult<String> {
    debug!(url, "fetching listing page");
    let reason = match fetcher.get(url, None, cancel).await {
        Ok(response) if response.is_success() => return Ok(response.body),
        Ok(response) => ListingFailure::Status(response.status),
        Err(FetchFailure::Cancelled) => {
            return Err(HydrationError::cancelled(format!(
                "Listing page fetch for {package_name} was cancelled"
            )));
        }
        Err(FetchFailure::Request(e)) => {
            debug!(error = %e, "listing request failed");
            ListingFailure::RequestFailed
        }
        Err(FetchFailure::Body(e)) => {
            debug!(error = %e, "listing body read failed");
            ListingFailure::ReadFailed
        }
    };
    warn!(package = package_name, %reason, "listing page unavailable, storing placeholder");
    Ok(placeholder(package_name, &reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_names_package_and_reason() {
        assert_eq!(
            placeholder("react", &ListingFailure::Status(403)),
            "<!-- listing page unavailable for \"react\" (status 403) -->\n"
        );
        assert!(placeholder("x", &ListingFailure::RequestFailed).contains("(request failed)"));
        assert!(placeholder("x", &ListingFailure::ReadFailed).contains("(response read failed)"));
    }
}
