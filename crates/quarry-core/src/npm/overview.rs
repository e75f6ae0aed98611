//! Generated markdown overview written beside an installed package.

use std::collections::BTreeMap;
use std::fmt::Write;

use super::types::VersionManifest;

/// Longest dependency list rendered before truncating.
pub const MAX_LISTED: usize = 100;

/// Everything the overview renders.
#[derive(Debug, Clone, Copy)]
pub struct OverviewInput<'a> {
    pub package_name: &'a str,
    pub resolved_version: &'a str,
    pub package_url: &'a str,
    pub listing_url: &'a str,
    pub metadata_url: &'a str,
    /// Manifest of the resolved version, when the document carried one.
    pub manifest: Option<&'a VersionManifest>,
}

/// Render the overview.
///
/// Sections always appear in the same order: header, URLs, version,
/// description, homepage, repository, license, keywords, dependencies and
/// peer dependencies.
pub fn render_overview(input: &OverviewInput<'_>) -> String {
    let manifest = input.manifest;
    let mut out = String::new();

    let _ = writeln!(out, "# {}\n", input.package_name);

    let _ = writeln!(out, "- Package: {}", input.package_url);
    let _ = writeln!(out, "- Listing: {}", input.listing_url);
    let _ = writeln!(out, "- Registry metadata: {}\n", input.metadata_url);

    let _ = writeln!(out, "Version: {}\n", input.resolved_version);

    let description = manifest.and_then(|m| m.description.as_deref());
    let _ = writeln!(out, "## Description\n\n{}\n", or_none(description));

    let homepage = manifest.and_then(|m| m.homepage.as_deref());
    let _ = writeln!(out, "Homepage: {}", or_none(homepage));

    let repository = manifest.and_then(|m| m.repository.as_ref()).and_then(|r| r.url());
    let _ = writeln!(out, "Repository: {}", or_none(repository.as_deref()));

    let license = manifest.and_then(|m| m.license.as_ref()).and_then(|l| l.name());
    let _ = writeln!(out, "License: {}", or_none(license));

    let keywords = manifest
        .and_then(|m| m.keywords.as_ref())
        .map(|k| k.to_vec())
        .unwrap_or_default();
    let keywords = (!keywords.is_empty()).then(|| keywords.join(", "));
    let _ = writeln!(out, "Keywords: {}\n", or_none(keywords.as_deref()));

    render_dependencies(
        &mut out,
        "Dependencies",
        manifest.and_then(|m| m.dependencies.as_ref()),
    );
    out.push('\n');
    render_dependencies(
        &mut out,
        "Peer Dependencies",
        manifest.and_then(|m| m.peer_dependencies.as_ref()),
    );

    out
}

fn render_dependencies(out: &mut String, title: &str, deps: Option<&BTreeMap<String, String>>) {
    let deps = deps.filter(|d| !d.is_empty());
    let Some(deps) = deps else {
        let _ = writeln!(out, "## {title}\n\nNone");
        return;
    };

    let _ = writeln!(out, "## {title} ({})\n", deps.len());
    for (name, range) in deps.iter().take(MAX_LISTED) {
        let _ = writeln!(out, "- {name}: {range}");
    }
    if deps.len() > MAX_LISTED {
        let _ = writeln!(out, "- ... and {} more", deps.len() - MAX_LISTED);
    }
}

fn or_none(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("(none)")
}
