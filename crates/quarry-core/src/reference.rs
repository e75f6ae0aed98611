//! Inline references discovered in a single request.
//!
//! Accepted forms:
//! - `npm:<package>[@<version>]`
//! - `https://www.npmjs.com/package/<package>[/v/<version>]`
//! - `https://<host>/<owner>/<repo>[.git][/tree/<branch>[/<path>]]`
//!
//! Every descriptor produced here is ephemeral and carries a directory key
//! derived from what it points at.

use url::Url;

use crate::error::{HydrationError, HydrationResult};
use crate::naming;
use crate::npm::NpmSpec;
use crate::resource::{
    DEFAULT_BRANCH, GitResource, NpmResource, ResourceCommon, ResourceDescriptor,
};

/// Prefix marking a registry reference.
pub const NPM_PREFIX: &str = "npm:";

const NPM_WEBSITE_HOSTS: [&str; 2] = ["www.npmjs.com", "npmjs.com"];

/// Cheap check for strings worth handing to [`parse_reference`].
pub fn looks_like_reference(input: &str) -> bool {
    let input = input.trim();
    input.starts_with(NPM_PREFIX) || input.starts_with("https://") || input.starts_with("http://")
}

/// Parse one inline reference into an ephemeral descriptor.
pub fn parse_reference(input: &str) -> HydrationResult<ResourceDescriptor> {
    let input = input.trim();
    if let Some(spec) = input.strip_prefix(NPM_PREFIX) {
        return npm_descriptor(NpmSpec::parse(spec)?);
    }

    let url = Url::parse(input).map_err(|e| {
        unrecognized(input).with_source(e)
    })?;
    if !matches!(url.scheme(), "https" | "http") {
        return Err(unrecognized(input));
    }
    let host = url.host_str().ok_or_else(|| unrecognized(input))?;
    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if NPM_WEBSITE_HOSTS.contains(&host) {
        return npm_from_website(input, &segments);
    }
    git_from_url(input, &url, host, &segments)
}

fn npm_from_website(input: &str, segments: &[&str]) -> HydrationResult<ResourceDescriptor> {
    let Some(("package", rest)) = segments.split_first().map(|(h, r)| (*h, r)) else {
        return Err(unrecognized(input));
    };
    let (name_len, name) = match rest {
        [scope, name, ..] if scope.starts_with('@') => (2, format!("{scope}/{name}")),
        [name, ..] => (1, name.to_string()),
        [] => return Err(unrecognized(input)),
    };
    let version = match &rest[name_len..] {
        [] => None,
        ["v", version] => Some(version.to_string()),
        _ => return Err(unrecognized(input)),
    };
    let spec = NpmSpec::parse(&name)?;
    npm_descriptor(NpmSpec { version, ..spec })
}

fn npm_descriptor(spec: NpmSpec) -> HydrationResult<ResourceDescriptor> {
    let package = spec.package.full_name();
    let name = match &spec.version {
        Some(v) => format!("{package}@{v}"),
        None => package.clone(),
    };
    let key = naming::anonymous_npm_key(&package, spec.version.as_deref());
    Ok(ResourceDescriptor::Npm(NpmResource {
        common: ephemeral_common(name, key),
        package,
        version: spec.version,
    }))
}

fn git_from_url(
    input: &str,
    url: &Url,
    host: &str,
    segments: &[&str],
) -> HydrationResult<ResourceDescriptor> {
    let [owner, repo, rest @ ..] = segments else {
        return Err(unrecognized(input));
    };

    let (branch, sub_path) = match rest {
        [] => (DEFAULT_BRANCH.to_string(), None),
        ["tree", branch, path @ ..] => {
            let sub_path = (!path.is_empty()).then(|| path.join("/"));
            (branch.to_string(), sub_path)
        }
        _ => return Err(unrecognized(input)),
    };

    let port = url.port().map(|p| format!(":{p}")).unwrap_or_default();
    let clone_url = format!("{}://{host}{port}/{owner}/{repo}", url.scheme());
    let display_repo = repo.strip_suffix(".git").unwrap_or(*repo);
    let key = naming::anonymous_git_key(&clone_url);

    Ok(ResourceDescriptor::Git(GitResource {
        common: ephemeral_common(format!("{owner}/{display_repo}"), key),
        url: clone_url,
        branch,
        repo_sub_paths: sub_path.into_iter().collect(),
        quiet: true,
    }))
}

fn ephemeral_common(name: String, key: String) -> ResourceCommon {
    ResourceCommon {
        name,
        special_agent_instructions: String::new(),
        ephemeral: true,
        local_directory_key: Some(key),
    }
}

fn unrecognized(input: &str) -> HydrationError {
    HydrationError::invalid_descriptor(format!("Unrecognized resource reference: {input}"))
        .with_hint("Use npm:<package>[@<version>] or an https repository URL")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn npm(d: &ResourceDescriptor) -> &NpmResource {
        match d {
            ResourceDescriptor::Npm(r) => r,
            other => panic!("expected npm descriptor, got {other:?}"),
        }
    }

    fn git(d: &ResourceDescriptor) -> &GitResource {
        match d {
            ResourceDescriptor::Git(r) => r,
            other => panic!("expected git descriptor, got {other:?}"),
        }
    }

    #[test]
    fn npm_prefix_with_scope_and_version() {
        let d = parse_reference("npm:@scope/example@2.10.1").unwrap();
        let r = npm(&d);
        assert_eq!(r.package, "@scope/example");
        assert_eq!(r.version.as_deref(), Some("2.10.1"));
        assert!(d.is_ephemeral());
        assert_eq!(d.resource_key(), "registry:@scope__example@2.10.1");
        assert_eq!(d.name(), "@scope/example@2.10.1");
    }

    #[test]
    fn npm_prefix_without_version_is_latest() {
        let d = parse_reference("npm:react").unwrap();
        assert_eq!(npm(&d).version, None);
        assert_eq!(d.resource_key(), "registry:react@latest");
    }

    #[test]
    fn npm_website_urls() {
        let d = parse_reference("https://www.npmjs.com/package/@scope/example/v/2.10.1").unwrap();
        assert_eq!(npm(&d).package, "@scope/example");
        assert_eq!(npm(&d).version.as_deref(), Some("2.10.1"));

        let d = parse_reference("https://www.npmjs.com/package/react").unwrap();
        assert_eq!(npm(&d).package, "react");
        assert_eq!(npm(&d).version, None);
    }

    #[test]
    fn plain_repository_url_uses_default_branch() {
        let d = parse_reference("https://github.com/sveltejs/svelte").unwrap();
        let r = git(&d);
        assert_eq!(r.url, "https://github.com/sveltejs/svelte");
        assert_eq!(r.branch, DEFAULT_BRANCH);
        assert!(r.repo_sub_paths.is_empty());
        assert_eq!(d.name(), "sveltejs/svelte");
        assert!(d.resource_key().starts_with("svelte-"));
    }

    #[test]
    fn tree_url_sets_branch_and_sub_path() {
        let d = parse_reference("https://github.com/sveltejs/svelte/tree/next/documentation/docs").unwrap();
        let r = git(&d);
        assert_eq!(r.url, "https://github.com/sveltejs/svelte");
        assert_eq!(r.branch, "next");
        assert_eq!(r.repo_sub_paths, vec!["documentation/docs"]);
    }

    #[test]
    fn dot_git_suffix_is_kept_for_cloning() {
        let d = parse_reference("https://gitlab.com/group/project.git").unwrap();
        assert_eq!(git(&d).url, "https://gitlab.com/group/project.git");
        assert_eq!(d.name(), "group/project");
    }

    #[test]
    fn rejects_everything_else() {
        for input in [
            "react",
            "ftp://example.com/a/b",
            "https://github.com/only-owner",
            "https://github.com/owner/repo/issues/1",
            "https://www.npmjs.com/search?q=react",
        ] {
            let err = parse_reference(input).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidDescriptor, "{input}");
        }
    }

    #[test]
    fn detects_reference_shapes() {
        assert!(looks_like_reference("npm:react"));
        assert!(looks_like_reference("https://github.com/a/b"));
        assert!(!looks_like_reference("what does react do?"));
    }
}
