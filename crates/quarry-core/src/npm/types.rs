//! Serde types for npm registry documents.
//!
//! Only the fields the overview needs are modelled. Registry documents are
//! loosely typed in the wild, so most fields are optional and several accept
//! both a string and an object form.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

/// Full registry document for a package (`GET <registry>/<name>`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PackageDocument {
    #[serde(default)]
    pub name: String,
    /// Tag to version map (e.g. `{"latest": "19.0.0"}`).
    #[serde(rename = "dist-tags", default)]
    pub dist_tags: HashMap<String, String>,
    /// Per-version manifests keyed by version string.
    #[serde(default)]
    pub versions: HashMap<String, VersionManifest>,
}

/// The published manifest of one version.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionManifest {
    #[serde(default)]
    pub version: String,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub repository: Option<Repository>,
    pub license: Option<License>,
    pub keywords: Option<Keywords>,
    pub dependencies: Option<BTreeMap<String, String>>,
    pub peer_dependencies: Option<BTreeMap<String, String>>,
}

/// `"repository": "github:org/repo"` or `{ "type": "git", "url": ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Repository {
    Url(String),
    Detailed {
        url: Option<String>,
        directory: Option<String>,
    },
}

impl Repository {
    pub fn url(&self) -> Option<String> {
        match self {
            Self::Url(url) => Some(url.clone()),
            Self::Detailed {
                url: Some(url),
                directory: Some(dir),
            } => Some(format!("{url} ({dir})")),
            Self::Detailed { url, .. } => url.clone(),
        }
    }
}

/// SPDX string, or the legacy `{ "type": "MIT", "url": ... }` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum License {
    Spdx(String),
    Detailed {
        #[serde(rename = "type")]
        kind: Option<String>,
    },
}

impl License {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Spdx(name) => Some(name),
            Self::Detailed { kind } => kind.as_deref(),
        }
    }
}

/// Keywords are a list, but some old packages publish a single string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Keywords {
    List(Vec<String>),
    Single(String),
}

impl Keywords {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::List(list) => list.clone(),
            Self::Single(s) => s
                .split([',', ' '])
                .filter(|k| !k.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}
