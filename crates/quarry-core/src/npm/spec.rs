//! npm package names and `name@version` specifiers.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{HydrationError, HydrationResult};

/// Maximum npm package name length (scope + name combined).
const MAX_PACKAGE_NAME_LENGTH: usize = 214;

/// A validated, possibly scoped package name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NpmPackage {
    /// Scope without the leading `@`.
    pub scope: Option<String>,
    pub name: String,
}

impl NpmPackage {
    /// Parse `name` or `@scope/name`.
    pub fn parse(input: &str) -> HydrationResult<Self> {
        let input = input.trim();
        let package = match input.strip_prefix('@') {
            Some(scoped) => {
                let (scope, name) = scoped.split_once('/').ok_or_else(|| {
                    invalid(input, "scoped names look like @scope/name")
                })?;
                Self {
                    scope: Some(scope.to_string()),
                    name: name.to_string(),
                }
            }
            None => Self {
                scope: None,
                name: input.to_string(),
            },
        };
        package.validate()?;
        Ok(package)
    }

    fn validate(&self) -> HydrationResult<()> {
        let full_name = self.full_name();
        if full_name.len() > MAX_PACKAGE_NAME_LENGTH {
            return Err(invalid(
                &full_name,
                &format!("exceeds {MAX_PACKAGE_NAME_LENGTH} characters"),
            ));
        }
        if let Some(scope) = &self.scope {
            validate_component(&full_name, scope)?;
        }
        validate_component(&full_name, &self.name)
    }

    /// `@scope/name` or `name`.
    pub fn full_name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{}/{}", scope, self.name),
            None => self.name.clone(),
        }
    }

    /// Path segment for registry metadata requests.
    ///
    /// The registry expects the scope separator percent-encoded:
    /// `@scope%2Fname`.
    pub fn registry_path(&self) -> String {
        match &self.scope {
            Some(scope) => format!("@{}%2F{}", scope, self.name),
            None => self.name.clone(),
        }
    }

    /// Where a package manager places this package under `root`.
    pub fn node_modules_path(&self, root: &Path) -> PathBuf {
        let modules = root.join("node_modules");
        match &self.scope {
            Some(scope) => modules.join(format!("@{scope}")).join(&self.name),
            None => modules.join(&self.name),
        }
    }
}

impl fmt::Display for NpmPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// A package plus an optional version or dist-tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpmSpec {
    pub package: NpmPackage,
    pub version: Option<String>,
}

impl NpmSpec {
    /// Parse `name`, `name@version`, `@scope/name` or `@scope/name@version`.
    pub fn parse(input: &str) -> HydrationResult<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(HydrationError::invalid_descriptor(
                "Empty package specifier",
            ));
        }

        // The version separator is the first `@` after any scope prefix.
        let search_from = usize::from(input.starts_with('@'));
        let (name, version) = match input[search_from..].find('@') {
            Some(pos) => {
                let at = search_from + pos;
                let version = &input[at + 1..];
                if version.is_empty() {
                    return Err(invalid(input, "missing version after '@'"));
                }
                (&input[..at], Some(version.to_string()))
            }
            None => (input, None),
        };

        Ok(Self {
            package: NpmPackage::parse(name)?,
            version,
        })
    }
}

fn validate_component(full_name: &str, component: &str) -> HydrationResult<()> {
    if component.is_empty() {
        return Err(invalid(full_name, "name segments cannot be empty"));
    }
    if component.starts_with('.') || component.starts_with('_') {
        return Err(invalid(full_name, "names cannot start with '.' or '_'"));
    }
    if let Some(bad) = component
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~')))
    {
        return Err(invalid(full_name, &format!("invalid character '{bad}'")));
    }
    Ok(())
}

fn invalid(name: &str, reason: &str) -> HydrationError {
    HydrationError::invalid_descriptor(format!("Invalid package name '{name}': {reason}"))
}
