//! Engine configuration (`quarry.toml`).
//!
//! Every field is optional. A missing file yields the defaults, so the
//! engine works out of the box against the public npm registry.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HydrationError, HydrationResult};
use crate::resource::ResourceDescriptor;

/// Name of the configuration file.
pub const CONFIG_FILE: &str = "quarry.toml";

/// Sub-root for ephemeral resources.
pub const EPHEMERAL_DIR: &str = ".tmp";

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";
pub const DEFAULT_WEBSITE_URL: &str = "https://www.npmjs.com";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Where hydrated resources live.
    pub resources_root: Option<PathBuf>,
    /// The project whose root must never be touched.
    pub project_root: Option<PathBuf>,
    pub registry: RegistrySettings,
    pub install: InstallSettings,
    pub git: GitSettings,
    pub http: HttpSettings,
    /// Persistent resources.
    pub resources: Vec<ResourceDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Metadata endpoint.
    pub url: String,
    /// Public website hosting package listing pages.
    pub website_url: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            website_url: DEFAULT_WEBSITE_URL.to_string(),
        }
    }
}

/// Package manager used for staged installs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    #[default]
    Npm,
    Bun,
}

impl PackageManager {
    pub fn program(&self) -> &'static str {
        match self {
            Self::Npm => "npm",
            Self::Bun => "bun",
        }
    }

    /// Arguments adding one exact version with lifecycle scripts disabled.
    pub fn add_exact_args(&self, spec: &str) -> Vec<String> {
        let args: &[&str] = match self {
            Self::Npm => &[
                "install",
                "--save-exact",
                "--ignore-scripts",
                "--no-audit",
                "--no-fund",
                "--no-package-lock",
            ],
            Self::Bun => &["add", "--exact", "--ignore-scripts"],
        };
        let mut args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        args.push(spec.to_string());
        args
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallSettings {
    pub package_manager: PackageManager,
    /// Overrides the package manager executable path.
    pub program: Option<String>,
}

impl InstallSettings {
    pub fn program(&self) -> String {
        self.program
            .clone()
            .unwrap_or_else(|| self.package_manager.program().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSettings {
    pub program: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            user_agent: concat!("quarry/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EngineConfig {
    /// Default location: `<config_dir>/quarry/quarry.toml`.
    pub fn default_path() -> HydrationResult<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join("quarry").join(CONFIG_FILE))
            .ok_or_else(|| HydrationError::config("Could not determine config directory"))
    }

    /// Load from a file; a missing file yields the defaults.
    pub fn load(path: &Path) -> HydrationResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            HydrationError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;
        Self::from_toml_str(&content).map_err(|e| {
            let message = format!("Failed to parse config file {}: {}", path.display(), e.message());
            match e.hint() {
                Some(hint) => HydrationError::config(message).with_hint(hint),
                None => HydrationError::config(message),
            }
        })
    }

    pub fn from_toml_str(content: &str) -> HydrationResult<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| enhance_toml_error(&e, content))?;
        config.validate()?;
        Ok(config)
    }

    /// Resource names must be present and unique.
    pub fn validate(&self) -> HydrationResult<()> {
        let mut seen = HashSet::new();
        for resource in &self.resources {
            resource.validate()?;
            if !seen.insert(resource.name()) {
                return Err(HydrationError::config(format!(
                    "Duplicate resource name: {}",
                    resource.name()
                )));
            }
        }
        if self.http.timeout_secs == 0 {
            return Err(HydrationError::config("http.timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn resources_root(&self) -> HydrationResult<PathBuf> {
        if let Some(root) = &self.resources_root {
            return Ok(root.clone());
        }
        dirs::data_local_dir()
            .map(|d| d.join("quarry").join("resources"))
            .ok_or_else(|| {
                HydrationError::config("Could not determine a data directory")
                    .with_hint("Set resources_root in quarry.toml")
            })
    }

    pub fn ephemeral_root(&self) -> HydrationResult<PathBuf> {
        Ok(self.resources_root()?.join(EPHEMERAL_DIR))
    }

    pub fn project_root(&self) -> HydrationResult<PathBuf> {
        match &self.project_root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir()
                .map_err(|e| HydrationError::io("Failed to read current directory", e)),
        }
    }

    pub fn find_resource(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.resources.iter().find(|r| r.name() == name)
    }
}

/// Point at the offending line when the parser reports one.
fn enhance_toml_error(error: &toml::de::Error, content: &str) -> HydrationError {
    let message = error.message().to_string();
    let Some(span) = error.span() else {
        return HydrationError::config(format!("TOML parsing error: {message}"));
    };
    let before = &content[..span.start.min(content.len())];
    let line_num = (before.matches('\n').count() + 1).min(content.lines().count().max(1));
    let context = line_context(content, line_num);
    HydrationError::config(format!(
        "TOML parsing error at line {line_num}: {message}"
    ))
    .with_hint(context)
}

/// A few lines around `line_num`, with the line itself marked.
fn line_context(content: &str, line_num: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let start = line_num.saturating_sub(2);
    let end = (line_num + 1).min(lines.len());

    lines[start.min(end)..end]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let num = start + i + 1;
            let marker = if num == line_num { ">>>" } else { "   " };
            format!("{} {:4} | {}", marker, num, line)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
