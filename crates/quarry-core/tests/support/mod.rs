#![allow(dead_code)]

pub mod git;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use quarry_core::config::EngineConfig;
use quarry_core::error::HydrationResult;
use quarry_core::loader::ResourceLoaderFacade;
use quarry_core::net::{FetchFailure, HttpResponse, NetworkFetcher};
use quarry_core::process::{CommandSpec, ProcessOutput, ProcessRunner};
use quarry_core::resource::{NpmResource, ResourceCommon, ResourceDescriptor};
use quarry_core::safety::SafetyGuard;

pub const REGISTRY: &str = "https://registry.npmjs.org";
pub const WEBSITE: &str = "https://www.npmjs.com";

/// Canned HTTP responses keyed by URL. Unknown URLs fail as if the
/// connection was refused.
#[derive(Default)]
pub struct FakeRegistry {
    responses: Mutex<HashMap<String, (u16, String)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.into(), (status, body.into()));
    }

    /// Registry document plus a listing page for each version.
    pub fn publish(&self, package: &str, latest: &str, versions: &[&str]) {
        let registry_path = package.replacen('/', "%2F", 1);
        self.respond(
            format!("{REGISTRY}/{registry_path}"),
            200,
            document_json(package, latest, versions),
        );
        for version in versions {
            self.respond(
                format!("{WEBSITE}/package/{package}/v/{version}"),
                200,
                format!("<html><title>{package}@{version}</title></html>"),
            );
        }
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl NetworkFetcher for FakeRegistry {
    async fn get(
        &self,
        url: &str,
        _accept: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, FetchFailure> {
        if cancel.is_cancelled() {
            return Err(FetchFailure::Cancelled);
        }
        self.calls.lock().unwrap().push(url.to_string());
        match self.responses.lock().unwrap().get(url) {
            Some((status, body)) => Ok(HttpResponse {
                status: *status,
                body: body.clone(),
            }),
            None => Err(FetchFailure::Request("connection refused".to_string())),
        }
    }
}

pub fn document_json(package: &str, latest: &str, versions: &[&str]) -> String {
    let versions: serde_json::Map<String, serde_json::Value> = versions
        .iter()
        .map(|v| {
            (
                v.to_string(),
                serde_json::json!({
                    "name": package,
                    "version": v,
                    "description": format!("{package} test package"),
                    "license": "MIT",
                    "keywords": ["test"],
                    "dependencies": { "loose-envify": "^1.1.0" }
                }),
            )
        })
        .collect();
    serde_json::json!({
        "name": package,
        "dist-tags": { "latest": latest },
        "versions": versions,
    })
    .to_string()
}

/// Stands in for the package manager: materializes the requested package
/// under `node_modules` of the working directory.
#[derive(Default)]
pub struct FakeInstaller {
    runs: Mutex<Vec<CommandSpec>>,
    exit_code: i32,
    stderr: String,
}

impl FakeInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stderr: stderr.to_string(),
            ..Default::default()
        }
    }

    pub fn runs(&self) -> usize {
        self.runs.lock().unwrap().len()
    }

    pub fn last_spec(&self) -> Option<String> {
        self.runs
            .lock()
            .unwrap()
            .last()
            .and_then(|c| c.args.last().cloned())
    }
}

#[async_trait]
impl ProcessRunner for FakeInstaller {
    async fn run(
        &self,
        spec: &CommandSpec,
        _cancel: &CancellationToken,
    ) -> HydrationResult<ProcessOutput> {
        self.runs.lock().unwrap().push(spec.clone());
        // Yield so concurrent hydrations get a chance to interleave.
        tokio::task::yield_now().await;

        if self.exit_code == 0 {
            let requested = spec.args.last().cloned().unwrap_or_default();
            let at = requested.rfind('@').filter(|i| *i > 0).unwrap_or(requested.len());
            let (package, version) = requested.split_at(at);
            let cwd = spec.cwd.clone().unwrap();
            let dir = package
                .split('/')
                .fold(cwd.join("node_modules"), |dir, part| dir.join(part));
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join("package.json"),
                format!("{{\"name\":\"{package}\",\"version\":\"{}\"}}", version.trim_start_matches('@')),
            )
            .unwrap();
            std::fs::write(dir.join("README.md"), format!("# {package}\n")).unwrap();
        }

        Ok(ProcessOutput {
            exit_code: self.exit_code,
            stdout: String::new(),
            stderr: self.stderr.clone(),
        })
    }
}

pub fn npm_resource(name: &str, package: &str, version: Option<&str>) -> ResourceDescriptor {
    ResourceDescriptor::Npm(NpmResource {
        common: ResourceCommon {
            name: name.to_string(),
            ..Default::default()
        },
        package: package.to_string(),
        version: version.map(str::to_string),
    })
}

/// A facade over temp directories with fake seams.
pub struct Harness {
    pub temp: TempDir,
    pub registry: Arc<FakeRegistry>,
    pub installer: Arc<FakeInstaller>,
    pub facade: ResourceLoaderFacade,
}

impl Harness {
    pub fn new(registry: FakeRegistry, installer: FakeInstaller) -> Self {
        Self::with_resources(registry, installer, Vec::new())
    }

    pub fn with_resources(
        registry: FakeRegistry,
        installer: FakeInstaller,
        resources: Vec<ResourceDescriptor>,
    ) -> Self {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig {
            resources_root: Some(temp.path().join("resources")),
            project_root: Some(temp.path().join("project")),
            resources,
            ..Default::default()
        };
        std::fs::create_dir_all(temp.path().join("project")).unwrap();

        let registry = Arc::new(registry);
        let installer = Arc::new(installer);
        let guard = SafetyGuard::new(None, temp.path().join("project"));
        let facade =
            ResourceLoaderFacade::new(config, installer.clone(), registry.clone(), guard).unwrap();
        Self {
            temp,
            registry,
            installer,
            facade,
        }
    }

    pub fn resources_root(&self) -> PathBuf {
        self.temp.path().join("resources")
    }
}
