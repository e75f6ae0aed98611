//! Terminal output and prompts.

use std::path::Path;

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};

use quarry_core::loader::ResourceLoaderFacade;
use quarry_core::resource::{HydratedResource, ResourceDescriptor};

pub fn print_hydrated(resource: &HydratedResource) {
    println!(
        "{} {} ({}) -> {}",
        style("✓").green(),
        style(&resource.name).bold(),
        resource.kind,
        resource.path().display()
    );
    if !resource.repo_sub_paths.is_empty() {
        println!("    sub-paths: {}", resource.repo_sub_paths.join(", "));
    }
}

pub fn print_resources(facade: &ResourceLoaderFacade) {
    let resources = &facade.config().resources;
    if resources.is_empty() {
        println!("No resources configured.");
        return;
    }

    println!("{}", style("Resources").bold());
    for descriptor in resources {
        let (location, present) = match (descriptor, facade.resource_dir(descriptor)) {
            (ResourceDescriptor::Local(local), _) => (local.path.clone(), local.path.is_dir()),
            (_, Some(dir)) => {
                let present = dir.is_dir();
                (dir, present)
            }
            (_, None) => continue,
        };
        let state = if present {
            style("present").green()
        } else {
            style("missing").dim()
        };
        println!(
            "  {:<24} {:<6} {:<32} {} [{}]",
            descriptor.name(),
            descriptor.kind(),
            descriptor.resource_key(),
            location.display(),
            state
        );
    }
}

/// Ask once before wiping; `yes` skips the prompt.
pub fn confirm_clear(what: &str, root: &Path, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Remove {what} under {}?", root.display()))
        .default(false)
        .interact()?;
    Ok(confirmed)
}
