//! Quarry - resource hydration for local indexing
//!
//! Usage:
//!   quarry hydrate [NAME]...        # Hydrate configured resources
//!   quarry fetch <REFERENCE>        # Hydrate an inline reference once
//!   quarry list                     # Show configured resources
//!   quarry clear                    # Wipe the resources root

mod display;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quarry_core::config::EngineConfig;
use quarry_core::error::HydrationError;
use quarry_core::loader::ResourceLoaderFacade;
use quarry_core::reference::parse_reference;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Hydrate repositories, npm packages and local folders for indexing", long_about = None)]
struct Cli {
    /// Path to quarry.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Hydrate configured resources (all of them when no name is given)
    Hydrate {
        /// Resource names from quarry.toml
        names: Vec<String>,
    },

    /// Hydrate an inline reference and print where it landed
    ///
    /// Accepts npm:<package>[@<version>], npmjs.com package URLs and https
    /// repository URLs (optionally /tree/<branch>/<path>).
    Fetch {
        reference: String,

        /// Keep the hydrated directory instead of cleaning it up
        #[arg(long)]
        keep: bool,
    },

    /// List configured resources and their on-disk locations
    List,

    /// Remove hydrated resources
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Only remove leftover ephemeral resources
        #[arg(long)]
        ephemeral: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    match run(cli, &cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, cancel: &CancellationToken) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => EngineConfig::default_path()?,
    };
    let config = EngineConfig::load(&config_path)?;
    let facade = ResourceLoaderFacade::from_config(config)
        .context("Failed to initialize the resource loader")?;

    match cli.command {
        Commands::Hydrate { names } => run_hydrate(&facade, &names, cancel).await,
        Commands::Fetch { reference, keep } => run_fetch(&facade, &reference, keep, cancel).await,
        Commands::List => {
            display::print_resources(&facade);
            Ok(())
        }
        Commands::Clear { yes, ephemeral } => run_clear(&facade, yes, ephemeral).await,
    }
}

async fn run_hydrate(
    facade: &ResourceLoaderFacade,
    names: &[String],
    cancel: &CancellationToken,
) -> Result<()> {
    if names.is_empty() {
        if facade.config().resources.is_empty() {
            println!("No resources configured.");
            return Ok(());
        }
        for resource in facade.hydrate_all(cancel).await? {
            display::print_hydrated(&resource);
        }
        return Ok(());
    }

    for name in names {
        let resource = facade.hydrate_named(name, cancel).await?;
        display::print_hydrated(&resource);
    }
    Ok(())
}

async fn run_fetch(
    facade: &ResourceLoaderFacade,
    reference: &str,
    keep: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let descriptor = parse_reference(reference)?;
    let resource = facade.hydrate(&descriptor, cancel).await?;
    display::print_hydrated(&resource);

    if let Some(cleanup) = resource.cleanup() {
        if keep {
            println!("Kept at {}", cleanup.path().display());
        } else {
            cleanup.run().await?;
        }
    }
    Ok(())
}

async fn run_clear(facade: &ResourceLoaderFacade, yes: bool, ephemeral: bool) -> Result<()> {
    let target = if ephemeral {
        "leftover ephemeral resources"
    } else {
        "all hydrated resources"
    };
    if !display::confirm_clear(target, facade.resources_root(), yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    if ephemeral {
        facade.clear_ephemeral().await?;
    } else {
        facade.clear_all().await?;
    }
    println!("Removed {target}.");
    Ok(())
}

/// Print the message, then the hint, then the cause chain.
fn report(error: &anyhow::Error) {
    let hydration = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<HydrationError>());

    eprintln!("{} {}", console::style("error:").red().bold(), error);
    if let Some(hint) = hydration.and_then(HydrationError::hint) {
        eprintln!("{} {}", console::style("hint:").yellow().bold(), hint);
    }
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fetch_with_keep() {
        let cli = Cli::parse_from(["quarry", "fetch", "npm:react@19.0.0", "--keep"]);
        match cli.command {
            Commands::Fetch { reference, keep } => {
                assert_eq!(reference, "npm:react@19.0.0");
                assert!(keep);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn config_flag_is_global() {
        let cli = Cli::parse_from(["quarry", "list", "--config", "/tmp/quarry.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/quarry.toml")));
    }
}
