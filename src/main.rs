//! Disc Organizer CLI
//!
//! A command-line tool that remuxes disc images and files the tracks into a
//! movie and TV library.

use clap::Parser;
use disc_organizer::cli::{
    args::{Cli, Commands},
    commands::{clean, report, run, scan},
};
use disc_organizer::core::orchestrator::{RunControl, RunMode, RunOptions};
use disc_organizer::models::config::{self, Config};
use disc_organizer::preflight::{self, Needs};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    let config = config::load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Scan { root } => {
            scan::scan(root, &config, cli.dry_run).await?;
        }

        Commands::Remux { root } => {
            pipeline(root, &config, RunMode::Remux, false, &cli).await?;
        }

        Commands::Rename { root } => {
            pipeline(root, &config, RunMode::Rename, false, &cli).await?;
        }

        Commands::Run { root, force } => {
            pipeline(root, &config, RunMode::Full, *force, &cli).await?;
        }

        Commands::Report { failed, format } => {
            report::report(&config, *failed, *format).await?;
        }

        Commands::Clean { records } => {
            clean::clean(&config, *records, cli.dry_run).await?;
        }
    }

    Ok(())
}

async fn pipeline(
    root: &std::path::Path,
    config: &Config,
    mode: RunMode,
    force: bool,
    cli: &Cli,
) -> anyhow::Result<()> {
    // Run preflight checks unless skipped
    if !cli.skip_preflight {
        let needs = Needs {
            remux: mode != RunMode::Rename && !cli.dry_run,
            probe: true,
            dry_run: cli.dry_run,
        };
        run_preflight_checks(config, needs).await?;
    }

    let control = Arc::new(RunControl::new());
    spawn_interrupt_handler(Arc::clone(&control));

    let options = RunOptions {
        mode,
        force,
        dry_run: cli.dry_run,
    };
    let summary = run::run_pipeline(root, config, options, &control).await?;

    if summary.halted {
        anyhow::bail!("Run halted on a fatal error");
    }
    if summary.failed > 0 {
        anyhow::bail!("{} disc(s) failed", summary.failed);
    }
    Ok(())
}

/// First Ctrl+C finishes the current disc, the second aborts it.
fn spawn_interrupt_handler(control: Arc<RunControl>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if control.interrupt() {
                tracing::warn!("Aborting the running remux");
                break;
            }
            tracing::warn!("Stopping after the current disc (Ctrl+C again to abort)");
        }
    });
}

/// Initialize the logging system.
fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("disc_organizer=debug")
    } else {
        EnvFilter::new("disc_organizer=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

/// Run preflight checks and exit if any fail.
async fn run_preflight_checks(config: &Config, needs: Needs) -> anyhow::Result<()> {
    use colored::Colorize;

    println!("{}", "Running preflight checks...".bold());
    println!();

    let results = preflight::run_preflight_checks(config, needs).await?;
    preflight::print_results(&results);

    println!();

    if !preflight::all_passed(&results) {
        anyhow::bail!("Preflight checks failed. Fix the issues above and try again.");
    }

    Ok(())
}
