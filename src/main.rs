use anyhow::{Context, Result};
use backup_orchestrator::config::{self, expand_tilde, Config};
use backup_orchestrator::managers::backup::{source_plans, BackupRunner};
use backup_orchestrator::managers::logging::{self, LoggingConfig};
use backup_orchestrator::stages::S3Store;
use backup_orchestrator::utils::locker::RunLock;
use backup_orchestrator::utils::RealExecutor;
use backup_orchestrator::RunSummary;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "backup-orchestrator")]
#[command(
    about = "Dump, archive, compress, encrypt and upload backups from one config file",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults to config.toml next to the executable)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every configured backup (default)
    Run,

    /// Validate configuration file
    Validate,

    /// List configured sources and their pipelines
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Run);

    // Only a backup run writes log files
    if !matches!(command, Commands::Run) {
        logging::init_console_logging();
    }

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let config = config::load_config(&config_path)
        .with_context(|| format!("Invalid configuration {:?}", config_path))?;

    match command {
        Commands::Validate => {
            println!("Configuration is valid!");
            println!("Dump sources: {}", config.sources.mysqldump.len());
            println!("Directory sources: {}", config.sources.directories.len());
            println!("Destinations: {}", config.destinations.len());
            println!("Encryptions: {}", config.encryptions.len());
        }

        Commands::List => {
            let plans = source_plans(&config)?;
            if plans.is_empty() {
                println!("No sources configured.");
            } else {
                println!("Configured sources:");
                for plan in plans {
                    println!("  {} ({})", plan.name, plan.kind);
                    println!("    Target: {}", plan.target);
                    println!("    Pipeline: {}", plan.pipeline);
                    println!();
                }
            }
        }

        Commands::Run => {
            let summary = run_backups(config)?;
            print_summary(&summary);
            if !summary.is_success() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn run_backups(config: Config) -> Result<RunSummary> {
    // Keep the guard alive until the run is over
    let _log_guard = logging::init_logging(&LoggingConfig::from_global(&config.global))?;

    let lock_path = expand_tilde(&config.global.lock_file);
    let _lock = RunLock::acquire(&lock_path)?;

    if config.sources.is_empty() {
        tracing::warn!("No sources configured, nothing to do");
    }

    let store = S3Store::new()?;
    let runner = BackupRunner::new(config, Box::new(RealExecutor::new()), Box::new(store));

    Ok(runner.run()?)
}

fn print_summary(summary: &RunSummary) {
    println!();
    for outcome in &summary.outcomes {
        if outcome.is_success() {
            println!("✓ {}", outcome.unit);
            for artifact in &outcome.artifacts {
                match artifact.uploaded_key {
                    Some(ref key) if artifact.cleaned_up => println!("    uploaded {}", key),
                    Some(ref key) => {
                        println!("    uploaded {} (kept {})", key, artifact.path.display())
                    }
                    None => println!("    kept {}", artifact.path.display()),
                }
            }
        } else {
            println!("✗ {}", outcome.unit);
            for error in outcome.all_errors() {
                println!("    {}", error);
            }
        }
    }

    println!();
    println!(
        "{} succeeded, {} failed in {:.1}s",
        summary.succeeded(),
        summary.failed(),
        summary.duration.as_secs_f64()
    );
}
