use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mirror::{SyncEngine, SyncOptions, SyncPlan};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mirror-sync")]
#[command(about = "Mirror a source directory into a destination directory")]
struct Cli {
    /// Full path of the source directory
    #[arg(short, long)]
    source: PathBuf,

    /// Full path of the destination directory, created if missing
    #[arg(short, long)]
    destination: PathBuf,

    /// Workers per copy/delete pool [default: 10]
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    workers: Option<u64>,

    /// TOML file with sync options; flags take precedence
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the planned copies and deletes without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Log each task
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Options from the config file (or defaults) with flag overrides applied
    fn sync_options(&self) -> Result<SyncOptions> {
        let mut options = match &self.config {
            Some(path) => SyncOptions::load(path)
                .with_context(|| format!("Failed to load options from {}", path.display()))?,
            None => SyncOptions::default(),
        };

        if let Some(workers) = self.workers {
            options.workers = usize::try_from(workers).context("worker count out of range")?;
        }

        options.validate()?;
        Ok(options)
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_plan(plan: &SyncPlan) {
    let mut copies: Vec<_> = plan.copies.paths().collect();
    copies.sort();
    let mut deletes: Vec<_> = plan.deletes.paths().collect();
    deletes.sort();

    for source in copies {
        let destination = plan.copies.companion(source).unwrap_or(source.as_path());
        println!("copy   {} -> {}", source.display(), destination.display());
    }
    for path in deletes {
        println!("delete {}", path.display());
    }
    println!(
        "{} copies ({} bytes), {} deletes",
        plan.copies.len(),
        plan.bytes_to_copy,
        plan.deletes.len()
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let options = cli.sync_options()?;
    info!("Using {} workers per pipeline", options.workers);
    let engine = SyncEngine::new(options)?;

    if cli.dry_run {
        let plan = engine.preview(&cli.source, &cli.destination).await?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            print_plan(&plan);
        }
        return Ok(());
    }

    let report = engine.sync(&cli.source, &cli.destination).await;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if !report.is_successful() {
        println!("sync completed but there are some errors, check error logs");
        std::process::exit(1);
    }

    Ok(())
}
