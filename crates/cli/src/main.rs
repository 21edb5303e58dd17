mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shelfdex_core::config::ScanConfig;
use shelfdex_core::Library;
use tracing_subscriber::EnvFilter;

/// E-book library indexer
#[derive(Parser)]
#[command(name = "shelfdex", version, about)]
struct Cli {
    /// Path to the catalog database
    #[arg(long, default_value_t = default_catalog_path())]
    catalog: String,

    /// TOML file with scan options
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log per-file decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk the library and bring the catalog up to date
    Scan(commands::scan::ScanArgs),
    /// Show catalog totals
    Status,
    /// List duplicate groups
    Duplicates,
}

fn default_catalog_path() -> String {
    dirs_path().to_string_lossy().to_string()
}

fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".shelfdex").join("catalog.db")
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let catalog_path = PathBuf::from(&cli.catalog);
    if let Some(dir) = catalog_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create {}", dir.display()))?;
    }
    tracing::debug!(catalog = %catalog_path.display(), "opening catalog");
    let mut library = Library::open(&catalog_path)
        .with_context(|| format!("cannot open catalog {}", catalog_path.display()))?;

    match cli.command {
        Commands::Scan(args) => {
            let mut config = match &cli.config {
                Some(path) => ScanConfig::load(path)
                    .with_context(|| format!("cannot load {}", path.display()))?,
                None => ScanConfig::default(),
            };
            args.apply(&mut config);
            commands::scan::run(&mut library, &config)?
        }
        Commands::Status => commands::status::run(&library)?,
        Commands::Duplicates => commands::duplicates::run(&library)?,
    }

    Ok(())
}
