use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use shelfdex_core::config::ScanConfig;
use shelfdex_core::{Library, ScanProgress};

/// Command-line overrides for the scan options.
#[derive(Args, Debug, Default)]
pub struct ScanArgs {
    /// Library root to walk
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Re-read archives that were already fully scanned
    #[arg(long)]
    pub rescan_archives: bool,

    /// Commit once at the end instead of after every book
    #[arg(long)]
    pub single_commit: bool,

    /// Extract cover images into this directory
    #[arg(long, value_name = "DIR")]
    pub covers: Option<PathBuf>,
}

impl ScanArgs {
    /// Layer the flags over options loaded from file or defaults.
    pub fn apply(&self, config: &mut ScanConfig) {
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if self.rescan_archives {
            config.rescan_archives = true;
        }
        if self.single_commit {
            config.single_commit = true;
        }
        if let Some(dir) = &self.covers {
            config.extract_covers = true;
            config.cover_dir = dir.clone();
        }
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("  {spinner:.green} {prefix:.dim} {pos:>6} {msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Spinner prefix for the phase that starts once `finished` completes.
fn next_phase_label(finished: &str) -> &'static str {
    match finished {
        "walk" => "Cleaning up",
        "cleanup" => "Resolving duplicates",
        _ => "Done",
    }
}

pub fn run(library: &mut Library, config: &ScanConfig) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(spinner_style());
    pb.set_prefix("Scanning");
    pb.enable_steady_tick(Duration::from_millis(80));

    let stats = library.scan(
        config,
        Some(&mut |progress: ScanProgress| match progress {
            ScanProgress::ArchiveOpened { path, members } => {
                pb.set_message(format!("{} ({members} members)", display_name(&path)));
            }
            ScanProgress::FileProcessed { path } => {
                pb.inc(1);
                pb.set_message(display_name(&path));
            }
            ScanProgress::PhaseComplete { phase } => {
                pb.set_prefix(next_phase_label(&phase));
                pb.set_message(String::new());
            }
        }),
    );
    pb.finish_and_clear();
    let stats = stats?;

    println!();
    println!("  Scan of {} complete.", config.root.display());
    println!();
    for line in stats.summary() {
        println!("   {line}");
    }
    println!();
    Ok(())
}
