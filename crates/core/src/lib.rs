pub mod archive;
pub mod catalog;
pub mod config;
pub mod cover;
pub mod domain;
pub mod error;
pub mod metadata;
pub mod scanner;
pub mod stats;

use std::path::Path;

use catalog::Catalog;
use config::ScanConfig;
use domain::*;
use error::Result;
use scanner::Scanner;
use stats::ScanStats;

pub use scanner::ScanProgress;

/// The main entry point for the shelfdex library.
pub struct Library {
    catalog: Catalog,
}

impl Library {
    /// Open or create a library catalog at the given path.
    pub fn open(catalog_path: &Path) -> Result<Self> {
        let catalog = Catalog::open(catalog_path)?;
        Ok(Self { catalog })
    }

    /// Open an in-memory catalog (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            catalog: Catalog::open_in_memory()?,
        })
    }

    /// Walk the configured root, bring the catalog in line with it and
    /// return the run counters. Calls `progress_cb` with progress updates if
    /// provided.
    pub fn scan(
        &mut self,
        config: &ScanConfig,
        progress_cb: Option<&mut dyn FnMut(ScanProgress)>,
    ) -> Result<ScanStats> {
        Scanner::new(config, &self.catalog)?.run(progress_cb)
    }

    /// Catalog totals.
    pub fn status(&self) -> Result<CatalogStats> {
        self.catalog.stats_summary()
    }

    /// RFC 3339 timestamp of the last completed scan.
    pub fn last_scan(&self) -> Result<Option<String>> {
        self.catalog.get_config("last_scan")
    }

    /// All book rows, logically removed ones included.
    pub fn books(&self) -> Result<Vec<Book>> {
        self.catalog.list_books()
    }

    /// Live duplicate groups.
    pub fn duplicates(&self) -> Result<Vec<DuplicateGroup>> {
        self.catalog.list_duplicate_groups()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }
}
