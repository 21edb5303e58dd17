//! Library walk: routes every file under the root to the archive or file
//! handler, then runs the end-of-run cleanup passes.

pub mod archive;
pub mod file;
pub mod source;

use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::stats::ScanStats;
use archive::ArchiveHandler;
use file::{Candidate, FileHandler, FileOutcome};
use source::BookSource;

const ARCHIVE_EXTENSION: &str = "zip";

/// Callback for reporting scan progress.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanProgress {
    /// An archive was opened and is about to be expanded.
    ArchiveOpened { path: PathBuf, members: usize },
    /// A book was added, skipped or failed.
    FileProcessed { path: PathBuf },
    /// Scan phase completed: `walk`, `cleanup` or `duplicates`.
    PhaseComplete { phase: String },
}

/// Optional progress sink threaded through the handlers.
pub struct Reporter<'a> {
    callback: Option<&'a mut dyn FnMut(ScanProgress)>,
}

impl<'a> Reporter<'a> {
    pub fn new(callback: Option<&'a mut dyn FnMut(ScanProgress)>) -> Self {
        Self { callback }
    }

    pub fn emit(&mut self, event: ScanProgress) {
        if let Some(ref mut cb) = self.callback {
            cb(event);
        }
    }
}

/// One scan run over a library root.
pub struct Scanner<'a> {
    config: &'a ScanConfig,
    catalog: &'a Catalog,
}

impl<'a> Scanner<'a> {
    /// Validates the configuration up front so a bad root or codepage fails
    /// before the catalog is touched.
    pub fn new(config: &'a ScanConfig, catalog: &'a Catalog) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, catalog })
    }

    /// Run the scan inside one catalog session. On a fatal error the writes
    /// since the last commit are rolled back before the error is returned.
    pub fn run(&self, progress: Option<&mut dyn FnMut(ScanProgress)>) -> Result<ScanStats> {
        let mut reporter = Reporter::new(progress);

        info!(root = %self.config.root.display(), "scan started");
        debug!(config = ?self.config, "scan options");

        self.catalog.open_session()?;
        match self.run_session(&mut reporter) {
            Ok(stats) => Ok(stats),
            Err(e) => {
                error!(error = %e, "scan aborted");
                if let Err(rollback) = self.catalog.abort_session() {
                    warn!(error = %rollback, "cannot roll back scan session");
                }
                Err(e)
            }
        }
    }

    fn run_session(&self, reporter: &mut Reporter<'_>) -> Result<ScanStats> {
        let mut stats = ScanStats::start(self.config.delete_mode);
        let root = self.config.root.as_path();

        self.catalog.prepare_availability()?;

        if self.config.extract_covers {
            std::fs::create_dir_all(&self.config.cover_dir)?;
        }

        let files = FileHandler::new(self.config, self.catalog);
        let archives = ArchiveHandler::new(self.config, self.catalog)?;

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "cannot read directory entry");
                    continue;
                }
            };
            let path = entry.path();
            // Follows symlinks, unlike the entry's own file type
            if !path.is_file() {
                continue;
            }

            if self.config.scan_archives && is_archive(path) {
                archives.process(&files, path, &relative_path(root, path), &mut stats, reporter)?;
                continue;
            }

            let location = path
                .parent()
                .map(|dir| relative_path(root, dir))
                .unwrap_or_default();
            let candidate = Candidate {
                name: entry.file_name().to_string_lossy().into_owned(),
                location,
                source: BookSource::Path(path.to_path_buf()),
                in_archive: false,
                size: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
                category_id: None,
            };

            match files.process(candidate, &mut stats) {
                Ok(FileOutcome::Ignored) => {}
                Ok(_) => reporter.emit(ScanProgress::FileProcessed {
                    path: path.to_path_buf(),
                }),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "cannot process file");
                    stats.books_failed += 1;
                }
            }
        }
        reporter.emit(ScanProgress::PhaseComplete {
            phase: "walk".to_string(),
        });

        self.catalog.commit()?;
        stats.books_deleted = self.catalog.delete_unavailable(self.config.delete_mode)?;
        reporter.emit(ScanProgress::PhaseComplete {
            phase: "cleanup".to_string(),
        });

        stats.duplicates_resolved = self.catalog.resolve_duplicates()?;
        reporter.emit(ScanProgress::PhaseComplete {
            phase: "duplicates".to_string(),
        });

        stats.finish();
        if let Some(finished) = stats.finished_at {
            self.catalog.set_config("last_scan", &finished.to_rfc3339())?;
        }
        self.catalog.close_session()?;
        stats.log_summary();
        Ok(stats)
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(ARCHIVE_EXTENSION))
}

/// `/`-joined path of `path` below `root`; empty for the root itself.
pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
