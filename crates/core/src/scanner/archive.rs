use std::io::Read;
use std::path::Path;

use encoding_rs::Encoding;
use tracing::{debug, error};

use super::file::{Candidate, FileHandler, FileOutcome};
use super::source::BookSource;
use super::{Reporter, ScanProgress};
use crate::archive::ZipReader;
use crate::catalog::Catalog;
use crate::config::ScanConfig;
use crate::error::Result;
use crate::stats::ScanStats;

/// Expands ZIP archives into candidates for the [`FileHandler`].
pub struct ArchiveHandler<'a> {
    config: &'a ScanConfig,
    catalog: &'a Catalog,
    encoding: &'static Encoding,
}

impl<'a> ArchiveHandler<'a> {
    pub fn new(config: &'a ScanConfig, catalog: &'a Catalog) -> Result<Self> {
        Ok(Self {
            config,
            catalog,
            encoding: config.archive_encoding()?,
        })
    }

    /// Scan one archive. A container that cannot be opened counts as a bad
    /// archive and unreadable members as failed books; only catalog errors
    /// are returned.
    pub fn process(
        &self,
        files: &FileHandler<'_>,
        path: &Path,
        rel_path: &str,
        stats: &mut ScanStats,
        reporter: &mut Reporter<'_>,
    ) -> Result<()> {
        if !self.config.rescan_archives && self.catalog.archive_is_scanned(rel_path)? {
            let confirmed = self.catalog.confirm_archive_books(rel_path)?;
            debug!(archive = rel_path, books = confirmed, "already scanned, skipping");
            stats.books_skipped += confirmed;
            stats.archives_skipped += 1;
            return Ok(());
        }

        let category_id = self.catalog.category_for(rel_path, true)?;

        let mut zip = match ZipReader::open(path, self.encoding) {
            Ok(zip) => zip,
            Err(e) => {
                error!(archive = rel_path, error = %e, "cannot open archive");
                stats.bad_archives += 1;
                return Ok(());
            }
        };

        reporter.emit(ScanProgress::ArchiveOpened {
            path: path.to_path_buf(),
            members: zip.len(),
        });

        for index in 0..zip.len() {
            let entry = match zip.entry(index) {
                Ok(entry) => entry,
                Err(e) => {
                    error!(archive = rel_path, index, error = %e, "cannot read archive member");
                    stats.books_failed += 1;
                    continue;
                }
            };
            if entry.is_dir {
                continue;
            }

            let candidate = Candidate {
                name: entry.name.clone(),
                location: rel_path.to_string(),
                source: member_source(&mut zip, index),
                in_archive: true,
                size: entry.size,
                category_id: Some(category_id),
            };

            match files.process(candidate, stats) {
                Ok(FileOutcome::Ignored) => {}
                Ok(_) => reporter.emit(ScanProgress::FileProcessed {
                    path: path.join(&entry.name),
                }),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(archive = rel_path, member = %entry.name, error = %e, "cannot process archive member");
                    stats.books_failed += 1;
                }
            }
        }

        stats.archives_scanned += 1;
        self.catalog.mark_archive_scanned(rel_path)?;
        Ok(())
    }
}

fn member_source<'z>(zip: &'z mut ZipReader, index: usize) -> BookSource<'z> {
    BookSource::Stream(Box::new(move || {
        let zip = zip;
        let reader: Box<dyn Read + 'z> = Box::new(zip.reader(index)?);
        Ok(reader)
    }))
}
