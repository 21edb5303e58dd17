use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, error, warn};

use super::source::BookSource;
use crate::catalog::Catalog;
use crate::config::ScanConfig;
use crate::cover;
use crate::domain::{BookKey, NewBook};
use crate::error::Result;
use crate::metadata::fb2::Fb2Parser;
use crate::metadata::{join_annotation, trim_field, BookMetadata};
use crate::stats::ScanStats;

/// Extension of the format that carries embedded metadata.
const RICH_FORMAT: &str = "fb2";

/// A file or archive member offered to the catalog.
pub struct Candidate<'a> {
    pub name: String,
    /// Relative directory for loose files, the archive's relative path for
    /// archive members.
    pub location: String,
    pub source: BookSource<'a>,
    pub in_archive: bool,
    pub size: u64,
    /// Pre-resolved for archive members; looked up from `location` otherwise.
    pub category_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Extension is not indexable.
    Ignored,
    /// Identity already catalogued.
    Skipped,
    Added(i64),
    /// Stream could not be read. Nothing was written.
    Failed,
}

/// Turns candidates into catalog rows.
pub struct FileHandler<'a> {
    config: &'a ScanConfig,
    catalog: &'a Catalog,
    parser: Fb2Parser,
    extensions: HashSet<String>,
}

impl<'a> FileHandler<'a> {
    pub fn new(config: &'a ScanConfig, catalog: &'a Catalog) -> Self {
        Self {
            config,
            catalog,
            parser: Fb2Parser::new(config.header_budget, config.extract_covers),
            extensions: config.extension_set(),
        }
    }

    /// Lower-case extension of `name` when it is indexable.
    pub fn indexable_format(&self, name: &str) -> Option<String> {
        let ext = Path::new(name).extension()?.to_string_lossy().to_lowercase();
        self.extensions.contains(&ext).then_some(ext)
    }

    /// Process one candidate. Only catalog failures are returned as errors;
    /// unreadable streams and bad covers are logged and counted.
    pub fn process(&self, candidate: Candidate<'_>, stats: &mut ScanStats) -> Result<FileOutcome> {
        let Some(format) = self.indexable_format(&candidate.name) else {
            return Ok(FileOutcome::Ignored);
        };

        let key = BookKey {
            filename: candidate.name,
            path: candidate.location,
            in_archive: candidate.in_archive,
        };

        if let Some(id) = self.catalog.find_book(&key)? {
            debug!(book = %key, book_id = id, "already catalogued, skipping");
            stats.books_skipped += 1;
            return Ok(FileOutcome::Skipped);
        }

        let rich = format == RICH_FORMAT && self.config.parse_fb2;
        let meta = if rich {
            match candidate.source.open().and_then(|reader| self.parser.parse(reader)) {
                Ok(meta) => meta,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(book = %key, error = %e, "cannot read book");
                    stats.books_failed += 1;
                    return Ok(FileOutcome::Failed);
                }
            }
        } else {
            BookMetadata::default()
        };

        if let Some(warning) = &meta.warning {
            warn!(book = %key, "{warning}");
        }

        let category_id = match candidate.category_id {
            Some(id) => id,
            None => self.catalog.category_for(&key.path, false)?,
        };

        let title = meta
            .title
            .as_deref()
            .map(trim_field)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| file_stem(&key.filename));

        // The format is resolved up front because the row stores it; the
        // bytes can only be written once the row id is known.
        let cover = meta
            .cover
            .as_ref()
            .filter(|c| rich && self.config.extract_covers && c.has_data());
        let cover_format = cover.map(|c| cover::resolve(c.content_type.as_deref(), c.id.as_deref()));

        let book = NewBook {
            key,
            category_id,
            format,
            title,
            lang: meta.lang.as_deref().map(trim_field).unwrap_or_default(),
            annotation: join_annotation(&meta.annotation),
            docdate: meta.docdate.as_deref().map(trim_field).unwrap_or_default(),
            size: candidate.size,
            cover: cover_format.as_ref().map(|f| f.extension.clone()).unwrap_or_default(),
            cover_type: cover_format.as_ref().map(|f| f.content_type.clone()).unwrap_or_default(),
        };
        let id = self.catalog.add_book(&book, self.config.detect_duplicates)?;
        stats.books_added += 1;
        if book.key.in_archive {
            stats.books_in_archives += 1;
        }
        debug!(book = %book.key, book_id = id, title = %book.title, "added");

        if let (Some(image), Some(format)) = (cover, &cover_format) {
            if let Err(e) = cover::save_cover(&self.config.cover_dir, id, format, &image.data) {
                error!(book = %book.key, book_id = id, error = %e, "cannot write cover");
                self.catalog.clear_cover(id)?;
            }
        }

        self.link_metadata(id, &meta)?;

        if !self.config.single_commit {
            self.catalog.commit()?;
        }
        Ok(FileOutcome::Added(id))
    }

    fn link_metadata(&self, book_id: i64, meta: &BookMetadata) -> Result<()> {
        for (first, last) in meta.authors() {
            let author_id = self
                .catalog
                .find_or_create_author(&trim_field(first), &trim_field(last))?;
            self.catalog.link_author(book_id, author_id)?;
        }

        for genre in &meta.genres {
            let tag = trim_field(&genre.to_lowercase());
            if tag.is_empty() {
                continue;
            }
            let genre_id = self.catalog.find_or_create_genre(&tag)?;
            self.catalog.link_genre(book_id, genre_id)?;
        }

        for series in &meta.series {
            let name = trim_field(series);
            if name.is_empty() {
                continue;
            }
            let series_id = self.catalog.find_or_create_series(&name)?;
            self.catalog.link_series(book_id, series_id)?;
        }
        Ok(())
    }
}

fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}
