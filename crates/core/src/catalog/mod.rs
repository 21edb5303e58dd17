pub mod schema;

use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};

use crate::config::DeleteMode;
use crate::domain::*;
use crate::error::{Error, Result};

const BOOK_COLUMNS: &str = "id, filename, path, in_archive, category_id, format, title, lang,
    annotation, docdate, size, duplicate_of, cover, cover_type, avail";

/// SQLite-backed book catalog.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Open or create a catalog at the given path with WAL mode.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory catalog (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::initialize(&conn)?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Start the write session of a scan run.
    pub fn open_session(&self) -> Result<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    /// Commit pending writes and keep the session open.
    pub fn commit(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT; BEGIN")?;
        }
        Ok(())
    }

    /// Commit pending writes and end the session.
    pub fn close_session(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    /// Discard writes since the last commit and end the session.
    pub fn abort_session(&self) -> Result<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    // ── Availability ─────────────────────────────────────────────────

    /// Demote every live book to unconfirmed. Returns the number of rows.
    pub fn prepare_availability(&self) -> Result<usize> {
        let count = self.conn.execute(
            "UPDATE books SET avail = ?1 WHERE avail = ?2",
            params![Availability::Unconfirmed.as_i64(), Availability::Confirmed.as_i64()],
        )?;
        Ok(count)
    }

    /// Look a book up by identity and confirm it present when found.
    pub fn find_book(&self, key: &BookKey) -> Result<Option<i64>> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM books WHERE filename = ?1 AND path = ?2 AND in_archive = ?3",
                params![key.filename, key.path, key.in_archive],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(id) = id {
            self.conn.execute(
                "UPDATE books SET avail = ?1 WHERE id = ?2",
                params![Availability::Confirmed.as_i64(), id],
            )?;
        }
        Ok(id)
    }

    /// Remove or mark removed every book not confirmed during the run.
    ///
    /// Archives that lose books here also lose their scanned flag, so the
    /// archive is read again if it ever reappears.
    pub fn delete_unavailable(&self, mode: DeleteMode) -> Result<usize> {
        self.conn.execute(
            "UPDATE categories SET scanned = 0
             WHERE is_archive = 1
               AND path IN (SELECT DISTINCT path FROM books WHERE in_archive = 1 AND avail = ?1)",
            params![Availability::Unconfirmed.as_i64()],
        )?;

        let count = match mode {
            DeleteMode::Logical => self.conn.execute(
                "UPDATE books SET avail = ?1 WHERE avail = ?2",
                params![Availability::Removed.as_i64(), Availability::Unconfirmed.as_i64()],
            )?,
            DeleteMode::Physical => {
                let stale = Availability::Confirmed.as_i64();
                for table in ["book_authors", "book_genres", "book_series"] {
                    self.conn.execute(
                        &format!(
                            "DELETE FROM {table} WHERE book_id IN (SELECT id FROM books WHERE avail < ?1)"
                        ),
                        params![stale],
                    )?;
                }
                self.conn
                    .execute("DELETE FROM books WHERE avail < ?1", params![stale])?
            }
        };
        Ok(count)
    }

    // ── Categories & archives ────────────────────────────────────────

    /// Find or create the category for a relative path, creating every
    /// missing ancestor. The library root is the category with path `""`.
    pub fn category_for(&self, rel_path: &str, is_archive: bool) -> Result<i64> {
        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM categories WHERE path = ?1",
                params![rel_path],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let (parent_id, name) = if rel_path.is_empty() {
            (None, "")
        } else {
            let (parent_path, name) = rel_path.rsplit_once('/').unwrap_or(("", rel_path));
            (Some(self.category_for(parent_path, false)?), name)
        };

        self.conn.execute(
            "INSERT INTO categories (parent_id, name, path, is_archive) VALUES (?1, ?2, ?3, ?4)",
            params![parent_id, name, rel_path, is_archive],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_category(&self, id: i64) -> Result<Option<Category>> {
        let category = self
            .conn
            .query_row(
                "SELECT id, parent_id, name, path, is_archive, scanned FROM categories WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Category {
                        id: row.get(0)?,
                        parent_id: row.get(1)?,
                        name: row.get(2)?,
                        path: row.get(3)?,
                        is_archive: row.get(4)?,
                        scanned: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    pub fn archive_is_scanned(&self, rel_path: &str) -> Result<bool> {
        let scanned: Option<bool> = self
            .conn
            .query_row(
                "SELECT scanned FROM categories WHERE path = ?1 AND is_archive = 1",
                params![rel_path],
                |row| row.get(0),
            )
            .optional()?;
        Ok(scanned.unwrap_or(false))
    }

    pub fn mark_archive_scanned(&self, rel_path: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE categories SET scanned = 1 WHERE path = ?1 AND is_archive = 1",
            params![rel_path],
        )?;
        Ok(())
    }

    /// Confirm every live catalogued member of an archive present. Rows
    /// already logically removed stay removed. Returns the number of books
    /// confirmed.
    pub fn confirm_archive_books(&self, rel_path: &str) -> Result<usize> {
        let count = self.conn.execute(
            "UPDATE books SET avail = ?1 WHERE path = ?2 AND in_archive = 1 AND avail > 0",
            params![Availability::Confirmed.as_i64(), rel_path],
        )?;
        Ok(count)
    }

    // ── Books ────────────────────────────────────────────────────────

    /// Insert a confirmed book row and return its id.
    ///
    /// With `detect_duplicates` the row gets a fingerprint and, when a live
    /// canonical row already carries it, is marked as that row's duplicate.
    pub fn add_book(&self, book: &NewBook, detect_duplicates: bool) -> Result<i64> {
        let fingerprint =
            detect_duplicates.then(|| fingerprint(&book.title, &book.format, book.size));

        let duplicate_of: Option<i64> = match &fingerprint {
            Some(fp) => self.conn.query_row(
                "SELECT MIN(id) FROM books
                 WHERE fingerprint = ?1 AND avail > 0 AND duplicate_of IS NULL",
                params![fp],
                |row| row.get(0),
            )?,
            None => None,
        };

        self.conn.execute(
            "INSERT INTO books (filename, path, in_archive, category_id, format, title, lang,
             annotation, docdate, size, fingerprint, duplicate_of, cover, cover_type, avail)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
            params![
                book.key.filename,
                book.key.path,
                book.key.in_archive,
                book.category_id,
                book.format,
                book.title,
                book.lang,
                book.annotation,
                book.docdate,
                book.size as i64,
                fingerprint,
                duplicate_of,
                book.cover,
                book.cover_type,
                Availability::Confirmed.as_i64(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Drop the cover reference of a book whose image never reached disk.
    pub fn clear_cover(&self, book_id: i64) -> Result<()> {
        self.conn.execute(
            "UPDATE books SET cover = '', cover_type = '' WHERE id = ?1",
            params![book_id],
        )?;
        Ok(())
    }

    pub fn get_book(&self, id: i64) -> Result<Book> {
        self.conn
            .query_row(
                &format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1"),
                params![id],
                book_from_row,
            )
            .optional()?
            .ok_or(Error::BookNotFound(id))
    }

    /// Every book row, removed ones included, in id order.
    pub fn list_books(&self) -> Result<Vec<Book>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY id"))?;
        let books = stmt
            .query_map([], book_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(books)
    }

    // ── Authors, genres, series ──────────────────────────────────────

    pub fn find_or_create_author(&self, first_name: &str, last_name: &str) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO authors (first_name, last_name) VALUES (?1, ?2)",
            params![first_name, last_name],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM authors WHERE first_name = ?1 AND last_name = ?2",
            params![first_name, last_name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn find_or_create_genre(&self, tag: &str) -> Result<i64> {
        self.conn
            .execute("INSERT OR IGNORE INTO genres (tag) VALUES (?1)", params![tag])?;
        let id = self
            .conn
            .query_row("SELECT id FROM genres WHERE tag = ?1", params![tag], |row| row.get(0))?;
        Ok(id)
    }

    pub fn find_or_create_series(&self, name: &str) -> Result<i64> {
        self.conn
            .execute("INSERT OR IGNORE INTO series (name) VALUES (?1)", params![name])?;
        let id = self
            .conn
            .query_row("SELECT id FROM series WHERE name = ?1", params![name], |row| row.get(0))?;
        Ok(id)
    }

    pub fn link_author(&self, book_id: i64, author_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO book_authors (book_id, author_id) VALUES (?1, ?2)",
            params![book_id, author_id],
        )?;
        Ok(())
    }

    pub fn link_genre(&self, book_id: i64, genre_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO book_genres (book_id, genre_id) VALUES (?1, ?2)",
            params![book_id, genre_id],
        )?;
        Ok(())
    }

    pub fn link_series(&self, book_id: i64, series_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO book_series (book_id, series_id) VALUES (?1, ?2)",
            params![book_id, series_id],
        )?;
        Ok(())
    }

    pub fn authors_for_book(&self, book_id: i64) -> Result<Vec<Author>> {
        let mut stmt = self.conn.prepare(
            "SELECT a.id, a.first_name, a.last_name FROM authors a
             JOIN book_authors ba ON ba.author_id = a.id
             WHERE ba.book_id = ?1 ORDER BY a.id",
        )?;
        let authors = stmt
            .query_map(params![book_id], |row| {
                Ok(Author {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(authors)
    }

    pub fn genres_for_book(&self, book_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT g.tag FROM genres g JOIN book_genres bg ON bg.genre_id = g.id
             WHERE bg.book_id = ?1 ORDER BY g.id",
        )?;
        let tags = stmt
            .query_map(params![book_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    pub fn series_for_book(&self, book_id: i64) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT s.name FROM series s JOIN book_series bs ON bs.series_id = s.id
             WHERE bs.book_id = ?1 ORDER BY s.id",
        )?;
        let names = stmt
            .query_map(params![book_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    // ── Duplicates ───────────────────────────────────────────────────

    /// Recompute duplicate marks over live fingerprinted books: in every
    /// group the lowest id is canonical and all others point to it.
    /// Returns the number of rows whose mark changed.
    pub fn resolve_duplicates(&self) -> Result<usize> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fingerprint, duplicate_of FROM books
             WHERE fingerprint IS NOT NULL AND avail > 0 ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Rows arrive in id order, so the first id seen per group is the lowest
        let mut canonical: HashMap<&str, i64> = HashMap::new();
        let mut changes = Vec::new();
        for (id, fp, current) in &rows {
            let first = *canonical.entry(fp.as_str()).or_insert(*id);
            let wanted = (first != *id).then_some(first);
            if wanted != *current {
                changes.push((*id, wanted));
            }
        }

        for (id, wanted) in &changes {
            self.conn.execute(
                "UPDATE books SET duplicate_of = ?1 WHERE id = ?2",
                params![wanted, id],
            )?;
        }
        Ok(changes.len())
    }

    /// Live duplicate groups ordered by canonical id.
    pub fn list_duplicate_groups(&self) -> Result<Vec<DuplicateGroup>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books
             WHERE duplicate_of IS NOT NULL AND avail > 0 ORDER BY duplicate_of, id"
        ))?;
        let duplicates = stmt
            .query_map([], book_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut groups: Vec<DuplicateGroup> = Vec::new();
        for book in duplicates {
            let canonical_id = book.duplicate_of.unwrap_or(book.id);
            match groups.last_mut() {
                Some(group) if group.canonical.id == canonical_id => group.duplicates.push(book),
                _ => groups.push(DuplicateGroup {
                    canonical: self.get_book(canonical_id)?,
                    duplicates: vec![book],
                }),
            }
        }
        Ok(groups)
    }

    // ── Summary ──────────────────────────────────────────────────────

    pub fn stats_summary(&self) -> Result<CatalogStats> {
        let stats = self.conn.query_row(
            "SELECT
                (SELECT COUNT(*) FROM books WHERE avail > 0),
                (SELECT COUNT(*) FROM books WHERE avail = 0),
                (SELECT COUNT(*) FROM books WHERE avail > 0 AND duplicate_of IS NOT NULL),
                (SELECT COUNT(*) FROM authors),
                (SELECT COUNT(*) FROM genres),
                (SELECT COUNT(*) FROM series),
                (SELECT COUNT(*) FROM categories WHERE is_archive = 0),
                (SELECT COUNT(*) FROM categories WHERE is_archive = 1)",
            [],
            |row| {
                Ok(CatalogStats {
                    books: row.get::<_, i64>(0)? as usize,
                    removed_books: row.get::<_, i64>(1)? as usize,
                    duplicates: row.get::<_, i64>(2)? as usize,
                    authors: row.get::<_, i64>(3)? as usize,
                    genres: row.get::<_, i64>(4)? as usize,
                    series: row.get::<_, i64>(5)? as usize,
                    categories: row.get::<_, i64>(6)? as usize,
                    archives: row.get::<_, i64>(7)? as usize,
                })
            },
        )?;
        Ok(stats)
    }

    // ── Config ───────────────────────────────────────────────────────

    pub fn set_config(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

/// Duplicate fingerprint: SHA-256 over the normalized title, format and size.
pub fn fingerprint(title: &str, format: &str, size: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.trim().to_lowercase().as_bytes());
    hasher.update([0x1f_u8]);
    hasher.update(format.to_lowercase().as_bytes());
    hasher.update([0x1f_u8]);
    hasher.update(size.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        key: BookKey {
            filename: row.get(1)?,
            path: row.get(2)?,
            in_archive: row.get(3)?,
        },
        category_id: row.get(4)?,
        format: row.get(5)?,
        title: row.get(6)?,
        lang: row.get(7)?,
        annotation: row.get(8)?,
        docdate: row.get(9)?,
        size: row.get::<_, i64>(10)? as u64,
        duplicate_of: row.get(11)?,
        cover: row.get(12)?,
        cover_type: row.get(13)?,
        availability: Availability::from_i64(row.get(14)?),
    })
}
