use rusqlite::{params, Connection};

use crate::error::{Error, Result};

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            parent_id   INTEGER REFERENCES categories(id),
            name        TEXT NOT NULL,
            path        TEXT NOT NULL UNIQUE,
            is_archive  INTEGER NOT NULL DEFAULT 0,
            scanned     INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS books (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            filename     TEXT NOT NULL,
            path         TEXT NOT NULL,
            in_archive   INTEGER NOT NULL,
            category_id  INTEGER NOT NULL REFERENCES categories(id),
            format       TEXT NOT NULL,
            title        TEXT NOT NULL,
            lang         TEXT NOT NULL DEFAULT '',
            annotation   TEXT NOT NULL DEFAULT '',
            docdate      TEXT NOT NULL DEFAULT '',
            size         INTEGER NOT NULL,
            fingerprint  TEXT,
            duplicate_of INTEGER,
            cover        TEXT NOT NULL DEFAULT '',
            cover_type   TEXT NOT NULL DEFAULT '',
            avail        INTEGER NOT NULL DEFAULT 2,
            UNIQUE (filename, path, in_archive)
        );

        CREATE INDEX IF NOT EXISTS idx_books_category ON books(category_id);
        CREATE INDEX IF NOT EXISTS idx_books_fingerprint ON books(fingerprint);
        CREATE INDEX IF NOT EXISTS idx_books_avail ON books(avail);

        CREATE TABLE IF NOT EXISTS authors (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name  TEXT NOT NULL,
            last_name   TEXT NOT NULL,
            UNIQUE (first_name, last_name)
        );

        CREATE TABLE IF NOT EXISTS genres (
            id   INTEGER PRIMARY KEY AUTOINCREMENT,
            tag  TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS series (
            id    INTEGER PRIMARY KEY AUTOINCREMENT,
            name  TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS book_authors (
            book_id    INTEGER NOT NULL REFERENCES books(id),
            author_id  INTEGER NOT NULL REFERENCES authors(id),
            PRIMARY KEY (book_id, author_id)
        );

        CREATE TABLE IF NOT EXISTS book_genres (
            book_id   INTEGER NOT NULL REFERENCES books(id),
            genre_id  INTEGER NOT NULL REFERENCES genres(id),
            PRIMARY KEY (book_id, genre_id)
        );

        CREATE TABLE IF NOT EXISTS book_series (
            book_id    INTEGER NOT NULL REFERENCES books(id),
            series_id  INTEGER NOT NULL REFERENCES series(id),
            PRIMARY KEY (book_id, series_id)
        );

        CREATE INDEX IF NOT EXISTS idx_book_authors_author ON book_authors(author_id);
        CREATE INDEX IF NOT EXISTS idx_book_genres_genre ON book_genres(genre_id);
        CREATE INDEX IF NOT EXISTS idx_book_series_series ON book_series(series_id);

        CREATE TABLE IF NOT EXISTS config (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Stamp the schema version on a fresh catalog and refuse one written by a
/// newer build.
pub fn migrate(conn: &Connection) -> Result<()> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM config WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .ok();

    match stored.and_then(|v| v.parse::<u32>().ok()) {
        Some(db) if db > SCHEMA_VERSION => Err(Error::SchemaTooNew {
            db,
            code: SCHEMA_VERSION,
        }),
        Some(_) => Ok(()),
        None => {
            conn.execute(
                "INSERT INTO config (key, value) VALUES ('schema_version', ?1)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![SCHEMA_VERSION.to_string()],
            )?;
            Ok(())
        }
    }
}
