use std::fmt;

/// Identity of a catalog entry: file name, its location relative to the
/// library root, and whether it lives inside an archive.
///
/// For archive members `path` is the archive's own relative path and
/// `filename` the member name as stored in the archive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookKey {
    pub filename: String,
    pub path: String,
    pub in_archive: bool,
}

impl fmt::Display for BookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.filename)
        } else {
            write!(f, "{}/{}", self.path, self.filename)
        }
    }
}

/// Row availability as tracked across a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Logically deleted.
    Removed,
    /// Not yet seen during the current run.
    Unconfirmed,
    /// Seen (or added) during the current run.
    Confirmed,
}

impl Availability {
    pub fn as_i64(self) -> i64 {
        match self {
            Availability::Removed => 0,
            Availability::Unconfirmed => 1,
            Availability::Confirmed => 2,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        match v {
            0 => Availability::Removed,
            1 => Availability::Unconfirmed,
            _ => Availability::Confirmed,
        }
    }
}

/// Everything needed to insert a new book row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBook {
    pub key: BookKey,
    pub category_id: i64,
    /// Lower-case extension without the dot.
    pub format: String,
    pub title: String,
    pub lang: String,
    pub annotation: String,
    pub docdate: String,
    pub size: u64,
    /// Extension of the persisted cover file, e.g. `.jpg`; empty when none.
    pub cover: String,
    /// Normalized content type reported for the cover.
    pub cover_type: String,
}

/// A catalogued book.
#[derive(Debug, Clone, PartialEq)]
pub struct Book {
    pub id: i64,
    pub key: BookKey,
    pub category_id: i64,
    pub format: String,
    pub title: String,
    pub lang: String,
    pub annotation: String,
    pub docdate: String,
    pub size: u64,
    pub duplicate_of: Option<i64>,
    pub cover: String,
    pub cover_type: String,
    pub availability: Availability,
}

impl Book {
    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }

    /// File name of the persisted cover inside the cover directory.
    pub fn cover_file_name(&self) -> Option<String> {
        if self.cover.is_empty() {
            None
        } else {
            Some(crate::cover::cover_file_name(self.id, &self.cover))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (true, _) => write!(f, "{}", self.last_name),
            (false, true) => write!(f, "{}", self.first_name),
            (false, false) => write!(f, "{} {}", self.first_name, self.last_name),
        }
    }
}

/// A node of the category tree: a library directory or an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    /// Path relative to the library root, `/`-separated; empty for the root.
    pub path: String,
    pub is_archive: bool,
    /// Archive has been fully scanned (always false for directories).
    pub scanned: bool,
}

/// A canonical book and the rows marked as its duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroup {
    pub canonical: Book,
    pub duplicates: Vec<Book>,
}

/// Totals shown by `shelfdex status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogStats {
    pub books: usize,
    pub removed_books: usize,
    pub duplicates: usize,
    pub authors: usize,
    pub genres: usize,
    pub series: usize,
    pub categories: usize,
    pub archives: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_key_display() {
        let key = BookKey {
            filename: "book.fb2".to_string(),
            path: "sci-fi/asimov".to_string(),
            in_archive: false,
        };
        assert_eq!(key.to_string(), "sci-fi/asimov/book.fb2");

        let at_root = BookKey {
            filename: "book.fb2".to_string(),
            path: String::new(),
            in_archive: false,
        };
        assert_eq!(at_root.to_string(), "book.fb2");
    }

    #[test]
    fn test_availability_roundtrip() {
        for a in [Availability::Removed, Availability::Unconfirmed, Availability::Confirmed] {
            assert_eq!(Availability::from_i64(a.as_i64()), a);
        }
    }

    #[test]
    fn test_author_display() {
        let author = Author {
            id: 1,
            first_name: "Isaac".to_string(),
            last_name: "Asimov".to_string(),
        };
        assert_eq!(author.to_string(), "Isaac Asimov");

        let mononym = Author {
            id: 2,
            first_name: String::new(),
            last_name: "Homer".to_string(),
        };
        assert_eq!(mononym.to_string(), "Homer");
    }
}
