use std::collections::HashSet;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use serde::Deserialize;

use crate::error::{Error, Result};

/// How stale catalog rows are removed at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Keep the row but mark it removed.
    #[default]
    Logical,
    /// Delete the row and its author/genre/series links.
    Physical,
}

/// Options for one library scan.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Library root to walk.
    pub root: PathBuf,
    /// Descend into ZIP archives.
    pub scan_archives: bool,
    /// Re-read archives already marked as fully scanned.
    pub rescan_archives: bool,
    /// File extensions that become catalog entries, without the leading dot.
    pub extensions: Vec<String>,
    /// Extract bibliographic metadata from FB2 files.
    pub parse_fb2: bool,
    /// Maximum bytes read while looking for the FB2 header; 0 reads until the
    /// header ends.
    pub header_budget: u64,
    /// Persist embedded FB2 cover images.
    pub extract_covers: bool,
    pub cover_dir: PathBuf,
    /// Encoding label for ZIP member names that are not flagged UTF-8.
    pub archive_codepage: String,
    pub detect_duplicates: bool,
    pub delete_mode: DeleteMode,
    /// Commit once at the end of the run instead of after every book.
    pub single_commit: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            scan_archives: true,
            rescan_archives: false,
            extensions: ["fb2", "epub", "mobi", "pdf", "djvu", "doc", "docx", "rtf"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            parse_fb2: true,
            header_budget: 0,
            extract_covers: false,
            cover_dir: PathBuf::from("covers"),
            archive_codepage: "cp866".to_string(),
            detect_duplicates: true,
            delete_mode: DeleteMode::Logical,
            single_commit: false,
        }
    }
}

impl ScanConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load options from a TOML file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Check the options that would otherwise fail halfway through a run.
    pub fn validate(&self) -> Result<()> {
        if !self.root.exists() {
            return Err(Error::RootNotFound(self.root.clone()));
        }
        if !self.root.is_dir() {
            return Err(Error::RootNotDirectory(self.root.clone()));
        }
        self.archive_encoding()?;
        Ok(())
    }

    /// Normalized set of indexable extensions: lower-case, no leading dot.
    pub fn extension_set(&self) -> HashSet<String> {
        self.extensions
            .iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }

    pub fn archive_encoding(&self) -> Result<&'static Encoding> {
        Encoding::for_label(self.archive_codepage.trim().as_bytes())
            .ok_or_else(|| Error::UnknownCodepage(self.archive_codepage.clone()))
    }
}
