//! Cover image naming and persistence.
//!
//! A cover's file name embeds the id of the book row it belongs to, so the
//! format is resolved before the row exists and the bytes are written after.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::Result;

/// Extension used when neither the content type nor the cover id tell us one.
pub const FALLBACK_EXTENSION: &str = ".img";

/// Resolved on-disk format of a cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverFormat {
    /// Extension including the leading dot.
    pub extension: String,
    /// Lower-cased content type, empty when the parser reported none.
    pub content_type: String,
}

/// Map a reported content type and cover id to a file extension.
///
/// JPEG and PNG content types win. Anything else falls back to the cover
/// id's own extension, then to [`FALLBACK_EXTENSION`].
pub fn resolve(content_type: Option<&str>, cover_id: Option<&str>) -> CoverFormat {
    let content_type = content_type
        .map(|t| t.trim().to_lowercase())
        .unwrap_or_default();

    let extension = match content_type.as_str() {
        "image/jpeg" | "image/jpg" => ".jpg".to_string(),
        "image/png" => ".png".to_string(),
        _ => cover_id
            .and_then(|id| Path::new(id.trim()).extension())
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string()),
    };

    CoverFormat {
        extension,
        content_type,
    }
}

pub fn cover_file_name(book_id: i64, extension: &str) -> String {
    format!("{book_id}{extension}")
}

/// Decode a base64 payload. Line breaks and other whitespace inside the
/// payload are ignored.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let compact: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    Ok(STANDARD.decode(compact)?)
}

/// Write raw image bytes to `dir/file_name`.
pub fn write_bytes(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let target = dir.join(file_name);
    fs::write(&target, bytes)?;
    Ok(target)
}

/// Decode and persist a cover for `book_id`. Returns the written path.
pub fn save_cover(dir: &Path, book_id: i64, format: &CoverFormat, payload: &str) -> Result<PathBuf> {
    let bytes = decode_payload(payload)?;
    write_bytes(dir, &cover_file_name(book_id, &format.extension), &bytes)
}
