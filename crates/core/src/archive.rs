use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use encoding_rs::Encoding;

use crate::error::Result;

/// One member of a ZIP archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Member name, decoded to UTF-8.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    pub is_dir: bool,
}

/// Read-only ZIP archive with legacy member-name decoding.
///
/// Names flagged as UTF-8 (or plain ASCII) are taken as-is. Anything else
/// was written by an archiver using the system code page and is decoded
/// with the configured encoding.
pub struct ZipReader {
    archive: zip::ZipArchive<BufReader<File>>,
    encoding: &'static Encoding,
}

impl ZipReader {
    pub fn open(path: &Path, encoding: &'static Encoding) -> Result<Self> {
        let file = File::open(path)?;
        let archive = zip::ZipArchive::new(BufReader::new(file))?;
        Ok(Self { archive, encoding })
    }

    pub fn len(&self) -> usize {
        self.archive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archive.len() == 0
    }

    pub fn entry(&mut self, index: usize) -> Result<ArchiveEntry> {
        let file = self.archive.by_index_raw(index)?;
        let name = decode_name(file.name_raw(), file.name(), self.encoding);
        Ok(ArchiveEntry {
            name,
            size: file.size(),
            is_dir: file.is_dir(),
        })
    }

    /// Decompressing reader over the member at `index`.
    pub fn reader(&mut self, index: usize) -> Result<impl Read + '_> {
        Ok(self.archive.by_index(index)?)
    }
}

fn decode_name(raw: &[u8], parsed: &str, encoding: &'static Encoding) -> String {
    if raw == parsed.as_bytes() {
        return parsed.to_string();
    }
    encoding.decode_without_bom_handling(raw).0.into_owned()
}
