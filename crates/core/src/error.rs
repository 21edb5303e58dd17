use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("cover payload is not valid base64: {0}")]
    CoverDecode(#[from] base64::DecodeError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("library root does not exist: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("library root is not a directory: {}", .0.display())]
    RootNotDirectory(PathBuf),

    #[error("unknown archive codepage: {0}")]
    UnknownCodepage(String),

    #[error("book not found: {0}")]
    BookNotFound(i64),

    #[error("catalog schema version {db} is newer than this build supports ({code})")]
    SchemaTooNew { db: u32, code: u32 },
}

impl Error {
    /// Whether the error must abort the whole scan.
    ///
    /// Everything touching the catalog session or the run configuration is
    /// fatal. Stream failures and bad covers are confined to the file or
    /// archive member that raised them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Database(_)
                | Error::Config(_)
                | Error::RootNotFound(_)
                | Error::RootNotDirectory(_)
                | Error::UnknownCodepage(_)
                | Error::SchemaTooNew { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_are_fatal() {
        let err = Error::Database(rusqlite::Error::InvalidQuery);
        assert!(err.is_fatal());
        assert!(Error::SchemaTooNew { db: 9, code: 1 }.is_fatal());
    }

    #[test]
    fn test_stream_errors_are_isolatable() {
        let err = Error::Io(std::io::Error::other("truncated member"));
        assert!(!err.is_fatal());
        let err = Error::Archive(zip::result::ZipError::FileNotFound);
        assert!(!err.is_fatal());
    }
}
