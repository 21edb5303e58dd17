use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use crate::error::Result;

/// Deferred opener for an already-located stream, such as an archive member.
pub type StreamOpener<'a> = Box<dyn FnOnce() -> Result<Box<dyn Read + 'a>> + 'a>;

/// Where a candidate's bytes come from. Loose files are opened by path;
/// archive members through a stream the archive handler hands over.
pub enum BookSource<'a> {
    Path(PathBuf),
    Stream(StreamOpener<'a>),
}

impl<'a> BookSource<'a> {
    /// Open the source for reading. Nothing is touched until this is called.
    pub fn open(self) -> Result<Box<dyn Read + 'a>> {
        match self {
            BookSource::Path(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            BookSource::Stream(open) => open(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_path_source_reads_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "content").unwrap();

        let mut text = String::new();
        BookSource::Path(path).open().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "content");
    }

    #[test]
    fn test_path_source_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = BookSource::Path(tmp.path().join("missing.fb2")).open().err().unwrap();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_stream_source_is_lazy() {
        let data = b"member bytes".to_vec();
        let mut opened = false;
        {
            let source = BookSource::Stream(Box::new(|| {
                opened = true;
                Ok(Box::new(data.as_slice()) as Box<dyn Read + '_>)
            }));
            let mut text = String::new();
            source.open().unwrap().read_to_string(&mut text).unwrap();
            assert_eq!(text, "member bytes");
        }
        assert!(opened);
    }
}
