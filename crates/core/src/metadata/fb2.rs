//! Streaming FictionBook 2 header reader.
//!
//! Only `<description>` is interpreted, plus the one `<binary>` the cover
//! page points at when covers are requested. Body text is never decoded.

use std::io::{self, BufReader, Read};

use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::{BookMetadata, CoverImage};
use crate::error::{Error, Result};

const TITLE_INFO: [&str; 2] = ["description", "title-info"];

/// Reusable FB2 parser. Every call to [`Fb2Parser::parse`] starts from a
/// clean result.
#[derive(Debug, Clone)]
pub struct Fb2Parser {
    header_budget: u64,
    want_cover: bool,
}

impl Fb2Parser {
    /// `header_budget` caps the bytes read before `</description>` (0 means
    /// no cap). With `want_cover` the parser keeps reading past the header to
    /// collect the cover binary.
    pub fn new(header_budget: u64, want_cover: bool) -> Self {
        Self {
            header_budget,
            want_cover,
        }
    }

    /// Parse one document. Malformed XML is reported through
    /// [`BookMetadata::warning`]; only read failures of the stream itself
    /// are returned as errors.
    pub fn parse<R: Read>(&self, source: R) -> Result<BookMetadata> {
        let mut xml = Reader::from_reader(BufReader::new(source));
        xml.config_mut().trim_text(true);

        let mut state = ParseState::default();
        let mut buf = Vec::new();

        loop {
            if !state.header_done
                && self.header_budget > 0
                && xml.buffer_position() as u64 > self.header_budget
            {
                state.meta.warning = Some(format!(
                    "header not finished within {} bytes",
                    self.header_budget
                ));
                break;
            }

            let event = match xml.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(quick_xml::Error::Io(e)) => {
                    return Err(Error::Io(io::Error::new(e.kind(), e.to_string())));
                }
                Err(e) => {
                    state.meta.warning = Some(format!(
                        "malformed XML near byte {}: {e}",
                        xml.buffer_position()
                    ));
                    break;
                }
            };
            let decoder = xml.decoder();

            match event {
                Event::Start(e) => {
                    state.stack.push(local_name(&e));
                    state.on_open(&e, decoder, self.want_cover);
                }
                Event::Empty(e) => {
                    state.stack.push(local_name(&e));
                    state.on_open(&e, decoder, self.want_cover);
                    state.stack.pop();
                }
                Event::Text(e) => {
                    if let Some(text) = decode_text(decoder, &e) {
                        state.on_text(text);
                    }
                }
                Event::CData(e) => {
                    if let Some(text) = decode_text(decoder, &e.into_inner()) {
                        state.on_text(text);
                    }
                }
                Event::End(_) => {
                    let closed = state.stack.pop();
                    match closed.as_deref() {
                        Some("description") if state.stack.len() == 1 => {
                            state.header_done = true;
                            if !self.want_cover || state.cover_href.is_none() {
                                break;
                            }
                        }
                        Some("binary") if state.in_cover_binary => {
                            state.in_cover_binary = false;
                            state.cover_found = true;
                            break;
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(state.finish())
    }
}

#[derive(Default)]
struct ParseState {
    meta: BookMetadata,
    /// Local names of the open elements, root first.
    stack: Vec<String>,
    header_done: bool,
    date_value: Option<String>,
    cover_href: Option<String>,
    cover_type: Option<String>,
    cover_data: String,
    in_cover_binary: bool,
    cover_found: bool,
}

impl ParseState {
    /// True when the open elements below the root are exactly `path`.
    fn is(&self, path: &[&str]) -> bool {
        self.stack.len() == path.len() + 1 && self.stack[1..].iter().zip(path).all(|(a, b)| a == b)
    }

    /// True when the open elements below the root start with `path`.
    fn within(&self, path: &[&str]) -> bool {
        self.stack.len() > path.len() && self.stack[1..].iter().zip(path).all(|(a, b)| a == b)
    }

    fn in_title_info(&self, leaf: &[&str]) -> bool {
        self.stack.len() == TITLE_INFO.len() + leaf.len() + 1
            && self.within(&TITLE_INFO)
            && self.stack[TITLE_INFO.len() + 1..]
                .iter()
                .zip(leaf)
                .all(|(a, b)| a == b)
    }

    fn on_open(&mut self, e: &BytesStart<'_>, decoder: Decoder, want_cover: bool) {
        if self.stack.len() == 1 && self.stack[0] != "FictionBook" && self.meta.warning.is_none() {
            self.meta.warning = Some(format!("root element is <{}>, not <FictionBook>", self.stack[0]));
        }

        if self.in_title_info(&["author"]) {
            self.meta.author_first.push(String::new());
            self.meta.author_last.push(String::new());
        } else if self.in_title_info(&["sequence"]) {
            if let Some(name) = attribute(decoder, e, b"name") {
                self.meta.series.push(name);
            }
        } else if self.in_title_info(&["coverpage", "image"]) {
            if self.cover_href.is_none() {
                self.cover_href = attribute(decoder, e, b"href")
                    .map(|href| href.trim_start_matches('#').to_string())
                    .filter(|href| !href.is_empty());
            }
        } else if self.is(&["description", "document-info", "date"]) {
            self.date_value = attribute(decoder, e, b"value");
        } else if want_cover && self.header_done && self.is(&["binary"]) && !self.cover_found {
            let id = attribute(decoder, e, b"id");
            if id.is_some() && id == self.cover_href {
                self.in_cover_binary = true;
                self.cover_type = attribute(decoder, e, b"content-type");
            }
        }
    }

    fn on_text(&mut self, text: String) {
        if self.in_cover_binary {
            self.cover_data
                .extend(text.chars().filter(|c| !c.is_ascii_whitespace()));
        } else if self.in_title_info(&["genre"]) {
            self.meta.genres.push(text);
        } else if self.in_title_info(&["author", "first-name"]) {
            if let Some(first) = self.meta.author_first.last_mut() {
                first.push_str(&text);
            }
        } else if self.in_title_info(&["author", "last-name"]) {
            if let Some(last) = self.meta.author_last.last_mut() {
                last.push_str(&text);
            }
        } else if self.in_title_info(&["book-title"]) {
            self.meta.title.get_or_insert_with(String::new).push_str(&text);
        } else if self.in_title_info(&["lang"]) {
            self.meta.lang.get_or_insert(text);
        } else if self.within(&["description", "title-info", "annotation"]) {
            self.meta.annotation.push(text);
        } else if self.is(&["description", "document-info", "date"]) {
            self.meta.docdate.get_or_insert(text);
        }
    }

    fn finish(mut self) -> BookMetadata {
        if self.meta.docdate.is_none() {
            self.meta.docdate = self.date_value;
        }
        if let Some(id) = self.cover_href {
            self.meta.cover = Some(CoverImage {
                content_type: self.cover_type,
                id: Some(id),
                data: if self.cover_found { self.cover_data } else { String::new() },
            });
        }
        self.meta
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Decode raw bytes with the document encoding and resolve entities.
/// Returns `None` for blank text.
fn decode_text(decoder: Decoder, raw: &[u8]) -> Option<String> {
    let decoded = decoder.decode(raw).ok()?;
    let text = match quick_xml::escape::unescape(&decoded) {
        Ok(unescaped) => unescaped.trim().to_string(),
        // Unknown entities (`&nbsp;` and friends) are kept verbatim
        Err(_) => decoded.trim().to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Value of the attribute whose local name is `name`, ignoring any prefix
/// (`l:href`, `xlink:href`).
fn attribute(decoder: Decoder, e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .with_checks(false)
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .and_then(|attr| decode_text(decoder, &attr.value))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0" xmlns:l="http://www.w3.org/1999/xlink">
  <description>
    <title-info>
      <genre>sf_social</genre>
      <genre>SF</genre>
      <author>
        <first-name>Arkady</first-name>
        <last-name>Strugatsky</last-name>
      </author>
      <author>
        <first-name>Boris</first-name>
        <last-name>Strugatsky</last-name>
      </author>
      <book-title>Roadside Picnic</book-title>
      <annotation>
        <p>A visitation left behind zones.</p>
        <p>Stalkers &amp; artifacts.</p>
      </annotation>
      <coverpage><image l:href="#cover.jpg"/></coverpage>
      <lang>en</lang>
      <sequence name="Noon Universe" number="3"/>
    </title-info>
    <document-info>
      <date value="2004-05-01">1 May 2004</date>
    </document-info>
  </description>
  <body><section><p>Chapter one.</p></section></body>
  <binary id="other.png" content-type="image/png">AAAA</binary>
  <binary id="cover.jpg" content-type="image/jpeg">/9j/
4AAQ</binary>
</FictionBook>
"##;

    #[test]
    fn test_parse_header_fields() {
        let meta = Fb2Parser::new(0, false).parse(SAMPLE.as_bytes()).unwrap();

        assert_eq!(meta.title.as_deref(), Some("Roadside Picnic"));
        assert_eq!(meta.lang.as_deref(), Some("en"));
        assert_eq!(meta.docdate.as_deref(), Some("1 May 2004"));
        assert_eq!(meta.genres, vec!["sf_social", "SF"]);
        assert_eq!(meta.series, vec!["Noon Universe"]);
        assert_eq!(
            meta.annotation,
            vec!["A visitation left behind zones.", "Stalkers & artifacts."]
        );
        assert_eq!(meta.author_first, vec!["Arkady", "Boris"]);
        assert_eq!(meta.author_last, vec!["Strugatsky", "Strugatsky"]);
        assert!(meta.warning.is_none());
    }

    #[test]
    fn test_cover_reference_without_extraction() {
        let meta = Fb2Parser::new(0, false).parse(SAMPLE.as_bytes()).unwrap();
        let cover = meta.cover.unwrap();
        assert_eq!(cover.id.as_deref(), Some("cover.jpg"));
        assert!(cover.content_type.is_none());
        assert!(!cover.has_data());
    }

    #[test]
    fn test_cover_extraction_picks_referenced_binary() {
        let meta = Fb2Parser::new(0, true).parse(SAMPLE.as_bytes()).unwrap();
        let cover = meta.cover.unwrap();
        assert_eq!(cover.id.as_deref(), Some("cover.jpg"));
        assert_eq!(cover.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(cover.data, "/9j/4AAQ");
        assert_eq!(
            crate::cover::decode_payload(&cover.data).unwrap(),
            vec![0xffu8, 0xd8, 0xff, 0xe0, 0x00, 0x10]
        );
        assert!(meta.warning.is_none());
    }

    #[test]
    fn test_parser_is_reusable() {
        let parser = Fb2Parser::new(0, false);
        let first = parser.parse(SAMPLE.as_bytes()).unwrap();
        let second = parser
            .parse(
                r#"<FictionBook><description><title-info><book-title>Other</book-title></title-info></description></FictionBook>"#
                    .as_bytes(),
            )
            .unwrap();

        assert_eq!(first.genres.len(), 2);
        assert_eq!(second.title.as_deref(), Some("Other"));
        assert!(second.genres.is_empty());
        assert!(second.author_first.is_empty());
    }

    #[test]
    fn test_date_value_fallback() {
        let doc = r#"<FictionBook><description><document-info><date value="2010-02-03"/></document-info></description></FictionBook>"#;
        let meta = Fb2Parser::new(0, false).parse(doc.as_bytes()).unwrap();
        assert_eq!(meta.docdate.as_deref(), Some("2010-02-03"));
    }

    #[test]
    fn test_author_without_first_name_keeps_pairing() {
        let doc = r#"<FictionBook><description><title-info>
            <author><last-name>Homer</last-name></author>
            <author><first-name>Jules</first-name><last-name>Verne</last-name></author>
        </title-info></description></FictionBook>"#;
        let meta = Fb2Parser::new(0, false).parse(doc.as_bytes()).unwrap();
        assert_eq!(meta.author_first, vec!["", "Jules"]);
        assert_eq!(meta.author_last, vec!["Homer", "Verne"]);
    }

    #[test]
    fn test_malformed_xml_is_a_warning() {
        let doc = r#"<FictionBook><description><title-info><book-title>Broken</book-title><genre>x</lang></title-info></description></FictionBook>"#;
        let meta = Fb2Parser::new(0, false).parse(doc.as_bytes()).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Broken"));
        assert!(meta.warning.unwrap().contains("malformed XML"));
    }

    #[test]
    fn test_foreign_root_is_a_warning() {
        let meta = Fb2Parser::new(0, false)
            .parse("<html><body>not a book</body></html>".as_bytes())
            .unwrap();
        assert!(meta.title.is_none());
        assert!(meta.warning.unwrap().contains("not <FictionBook>"));
    }

    #[test]
    fn test_header_budget_stops_scanning() {
        let filler = "<p>filler text for the annotation</p>".repeat(200);
        let doc = format!(
            "<FictionBook><description><title-info><book-title>Early</book-title><annotation>{filler}</annotation><lang>ru</lang></title-info></description></FictionBook>"
        );
        let meta = Fb2Parser::new(512, false).parse(doc.as_bytes()).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Early"));
        assert!(meta.lang.is_none());
        assert!(meta.warning.unwrap().contains("512 bytes"));
    }

    #[test]
    fn test_legacy_declared_encoding() {
        let header = r#"<?xml version="1.0" encoding="windows-1251"?><FictionBook><description><title-info><book-title>"#;
        let footer = "</book-title></title-info></description></FictionBook>";
        let (title, _, _) = encoding_rs::WINDOWS_1251.encode("Пикник на обочине");

        let mut doc = header.as_bytes().to_vec();
        doc.extend_from_slice(&title);
        doc.extend_from_slice(footer.as_bytes());

        let meta = Fb2Parser::new(0, false).parse(doc.as_slice()).unwrap();
        assert_eq!(meta.title.as_deref(), Some("Пикник на обочине"));
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("bad CRC"))
        }
    }

    #[test]
    fn test_stream_failure_is_an_error() {
        let err = Fb2Parser::new(0, false).parse(FailingReader).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
