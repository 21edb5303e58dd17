pub mod fb2;

/// Annotations longer than this many characters are truncated.
pub const MAX_ANNOTATION_CHARS: usize = 10_000;

/// Characters stripped from both ends of free-text metadata fields.
///
/// Whitespace is always stripped as well. The set covers the quoting and
/// decoration that hand-made FB2 headers tend to wrap around titles and
/// names (`"Title"`, `- Name -`, `#Series`, backticks and stray escapes).
pub const TRIM_CHARS: &[char] = &['\'', '"', '&', '-', '.', '#', '\\', '`'];

/// Trim whitespace and [`TRIM_CHARS`] from both ends of a field.
pub fn trim_field(value: &str) -> String {
    value
        .trim_matches(|c: char| c.is_whitespace() || TRIM_CHARS.contains(&c))
        .to_string()
}

/// Join annotation lines and cut the result to [`MAX_ANNOTATION_CHARS`].
pub fn join_annotation(lines: &[String]) -> String {
    let joined = lines.join("\n");
    if joined.chars().count() > MAX_ANNOTATION_CHARS {
        joined.chars().take(MAX_ANNOTATION_CHARS).collect()
    } else {
        joined
    }
}

/// Embedded cover image as reported by the parser.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverImage {
    pub content_type: Option<String>,
    /// Binary id referenced from the cover page, without the leading `#`.
    pub id: Option<String>,
    /// Base64 payload, possibly wrapped across lines.
    pub data: String,
}

impl CoverImage {
    pub fn has_data(&self) -> bool {
        !self.data.trim().is_empty()
    }
}

/// Raw bibliographic fields extracted from one file.
///
/// Values are reported as found in the document; trimming and fallbacks are
/// applied by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookMetadata {
    pub title: Option<String>,
    pub lang: Option<String>,
    pub annotation: Vec<String>,
    pub docdate: Option<String>,
    /// First names, index-aligned with `author_last`.
    pub author_first: Vec<String>,
    pub author_last: Vec<String>,
    pub genres: Vec<String>,
    pub series: Vec<String>,
    pub cover: Option<CoverImage>,
    /// Non-fatal problem met while parsing. The fields above hold whatever
    /// was read before it.
    pub warning: Option<String>,
}

impl BookMetadata {
    /// Author (first, last) pairs in document order.
    pub fn authors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.author_first
            .iter()
            .zip(self.author_last.iter())
            .map(|(first, last)| (first.as_str(), last.as_str()))
    }
}
