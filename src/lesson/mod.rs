//! Interactive lesson documents.
//!
//! A lesson is a sequence of pages. Each page has a title, an HTML body, a
//! [`PageType`] that decides how Moodle presents it, and a list of outgoing
//! [`LessonLink`]s that become the page's answers. Links carry their jump
//! target and score in `moodle://` query parameters, e.g.
//! `[Next](moodle://jump?jumpto=-1&score=1)`.
//!
//! [`reader`] builds a [`LessonDocument`] from Markdown.

pub mod reader;

use std::collections::BTreeMap;

pub use reader::{parse_front_matter, read_lesson};

/// Scheme prefix of links that turn into lesson answers.
pub const MOODLE_SCHEME: &str = "moodle://";

/// How Moodle presents a lesson page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageType {
    /// Plain content page with navigation buttons.
    #[default]
    Content,
    Essay,
    ShortAnswer,
    TrueFalse,
}

impl PageType {
    /// Parse the `TYPE:` token of a page. Unknown tokens are content pages.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_uppercase().as_str() {
            "ESSAY" => PageType::Essay,
            "SHORTANSWER" => PageType::ShortAnswer,
            "TRUEFALSE" => PageType::TrueFalse,
            _ => PageType::Content,
        }
    }

    /// Moodle's `qtype` code for this page type.
    pub fn qtype(self) -> u32 {
        match self {
            PageType::ShortAnswer => 1,
            PageType::TrueFalse => 2,
            PageType::Essay => 10,
            PageType::Content => 20,
        }
    }
}

/// An outgoing `moodle://` link on a lesson page.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LessonLink {
    /// Visible link text. May be empty.
    pub text: String,
    /// The part between `moodle://` and `?`.
    pub kind: String,
    pub params: BTreeMap<String, String>,
}

impl LessonLink {
    /// Parse a `moodle://kind?k=v&...` URL. Returns `None` for other schemes.
    pub fn parse(url: &str, text: &str) -> Option<Self> {
        let rest = url.strip_prefix(MOODLE_SCHEME)?;
        let (kind, query) = match rest.split_once('?') {
            Some((kind, query)) => (kind, Some(query)),
            None => (rest, None),
        };
        let mut params = BTreeMap::new();
        for pair in query.into_iter().flat_map(|q| q.split('&')) {
            if let Some((key, value)) = pair.split_once('=') {
                let value = percent_encoding::percent_decode_str(value)
                    .decode_utf8_lossy()
                    .into_owned();
                params.insert(key.to_string(), value);
            }
        }
        Some(Self {
            text: text.to_string(),
            kind: kind.to_string(),
            params,
        })
    }

    /// Integer query parameter, `0` when absent or not a number.
    pub fn int_param(&self, key: &str) -> i64 {
        self.params
            .get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }

    /// Target page of the answer (`jumpto`). Moodle uses negative sentinels
    /// such as `-1` for "next page".
    pub fn jumpto(&self) -> i64 {
        self.int_param("jumpto")
    }

    pub fn score(&self) -> i64 {
        self.int_param("score")
    }
}

/// One page of a lesson.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LessonPage {
    pub title: String,
    /// Rendered HTML body (escaped again when written to XML).
    pub html: String,
    pub page_type: PageType,
    pub links: Vec<LessonLink>,
}

impl LessonPage {
    pub fn new(title: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, page_type: PageType) -> Self {
        self.page_type = page_type;
        self
    }

    pub fn with_link(mut self, link: LessonLink) -> Self {
        self.links.push(link);
        self
    }
}

/// A parsed multi-page lesson.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LessonDocument {
    pub title: String,
    pub metadata: BTreeMap<String, String>,
    pub pages: Vec<LessonPage>,
}

impl LessonDocument {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn add_page(&mut self, page: LessonPage) {
        self.pages.push(page);
    }

    /// Total number of answers over all pages.
    pub fn answer_count(&self) -> usize {
        self.pages.iter().map(|p| p.links.len()).sum()
    }
}
