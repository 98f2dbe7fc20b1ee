//! Markdown lesson reader.
//!
//! Lessons are authored as Markdown with an optional front-matter block and
//! pages separated by `---` lines:
//!
//! ```text
//! ---
//! title: Object basics
//! moodle: true
//! ---
//! # What is an object?
//! <!-- TYPE: TRUEFALSE -->
//! Objects bundle state and behaviour.
//! [True](moodle://answer?jumpto=-1&score=1)
//! [False](moodle://answer?jumpto=0)
//! ---
//! ## Summary
//! ...
//! ```
//!
//! Link lines pointing at `moodle://` and `<!-- ... -->` comment lines are
//! taken out of the page body; what remains is rendered to a small HTML
//! subset (headings, paragraphs, lists, fenced code, emphasis, links and
//! images). Anything fancier is passed through as escaped text.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::util::{decode_text, escape_xml};

use super::{LessonDocument, LessonLink, LessonPage, PageType};

/// Front matter is only looked for within this many leading lines.
const MAX_FRONT_MATTER_LINES: usize = 30;

/// Read and parse a Markdown lesson from disk.
pub fn read_lesson(path: &Path) -> Result<LessonDocument> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let text = decode_text(&bytes, None);
    let mut doc = parse_lesson(&text);
    if doc.title.is_empty()
        && let Some(stem) = path.file_stem()
    {
        doc.title = stem.to_string_lossy().replace('-', " ");
    }
    Ok(doc)
}

/// Parse a Markdown lesson held in memory.
pub fn parse_lesson(text: &str) -> LessonDocument {
    let text = text.replace("\r\n", "\n");
    let (metadata, body) = parse_front_matter(&text);

    let pages: Vec<LessonPage> = if body.trim().is_empty() {
        Vec::new()
    } else {
        body.split("\n---\n")
            .map(|chunk| parse_page(chunk.trim()))
            .collect()
    };

    let title = metadata
        .get("title")
        .cloned()
        .or_else(|| pages.first().map(|p| p.title.clone()))
        .unwrap_or_default();

    LessonDocument {
        title,
        metadata,
        pages,
    }
}

/// Split `key: value` front matter from the rest of the document.
///
/// The block must open on the first line with `---` and close with another
/// `---` within the first [`MAX_FRONT_MATTER_LINES`] lines; otherwise the
/// whole text is body. Surrounding quotes are stripped from values and
/// `true`/`false` are normalised to lowercase.
pub fn parse_front_matter(text: &str) -> (BTreeMap<String, String>, &str) {
    let mut metadata = BTreeMap::new();
    if text.lines().next().map(str::trim) != Some("---") {
        return (metadata, text);
    }

    let mut offset = text.find('\n').map(|i| i + 1).unwrap_or(text.len());
    let mut entries = Vec::new();
    let mut closed = false;
    for _ in 0..MAX_FRONT_MATTER_LINES {
        if offset >= text.len() {
            break;
        }
        let end = text[offset..]
            .find('\n')
            .map(|i| offset + i + 1)
            .unwrap_or(text.len());
        let line = text[offset..end].trim();
        offset = end;
        if line == "---" {
            closed = true;
            break;
        }
        entries.push(line);
    }
    if !closed {
        return (metadata, text);
    }

    for line in entries {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let mut value = value.trim();
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        let value = if value.eq_ignore_ascii_case("true") {
            "true".to_string()
        } else if value.eq_ignore_ascii_case("false") {
            "false".to_string()
        } else {
            value.to_string()
        };
        metadata.insert(key.trim().to_string(), value);
    }

    (metadata, &text[offset..])
}

fn parse_page(content: &str) -> LessonPage {
    let mut title = String::new();
    let mut page_type = PageType::Content;
    let mut links = Vec::new();
    let mut body = Vec::new();

    for line in content.lines() {
        let stripped = line.trim();

        if title.is_empty()
            && let Some(heading) = ["# ", "## ", "### "]
                .iter()
                .find_map(|p| stripped.strip_prefix(p))
        {
            title = heading.trim().to_string();
        }

        if let Some(link) = moodle_link_line(stripped) {
            links.push(link);
            continue;
        }

        if let Some(comment) = stripped
            .strip_prefix("<!--")
            .and_then(|s| s.strip_suffix("-->"))
        {
            if let Some(token) = comment.trim().strip_prefix("TYPE:") {
                page_type = PageType::from_token(token);
            }
            continue;
        }

        body.push(line);
    }

    LessonPage {
        title,
        html: render_markdown(&body.join("\n")),
        page_type,
        links,
    }
}

/// A line of the form `[text](moodle://...)`.
fn moodle_link_line(line: &str) -> Option<LessonLink> {
    if !line.starts_with('[') {
        return None;
    }
    let start = line.find("](moodle:")?;
    let end = start + line[start..].find(')')?;
    let text = &line[1..start];
    let url = &line[start + 2..end];
    LessonLink::parse(url, text)
}

// ============================================================================
// Markdown subset
// ============================================================================

#[derive(PartialEq)]
enum Block {
    None,
    Paragraph,
    Bullets,
    Numbered,
}

/// Render a small Markdown subset to HTML.
pub fn render_markdown(text: &str) -> String {
    let mut html = String::new();
    let mut block = Block::None;
    let mut paragraph: Vec<&str> = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();

        if let Some(lang) = trimmed.strip_prefix("```") {
            close_block(&mut html, &mut block, &mut paragraph);
            let mut code = Vec::new();
            for inner in lines.by_ref() {
                if inner.trim_start().starts_with("```") {
                    break;
                }
                code.push(inner);
            }
            let lang = lang.trim();
            if lang.is_empty() {
                html.push_str("<pre><code>");
            } else {
                html.push_str(&format!(
                    "<pre><code class=\"language-{}\">",
                    escape_attr(lang)
                ));
            }
            html.push_str(&escape_xml(&code.join("\n")));
            html.push_str("</code></pre>\n");
            continue;
        }

        if trimmed.is_empty() {
            close_block(&mut html, &mut block, &mut paragraph);
            continue;
        }

        if let Some((level, heading)) = heading_line(trimmed) {
            close_block(&mut html, &mut block, &mut paragraph);
            html.push_str(&format!(
                "<h{level}>{}</h{level}>\n",
                render_inline(heading)
            ));
            continue;
        }

        if let Some(item) = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
        {
            open_list(&mut html, &mut block, &mut paragraph, Block::Bullets);
            html.push_str(&format!("<li>{}</li>\n", render_inline(item)));
            continue;
        }

        if let Some(item) = numbered_item(trimmed) {
            open_list(&mut html, &mut block, &mut paragraph, Block::Numbered);
            html.push_str(&format!("<li>{}</li>\n", render_inline(item)));
            continue;
        }

        if block != Block::Paragraph {
            close_block(&mut html, &mut block, &mut paragraph);
            block = Block::Paragraph;
        }
        paragraph.push(trimmed);
    }

    close_block(&mut html, &mut block, &mut paragraph);
    html
}

fn heading_line(line: &str) -> Option<(usize, &str)> {
    let level = line.bytes().take_while(|&b| b == b'#').count();
    if (1..=6).contains(&level) {
        line[level..].strip_prefix(' ').map(|rest| (level, rest.trim()))
    } else {
        None
    }
}

fn numbered_item(line: &str) -> Option<&str> {
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    line[digits..].strip_prefix(". ")
}

fn open_list(html: &mut String, block: &mut Block, paragraph: &mut Vec<&str>, kind: Block) {
    if *block == kind {
        return;
    }
    close_block(html, block, paragraph);
    html.push_str(if kind == Block::Bullets {
        "<ul>\n"
    } else {
        "<ol>\n"
    });
    *block = kind;
}

fn close_block(html: &mut String, block: &mut Block, paragraph: &mut Vec<&str>) {
    match block {
        Block::None => {}
        Block::Paragraph => {
            html.push_str(&format!("<p>{}</p>\n", render_inline(&paragraph.join("\n"))));
            paragraph.clear();
        }
        Block::Bullets => html.push_str("</ul>\n"),
        Block::Numbered => html.push_str("</ol>\n"),
    }
    *block = Block::None;
}

/// Inline spans: code, images, links, `**strong**` and `*em*`.
fn render_inline(text: &str) -> String {
    let mut out = String::new();
    // Odd segments are inside backticks.
    for (i, segment) in text.split('`').enumerate() {
        if i % 2 == 1 {
            out.push_str("<code>");
            out.push_str(&escape_xml(segment));
            out.push_str("</code>");
        } else {
            let escaped = escape_xml(segment);
            let linked = render_links(&escaped);
            let strong = wrap_pairs(&linked, "**", "strong");
            out.push_str(&wrap_pairs(&strong, "*", "em"));
        }
    }
    out
}

fn render_links(text: &str) -> String {
    let mut out = String::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let Some(mid) = rest[open..].find("](").map(|i| open + i) else {
            break;
        };
        let Some(close) = rest[mid..].find(')').map(|i| mid + i) else {
            break;
        };
        let is_image = open > 0 && rest.as_bytes()[open - 1] == b'!';
        let label = &rest[open + 1..mid];
        let url = escape_attr(&rest[mid + 2..close]);
        if is_image {
            out.push_str(&rest[..open - 1]);
            out.push_str(&format!("<img src=\"{url}\" alt=\"{}\" />", escape_attr(label)));
        } else {
            out.push_str(&rest[..open]);
            out.push_str(&format!("<a href=\"{url}\">{label}</a>"));
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Wrap balanced `delim ... delim` pairs in `<tag>`. An unmatched trailing
/// delimiter is left as literal text.
fn wrap_pairs(text: &str, delim: &str, tag: &str) -> String {
    let mut out = String::new();
    let mut rest = text;
    while let Some(start) = rest.find(delim) {
        let after = &rest[start + delim.len()..];
        let Some(end) = after.find(delim) else {
            break;
        };
        if end == 0 {
            out.push_str(&rest[..start + delim.len() * 2]);
            rest = &after[delim.len()..];
            continue;
        }
        out.push_str(&rest[..start]);
        out.push_str(&format!("<{tag}>{}</{tag}>", &after[..end]));
        rest = &after[end + delim.len()..];
    }
    out.push_str(rest);
    out
}

fn escape_attr(s: &str) -> String {
    s.replace('"', "&quot;")
}
