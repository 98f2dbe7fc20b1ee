//! Extension-based MIME classification.
//!
//! This is best effort: Moodle re-detects types on restore, the value in
//! `files.xml` only has to be plausible.

use std::path::Path;

/// Media types the builder knows by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Jpeg,
    Png,
    Gif,
    Text,
    Html,
    Markdown,
    Zip,
    Doc,
    Docx,
    Ppt,
    Pptx,
    Xls,
    Xlsx,
    Xml,
    /// Unknown/binary format
    Binary,
}

impl MediaType {
    /// Classify a path by its (case-insensitive) extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => MediaType::Pdf,
            "jpg" | "jpeg" => MediaType::Jpeg,
            "png" => MediaType::Png,
            "gif" => MediaType::Gif,
            "txt" => MediaType::Text,
            "html" | "htm" => MediaType::Html,
            "md" => MediaType::Markdown,
            "zip" => MediaType::Zip,
            "doc" => MediaType::Doc,
            "docx" => MediaType::Docx,
            "ppt" => MediaType::Ppt,
            "pptx" => MediaType::Pptx,
            "xls" => MediaType::Xls,
            "xlsx" => MediaType::Xlsx,
            "xml" => MediaType::Xml,
            _ => MediaType::Binary,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::Text => "text/plain",
            MediaType::Html => "text/html",
            MediaType::Markdown => "text/markdown",
            MediaType::Zip => "application/zip",
            MediaType::Doc => "application/msword",
            MediaType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            MediaType::Ppt => "application/vnd.ms-powerpoint",
            MediaType::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            MediaType::Xls => "application/vnd.ms-excel",
            MediaType::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            MediaType::Xml => "application/xml",
            MediaType::Binary => "application/octet-stream",
        }
    }
}

/// Shorthand for `MediaType::from_path(path).mime_type()`.
pub fn mime_type_for(path: &Path) -> &'static str {
    MediaType::from_path(path).mime_type()
}
