//! Error types for archive building.

use std::path::PathBuf;

use thiserror::Error;

use crate::assemble::BuildState;
use crate::ids::IdKind;

/// Errors that can occur while ingesting content or assembling a backup.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// A referenced source file or SCORM package does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// `imsmanifest.xml` could not be parsed.
    #[error("Invalid imsmanifest.xml: {0}")]
    ManifestParse(String),

    /// An identifier kind ran past the end of its reserved range.
    #[error("Identifier range exhausted for {0:?}")]
    IdRangeExhausted(IdKind),

    /// The output directory or archive exists and replacing it was not requested.
    #[error("Output already exists: {}", .0.display())]
    OutputExists(PathBuf),

    /// An assembler step was invoked out of order.
    #[error("Invalid build state: expected {expected:?}, found {found:?}")]
    InvalidState {
        expected: BuildState,
        found: BuildState,
    },

    /// An archive name that is empty, `.`/`..`, or contains a path separator.
    #[error("Invalid archive name: {0:?}")]
    InvalidName(String),

    /// A section name was looked up that the course does not contain.
    #[error("Unknown section: {0}")]
    UnknownSection(String),
}

pub type Result<T> = std::result::Result<T, Error>;
