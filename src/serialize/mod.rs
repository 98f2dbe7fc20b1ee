//! Moodle backup XML serializers.
//!
//! Each submodule renders one entity kind into the fixed-schema XML Moodle's
//! restore expects. Rendering and writing are split: `render_*` functions
//! return the document as a `String` (easy to test), `write_*` functions put
//! the documents for one entity into an explicit destination directory.
//!
//! Free text (titles, names, summaries) is escaped at this layer. The model
//! keeps it raw.

pub mod activity;
pub mod course;
pub mod files;
pub mod lesson;
pub mod manifest;
pub mod root;
pub mod scorm;
pub mod section;

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::settings::BackupSettings;

/// Moodle's marker for a `NULL` column value.
pub const NULL: &str = "$@NULL@$";

/// XML declaration that starts every document.
pub const XML_DECLARATION: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Values shared by every serializer in one build.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub settings: &'a BackupSettings,
    /// Build time, seconds since the epoch.
    pub timestamp: u64,
}

impl<'a> RenderContext<'a> {
    pub fn new(settings: &'a BackupSettings, timestamp: u64) -> Self {
        Self {
            settings,
            timestamp,
        }
    }
}

/// Render a document that is only a root element with empty children.
///
/// ```
/// use mbz::serialize::emit_empty_container;
///
/// let xml = emit_empty_container("roles", &["role_overrides"]);
/// assert_eq!(
///     xml,
///     "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<roles>\n  <role_overrides>\n  </role_overrides>\n</roles>\n"
/// );
/// ```
pub fn emit_empty_container(root: &str, children: &[&str]) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&format!("<{root}>\n"));
    for child in children {
        xml.push_str(&format!("  <{child}>\n  </{child}>\n"));
    }
    xml.push_str(&format!("</{root}>\n"));
    xml
}

/// Write `content` to `dir/name`.
pub fn write_xml(dir: &Path, name: &str, content: &str) -> Result<()> {
    fs::write(dir.join(name), content)?;
    Ok(())
}

/// `roles.xml` as found in course and activity directories.
pub(crate) fn empty_roles() -> String {
    emit_empty_container("roles", &["role_overrides", "role_assignments"])
}

/// `inforef.xml` without references.
pub(crate) fn empty_inforef() -> String {
    emit_empty_container("inforef", &[])
}
