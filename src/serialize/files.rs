//! `files.xml`: one `<file>` per registered file.

use crate::content::{BackupFile, Component};
use crate::util::escape_xml;

use super::{NULL, XML_DECLARATION};

/// Render `files.xml`.
///
/// Only resource files carry their name in `<source>`; files owned by other
/// components are internal assets and get `NULL`.
pub fn render_files(files: &[BackupFile]) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str("<files>\n");
    for f in files {
        let filename = escape_xml(&f.filename);
        let source = if f.component == Component::Resource {
            filename.clone()
        } else {
            NULL.into()
        };
        xml.push_str(&format!("  <file id=\"{}\">\n", f.id));
        xml.push_str(&format!("    <contenthash>{}</contenthash>\n", f.content_hash));
        xml.push_str(&format!("    <contextid>{}</contextid>\n", f.context_id));
        xml.push_str(&format!("    <component>{}</component>\n", f.component));
        xml.push_str(&format!("    <filearea>{}</filearea>\n", f.filearea));
        xml.push_str("    <itemid>0</itemid>\n");
        xml.push_str(&format!(
            "    <filepath>{}</filepath>\n",
            escape_xml(&f.moodle_filepath())
        ));
        xml.push_str(&format!("    <filename>{filename}</filename>\n"));
        xml.push_str(&format!("    <userid>{NULL}</userid>\n"));
        xml.push_str(&format!("    <filesize>{}</filesize>\n", f.filesize));
        xml.push_str(&format!("    <mimetype>{}</mimetype>\n", f.mimetype));
        xml.push_str("    <status>0</status>\n");
        xml.push_str(&format!("    <timecreated>{}</timecreated>\n", f.time_created));
        xml.push_str(&format!("    <timemodified>{}</timemodified>\n", f.time_modified));
        xml.push_str(&format!("    <source>{source}</source>\n"));
        xml.push_str(&format!("    <author>{NULL}</author>\n"));
        xml.push_str(&format!("    <license>{NULL}</license>\n"));
        xml.push_str("    <sortorder>1</sortorder>\n");
        xml.push_str(&format!("    <repositorytype>{NULL}</repositorytype>\n"));
        xml.push_str(&format!("    <repositoryid>{NULL}</repositoryid>\n"));
        xml.push_str(&format!("    <reference>{NULL}</reference>\n"));
        xml.push_str("  </file>\n");
    }
    xml.push_str("</files>\n");
    xml
}
