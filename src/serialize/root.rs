//! Top-level documents next to `moodle_backup.xml`.

use std::path::Path;

use crate::error::Result;
use crate::model::Course;

use super::files::render_files;
use super::{NULL, RenderContext, XML_DECLARATION, emit_empty_container, write_xml};

pub fn render_groups() -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(concat!(
        "<groups>\n",
        "  <groupcustomfields>\n",
        "  </groupcustomfields>\n",
        "  <groupings>\n",
        "    <groupingcustomfields>\n",
        "    </groupingcustomfields>\n",
        "  </groupings>\n",
        "</groups>\n",
    ));
    xml
}

/// Definition of the single role referenced by enrolments.
pub fn render_roles_definition(ctx: &RenderContext<'_>) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str("<roles_definition>\n");
    xml.push_str(&format!("  <role id=\"{}\">\n", ctx.settings.role_id));
    xml.push_str("    <name>{mlang de}TeilnehmerIn{mlang}{mlang en}Participant{mlang}</name>\n");
    xml.push_str("    <shortname>student</shortname>\n");
    xml.push_str(&format!("    <nameincourse>{NULL}</nameincourse>\n"));
    xml.push_str("    <description>Standardrolle - für Studierende in Lehrveranstaltungen und für normale TeilnehmerInnen in nicht-LV Kursen</description>\n");
    xml.push_str("    <sortorder>13</sortorder>\n    <archetype>student</archetype>\n");
    xml.push_str("  </role>\n</roles_definition>\n");
    xml
}

/// Write `files.xml`, `groups.xml`, `outcomes.xml`, `questions.xml`,
/// `roles.xml` and `scales.xml` into the backup root.
pub fn write_root_documents(root: &Path, course: &Course, ctx: &RenderContext<'_>) -> Result<()> {
    write_xml(root, "files.xml", &render_files(course.files()))?;
    write_xml(root, "groups.xml", &render_groups())?;
    write_xml(root, "outcomes.xml", &emit_empty_container("outcomes_definition", &[]))?;
    write_xml(root, "questions.xml", &emit_empty_container("question_categories", &[]))?;
    write_xml(root, "roles.xml", &render_roles_definition(ctx))?;
    write_xml(root, "scales.xml", &emit_empty_container("scales_definition", &[]))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::BackupSettings;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_roles_definition() {
        let settings = BackupSettings::default();
        let xml = render_roles_definition(&RenderContext::new(&settings, 1));
        assert!(xml.contains("<role id=\"5\">"));
        assert!(xml.contains("<archetype>student</archetype>"));
    }

    #[test]
    fn test_write_root_documents() {
        let dir = TempDir::new().unwrap();
        let settings = BackupSettings::default();
        let course = Course::new("c", "C", 1);
        write_root_documents(dir.path(), &course, &RenderContext::new(&settings, 1)).unwrap();
        for name in [
            "files.xml",
            "groups.xml",
            "outcomes.xml",
            "questions.xml",
            "roles.xml",
            "scales.xml",
        ] {
            assert!(dir.path().join(name).is_file(), "{name}");
        }
        let scales = fs::read_to_string(dir.path().join("scales.xml")).unwrap();
        assert!(scales.contains("<scales_definition>\n</scales_definition>"));
    }
}
