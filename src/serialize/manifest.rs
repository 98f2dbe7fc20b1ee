//! `moodle_backup.xml`, the top-level backup manifest.
//!
//! Restore reads this document first: it names every section and activity
//! directory in the archive and the settings the backup was taken with.

use std::path::Path;

use crate::content::hash_bytes;
use crate::error::Result;
use crate::model::Course;
use crate::util::escape_xml;

use super::activity::activity_directory;
use super::section::section_directory;
use super::{RenderContext, XML_DECLARATION, write_xml};

/// Root-level settings that are always disabled.
const DISABLED_ROOT_SETTINGS: &[&str] = &[
    "filters",
    "comments",
    "badges",
    "calendarevents",
    "userscompletion",
    "logs",
    "grade_histories",
    "questionbank",
    "groups",
    "competencies",
    "customfield",
    "contentbankcontent",
    "xapistate",
    "legacyfiles",
];

/// Identity of a backup: SHA-1 of the course short name followed by its id.
pub fn backup_id(course: &Course) -> String {
    hash_bytes(format!("{}{}", course.name, course.id).as_bytes())
}

fn push_setting(
    xml: &mut String,
    level: &str,
    scope: Option<(&str, &str)>,
    name: &str,
    value: &str,
) {
    xml.push_str("      <setting>\n");
    xml.push_str(&format!("        <level>{level}</level>\n"));
    if let Some((tag, owner)) = scope {
        xml.push_str(&format!("        <{tag}>{owner}</{tag}>\n"));
    }
    xml.push_str(&format!("        <name>{name}</name>\n"));
    xml.push_str(&format!("        <value>{value}</value>\n"));
    xml.push_str("      </setting>\n");
}

/// Render `moodle_backup.xml` for an archive called `filename`.
///
/// The document ends right after `</moodle_backup>` with no newline, like
/// Moodle's own exporter.
pub fn render_manifest(course: &Course, filename: &str, ctx: &RenderContext<'_>) -> String {
    let s = ctx.settings;
    let filename = escape_xml(filename);
    let course_name = escape_xml(&course.name);
    let file_count = course.files().len();
    let activity_count = course.activities().len();

    let mut xml = String::from(XML_DECLARATION);
    xml.push_str("<moodle_backup>\n  <information>\n");
    xml.push_str(&format!("    <name>{filename}</name>\n"));
    xml.push_str(&format!("    <moodle_version>{}</moodle_version>\n", s.moodle_version));
    xml.push_str(&format!("    <moodle_release>{}</moodle_release>\n", s.moodle_release));
    xml.push_str(&format!("    <backup_version>{}</backup_version>\n", s.backup_version));
    xml.push_str(&format!("    <backup_release>{}</backup_release>\n", s.backup_release));
    xml.push_str(&format!("    <backup_date>{}</backup_date>\n", ctx.timestamp));
    xml.push_str("    <mnet_remoteusers>0</mnet_remoteusers>\n");
    xml.push_str(&format!("    <include_files>{file_count}</include_files>\n"));
    xml.push_str("    <include_file_references_to_external_content>0</include_file_references_to_external_content>\n");
    xml.push_str(&format!(
        "    <original_wwwroot>{}</original_wwwroot>\n",
        escape_xml(&s.original_wwwroot)
    ));
    xml.push_str(&format!(
        "    <original_site_identifier_hash>{}</original_site_identifier_hash>\n",
        s.original_site_identifier_hash
    ));
    xml.push_str(&format!("    <original_course_id>{}</original_course_id>\n", course.id));
    xml.push_str(&format!(
        "    <original_course_format>{}</original_course_format>\n",
        s.course_format
    ));
    xml.push_str(&format!(
        "    <original_course_fullname>{}</original_course_fullname>\n",
        escape_xml(&course.title)
    ));
    xml.push_str(&format!(
        "    <original_course_shortname>{course_name}</original_course_shortname>\n"
    ));
    xml.push_str("    <original_course_startdate>0</original_course_startdate>\n");
    xml.push_str("    <original_course_enddate>0</original_course_enddate>\n");
    xml.push_str(&format!(
        "    <original_course_contextid>{}</original_course_contextid>\n",
        s.course_context_id
    ));
    xml.push_str("    <original_system_contextid>1</original_system_contextid>\n");
    xml.push_str("    <details>\n");
    xml.push_str(&format!("      <detail backup_id=\"{}\">\n", backup_id(course)));
    xml.push_str(concat!(
        "        <type>course</type>\n",
        "        <format>moodle2</format>\n",
        "        <interactive>1</interactive>\n",
        "        <mode>70</mode>\n",
        "        <execution>2</execution>\n",
        "        <executiontime>0</executiontime>\n",
        "      </detail>\n",
        "    </details>\n",
    ));

    xml.push_str("    <contents>\n");
    if !course.activities().is_empty() {
        xml.push_str("      <activities>\n");
        for activity in course.activities() {
            let section_id = course.activity_section(activity).map(|s| s.id).unwrap_or(0);
            xml.push_str("        <activity>\n");
            xml.push_str(&format!("          <moduleid>{}</moduleid>\n", activity.module_id));
            xml.push_str(&format!("          <sectionid>{section_id}</sectionid>\n"));
            xml.push_str(&format!(
                "          <modulename>{}</modulename>\n",
                activity.modulename()
            ));
            xml.push_str(&format!("          <title>{}</title>\n", escape_xml(&activity.title)));
            xml.push_str(&format!(
                "          <directory>{}</directory>\n",
                activity_directory(activity)
            ));
            xml.push_str("          <insubsection></insubsection>\n");
            xml.push_str("        </activity>\n");
        }
        xml.push_str("      </activities>\n");
    }
    if !course.sections().is_empty() {
        xml.push_str("      <sections>\n");
        for section in course.sections() {
            xml.push_str("        <section>\n");
            xml.push_str(&format!("          <sectionid>{}</sectionid>\n", section.id));
            xml.push_str(&format!("          <title>{}</title>\n", escape_xml(&section.title)));
            xml.push_str(&format!(
                "          <directory>{}</directory>\n",
                section_directory(section)
            ));
            xml.push_str("          <parentcmid></parentcmid>\n");
            xml.push_str("          <modname></modname>\n");
            xml.push_str("        </section>\n");
        }
        xml.push_str("      </sections>\n");
    }
    xml.push_str("      <course>\n");
    xml.push_str(&format!("        <courseid>{}</courseid>\n", course.id));
    xml.push_str(&format!("        <title>{course_name}</title>\n"));
    xml.push_str("        <directory>course</directory>\n");
    xml.push_str("      </course>\n");
    xml.push_str("    </contents>\n");

    xml.push_str("    <settings>\n");
    push_setting(&mut xml, "root", None, "filename", &filename);
    push_setting(&mut xml, "root", None, "users", "0");
    push_setting(&mut xml, "root", None, "anonymize", "0");
    push_setting(&mut xml, "root", None, "role_assignments", "0");
    push_setting(&mut xml, "root", None, "activities", &activity_count.to_string());
    push_setting(&mut xml, "root", None, "blocks", "0");
    push_setting(&mut xml, "root", None, "files", &file_count.to_string());
    for name in DISABLED_ROOT_SETTINGS {
        push_setting(&mut xml, "root", None, name, "0");
    }
    for section in course.sections() {
        let key = format!("section_{}", section.id);
        let scope = Some(("section", key.as_str()));
        push_setting(&mut xml, "section", scope, &format!("{key}_included"), "1");
        push_setting(&mut xml, "section", scope, &format!("{key}_userinfo"), "0");
    }
    for activity in course.activities() {
        let key = activity.directory_name();
        let scope = Some(("activity", key.as_str()));
        push_setting(&mut xml, "activity", scope, &format!("{key}_included"), "1");
        push_setting(&mut xml, "activity", scope, &format!("{key}_userinfo"), "0");
    }
    xml.push_str("    </settings>\n  </information>\n</moodle_backup>");
    xml
}

/// Write `moodle_backup.xml` into the backup root.
pub fn write_manifest(
    root: &Path,
    course: &Course,
    filename: &str,
    ctx: &RenderContext<'_>,
) -> Result<()> {
    write_xml(root, "moodle_backup.xml", &render_manifest(course, filename, ctx))
}
