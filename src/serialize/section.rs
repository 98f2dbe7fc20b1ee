//! `sections/section_<id>/`

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{Course, Section};
use crate::util::escape_xml;

use super::{NULL, RenderContext, XML_DECLARATION, empty_inforef, write_xml};

/// Per-section course format options, `(id, name, value)`.
const SECTION_FORMAT_OPTIONS: &[(u64, &str, &str)] = &[
    (163054, "blockname", ""),
    (163055, "sectionblock", "0"),
    (163056, "sectionstartdate", "0"),
    (163057, "sectiontype", "0"),
];

/// Directory of a section relative to the backup root.
pub fn section_directory(section: &Section) -> String {
    format!("sections/section_{}", section.id)
}

/// Comma-separated module ids of the section's activities.
pub fn sequence(course: &Course, section: &Section) -> String {
    section
        .activities
        .iter()
        .map(|a| course.activity(*a).module_id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn render_section(course: &Course, section: &Section, ctx: &RenderContext<'_>) -> String {
    let format = &ctx.settings.course_format;
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&format!("<section id=\"{}\">\n", section.id));
    xml.push_str(&format!("  <number>{}</number>\n", section.number));
    xml.push_str(&format!("  <name>{}</name>\n", escape_xml(&section.title)));
    xml.push_str(&format!("  <summary>{}</summary>\n", escape_xml(&section.summary)));
    xml.push_str("  <summaryformat>1</summaryformat>\n");
    xml.push_str(&format!("  <sequence>{}</sequence>\n", sequence(course, section)));
    xml.push_str("  <visible>1</visible>\n");
    xml.push_str("  <availabilityjson>{\"op\":\"&amp;\",\"c\":[],\"showc\":[]}</availabilityjson>\n");
    xml.push_str(&format!("  <component>{NULL}</component>\n"));
    xml.push_str(&format!("  <itemid>{NULL}</itemid>\n"));
    xml.push_str(&format!("  <timemodified>{}</timemodified>\n", ctx.timestamp));
    for (id, name, value) in SECTION_FORMAT_OPTIONS {
        xml.push_str(&format!("  <course_format_options id=\"{id}\">\n"));
        xml.push_str(&format!("    <format>{format}</format>\n"));
        xml.push_str(&format!("    <name>{name}</name>\n"));
        xml.push_str(&format!("    <value>{value}</value>\n"));
        xml.push_str("  </course_format_options>\n");
    }
    xml.push_str("</section>\n");
    xml
}

/// Write `<backup>/sections/section_<id>/` and return its path.
pub fn write_section(
    root: &Path,
    course: &Course,
    section: &Section,
    ctx: &RenderContext<'_>,
) -> Result<PathBuf> {
    let dir = root.join(section_directory(section));
    fs::create_dir_all(&dir)?;
    write_xml(&dir, "inforef.xml", &empty_inforef())?;
    write_xml(&dir, "section.xml", &render_section(course, section, ctx))?;
    Ok(dir)
}
