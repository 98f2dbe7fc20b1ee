//! `activities/<modulename>_<moduleid>/`
//!
//! Every activity directory holds the same five module-independent documents
//! plus one `<modulename>.xml` with the module's own data. Resource activities
//! are rendered here; SCORM and lesson activities have their own modules.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;
use crate::model::{Activity, ActivityKind, Course};
use crate::util::escape_xml;

use super::{NULL, RenderContext, XML_DECLARATION, emit_empty_container, empty_roles, write_xml};

/// Directory of an activity relative to the backup root.
pub fn activity_directory(activity: &Activity) -> String {
    format!("activities/{}", activity.directory_name())
}

/// `(sectionid, sectionnumber)` of an activity, `(0, 0)` when unplaced.
pub fn section_fields(course: &Course, activity: &Activity) -> (u64, u32) {
    match course.activity_section(activity) {
        Some(section) => (section.id, section.number),
        None => {
            warn!(
                activity = %activity.name,
                module_id = activity.module_id,
                "Activity is not placed in a section"
            );
            (0, 0)
        }
    }
}

/// Opening `<activity>` tag shared by every module document.
pub(crate) fn activity_open_tag(course: &Course, activity: &Activity) -> String {
    format!(
        "<activity id=\"{}\" moduleid=\"{}\" modulename=\"{}\" contextid=\"{}\">\n",
        activity.id,
        activity.module_id,
        activity.modulename(),
        course.activity_context_id(activity)
    )
}

pub fn render_inforef(course: &Course, activity: &Activity) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str("<inforef>\n  <fileref>\n");
    for file in course.activity_files(activity) {
        xml.push_str(&format!("    <file>\n      <id>{}</id>\n    </file>\n", file.id));
    }
    xml.push_str("  </fileref>\n</inforef>\n");
    xml
}

pub fn render_module(course: &Course, activity: &Activity, ctx: &RenderContext<'_>) -> String {
    let (section_id, section_number) = section_fields(course, activity);
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&format!(
        "<module id=\"{}\" version=\"{}\">\n",
        activity.module_id, ctx.settings.backup_version
    ));
    xml.push_str(&format!("  <modulename>{}</modulename>\n", activity.modulename()));
    xml.push_str(&format!("  <sectionid>{section_id}</sectionid>\n"));
    xml.push_str(&format!("  <sectionnumber>{section_number}</sectionnumber>\n"));
    xml.push_str(&format!("  <idnumber>{NULL}</idnumber>\n"));
    xml.push_str(&format!("  <added>{}</added>\n", ctx.timestamp));
    xml.push_str(concat!(
        "  <score>0</score>\n",
        "  <indent>1</indent>\n",
        "  <visible>1</visible>\n",
        "  <visibleoncoursepage>1</visibleoncoursepage>\n",
        "  <visibleold>1</visibleold>\n",
        "  <groupmode>0</groupmode>\n",
        "  <groupingid>0</groupingid>\n",
        "  <completion>0</completion>\n",
    ));
    xml.push_str(&format!(
        "  <completiongradeitemnumber>{NULL}</completiongradeitemnumber>\n"
    ));
    xml.push_str(concat!(
        "  <completionpassgrade>0</completionpassgrade>\n",
        "  <completionview>0</completionview>\n",
        "  <completionexpected>0</completionexpected>\n",
    ));
    xml.push_str(&format!("  <availability>{NULL}</availability>\n"));
    xml.push_str("  <showdescription>0</showdescription>\n");
    xml.push_str("  <downloadcontent>1</downloadcontent>\n");
    xml.push_str(&format!("  <lang>{NULL}</lang>\n"));
    xml.push_str(concat!(
        "  <plugin_plagiarism_turnitinsim_module>\n",
        "    <turnitinsim_mods>\n",
        "    </turnitinsim_mods>\n",
        "  </plugin_plagiarism_turnitinsim_module>\n",
        "  <tags>\n",
        "  </tags>\n",
        "</module>\n",
    ));
    xml
}

pub fn render_resource(course: &Course, activity: &Activity, ctx: &RenderContext<'_>) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&activity_open_tag(course, activity));
    xml.push_str(&format!("  <resource id=\"{}\">\n", activity.id));
    xml.push_str(&format!("    <name>{}</name>\n", escape_xml(&activity.title)));
    xml.push_str(concat!(
        "    <intro></intro>\n",
        "    <introformat>1</introformat>\n",
        "    <tobemigrated>0</tobemigrated>\n",
        "    <legacyfiles>0</legacyfiles>\n",
    ));
    xml.push_str(&format!("    <legacyfileslast>{NULL}</legacyfileslast>\n"));
    xml.push_str("    <display>0</display>\n");
    xml.push_str("    <displayoptions>a:1:{s:10:\"printintro\";i:1;}</displayoptions>\n");
    xml.push_str("    <filterfiles>0</filterfiles>\n    <revision>0</revision>\n");
    xml.push_str(&format!("    <timemodified>{}</timemodified>\n", ctx.timestamp));
    xml.push_str("  </resource>\n</activity>\n");
    xml
}

/// Render the module-specific `<modulename>.xml`.
pub fn render_module_document(
    course: &Course,
    activity: &Activity,
    ctx: &RenderContext<'_>,
) -> String {
    match &activity.kind {
        ActivityKind::Resource => render_resource(course, activity, ctx),
        ActivityKind::Scorm { manifest } => {
            super::scorm::render_scorm(course, activity, manifest.as_ref())
        }
        ActivityKind::Lesson {
            document,
            first_page_id,
            first_answer_id,
            ..
        } => super::lesson::render_lesson(
            course,
            activity,
            document,
            *first_page_id,
            *first_answer_id,
            ctx,
        ),
    }
}

/// Write `<backup>/activities/<modulename>_<moduleid>/` and return its path.
pub fn write_activity(
    root: &Path,
    course: &Course,
    activity: &Activity,
    ctx: &RenderContext<'_>,
) -> Result<PathBuf> {
    let dir = root.join(activity_directory(activity));
    fs::create_dir_all(&dir)?;
    write_xml(
        &dir,
        "grade_history.xml",
        &emit_empty_container("grade_history", &["grade_grades"]),
    )?;
    write_xml(
        &dir,
        "grades.xml",
        &emit_empty_container("activity_gradebook", &["grade_items", "grade_letters"]),
    )?;
    write_xml(&dir, "inforef.xml", &render_inforef(course, activity))?;
    write_xml(&dir, "module.xml", &render_module(course, activity, ctx))?;
    write_xml(
        &dir,
        &format!("{}.xml", activity.modulename()),
        &render_module_document(course, activity, ctx),
    )?;
    write_xml(&dir, "roles.xml", &empty_roles())?;
    Ok(dir)
}
