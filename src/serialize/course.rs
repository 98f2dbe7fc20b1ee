//! `course/` directory: course, enrolments, inforef, roles, completion defaults.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::model::Course;
use crate::util::escape_xml;

use super::{NULL, RenderContext, XML_DECLARATION, emit_empty_container, empty_roles, write_xml};

/// Course format options written for section `0`, as `(name, value)`.
///
/// Values are XML text as-is.
const COURSE_FORMAT_OPTIONS: &[(&str, &str)] = &[
    (
        "advancedoptions",
        "Alle weiteren Parameter sollten für standardisierte Lehrverantstaltungen nicht geändert werden!",
    ),
    ("coursedisplay", "Course layout"),
    ("customsectionlisttitle", ""),
    ("customteacherlisttitle", ""),
    ("grading", "&lt;h3&gt;Assessment&lt;/h3&gt;..."),
    ("gradingcriteria", "&lt;h3&gt;Assessment Criteria&lt;/h3&gt;..."),
    ("hiddensections", "1"),
    ("maxteacherlistlength", "2"),
    ("scfhtwexpandsections", "0"),
    ("schedule", NULL),
    ("showheader", "1"),
    ("showimage", "0"),
    ("showinfo", "1"),
    ("showoverview", "1"),
    ("showteachers", "1"),
];

/// Enrolment plugin columns that are always `NULL` for manual enrolment.
const ENROL_NULL_FIELDS: &[&str] = &[
    "customint1",
    "customint2",
    "customint3",
    "customint4",
    "customint5",
    "customint6",
    "customint7",
    "customint8",
    "customchar1",
    "customchar2",
    "customchar3",
    "customdec1",
    "customdec2",
    "customtext1",
    "customtext2",
    "customtext3",
    "customtext4",
];

pub fn render_course(course: &Course, ctx: &RenderContext<'_>) -> String {
    let s = ctx.settings;
    let format = &s.course_format;
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&format!(
        "<course id=\"{}\" contextid=\"{}\">\n",
        course.id, s.course_context_id
    ));
    xml.push_str(&format!("  <shortname>{}</shortname>\n", escape_xml(&course.name)));
    xml.push_str(&format!("  <fullname>{}</fullname>\n", escape_xml(&course.title)));
    xml.push_str("  <idnumber></idnumber>\n");
    xml.push_str("  <summary></summary>\n");
    xml.push_str("  <summaryformat>1</summaryformat>\n");
    xml.push_str(&format!("  <format>{format}</format>\n"));
    xml.push_str("  <showgrades>1</showgrades>\n  <newsitems>5</newsitems>\n");
    xml.push_str(&format!("  <startdate>{}</startdate>\n", s.course_start_date));
    xml.push_str(concat!(
        "  <enddate>0</enddate>\n",
        "  <marker>-1</marker>\n",
        "  <maxbytes>20971520</maxbytes>\n",
        "  <legacyfiles>0</legacyfiles>\n",
        "  <showreports>0</showreports>\n",
        "  <visible>1</visible>\n",
        "  <groupmode>0</groupmode>\n",
        "  <groupmodeforce>0</groupmodeforce>\n",
        "  <defaultgroupingid>0</defaultgroupingid>\n",
        "  <lang>en</lang>\n",
        "  <theme></theme>\n",
    ));
    xml.push_str(&format!("  <timecreated>{}</timecreated>\n", s.course_time_created));
    xml.push_str(&format!("  <timemodified>{}</timemodified>\n", s.course_time_modified));
    xml.push_str("  <requested>0</requested>\n  <showactivitydates>0</showactivitydates>\n");
    xml.push_str(&format!("  <showcompletionconditions>{NULL}</showcompletionconditions>\n"));
    xml.push_str(&format!("  <pdfexportfont>{NULL}</pdfexportfont>\n"));
    xml.push_str("  <enablecompletion>0</enablecompletion>\n");
    xml.push_str("  <completionnotify>0</completionnotify>\n");
    xml.push_str(&format!("  <category id=\"{}\">\n", s.category_id));
    xml.push_str(&format!("    <name>{}</name>\n", s.category_name));
    xml.push_str("    <description></description>\n  </category>\n");
    xml.push_str("  <tags>\n  </tags>\n  <customfields>\n  </customfields>\n");
    xml.push_str("  <courseformatoptions>\n");
    for (name, value) in COURSE_FORMAT_OPTIONS {
        xml.push_str("    <courseformatoption>\n");
        xml.push_str(&format!("      <format>{format}</format>\n"));
        xml.push_str("      <sectionid>0</sectionid>\n");
        xml.push_str(&format!("      <name>{name}</name>\n"));
        xml.push_str(&format!("      <value>{value}</value>\n"));
        xml.push_str("    </courseformatoption>\n");
    }
    xml.push_str("  </courseformatoptions>\n</course>\n");
    xml
}

pub fn render_enrolments(ctx: &RenderContext<'_>) -> String {
    let s = ctx.settings;
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str("<enrolments>\n  <enrols>\n");
    xml.push_str(&format!("    <enrol id=\"{}\">\n", s.enrol_id));
    xml.push_str("      <enrol>manual</enrol>\n      <status>0</status>\n");
    xml.push_str(&format!("      <name>{NULL}</name>\n"));
    xml.push_str(concat!(
        "      <enrolperiod>0</enrolperiod>\n",
        "      <enrolstartdate>0</enrolstartdate>\n",
        "      <enrolenddate>0</enrolenddate>\n",
        "      <expirynotify>0</expirynotify>\n",
        "      <expirythreshold>86400</expirythreshold>\n",
        "      <notifyall>0</notifyall>\n",
    ));
    for field in ["password", "cost", "currency"] {
        xml.push_str(&format!("      <{field}>{NULL}</{field}>\n"));
    }
    xml.push_str(&format!("      <roleid>{}</roleid>\n", s.role_id));
    for field in ENROL_NULL_FIELDS {
        xml.push_str(&format!("      <{field}>{NULL}</{field}>\n"));
    }
    xml.push_str(&format!("      <timecreated>{}</timecreated>\n", s.course_time_created));
    xml.push_str(&format!("      <timemodified>{}</timemodified>\n", s.course_time_created));
    xml.push_str("      <user_enrolments>\n      </user_enrolments>\n");
    xml.push_str("    </enrol>\n  </enrols>\n</enrolments>\n");
    xml
}

pub fn render_inforef(ctx: &RenderContext<'_>) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str("<inforef>\n  <roleref>\n    <role>\n");
    xml.push_str(&format!("      <id>{}</id>\n", ctx.settings.role_id));
    xml.push_str("    </role>\n  </roleref>\n</inforef>\n");
    xml
}

/// Write `<backup>/course/`.
pub fn write_course(root: &Path, course: &Course, ctx: &RenderContext<'_>) -> Result<()> {
    let dir = root.join("course");
    fs::create_dir_all(&dir)?;
    write_xml(
        &dir,
        "completiondefaults.xml",
        &emit_empty_container("course_completion_defaults", &[]),
    )?;
    write_xml(&dir, "course.xml", &render_course(course, ctx))?;
    write_xml(&dir, "enrolments.xml", &render_enrolments(ctx))?;
    write_xml(&dir, "inforef.xml", &render_inforef(ctx))?;
    write_xml(&dir, "roles.xml", &empty_roles())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::BackupSettings;
    use tempfile::TempDir;

    #[test]
    fn test_course_escapes_title() {
        let settings = BackupSettings::default();
        let ctx = RenderContext::new(&settings, 1);
        let course = Course::new("swen1", "Design & <Patterns>", 42);
        let xml = render_course(&course, &ctx);
        assert!(xml.contains("<course id=\"42\" contextid=\"946563\">"));
        assert!(xml.contains("<shortname>swen1</shortname>"));
        assert!(xml.contains("<fullname>Design &amp; &lt;Patterns&gt;</fullname>"));
        assert!(xml.contains("<name>Software Engineering &amp; Architecture</name>"));
        assert_eq!(xml.matches("<courseformatoption>").count(), 15);
        assert!(xml.contains("<name>schedule</name>\n      <value>$@NULL@$</value>"));
        assert!(xml.ends_with("</course>\n"));
    }

    #[test]
    fn test_enrolments() {
        let settings = BackupSettings::default();
        let xml = render_enrolments(&RenderContext::new(&settings, 1));
        assert!(xml.contains("<enrol id=\"30241\">"));
        assert!(xml.contains("<roleid>5</roleid>"));
        assert!(xml.contains("<customtext4>$@NULL@$</customtext4>"));
        assert!(xml.contains("<expirythreshold>86400</expirythreshold>"));
    }

    #[test]
    fn test_write_course_dir() {
        let dir = TempDir::new().unwrap();
        let settings = BackupSettings::default();
        let course = Course::new("c", "C", 1);
        write_course(dir.path(), &course, &RenderContext::new(&settings, 1)).unwrap();
        for name in [
            "completiondefaults.xml",
            "course.xml",
            "enrolments.xml",
            "inforef.xml",
            "roles.xml",
        ] {
            assert!(dir.path().join("course").join(name).is_file(), "{name}");
        }
        let inforef = fs::read_to_string(dir.path().join("course/inforef.xml")).unwrap();
        assert!(inforef.contains("<id>5</id>"));
    }
}
