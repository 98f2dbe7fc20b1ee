//! `scorm.xml`
//!
//! A SCORM activity always carries two SCOs: the organization root (no
//! launch URL) and one asset SCO that launches the package's first resource.
//! Their identifiers come from the package's `imsmanifest.xml`; when the
//! manifest is missing or unreadable they are written as empty strings.

use crate::model::{Activity, Course};
use crate::scorm::ScormManifest;
use crate::util::escape_xml;

use super::activity::activity_open_tag;
use super::{NULL, XML_DECLARATION};

/// Empty sequencing containers closing every `<sco>`.
const SCO_TAIL: &str = concat!(
    "        <seq_ruleconds>\n",
    "        </seq_ruleconds>\n",
    "        <seq_rolluprules>\n",
    "        </seq_rolluprules>\n",
    "        <seq_objectives>\n",
    "        </seq_objectives>\n",
    "        <sco_tracks>\n",
    "        </sco_tracks>\n",
    "      </sco>\n",
);

/// Manifest fields as escaped XML text, empty when absent.
struct ScoFields {
    manifest: String,
    organization: String,
    organization_title: String,
    item: String,
    item_title: String,
    launch: String,
}

impl ScoFields {
    fn from_manifest(manifest: Option<&ScormManifest>) -> Self {
        let m = manifest.cloned().unwrap_or_default();
        Self {
            manifest: text(&m.identifier),
            organization: text(&m.organization_identifier),
            organization_title: text(&m.organization_title),
            item: text(&m.item_identifier),
            item_title: text(&m.item_title),
            launch: text(&m.resource_href),
        }
    }
}

fn text(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(|v| escape_xml(v).into_owned())
        .unwrap_or_default()
}

pub fn render_scorm(
    course: &Course,
    activity: &Activity,
    manifest: Option<&ScormManifest>,
) -> String {
    let package = course.activity_files(activity).last();
    let reference = package
        .map(|f| escape_xml(&f.filename).into_owned())
        .unwrap_or_default();
    let sha1 = package.map(|f| f.content_hash.as_str()).unwrap_or("");
    let sco = ScoFields::from_manifest(manifest);
    let id = activity.id;

    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&activity_open_tag(course, activity));
    xml.push_str(&format!("  <scorm id=\"{id}\">\n"));
    xml.push_str(&format!("    <name>{}</name>\n", escape_xml(&activity.title)));
    xml.push_str("    <scormtype>local</scormtype>\n");
    xml.push_str(&format!("    <reference>{reference}</reference>\n"));
    xml.push_str(concat!(
        "    <intro></intro>\n",
        "    <introformat>0</introformat>\n",
        "    <version>SCORM_1.2</version>\n",
        "    <maxgrade>100</maxgrade>\n",
        "    <grademethod>1</grademethod>\n",
        "    <whatgrade>0</whatgrade>\n",
        "    <maxattempt>0</maxattempt>\n",
        "    <forcecompleted>0</forcecompleted>\n",
        "    <forcenewattempt>0</forcenewattempt>\n",
        "    <lastattemptlock>0</lastattemptlock>\n",
        "    <masteryoverride>1</masteryoverride>\n",
        "    <displayattemptstatus>1</displayattemptstatus>\n",
        "    <displaycoursestructure>0</displaycoursestructure>\n",
        "    <updatefreq>0</updatefreq>\n",
    ));
    xml.push_str(&format!("    <sha1hash>{sha1}</sha1hash>\n"));
    xml.push_str(concat!(
        "    <md5hash></md5hash>\n",
        "    <revision>1</revision>\n",
        "    <launch>3641</launch>\n",
        "    <skipview>0</skipview>\n",
        "    <hidebrowse>0</hidebrowse>\n",
        "    <hidetoc>1</hidetoc>\n",
        "    <nav>1</nav>\n",
        "    <navpositionleft>-100</navpositionleft>\n",
        "    <navpositiontop>-100</navpositiontop>\n",
        "    <auto>0</auto>\n",
        "    <popup>0</popup>\n",
        "    <options></options>\n",
        "    <width>100</width>\n",
        "    <height>500</height>\n",
        "    <timeopen>0</timeopen>\n",
        "    <timeclose>0</timeclose>\n",
        "    <timemodified>1755603996</timemodified>\n",
    ));
    xml.push_str(&format!(
        "    <completionstatusrequired>{NULL}</completionstatusrequired>\n"
    ));
    xml.push_str(&format!(
        "    <completionscorerequired>{NULL}</completionscorerequired>\n"
    ));
    xml.push_str("    <completionstatusallscos>0</completionstatusallscos>\n");
    xml.push_str("    <autocommit>0</autocommit>\n");
    xml.push_str("    <scoes>\n");

    // Organization root.
    xml.push_str(&format!("      <sco id=\"{id}0\">\n"));
    xml.push_str(&format!("        <manifest>{}</manifest>\n", sco.manifest));
    xml.push_str("        <organization></organization>\n");
    xml.push_str("        <parent>/</parent>\n");
    xml.push_str(&format!("        <identifier>{}</identifier>\n", sco.organization));
    xml.push_str("        <launch></launch>\n        <scormtype></scormtype>\n");
    xml.push_str(&format!("        <title>{}</title>\n", sco.organization_title));
    xml.push_str("        <sortorder>1</sortorder>\n");
    xml.push_str("        <sco_datas>\n        </sco_datas>\n");
    xml.push_str(SCO_TAIL);

    // Launchable asset.
    xml.push_str(&format!("      <sco id=\"{id}1\">\n"));
    xml.push_str(&format!("        <manifest>{}</manifest>\n", sco.manifest));
    xml.push_str(&format!("        <organization>{}</organization>\n", sco.organization));
    xml.push_str(&format!("        <parent>{}</parent>\n", sco.organization));
    xml.push_str(&format!("        <identifier>{}</identifier>\n", sco.item));
    xml.push_str(&format!("        <launch>{}</launch>\n", sco.launch));
    xml.push_str("        <scormtype>asset</scormtype>\n");
    xml.push_str(&format!("        <title>{}</title>\n", sco.item_title));
    xml.push_str("        <sortorder>2</sortorder>\n");
    xml.push_str("        <sco_datas>\n");
    xml.push_str(&format!("          <sco_data id=\"{id}2\">\n"));
    xml.push_str("            <name>isvisible</name>\n            <value>true</value>\n");
    xml.push_str("          </sco_data>\n");
    xml.push_str(&format!("          <sco_data id=\"{id}3\">\n"));
    xml.push_str("            <name>parameters</name>\n            <value></value>\n");
    xml.push_str("          </sco_data>\n");
    xml.push_str("        </sco_datas>\n");
    xml.push_str(SCO_TAIL);

    xml.push_str("    </scoes>\n  </scorm>\n</activity>\n");
    xml
}
