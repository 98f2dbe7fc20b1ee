//! `lesson.xml`
//!
//! Pages are numbered from the activity's first page id in steps of
//! [`LESSON_PAGE_STRIDE`] and chained through `prevpageid`/`nextpageid`
//! (`0` at either end). Each outgoing link of a page becomes an `<answer>`;
//! answer ids run consecutively across the whole lesson.

use crate::lesson::{LessonDocument, LessonPage};
use crate::model::{Activity, Course, LESSON_PAGE_STRIDE};
use crate::util::escape_xml;

use super::activity::activity_open_tag;
use super::{NULL, RenderContext, XML_DECLARATION};

/// Answer text Moodle shows for an unlabeled (wrong) answer.
pub const WRONG_ANSWER_TEXT: &str = "@#wronganswer#@";

pub fn render_lesson(
    course: &Course,
    activity: &Activity,
    document: &LessonDocument,
    first_page_id: u64,
    first_answer_id: u64,
    ctx: &RenderContext<'_>,
) -> String {
    let mut xml = String::from(XML_DECLARATION);
    xml.push_str(&activity_open_tag(course, activity));
    xml.push_str(&format!("  <lesson id=\"{}\">\n", activity.id));
    xml.push_str(&format!("    <course>{}</course>\n", course.id));
    xml.push_str(&format!("    <name>{}</name>\n", escape_xml(&activity.title)));
    xml.push_str(concat!(
        "    <intro></intro>\n",
        "    <introformat>1</introformat>\n",
        "    <practice>0</practice>\n",
        "    <modattempts>0</modattempts>\n",
        "    <usepassword>0</usepassword>\n",
        "    <password></password>\n",
        "    <dependency>0</dependency>\n",
        "    <conditions>O:8:\"stdClass\":3:{s:9:\"timespent\";i:0;s:9:\"completed\";i:0;s:15:\"gradebetterthan\";i:0;}</conditions>\n",
        "    <grade>10</grade>\n",
        "    <custom>1</custom>\n",
        "    <ongoing>0</ongoing>\n",
        "    <usemaxgrade>0</usemaxgrade>\n",
        "    <maxanswers>4</maxanswers>\n",
        "    <maxattempts>1</maxattempts>\n",
        "    <review>0</review>\n",
        "    <nextpagedefault>0</nextpagedefault>\n",
        "    <feedback>0</feedback>\n",
        "    <minquestions>0</minquestions>\n",
        "    <maxpages>1</maxpages>\n",
        "    <timelimit>0</timelimit>\n",
        "    <retake>0</retake>\n",
        "    <activitylink>0</activitylink>\n",
        "    <mediafile></mediafile>\n",
        "    <mediaheight>480</mediaheight>\n",
        "    <mediawidth>640</mediawidth>\n",
        "    <mediaclose>0</mediaclose>\n",
        "    <slideshow>0</slideshow>\n",
        "    <width>640</width>\n",
        "    <height>480</height>\n",
        "    <bgcolor>#FFFFFF</bgcolor>\n",
        "    <displayleft>1</displayleft>\n",
        "    <displayleftif>0</displayleftif>\n",
        "    <progressbar>1</progressbar>\n",
        "    <available>0</available>\n",
        "    <deadline>0</deadline>\n",
    ));
    xml.push_str(&format!("    <timemodified>{}</timemodified>\n", ctx.timestamp));
    xml.push_str(concat!(
        "    <completionendreached>0</completionendreached>\n",
        "    <completiontimespent>0</completiontimespent>\n",
        "    <allowofflineattempts>0</allowofflineattempts>\n",
    ));

    xml.push_str("    <pages>\n");
    let last = document.pages.len().saturating_sub(1);
    let mut answer_id = first_answer_id;
    for (idx, page) in document.pages.iter().enumerate() {
        let page_id = first_page_id + idx as u64 * LESSON_PAGE_STRIDE;
        let prev = if idx > 0 { page_id - LESSON_PAGE_STRIDE } else { 0 };
        let next = if idx < last { page_id + LESSON_PAGE_STRIDE } else { 0 };
        render_page(&mut xml, page, page_id, prev, next, &mut answer_id, ctx.timestamp);
    }
    xml.push_str("    </pages>\n");

    xml.push_str(concat!(
        "    <grades>\n",
        "    </grades>\n",
        "    <timers>\n",
        "    </timers>\n",
        "    <overrides>\n",
        "    </overrides>\n",
        "  </lesson>\n",
        "</activity>\n",
    ));
    xml
}

fn render_page(
    xml: &mut String,
    page: &LessonPage,
    page_id: u64,
    prev: u64,
    next: u64,
    answer_id: &mut u64,
    timestamp: u64,
) {
    xml.push_str(&format!("      <page id=\"{page_id}\">\n"));
    xml.push_str(&format!("        <prevpageid>{prev}</prevpageid>\n"));
    xml.push_str(&format!("        <nextpageid>{next}</nextpageid>\n"));
    xml.push_str(&format!("        <qtype>{}</qtype>\n", page.page_type.qtype()));
    xml.push_str("        <qoption>0</qoption>\n");
    xml.push_str("        <layout>1</layout>\n");
    xml.push_str("        <display>1</display>\n");
    xml.push_str(&format!("        <timecreated>{timestamp}</timecreated>\n"));
    xml.push_str(&format!("        <timemodified>{timestamp}</timemodified>\n"));
    xml.push_str(&format!("        <title>{}</title>\n", escape_xml(&page.title)));
    xml.push_str(&format!("        <contents>{}</contents>\n", escape_xml(&page.html)));
    xml.push_str("        <contentsformat>1</contentsformat>\n");
    xml.push_str("        <answers>\n");
    for link in &page.links {
        let text = if link.text.is_empty() {
            WRONG_ANSWER_TEXT.into()
        } else {
            escape_xml(&link.text)
        };
        xml.push_str(&format!("          <answer id=\"{answer_id}\">\n"));
        xml.push_str(&format!("            <jumpto>{}</jumpto>\n", link.jumpto()));
        xml.push_str("            <grade>0</grade>\n");
        xml.push_str(&format!("            <score>{}</score>\n", link.score()));
        xml.push_str("            <flags>0</flags>\n");
        xml.push_str(&format!("            <timecreated>{timestamp}</timecreated>\n"));
        xml.push_str(&format!("            <timemodified>{timestamp}</timemodified>\n"));
        xml.push_str(&format!("            <answer_text>{text}</answer_text>\n"));
        xml.push_str(&format!("            <response>{NULL}</response>\n"));
        xml.push_str("            <answerformat>0</answerformat>\n");
        xml.push_str("            <responseformat>0</responseformat>\n");
        xml.push_str("            <attempts>\n            </attempts>\n");
        xml.push_str("          </answer>\n");
        *answer_id += 1;
    }
    xml.push_str("        </answers>\n");
    xml.push_str("        <branches>\n        </branches>\n");
    xml.push_str("      </page>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lesson::{LessonLink, PageType};
    use crate::model::ActivityKind;
    use crate::settings::BackupSettings;

    fn quiz() -> LessonDocument {
        let mut doc = LessonDocument::new("Quiz");
        doc.add_page(
            LessonPage::new("Intro & <Start>", "<p>Hello</p>")
                .with_link(LessonLink::parse("moodle://jump?jumpto=-1&score=1", "Go").unwrap()),
        );
        doc.add_page(
            LessonPage::new("Question", "<p>Q?</p>")
                .with_type(PageType::TrueFalse)
                .with_link(LessonLink::parse("moodle://answer?jumpto=-1&score=1", "True").unwrap())
                .with_link(LessonLink::parse("moodle://answer?jumpto=0", "").unwrap()),
        );
        doc.add_page(LessonPage::new("Essay", "<p>Write</p>").with_type(PageType::Essay));
        doc
    }

    fn render() -> String {
        let mut course = Course::new("c", "C", 4711);
        let s = course.create_section("s", "S", "").unwrap();
        let a = course.add_lesson_activity(s, "quiz", "Quiz", quiz()).unwrap();
        let settings = BackupSettings::default();
        let ctx = RenderContext::new(&settings, 7);
        let act = course.activity(a);
        let ActivityKind::Lesson { document, first_page_id, first_answer_id, .. } = &act.kind else {
            panic!("not a lesson");
        };
        render_lesson(&course, act, document, *first_page_id, *first_answer_id, &ctx)
    }

    #[test]
    fn test_page_chain() {
        let xml = render();
        assert!(xml.contains("<course>4711</course>"));
        assert!(xml.contains(
            "<page id=\"36000\">\n        <prevpageid>0</prevpageid>\n        <nextpageid>36010</nextpageid>"
        ));
        assert!(xml.contains(
            "<page id=\"36010\">\n        <prevpageid>36000</prevpageid>\n        <nextpageid>36020</nextpageid>"
        ));
        assert!(xml.contains(
            "<page id=\"36020\">\n        <prevpageid>36010</prevpageid>\n        <nextpageid>0</nextpageid>"
        ));
    }

    #[test]
    fn test_qtypes_and_answers() {
        let xml = render();
        assert_eq!(xml.matches("<qtype>20</qtype>").count(), 1);
        assert_eq!(xml.matches("<qtype>2</qtype>").count(), 1);
        assert_eq!(xml.matches("<qtype>10</qtype>").count(), 1);
        assert!(xml.contains("<answer id=\"69000\">"));
        assert!(xml.contains("<answer id=\"69001\">"));
        assert!(xml.contains("<answer id=\"69002\">"));
        assert!(!xml.contains("<answer id=\"69003\">"));
        assert!(xml.contains("<jumpto>-1</jumpto>"));
        assert!(xml.contains("<answer_text>@#wronganswer#@</answer_text>"));
    }

    #[test]
    fn test_contents_escaped() {
        let xml = render();
        assert!(xml.contains("<title>Intro &amp; &lt;Start&gt;</title>"));
        assert!(xml.contains("<contents>&lt;p&gt;Hello&lt;/p&gt;</contents>"));
    }
}
