//! End-to-end archive builds.
//!
//! Every test builds a course from sources created on the fly in a temp
//! directory and inspects the resulting `.mbz`.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use mbz::scorm::{PackageSpec, write_package};
use mbz::{ArchiveOptions, Course, Error, build_archive, write_materials};
use quick_xml::Reader;
use quick_xml::events::Event;
use tempfile::TempDir;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const FROZEN: u64 = 1_700_000_000;

fn options(dir: &Path) -> ArchiveOptions {
    ArchiveOptions::new(dir).with_timestamp(FROZEN)
}

fn entry_names(archive: &Path) -> Vec<String> {
    let zip = ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
    zip.file_names().map(str::to_string).collect()
}

fn read_entry(archive: &Path, name: &str) -> String {
    let mut zip = ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
    let mut content = String::new();
    zip.by_name(name)
        .unwrap_or_else(|_| panic!("missing entry {name}"))
        .read_to_string(&mut content)
        .unwrap();
    content
}

fn write_source(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Text content of every element named `tag`.
fn texts_of(xml: &str, tag: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut inside = false;
    let mut out = Vec::new();
    loop {
        match reader.read_event().unwrap() {
            Event::Start(e) if e.local_name().as_ref() == tag.as_bytes() => {
                inside = true;
                out.push(String::new());
            }
            Event::End(e) if e.local_name().as_ref() == tag.as_bytes() => inside = false,
            Event::Text(t) if inside => {
                if let Some(last) = out.last_mut() {
                    last.push_str(&String::from_utf8_lossy(t.as_ref()));
                }
            }
            Event::GeneralRef(r) if inside => {
                let entity = match &*r {
                    b"amp" => "&",
                    b"lt" => "<",
                    b"gt" => ">",
                    b"quot" => "\"",
                    b"apos" => "'",
                    _ => "",
                };
                if let Some(last) = out.last_mut() {
                    last.push_str(entity);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    out
}

// ============================================================================
// Course shapes
// ============================================================================

#[test]
fn test_empty_course() {
    let out = TempDir::new().unwrap();
    let mut course = Course::new("empty", "Empty Course", 7);
    let report = build_archive(&mut course, "empty", options(out.path())).unwrap();

    assert_eq!(report.archive, out.path().join("empty.mbz"));
    assert_eq!((report.sections, report.activities, report.files), (0, 0, 0));

    let names = entry_names(&report.archive);
    for expected in [
        "moodle_backup.xml",
        "files.xml",
        "groups.xml",
        "outcomes.xml",
        "questions.xml",
        "roles.xml",
        "scales.xml",
        "course/course.xml",
        "course/enrolments.xml",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
    assert!(!names.iter().any(|n| n.starts_with("activities/")));
    assert!(!names.iter().any(|n| n.starts_with("sections/")));
    assert!(!names.iter().any(|n| n.starts_with("files/")));

    let manifest = read_entry(&report.archive, "moodle_backup.xml");
    assert!(manifest.contains("<include_files>0</include_files>"));
    assert!(!manifest.contains("<activities>"));
    assert!(!manifest.contains("<sections>"));
}

#[test]
fn test_resource_with_two_files() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let a = write_source(src.path(), "a.pdf", b"%PDF-1.4 first");
    let b = write_source(src.path(), "b.pdf", b"%PDF-1.4 second");

    let mut course = Course::new("swen1", "Software Engineering", 42);
    let week = course.create_section("week-1", "Week 1", "Intro").unwrap();
    course
        .add_resource_activity(week, "slides", "Slides", &[&a, &b])
        .unwrap();
    let report = build_archive(&mut course, "swen1", options(out.path())).unwrap();
    assert_eq!((report.sections, report.activities, report.files), (1, 1, 2));

    let files = read_entry(&report.archive, "files.xml");
    assert_eq!(files.matches("<file id=").count(), 2);
    assert_eq!(texts_of(&files, "source"), vec!["a.pdf", "b.pdf"]);
    assert_eq!(texts_of(&files, "mimetype"), vec!["application/pdf"; 2]);

    let manifest = read_entry(&report.archive, "moodle_backup.xml");
    assert_eq!(texts_of(&manifest, "moduleid").len(), 1);
    assert_eq!(texts_of(&manifest, "directory")[0], "activities/resource_25000");
    assert!(manifest.contains("<include_files>2</include_files>"));

    let names = entry_names(&report.archive);
    let activity = course.activities()[0].module_id;
    for doc in ["grade_history", "grades", "inforef", "module", "resource", "roles"] {
        let name = format!("activities/resource_{activity}/{doc}.xml");
        assert!(names.contains(&name), "missing {name}");
    }
    let section_id = course.sections()[0].id;
    assert!(names.contains(&format!("sections/section_{section_id}/section.xml")));

    for file in course.files() {
        let blob = format!("files/{}/{}", &file.content_hash[..2], file.content_hash);
        assert!(names.contains(&blob), "missing blob {blob}");
    }
}

#[test]
fn test_identical_content_shares_blob() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let a = write_source(src.path(), "intro.pdf", b"same bytes");
    let b = write_source(src.path(), "copy.pdf", b"same bytes");

    let mut course = Course::new("dup", "Dup", 1);
    let s = course.create_section("s", "S", "").unwrap();
    course.add_resource_activity(s, "one", "One", &[&a]).unwrap();
    course.add_resource_activity(s, "two", "Two", &[&b]).unwrap();
    let report = build_archive(&mut course, "dup", options(out.path())).unwrap();

    assert_eq!(report.files, 2);
    assert_eq!(report.blobs, 1);

    let files = read_entry(&report.archive, "files.xml");
    let hashes = texts_of(&files, "contenthash");
    assert_eq!(hashes.len(), 2);
    assert_eq!(hashes[0], hashes[1]);
    let ids = texts_of(&files, "contextid");
    assert_ne!(ids[0], ids[1]);

    let blobs = entry_names(&report.archive)
        .into_iter()
        .filter(|n| n.starts_with("files/"))
        .count();
    assert_eq!(blobs, 1);
}

#[test]
fn test_titles_escaped_and_round_trip() {
    let out = TempDir::new().unwrap();
    let mut course = Course::new("esc", "Tips & <Tricks>", 3);
    course
        .create_section("s", "Q&A > Lecture", "Summary with <b>")
        .unwrap();
    let report = build_archive(&mut course, "esc", options(out.path())).unwrap();

    let manifest = read_entry(&report.archive, "moodle_backup.xml");
    assert!(manifest.contains("Tips &amp; &lt;Tricks&gt;"));
    assert_eq!(texts_of(&manifest, "original_course_fullname"), vec!["Tips & <Tricks>"]);

    let section_id = course.sections()[0].id;
    let section = read_entry(
        &report.archive,
        &format!("sections/section_{section_id}/section.xml"),
    );
    assert_eq!(texts_of(&section, "name")[0], "Q&A > Lecture");
    assert_eq!(texts_of(&section, "summary"), vec!["Summary with <b>"]);
}

// ============================================================================
// Build properties
// ============================================================================

#[test]
fn test_frozen_clock_builds_are_identical() {
    let src = TempDir::new().unwrap();
    let pdf = write_source(src.path(), "notes.pdf", b"%PDF notes");
    let deck = scorm_zip(src.path(), "deck.zip", MANIFEST);
    let build = |out: &Path| {
        let mut course = Course::new("det", "Deterministic", 9);
        let s = course.create_section("s", "S", "").unwrap();
        course.add_resource_activity(s, "notes", "Notes", &[&pdf]).unwrap();
        course.add_scorm_activity(s, "deck", "Deck", &deck).unwrap();
        build_archive(&mut course, "det", options(out)).unwrap().archive
    };

    let one = TempDir::new().unwrap();
    let two = TempDir::new().unwrap();
    let first = fs::read(build(one.path())).unwrap();
    // The package is re-extracted on the second build, on a later second.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    let second = fs::read(build(two.path())).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_replace_existing() {
    let out = TempDir::new().unwrap();
    let mut course = Course::new("c", "C", 1);
    build_archive(&mut course, "c", options(out.path())).unwrap();

    let err = build_archive(&mut course, "c", options(out.path()).replace_existing(false))
        .unwrap_err();
    assert!(matches!(err, Error::OutputExists(_)));

    let report = build_archive(&mut course, "c.mbz", options(out.path())).unwrap();
    assert_eq!(report.archive, out.path().join("c.mbz"));
}

#[test]
fn test_path_like_names_are_rejected() {
    let root = TempDir::new().unwrap();
    let out = root.path().join("out");
    fs::create_dir(&out).unwrap();
    let other = write_source(&out, "other-course.mbz", b"other");
    let sibling = write_source(root.path(), "plan.json", b"{}");

    for name in ["", ".mbz", ".", "..", "...mbz", "a/b", "../escape", "a\\b"] {
        let mut course = Course::new("c", "C", 1);
        let err = build_archive(&mut course, name, options(&out)).unwrap_err();
        assert!(matches!(err, Error::InvalidName(_)), "{name:?}: {err}");
        assert!(other.is_file(), "{name:?} removed a sibling archive");
        assert!(sibling.is_file(), "{name:?} escaped the output directory");
    }
    assert!(write_materials(&Course::new("c", "C", 1), "..", &options(&out)).is_err());
    assert_eq!(fs::read_dir(&out).unwrap().count(), 1);
}

// ============================================================================
// SCORM and lessons
// ============================================================================

const MANIFEST: &str = r#"<?xml version="1.0"?>
<manifest identifier="MANIFEST-1" xmlns="http://www.imsglobal.org/xsd/imscp_v1p1">
  <organizations default="ORG1">
    <organization identifier="ORG1"><title>Deck</title>
      <item identifier="ITEM1" identifierref="RES1"><title>Deck &amp; Notes</title></item>
    </organization>
  </organizations>
  <resources><resource identifier="RES1" type="webcontent" href="index.html"/></resources>
</manifest>"#;

fn scorm_zip(dir: &Path, name: &str, manifest: &str) -> PathBuf {
    let path = dir.join(name);
    let mut zip = ZipWriter::new(fs::File::create(&path).unwrap());
    zip.start_file("imsmanifest.xml", SimpleFileOptions::default()).unwrap();
    zip.write_all(manifest.as_bytes()).unwrap();
    zip.start_file("index.html", SimpleFileOptions::default()).unwrap();
    zip.write_all(b"<html><body>deck</body></html>").unwrap();
    zip.finish().unwrap();
    path
}

#[test]
fn test_scorm_activity() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pkg = scorm_zip(src.path(), "deck.zip", MANIFEST);

    let mut course = Course::new("c", "C", 1);
    let s = course.create_section("s", "S", "").unwrap();
    course.add_scorm_activity(s, "deck", "Deck", &pkg).unwrap();
    assert!(src.path().join("deck_unzipped").is_dir());

    let report = build_archive(&mut course, "c", options(out.path())).unwrap();
    assert!(!src.path().join("deck_unzipped").exists());
    assert_eq!(report.files, 3);

    let activity = &course.activities()[0];
    let scorm = read_entry(
        &report.archive,
        &format!("activities/scorm_{}/scorm.xml", activity.module_id),
    );
    assert_eq!(texts_of(&scorm, "identifier"), vec!["ORG1", "ITEM1"]);
    assert_eq!(texts_of(&scorm, "reference"), vec!["deck.zip"]);
    let package = course.files().last().unwrap();
    assert_eq!(texts_of(&scorm, "sha1hash"), vec![package.content_hash.clone()]);

    let files = read_entry(&report.archive, "files.xml");
    assert_eq!(texts_of(&files, "component"), vec!["mod_scorm"; 3]);
    assert_eq!(texts_of(&files, "filearea"), vec!["content", "content", "package"]);
    let contexts = texts_of(&files, "contextid");
    assert!(contexts.iter().all(|c| c == &contexts[0]));
}

#[test]
fn test_scorm_with_malformed_manifest() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pkg = scorm_zip(src.path(), "broken.zip", "<manifest><organizations>");

    let mut course = Course::new("c", "C", 1);
    let s = course.create_section("s", "S", "").unwrap();
    course.add_scorm_activity(s, "broken", "Broken", &pkg).unwrap();
    let report = build_archive(&mut course, "c", options(out.path())).unwrap();

    let activity = &course.activities()[0];
    let scorm = read_entry(
        &report.archive,
        &format!("activities/scorm_{}/scorm.xml", activity.module_id),
    );
    assert_eq!(texts_of(&scorm, "identifier"), vec!["", ""]);
}

#[test]
fn test_generated_package_imports() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let page = write_source(src.path(), "oop.html", b"<html><body>OOP</body></html>");
    let spec = PackageSpec::new("oop", "SWEN1", "Objects & Classes", &page);
    let pkg = write_package(&spec, &src.path().join("oop.zip")).unwrap();

    let mut course = Course::new("c", "C", 1);
    let s = course.create_section("s", "S", "").unwrap();
    course.add_scorm_activity(s, "oop", "OOP", &pkg).unwrap();
    let report = build_archive(&mut course, "c", options(out.path())).unwrap();

    let activity = &course.activities()[0];
    let scorm = read_entry(
        &report.archive,
        &format!("activities/scorm_{}/scorm.xml", activity.module_id),
    );
    assert_eq!(texts_of(&scorm, "identifier"), vec!["ORG-oop", "ITEM-oop"]);
    assert_eq!(texts_of(&scorm, "title"), vec!["SWEN1", "Objects & Classes"]);
}

#[test]
fn test_missing_scorm_zip_adds_nothing() {
    let src = TempDir::new().unwrap();
    let mut course = Course::new("c", "C", 1);
    let s = course.create_section("s", "S", "").unwrap();
    let err = course
        .add_scorm_activity(s, "gone", "Gone", &src.path().join("gone.zip"))
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(course.activities().is_empty());
    assert!(course.files().is_empty());
}

const LESSON: &str = "---
title: Quiz
---

# Start

Welcome to the *quiz*.

[Begin](moodle://jump?jumpto=-1)

---

# Truth
<!-- TYPE: TRUEFALSE -->

Rust has a garbage collector.

[True](moodle://answer?jumpto=0&score=0)
[False](moodle://answer?jumpto=-1&score=1)
";

#[test]
fn test_lesson_activity() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let path = write_source(src.path(), "quiz.md", LESSON.as_bytes());

    let mut course = Course::new("c", "C", 11);
    let s = course.create_section("s", "S", "").unwrap();
    let document = mbz::read_lesson(&path).unwrap();
    assert_eq!(document.title, "Quiz");
    course.add_lesson_activity(s, "quiz", "Quiz", document).unwrap();
    let report = build_archive(&mut course, "c", options(out.path())).unwrap();
    assert_eq!(report.files, 0);

    let activity = &course.activities()[0];
    let lesson = read_entry(
        &report.archive,
        &format!("activities/lesson_{}/lesson.xml", activity.module_id),
    );
    assert_eq!(texts_of(&lesson, "course"), vec!["11"]);
    assert_eq!(texts_of(&lesson, "qtype"), vec!["20", "2"]);
    assert_eq!(texts_of(&lesson, "prevpageid"), vec!["0", "36000"]);
    assert_eq!(texts_of(&lesson, "nextpageid"), vec!["36010", "0"]);
    assert_eq!(texts_of(&lesson, "answer_text"), vec!["Begin", "True", "False"]);
    assert_eq!(texts_of(&lesson, "score"), vec!["0", "0", "1"]);
    assert!(lesson.contains("<answer id=\"69000\">"));
    assert!(lesson.contains("<answer id=\"69002\">"));
}

// ============================================================================
// Materials
// ============================================================================

#[test]
fn test_materials_zip_next_to_archive() {
    let src = TempDir::new().unwrap();
    let out = TempDir::new().unwrap();
    let pdf = write_source(src.path(), "intro.pdf", b"%PDF intro");
    let pkg = scorm_zip(src.path(), "deck.zip", MANIFEST);

    let mut course = Course::new("c", "C", 1);
    let s = course.create_section("week-1", "Week 1", "").unwrap();
    course.add_resource_activity(s, "intro", "Intro", &[&pdf]).unwrap();
    course.add_scorm_activity(s, "deck", "Deck", &pkg).unwrap();

    let opts = options(out.path());
    let materials = write_materials(&course, "c", &opts).unwrap();
    build_archive(&mut course, "c", opts).unwrap();

    let mut names = entry_names(&materials.archive);
    names.sort();
    assert_eq!(names, vec!["week-1/deck/deck.zip", "week-1/intro/intro.pdf"]);
    assert!(out.path().join("c.mbz").is_file());
}
