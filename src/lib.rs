//! # mbz
//!
//! Build Moodle course backup archives (`.mbz`) from slide decks, PDFs,
//! SCORM packages and Markdown lessons.
//!
//! ## Features
//!
//! - Typed in-memory course model: sections, resource/SCORM/lesson activities, files
//! - Deterministic, type-scoped id allocation matching Moodle's own exporter
//! - Content-addressed file store with SHA-1 deduplication
//! - SCORM package import (namespace-aware `imsmanifest.xml` parsing) and export
//! - Markdown lessons with `moodle://` answer links
//! - Atomic packaging: an archive only appears once the whole tree is written
//!
//! ## Quick Start
//!
//! ```no_run
//! use mbz::{ArchiveOptions, Course, build_archive, read_lesson};
//!
//! let mut course = Course::new("swen1", "Software Engineering 1", 42);
//! let oop = course.create_section("oop", "Object Orientation", "Classes and objects")?;
//! course.add_resource_activity(oop, "oop-slides", "OOP Slides", &["slides/oop.pdf"])?;
//! course.add_scorm_activity(oop, "oop-deck", "OOP Deck", "slides/oop.zip".as_ref())?;
//! let quiz = read_lesson("lessons/oop.md".as_ref())?;
//! course.add_lesson_activity(oop, "oop-quiz", "OOP Quiz", quiz)?;
//!
//! let report = build_archive(&mut course, "swen1", ArchiveOptions::new("output"))?;
//! println!("wrote {}", report.archive.display());
//! # Ok::<(), mbz::Error>(())
//! ```
//!
//! ## Reproducible builds
//!
//! Ids come from the course's own [`IdAllocator`] and all timestamps written
//! by the serializers come from one build clock. Freezing that clock with
//! [`ArchiveOptions::with_timestamp`] makes two builds of the same inputs
//! byte-identical:
//!
//! ```
//! use mbz::{ArchiveOptions, Course, build_archive};
//!
//! let (one, two) = (tempfile::tempdir()?, tempfile::tempdir()?);
//! let options = |dir: &std::path::Path| ArchiveOptions::new(dir).with_timestamp(1_700_000_000);
//!
//! let a = build_archive(&mut Course::new("c", "Course", 1), "c", options(one.path()))?;
//! let b = build_archive(&mut Course::new("c", "Course", 1), "c", options(two.path()))?;
//! assert_eq!(std::fs::read(&a.archive)?, std::fs::read(&b.archive)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod assemble;
pub mod content;
pub mod error;
pub mod ids;
pub mod lesson;
pub mod model;
pub mod scorm;
pub mod serialize;
pub mod settings;
pub(crate) mod util;

pub use assemble::{
    ArchiveAssembler, ArchiveOptions, BuildReport, BuildState, Compression, archive_stem,
    build_archive, write_materials,
};
pub use content::{BackupFile, Component, ContentStore};
pub use error::{Error, Result};
pub use ids::{IdAllocator, IdKind};
pub use lesson::{LessonDocument, LessonLink, LessonPage, PageType, read_lesson};
pub use model::{Activity, ActivityKind, ActivityRef, Course, FileRef, Section, SectionRef};
pub use scorm::{ScormManifest, import_package, parse_manifest};
pub use settings::BackupSettings;
