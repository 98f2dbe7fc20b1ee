//! In-memory course model.
//!
//! A [`Course`] owns flat arenas of sections, activities and files and hands
//! out small copyable handles ([`SectionRef`], [`ActivityRef`], [`FileRef`])
//! into them. Relationships are stored as handles too:
//!
//! - a section lists its activities in display order,
//! - an activity lists its files and holds an optional back-reference to the
//!   section it was placed in.
//!
//! The back-reference is only a lookup key. Ownership always flows from the
//! course downwards, so there are no reference cycles to manage.
//!
//! The course also owns the build's [`IdAllocator`]; every id in the model is
//! allocated through it, in call order, which is what makes two builds of the
//! same inputs produce the same ids.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::content::{self, AREA_CONTENT, BackupFile, Component};
use crate::error::{Error, Result};
use crate::ids::{IdAllocator, IdKind};
use crate::lesson::LessonDocument;
use crate::scorm::{self, ScormManifest};

/// Id stride between consecutive lesson pages.
pub const LESSON_PAGE_STRIDE: u64 = 10;

/// Handle to a section in a [`Course`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionRef(pub u32);

/// Handle to an activity in a [`Course`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivityRef(pub u32);

/// Handle to a file in a [`Course`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileRef(pub u32);

/// A course section (Moodle "topic").
#[derive(Debug, Clone)]
pub struct Section {
    pub id: u64,
    /// Lookup key, unique within the course.
    pub name: String,
    pub title: String,
    /// 1-based position shown by Moodle.
    pub number: u32,
    pub summary: String,
    /// Activities in display order.
    pub activities: Vec<ActivityRef>,
}

/// Module-specific data of an activity.
#[derive(Debug, Clone)]
pub enum ActivityKind {
    /// One or more downloadable files.
    Resource,
    /// An uploaded SCORM package.
    Scorm { manifest: Option<ScormManifest> },
    /// An interactive lesson.
    Lesson {
        document: LessonDocument,
        context_id: u64,
        /// Id of the first page; later pages follow at [`LESSON_PAGE_STRIDE`].
        first_page_id: u64,
        /// Id of the first answer; answers are numbered consecutively.
        first_answer_id: u64,
    },
}

impl ActivityKind {
    /// Moodle module name, also the stem of the module's XML file.
    pub fn modulename(&self) -> &'static str {
        match self {
            ActivityKind::Resource => "resource",
            ActivityKind::Scorm { .. } => "scorm",
            ActivityKind::Lesson { .. } => "lesson",
        }
    }
}

/// A course module placed in a section.
#[derive(Debug, Clone)]
pub struct Activity {
    pub id: u64,
    pub module_id: u64,
    pub name: String,
    pub title: String,
    pub kind: ActivityKind,
    pub files: Vec<FileRef>,
    /// Non-owning back-reference to the section listing this activity.
    pub section: Option<SectionRef>,
}

impl Activity {
    pub fn modulename(&self) -> &'static str {
        self.kind.modulename()
    }

    /// Directory of this activity inside the backup, e.g. `scorm_25003`.
    pub fn directory_name(&self) -> String {
        format!("{}_{}", self.modulename(), self.module_id)
    }
}

/// Number of entities in a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub sections: usize,
    pub activities: usize,
    pub files: usize,
}

/// A course and everything that goes into its backup.
#[derive(Debug, Clone)]
pub struct Course {
    /// Short name (Moodle `shortname`).
    pub name: String,
    pub title: String,
    pub id: u64,
    ids: IdAllocator,
    sections: Vec<Section>,
    section_index: HashMap<String, SectionRef>,
    activities: Vec<Activity>,
    files: Vec<BackupFile>,
    scorm_workdirs: Vec<PathBuf>,
}

impl Course {
    /// Create an empty course with a fresh id allocator.
    pub fn new(name: impl Into<String>, title: impl Into<String>, id: u64) -> Self {
        Self::with_allocator(name, title, id, IdAllocator::new())
    }

    pub fn with_allocator(
        name: impl Into<String>,
        title: impl Into<String>,
        id: u64,
        ids: IdAllocator,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            id,
            ids,
            sections: Vec::new(),
            section_index: HashMap::new(),
            activities: Vec::new(),
            files: Vec::new(),
            scorm_workdirs: Vec::new(),
        }
    }

    pub fn allocator(&self) -> &IdAllocator {
        &self.ids
    }

    // ==================================================================
    // Sections
    // ==================================================================

    /// Add a section with an explicit number.
    ///
    /// Section names are unique: adding a name that already exists returns
    /// the existing section unchanged.
    pub fn add_section(
        &mut self,
        name: impl Into<String>,
        title: impl Into<String>,
        number: u32,
        summary: impl Into<String>,
    ) -> Result<SectionRef> {
        let name = name.into();
        if let Some(&existing) = self.section_index.get(&name) {
            return Ok(existing);
        }
        let id = self.ids.next(IdKind::Section)?;
        let section_ref = SectionRef(self.sections.len() as u32);
        debug!(name = %name, id, number, "Added section");
        self.section_index.insert(name.clone(), section_ref);
        self.sections.push(Section {
            id,
            name,
            title: title.into(),
            number,
            summary: summary.into(),
            activities: Vec::new(),
        });
        Ok(section_ref)
    }

    /// Add a section numbered after the sections already present.
    pub fn create_section(
        &mut self,
        name: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
    ) -> Result<SectionRef> {
        let number = self.sections.len() as u32 + 1;
        self.add_section(name, title, number, summary)
    }

    pub fn section_by_name(&self, name: &str) -> Option<SectionRef> {
        self.section_index.get(name).copied()
    }

    /// Like [`section_by_name`](Self::section_by_name), but a missing section
    /// is an [`Error::UnknownSection`].
    pub fn require_section(&self, name: &str) -> Result<SectionRef> {
        self.section_by_name(name)
            .ok_or_else(|| Error::UnknownSection(name.to_string()))
    }

    pub fn section(&self, section: SectionRef) -> &Section {
        &self.sections[section.0 as usize]
    }

    /// Sections in insertion order.
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    // ==================================================================
    // Files
    // ==================================================================

    /// Register an already ingested file.
    pub fn add_file(&mut self, file: BackupFile) -> FileRef {
        let file_ref = FileRef(self.files.len() as u32);
        self.files.push(file);
        file_ref
    }

    /// Ingest a source file and register it.
    pub fn ingest_file(
        &mut self,
        path: &Path,
        component: Component,
        context_id: Option<u64>,
        filearea: &str,
    ) -> Result<FileRef> {
        let file = content::ingest(&mut self.ids, path, component, context_id, filearea)?;
        Ok(self.add_file(file))
    }

    pub fn file(&self, file: FileRef) -> &BackupFile {
        &self.files[file.0 as usize]
    }

    /// Every file of the course, in registration order.
    pub fn files(&self) -> &[BackupFile] {
        &self.files
    }

    // ==================================================================
    // Activities
    // ==================================================================

    /// Create an activity, not yet placed in any section.
    pub fn add_activity(
        &mut self,
        name: impl Into<String>,
        title: impl Into<String>,
        kind: ActivityKind,
    ) -> Result<ActivityRef> {
        let id = self.ids.next(IdKind::Activity)?;
        let module_id = self.ids.next(IdKind::Module)?;
        let activity_ref = ActivityRef(self.activities.len() as u32);
        let name = name.into();
        debug!(name = %name, id, module_id, module = kind.modulename(), "Added activity");
        self.activities.push(Activity {
            id,
            module_id,
            name,
            title: title.into(),
            kind,
            files: Vec::new(),
            section: None,
        });
        Ok(activity_ref)
    }

    pub fn attach_file(&mut self, activity: ActivityRef, file: FileRef) {
        self.activities[activity.0 as usize].files.push(file);
    }

    /// Append an activity to a section and point the activity back at it.
    pub fn place_activity(&mut self, section: SectionRef, activity: ActivityRef) {
        self.sections[section.0 as usize].activities.push(activity);
        self.activities[activity.0 as usize].section = Some(section);
    }

    pub fn activity(&self, activity: ActivityRef) -> &Activity {
        &self.activities[activity.0 as usize]
    }

    /// Activities in creation order.
    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    /// The section an activity was placed in, if any.
    pub fn activity_section(&self, activity: &Activity) -> Option<&Section> {
        activity.section.map(|s| self.section(s))
    }

    /// Files of an activity, in attachment order.
    pub fn activity_files<'a>(
        &'a self,
        activity: &'a Activity,
    ) -> impl Iterator<Item = &'a BackupFile> + 'a {
        activity.files.iter().map(move |f| self.file(*f))
    }

    /// Context the activity's files live in, `0` when there is none.
    pub fn activity_context_id(&self, activity: &Activity) -> u64 {
        if let ActivityKind::Lesson { context_id, .. } = &activity.kind {
            return *context_id;
        }
        self.activity_files(activity)
            .next()
            .map(|f| f.context_id)
            .unwrap_or(0)
    }

    /// Create a resource activity from one or more files and place it.
    ///
    /// Every file is ingested before the activity is created, so a missing
    /// file leaves no half-built activity behind.
    pub fn add_resource_activity<P: AsRef<Path>>(
        &mut self,
        section: SectionRef,
        name: impl Into<String>,
        title: impl Into<String>,
        paths: &[P],
    ) -> Result<ActivityRef> {
        let mut ingested = Vec::with_capacity(paths.len());
        for path in paths {
            ingested.push(content::ingest(
                &mut self.ids,
                path.as_ref(),
                Component::Resource,
                None,
                AREA_CONTENT,
            )?);
        }
        let activity = self.add_activity(name, title, ActivityKind::Resource)?;
        for file in ingested {
            let file_ref = self.add_file(file);
            self.attach_file(activity, file_ref);
        }
        self.place_activity(section, activity);
        Ok(activity)
    }

    /// Import a SCORM zip as an activity and place it.
    ///
    /// The extraction directory is kept until [`scorm_workdirs`](Self::scorm_workdirs)
    /// are cleaned up after packaging.
    pub fn add_scorm_activity(
        &mut self,
        section: SectionRef,
        name: impl Into<String>,
        title: impl Into<String>,
        zip_path: &Path,
    ) -> Result<ActivityRef> {
        let package = scorm::import_package(&mut self.ids, zip_path, Component::Scorm)?;
        self.scorm_workdirs.push(package.workdir);
        let activity = self.add_activity(
            name,
            title,
            ActivityKind::Scorm {
                manifest: package.manifest,
            },
        )?;
        for file in package.files {
            let file_ref = self.add_file(file);
            self.attach_file(activity, file_ref);
        }
        self.place_activity(section, activity);
        Ok(activity)
    }

    /// Create a lesson activity from a parsed document and place it.
    pub fn add_lesson_activity(
        &mut self,
        section: SectionRef,
        name: impl Into<String>,
        title: impl Into<String>,
        document: LessonDocument,
    ) -> Result<ActivityRef> {
        let context_id = self.ids.next(IdKind::Context)?;
        let first_page_id = self
            .ids
            .next_block(IdKind::LessonPage, document.pages.len() as u64 * LESSON_PAGE_STRIDE)?;
        let first_answer_id = self
            .ids
            .next_block(IdKind::LessonAnswer, document.answer_count() as u64)?;
        let activity = self.add_activity(
            name,
            title,
            ActivityKind::Lesson {
                document,
                context_id,
                first_page_id,
                first_answer_id,
            },
        )?;
        self.place_activity(section, activity);
        Ok(activity)
    }

    // ==================================================================
    // Build bookkeeping
    // ==================================================================

    /// SCORM extraction directories to remove once the archive is written.
    pub fn scorm_workdirs(&self) -> &[PathBuf] {
        &self.scorm_workdirs
    }

    /// Forget the extraction directories after they have been removed.
    pub fn clear_scorm_workdirs(&mut self) {
        self.scorm_workdirs.clear();
    }

    pub fn counts(&self) -> Counts {
        Counts {
            sections: self.sections.len(),
            activities: self.activities.len(),
            files: self.files.len(),
        }
    }

    /// Log a one-line summary of the course.
    pub fn log_summary(&self) {
        let counts = self.counts();
        info!(
            course = %self.name,
            sections = counts.sections,
            activities = counts.activities,
            files = counts.files,
            "Course model"
        );
    }
}
