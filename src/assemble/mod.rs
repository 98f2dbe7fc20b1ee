//! Backup archive assembly.
//!
//! [`ArchiveAssembler`] turns a populated [`Course`] into a `.mbz` archive in
//! a fixed sequence of steps:
//!
//! | Step | Writes |
//! |------|--------|
//! | `begin` | clears old output (when replacing) and creates `<name>/` |
//! | [`write_files`](ArchiveAssembler::write_files) | `files.xml`, the other top-level documents and the `files/` blob store |
//! | [`write_activities`](ArchiveAssembler::write_activities) | `activities/<module>_<id>/` |
//! | [`write_course`](ArchiveAssembler::write_course) | `course/` |
//! | [`write_sections`](ArchiveAssembler::write_sections) | `sections/section_<id>/` |
//! | [`write_manifest`](ArchiveAssembler::write_manifest) | `moodle_backup.xml` |
//! | [`package`](ArchiveAssembler::package) | `<name>.mbz` from the finished tree |
//! | [`finish`](ArchiveAssembler::finish) | removes SCORM working directories (and the tree, if asked) |
//!
//! Each step checks the current [`BuildState`] and fails with
//! [`Error::InvalidState`] when called out of order. [`ArchiveAssembler::build`]
//! runs them all.
//!
//! # Example
//!
//! ```no_run
//! use mbz::{ArchiveAssembler, ArchiveOptions, Course};
//!
//! let mut course = Course::new("swen1", "Software Engineering 1", 42);
//! let week1 = course.create_section("week-1", "Week 1", "")?;
//! course.add_resource_activity(week1, "intro", "Introduction", &["slides/intro.pdf"])?;
//!
//! let report = ArchiveAssembler::begin(&mut course, "swen1", ArchiveOptions::new("output"))?
//!     .build()?;
//! println!("{}", report.archive.display());
//! # Ok::<(), mbz::Error>(())
//! ```

mod materials;
mod pack;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::content::ContentStore;
use crate::error::{Error, Result};
use crate::model::Course;
use crate::scorm::remove_workdirs;
use crate::serialize::RenderContext;
use crate::serialize::activity::write_activity;
use crate::serialize::course::write_course;
use crate::serialize::manifest::write_manifest;
use crate::serialize::root::write_root_documents;
use crate::serialize::section::write_section;
use crate::settings::BackupSettings;
use crate::util::{remove_dir_if_exists, remove_file_if_exists, time_now_secs};

pub use materials::{MaterialsReport, materials_path, write_materials};
pub use pack::{part_path, zip_directory};

/// Where an assembler is in its step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Init,
    FilesWritten,
    ActivitiesWritten,
    CourseWritten,
    SectionsWritten,
    ManifestWritten,
    Packaged,
    Done,
}

impl BuildState {
    /// The state that follows this one, `None` after [`Done`](Self::Done).
    pub fn next(self) -> Option<Self> {
        match self {
            BuildState::Init => Some(BuildState::FilesWritten),
            BuildState::FilesWritten => Some(BuildState::ActivitiesWritten),
            BuildState::ActivitiesWritten => Some(BuildState::CourseWritten),
            BuildState::CourseWritten => Some(BuildState::SectionsWritten),
            BuildState::SectionsWritten => Some(BuildState::ManifestWritten),
            BuildState::ManifestWritten => Some(BuildState::Packaged),
            BuildState::Packaged => Some(BuildState::Done),
            BuildState::Done => None,
        }
    }
}

/// Zip entry compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

/// Configuration for archive assembly.
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Directory receiving `<name>/` and `<name>.mbz`.
    pub output_dir: PathBuf,
    /// Delete earlier output of the same name first (default `true`).
    /// When `false`, existing output is an error.
    pub replace_existing: bool,
    /// Keep the uncompressed tree after packaging (default `true`).
    pub keep_expanded: bool,
    /// Fixed build time. `None` uses the clock when the build begins.
    pub timestamp: Option<u64>,
    pub compression: Compression,
    pub settings: BackupSettings,
}

impl ArchiveOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            replace_existing: true,
            keep_expanded: true,
            timestamp: None,
            compression: Compression::default(),
            settings: BackupSettings::default(),
        }
    }

    pub fn replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    pub fn keep_expanded(mut self, keep: bool) -> Self {
        self.keep_expanded = keep;
        self
    }

    /// Freeze the clock, for reproducible archives.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_settings(mut self, settings: BackupSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub archive: PathBuf,
    /// The uncompressed tree, `None` when it was removed.
    pub expanded_dir: Option<PathBuf>,
    pub sections: usize,
    pub activities: usize,
    pub files: usize,
    /// Distinct blobs in `files/` (files deduplicated by content hash).
    pub blobs: usize,
}

/// Drives the serializers and the content store for one course.
pub struct ArchiveAssembler<'a> {
    course: &'a mut Course,
    options: ArchiveOptions,
    name: String,
    root: PathBuf,
    archive: PathBuf,
    timestamp: u64,
    state: BuildState,
    blobs: usize,
}

impl<'a> ArchiveAssembler<'a> {
    /// Enter [`BuildState::Init`]: prepare `<output_dir>/<name>/`.
    ///
    /// A trailing `.mbz` on `name` is ignored, and what remains must be a
    /// single path component (see [`archive_stem`]). With `replace_existing`,
    /// an earlier tree and archive of the same name are deleted first;
    /// otherwise their presence is an [`Error::OutputExists`].
    pub fn begin(course: &'a mut Course, name: &str, options: ArchiveOptions) -> Result<Self> {
        let name = archive_stem(name)?.to_string();
        let root = options.output_dir.join(&name);
        let archive = options.output_dir.join(format!("{name}.mbz"));

        if options.replace_existing {
            remove_dir_if_exists(&root)?;
            remove_file_if_exists(&archive)?;
            remove_file_if_exists(&part_path(&archive))?;
        } else {
            for existing in [&root, &archive] {
                if existing.exists() {
                    return Err(Error::OutputExists(existing.clone()));
                }
            }
        }
        fs::create_dir_all(&root)?;

        let timestamp = options.timestamp.unwrap_or_else(time_now_secs);
        debug!(root = %root.display(), timestamp, "Build initialized");

        Ok(Self {
            course,
            options,
            name,
            root,
            archive,
            timestamp,
            state: BuildState::Init,
            blobs: 0,
        })
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// The uncompressed backup tree.
    pub fn expanded_dir(&self) -> &Path {
        &self.root
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    fn check_state(&self, expected: BuildState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                expected,
                found: self.state,
            });
        }
        Ok(())
    }

    fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            debug!(from = ?self.state, to = ?next, "Build step complete");
            self.state = next;
        }
    }

    fn context(&self) -> RenderContext<'_> {
        RenderContext::new(&self.options.settings, self.timestamp)
    }

    /// `Init → FilesWritten`
    pub fn write_files(&mut self) -> Result<()> {
        self.check_state(BuildState::Init)?;
        write_root_documents(&self.root, self.course, &self.context())?;

        if !self.course.files().is_empty() {
            let store = ContentStore::new(self.root.join("files"));
            for file in self.course.files() {
                if !store.materialize(file)?.already_existed {
                    self.blobs += 1;
                }
            }
        }
        self.advance();
        Ok(())
    }

    /// `FilesWritten → ActivitiesWritten`
    pub fn write_activities(&mut self) -> Result<()> {
        self.check_state(BuildState::FilesWritten)?;
        let ctx = self.context();
        for activity in self.course.activities() {
            write_activity(&self.root, self.course, activity, &ctx)?;
        }
        self.advance();
        Ok(())
    }

    /// `ActivitiesWritten → CourseWritten`
    pub fn write_course(&mut self) -> Result<()> {
        self.check_state(BuildState::ActivitiesWritten)?;
        write_course(&self.root, self.course, &self.context())?;
        self.advance();
        Ok(())
    }

    /// `CourseWritten → SectionsWritten`
    pub fn write_sections(&mut self) -> Result<()> {
        self.check_state(BuildState::CourseWritten)?;
        let ctx = self.context();
        for section in self.course.sections() {
            write_section(&self.root, self.course, section, &ctx)?;
        }
        self.advance();
        Ok(())
    }

    /// `SectionsWritten → ManifestWritten`
    pub fn write_manifest(&mut self) -> Result<()> {
        self.check_state(BuildState::SectionsWritten)?;
        let filename = format!("{}.mbz", self.name);
        write_manifest(&self.root, self.course, &filename, &self.context())?;
        self.advance();
        Ok(())
    }

    /// `ManifestWritten → Packaged`
    pub fn package(&mut self) -> Result<()> {
        self.check_state(BuildState::ManifestWritten)?;
        zip_directory(&self.root, &self.archive, self.options.compression)?;
        self.advance();
        Ok(())
    }

    /// `Packaged → Done`: clean up and report.
    pub fn finish(&mut self) -> Result<BuildReport> {
        self.check_state(BuildState::Packaged)?;
        remove_workdirs(self.course.scorm_workdirs())?;
        self.course.clear_scorm_workdirs();

        let expanded_dir = if self.options.keep_expanded {
            Some(self.root.clone())
        } else {
            remove_dir_if_exists(&self.root)?;
            None
        };
        self.advance();

        let counts = self.course.counts();
        info!(
            archive = %self.archive.display(),
            sections = counts.sections,
            activities = counts.activities,
            files = counts.files,
            "Generated backup"
        );
        Ok(BuildReport {
            archive: self.archive.clone(),
            expanded_dir,
            sections: counts.sections,
            activities: counts.activities,
            files: counts.files,
            blobs: self.blobs,
        })
    }

    /// Run every remaining step.
    ///
    /// On failure the counts reached so far are logged and no archive is
    /// left under the final name.
    pub fn build(mut self) -> Result<BuildReport> {
        let result = self.run_steps();
        if let Err(e) = &result {
            let counts = self.course.counts();
            error!(
                state = ?self.state,
                sections = counts.sections,
                activities = counts.activities,
                files = counts.files,
                error = %e,
                "Backup build failed"
            );
        }
        result
    }

    fn run_steps(&mut self) -> Result<BuildReport> {
        self.write_files()?;
        self.write_activities()?;
        self.write_course()?;
        self.write_sections()?;
        self.write_manifest()?;
        self.package()?;
        self.finish()
    }
}

/// Strip a trailing `.mbz` from `name` and check that the rest is a plain
/// file name.
///
/// Empty names, `.`, `..` and names containing `/`, `\` or the platform
/// separator are rejected with [`Error::InvalidName`]. The stem names a
/// directory inside the output directory that is deleted when replacing.
pub fn archive_stem(name: &str) -> Result<&str> {
    let stem = name.strip_suffix(".mbz").unwrap_or(name);
    let separator = |c: char| c == '/' || c == '\\' || std::path::is_separator(c);
    if matches!(stem, "" | "." | "..") || stem.contains(separator) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(stem)
}

/// Build `<output_dir>/<name>.mbz` for `course` in one call.
pub fn build_archive(
    course: &mut Course,
    name: &str,
    options: ArchiveOptions,
) -> Result<BuildReport> {
    ArchiveAssembler::begin(course, name, options)?.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_state_sequence() {
        let mut state = BuildState::Init;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            seen.push(next);
            state = next;
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(seen.last(), Some(&BuildState::Done));
    }

    #[test]
    fn test_out_of_order_step() {
        let out = TempDir::new().unwrap();
        let mut course = Course::new("c", "C", 1);
        let mut asm =
            ArchiveAssembler::begin(&mut course, "c", ArchiveOptions::new(out.path())).unwrap();
        let err = asm.write_course().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidState {
                expected: BuildState::ActivitiesWritten,
                found: BuildState::Init
            }
        ));
        asm.write_files().unwrap();
        assert_eq!(asm.state(), BuildState::FilesWritten);
        assert!(asm.write_files().is_err());
    }

    #[test]
    fn test_step_by_step() {
        let out = TempDir::new().unwrap();
        let mut course = Course::new("c", "C", 1);
        course.create_section("s", "S", "").unwrap();
        let mut asm = ArchiveAssembler::begin(
            &mut course,
            "c.mbz",
            ArchiveOptions::new(out.path()).with_timestamp(5),
        )
        .unwrap();
        assert_eq!(asm.archive_path(), out.path().join("c.mbz"));
        asm.write_files().unwrap();
        asm.write_activities().unwrap();
        asm.write_course().unwrap();
        asm.write_sections().unwrap();
        asm.write_manifest().unwrap();
        assert!(!out.path().join("c.mbz").exists());
        asm.package().unwrap();
        assert!(out.path().join("c.mbz").is_file());
        let report = asm.finish().unwrap();
        assert_eq!(asm.state(), BuildState::Done);
        assert_eq!(report.sections, 1);
        assert_eq!(report.expanded_dir, Some(out.path().join("c")));
        assert!(out.path().join("c/sections/section_30000/section.xml").is_file());
    }

    #[test]
    fn test_no_replace_refuses_existing() {
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("c.mbz"), b"old").unwrap();
        let mut course = Course::new("c", "C", 1);
        let result = ArchiveAssembler::begin(
            &mut course,
            "c",
            ArchiveOptions::new(out.path()).replace_existing(false),
        );
        assert!(matches!(result, Err(Error::OutputExists(_))));
    }

    #[test]
    fn test_archive_stem() {
        assert_eq!(archive_stem("swen1").unwrap(), "swen1");
        assert_eq!(archive_stem("swen1.mbz").unwrap(), "swen1");
        assert_eq!(archive_stem("v1.2").unwrap(), "v1.2");
        for bad in ["", ".mbz", ".", "..", "...mbz", "a/b", "../c", "a\\b", "/abs"] {
            assert!(
                matches!(archive_stem(bad), Err(Error::InvalidName(n)) if n == bad),
                "{bad:?} accepted"
            );
        }
    }

    #[test]
    fn test_invalid_name_touches_nothing() {
        let out = TempDir::new().unwrap();
        fs::write(out.path().join("keep.txt"), b"x").unwrap();
        let mut course = Course::new("c", "C", 1);
        let result = ArchiveAssembler::begin(&mut course, "..", ArchiveOptions::new(out.path()));
        assert!(matches!(result, Err(Error::InvalidName(_))));
        assert!(out.path().join("keep.txt").is_file());
    }

    #[test]
    fn test_discard_expanded() {
        let out = TempDir::new().unwrap();
        let mut course = Course::new("c", "C", 1);
        let report = build_archive(
            &mut course,
            "c",
            ArchiveOptions::new(out.path()).keep_expanded(false),
        )
        .unwrap();
        assert!(report.expanded_dir.is_none());
        assert!(!out.path().join("c").exists());
        assert!(report.archive.is_file());
    }
}
