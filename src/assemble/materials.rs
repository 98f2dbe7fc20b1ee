//! Companion zip of raw course materials.
//!
//! Next to the `.mbz`, a plain `<name>.zip` can be produced for manual
//! distribution. It is laid out as `<section>/<activity>/<filename>` using
//! the section and activity names. Entries that would collide get a `-2`,
//! `-3`, ... suffix before the extension. SCORM activities contribute only their
//! package zip, not the extracted contents. Activities without files
//! (lessons) and activities outside any section are skipped.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::content::{AREA_PACKAGE, BackupFile};
use crate::error::{Error, Result};
use crate::model::{Activity, ActivityKind, Course};
use crate::util::remove_file_if_exists;

use super::pack::{entry_options, write_atomically};
use super::{ArchiveOptions, archive_stem};

/// Outcome of [`write_materials`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialsReport {
    pub archive: PathBuf,
    /// Number of files written into the zip.
    pub files: usize,
}

fn distributed_files<'a>(
    course: &'a Course,
    activity: &'a Activity,
) -> impl Iterator<Item = &'a BackupFile> + 'a {
    let scorm = matches!(activity.kind, ActivityKind::Scorm { .. });
    course
        .activity_files(activity)
        .filter(move |f| !scorm || f.filearea == AREA_PACKAGE)
}

/// `name` unless `seen` already holds it, else the first free `stem-N.ext`.
fn unique_entry_name(seen: &mut HashSet<String>, name: String) -> String {
    if seen.insert(name.clone()) {
        return name;
    }
    let (dir, base) = match name.rfind('/') {
        Some(i) => name.split_at(i + 1),
        None => ("", name.as_str()),
    };
    let (stem, ext) = match base.rfind('.') {
        Some(i) if i > 0 => base.split_at(i),
        _ => (base, ""),
    };
    let mut n = 2;
    loop {
        let candidate = format!("{dir}{stem}-{n}{ext}");
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Write `<output_dir>/<name>.zip` with the course's raw materials.
///
/// `name` follows the same rules as the archive name: a trailing `.mbz` is
/// dropped and path-like names are an [`Error::InvalidName`]. Source files
/// that disappeared since they were ingested are skipped with a warning.
pub fn write_materials(
    course: &Course,
    name: &str,
    options: &ArchiveOptions,
) -> Result<MaterialsReport> {
    let archive = materials_path(&options.output_dir, archive_stem(name)?);
    if options.replace_existing {
        remove_file_if_exists(&archive)?;
    } else if archive.exists() {
        return Err(Error::OutputExists(archive));
    }
    fs::create_dir_all(&options.output_dir)?;

    let entry = entry_options(options.compression);
    let mut count = 0;
    let mut seen = HashSet::new();
    write_atomically(&archive, |zip| {
        for section in course.sections() {
            for activity_ref in &section.activities {
                let activity = course.activity(*activity_ref);
                for file in distributed_files(course, activity) {
                    if !file.source.is_file() {
                        warn!(path = %file.source.display(), "Skipping missing material");
                        continue;
                    }
                    let entry_name = unique_entry_name(
                        &mut seen,
                        format!("{}/{}/{}", section.name, activity.name, file.filename),
                    );
                    zip.start_file(entry_name.as_str(), entry)?;
                    let mut source = fs::File::open(&file.source)?;
                    std::io::copy(&mut source, zip)?;
                    count += 1;
                }
            }
        }
        Ok(())
    })?;

    let counts = course.counts();
    info!(
        archive = %archive.display(),
        sections = counts.sections,
        activities = counts.activities,
        files = count,
        "Generated materials zip"
    );
    Ok(MaterialsReport {
        archive,
        files: count,
    })
}

/// Path the materials zip for `name` is written to.
pub fn materials_path(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!("{name}.zip"))
}
