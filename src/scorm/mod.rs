//! SCORM package import.
//!
//! A SCORM package is a zip with an `imsmanifest.xml` at its root. Moodle
//! stores both the exploded contents and the zip itself, all in the module's
//! context, so importing a package:
//!
//! 1. extracts the zip into a sibling `<stem>_unzipped` working directory,
//! 2. ingests every extracted file into one freshly allocated context,
//!    keeping its directory inside the package as the file's subdirectory
//!    and the entry's zip timestamp as its creation and modification time,
//! 3. parses `imsmanifest.xml` when present,
//! 4. ingests the zip itself last, in the same context.
//!
//! The working directory must outlive the build: the content store copies
//! from it when the archive is assembled. [`ScormPackage::workdir`] is handed
//! to the course, which removes it once packaging is done.

pub mod manifest;
pub mod package;

use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::{DateTime, ZipArchive};

use crate::content::{self, AREA_CONTENT, AREA_PACKAGE, BackupFile, Component};
use crate::error::{Error, Result};
use crate::ids::{IdAllocator, IdKind};
use crate::util::{relative_slash_path, remove_dir_if_exists, walk_files};

pub use manifest::{IMSCP_NS, ScormManifest, parse_manifest, resolve_entity};
pub use package::{PackageSpec, write_package};

/// Name of the manifest file inside a package.
pub const MANIFEST_NAME: &str = "imsmanifest.xml";

/// The result of importing a SCORM zip.
#[derive(Debug, Clone)]
pub struct ScormPackage {
    /// Extracted files followed by the package zip itself.
    pub files: Vec<BackupFile>,
    /// `None` when the package has no manifest or it could not be parsed.
    pub manifest: Option<ScormManifest>,
    /// Extraction directory, to be removed after the archive is written.
    pub workdir: PathBuf,
}

impl ScormPackage {
    /// The package zip (always the last file).
    pub fn package_file(&self) -> Option<&BackupFile> {
        self.files.last()
    }
}

/// Working directory used for extracting `zip_path`.
pub fn workdir_for(zip_path: &Path) -> PathBuf {
    let stem = zip_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string());
    zip_path.with_file_name(format!("{stem}_unzipped"))
}

/// Modification time of every file entry, keyed by its extraction path.
fn entry_times<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    workdir: &Path,
) -> Result<HashMap<PathBuf, u64>> {
    let mut times = HashMap::new();
    for i in 0..archive.len() {
        let entry = archive.by_index_raw(i)?;
        if !entry.is_file() {
            continue;
        }
        if let (Some(rel), Some(t)) = (entry.enclosed_name(), entry.last_modified()) {
            times.insert(workdir.join(rel), zip_time_secs(t));
        }
    }
    Ok(times)
}

/// Seconds since the epoch for a zip timestamp, read as UTC.
fn zip_time_secs(t: DateTime) -> u64 {
    let (month, day) = (i64::from(t.month()), i64::from(t.day()));
    let year = i64::from(t.year()) - i64::from(month <= 2);
    let era = year.div_euclid(400);
    let yoe = year - era * 400;
    let doy = (153 * ((month + 9) % 12) + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    let days = era * 146_097 + doe - 719_468;
    let secs = days * 86_400
        + i64::from(t.hour()) * 3_600
        + i64::from(t.minute()) * 60
        + i64::from(t.second());
    u64::try_from(secs).unwrap_or(0)
}

/// Import a SCORM zip as content-store files sharing one context.
///
/// Extracted files take their times from the zip entries (or from the zip
/// itself when an entry has none), so importing the same package twice
/// yields identical metadata.
pub fn import_package(
    ids: &mut IdAllocator,
    zip_path: &Path,
    component: Component,
) -> Result<ScormPackage> {
    if !zip_path.is_file() {
        return Err(Error::NotFound(zip_path.to_path_buf()));
    }

    let workdir = workdir_for(zip_path);
    remove_dir_if_exists(&workdir)?;
    let package_time = fs::metadata(zip_path)?
        .modified()
        .map(content::epoch_secs)
        .unwrap_or(0);
    let mut archive = ZipArchive::new(BufReader::new(fs::File::open(zip_path)?))?;
    let times = entry_times(&mut archive, &workdir)?;
    archive.extract(&workdir)?;
    debug!(zip = %zip_path.display(), dir = %workdir.display(), "Extracted package");

    let context_id = ids.next(IdKind::Context)?;
    let mut files = Vec::new();
    let mut manifest = None;
    let mut manifest_seen = false;

    for path in walk_files(&workdir)? {
        let mut file = content::ingest(
            ids,
            &path,
            component.clone(),
            Some(context_id),
            AREA_CONTENT,
        )?;
        file.subdir = package_subdir(&workdir, &path);
        let time = times.get(&path).copied().unwrap_or(package_time);
        file.time_created = time;
        file.time_modified = time;

        if file.filename == MANIFEST_NAME && !manifest_seen {
            manifest_seen = true;
            manifest = read_manifest(&path);
        }
        files.push(file);
    }

    files.push(content::ingest(
        ids,
        zip_path,
        component,
        Some(context_id),
        AREA_PACKAGE,
    )?);

    info!(
        zip = %zip_path.display(),
        files = files.len(),
        manifest = manifest.is_some(),
        "Imported SCORM package"
    );

    Ok(ScormPackage {
        files,
        manifest,
        workdir,
    })
}

/// `/dir/sub` for a file at `<workdir>/dir/sub/name`, empty at top level.
fn package_subdir(workdir: &Path, path: &Path) -> String {
    path.parent()
        .and_then(|parent| relative_slash_path(workdir, parent))
        .filter(|rel| !rel.is_empty())
        .map(|rel| format!("/{rel}"))
        .unwrap_or_default()
}

/// Parse a manifest file, logging and swallowing parse failures.
fn read_manifest(path: &Path) -> Option<ScormManifest> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read imsmanifest.xml");
            return None;
        }
    };
    match parse_manifest(&bytes) {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring malformed imsmanifest.xml");
            None
        }
    }
}

/// Remove extraction directories left behind by [`import_package`].
pub fn remove_workdirs<'a>(dirs: impl IntoIterator<Item = &'a PathBuf>) -> Result<()> {
    for dir in dirs {
        remove_dir_if_exists(dir)?;
        debug!(dir = %dir.display(), "Removed package working directory");
    }
    Ok(())
}
