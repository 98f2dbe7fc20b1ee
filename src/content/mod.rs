//! Content-addressed file store.
//!
//! Every source file that ends up in a backup is described by a [`BackupFile`]:
//! its SHA-1 content hash, size, type, timestamps and the Moodle component /
//! file area that owns it. The bytes themselves are copied into the backup's
//! `files/` directory under `<hash[0..2]>/<hash>`, the same two-level layout
//! Moodle uses for its file pool. Identical content lands on the same path and
//! is written once.

mod mime;

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use sha1_smol::Sha1;
use tracing::debug;

use crate::error::{Error, Result};
use crate::ids::{IdAllocator, IdKind};

pub use mime::{MediaType, mime_type_for};

/// Read buffer size used while hashing and copying.
const CHUNK_SIZE: usize = 64 * 1024;

/// Moodle subsystem that owns a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Component {
    Resource,
    Scorm,
    Lesson,
    Other(String),
}

impl Component {
    pub fn as_str(&self) -> &str {
        match self {
            Component::Resource => "mod_resource",
            Component::Scorm => "mod_scorm",
            Component::Lesson => "mod_lesson",
            Component::Other(name) => name,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File area used for ordinary content files.
pub const AREA_CONTENT: &str = "content";
/// File area holding an uploaded SCORM package zip.
pub const AREA_PACKAGE: &str = "package";

/// A source file registered for inclusion in the backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupFile {
    pub id: u64,
    pub context_id: u64,
    /// Where the bytes are read from.
    pub source: PathBuf,
    pub filename: String,
    pub filesize: u64,
    pub mimetype: &'static str,
    pub time_created: u64,
    pub time_modified: u64,
    /// Lowercase hex SHA-1 of the full content. Computed once at ingest.
    pub content_hash: String,
    /// Directory inside the owning package (`/sub/dir`), empty for top level.
    pub subdir: String,
    pub component: Component,
    pub filearea: String,
}

impl BackupFile {
    /// The `<filepath>` value Moodle expects: `/` or `/sub/dir/`.
    pub fn moodle_filepath(&self) -> String {
        format!("{}/", self.subdir)
    }

    /// Path of this file's blob relative to the backup's `files/` directory.
    pub fn blob_path(&self) -> PathBuf {
        blob_path(&self.content_hash)
    }
}

/// `<hash[0..2]>/<hash>`
pub fn blob_path(hash: &str) -> PathBuf {
    let bucket = &hash[..2.min(hash.len())];
    Path::new(bucket).join(hash)
}

/// Register a source file: hash it, classify it and allocate its ids.
///
/// When `context_id` is `None` a fresh context is allocated, so stand-alone
/// files never share a context.
pub fn ingest(
    ids: &mut IdAllocator,
    path: &Path,
    component: Component,
    context_id: Option<u64>,
    filearea: &str,
) -> Result<BackupFile> {
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };
    let content_hash = hash_file(path)?;

    let time_modified = metadata.modified().map(epoch_secs).unwrap_or(0);
    let time_created = metadata
        .created()
        .map(epoch_secs)
        .unwrap_or(time_modified);

    let id = ids.next(IdKind::File)?;
    let context_id = match context_id {
        Some(ctx) => ctx,
        None => ids.next(IdKind::Context)?,
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    debug!(path = %path.display(), hash = %content_hash, id, "Ingested file");

    Ok(BackupFile {
        id,
        context_id,
        source: path.to_path_buf(),
        filename,
        filesize: metadata.len(),
        mimetype: mime_type_for(path),
        time_created,
        time_modified,
        content_hash,
        subdir: String::new(),
        component,
        filearea: filearea.to_string(),
    })
}

/// SHA-1 of a file's full content as lowercase hex.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
        _ => Error::Io(e),
    })?;
    let mut sha1 = Sha1::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        sha1.update(&buf[..n]);
    }
    Ok(sha1.digest().to_string())
}

/// SHA-1 of an in-memory buffer as lowercase hex.
pub fn hash_bytes(data: &[u8]) -> String {
    Sha1::from(data).digest().to_string()
}

pub(crate) fn epoch_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// Outcome of copying one file into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub path: PathBuf,
    /// The blob was already present (same hash written earlier).
    pub already_existed: bool,
}

/// The `files/` directory of a backup being written.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy a file's bytes to `<root>/<hash[0..2]>/<hash>`.
    ///
    /// An existing blob with the same hash already holds the same bytes and
    /// is left untouched.
    pub fn materialize(&self, file: &BackupFile) -> Result<Materialized> {
        let path = self.root.join(file.blob_path());
        if path.is_file() {
            debug!(hash = %file.content_hash, "Blob already stored");
            return Ok(Materialized {
                path,
                already_existed: true,
            });
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::copy(&file.source, &path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound && !file.source.exists() => {
                return Err(Error::NotFound(file.source.clone()));
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Materialized {
            path,
            already_existed: false,
        })
    }
}
