//! Deterministic zip packaging.
//!
//! Archives are written to `<archive>.part` and renamed into place once the
//! zip is complete, so a failed build never leaves a truncated archive under
//! the final name. Entries are sorted by their `/`-separated relative path and
//! all carry the same fixed modification time, which makes equal trees
//! produce byte-identical archives.

use std::ffi::OsString;
use std::fs;
use std::io::{BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::Result;
use crate::util::{relative_slash_path, remove_file_if_exists, walk_files};

use super::Compression;

/// Options shared by every entry of a generated zip.
pub fn entry_options(compression: Compression) -> SimpleFileOptions {
    let method = match compression {
        Compression::Deflated => CompressionMethod::Deflated,
        Compression::Stored => CompressionMethod::Stored,
    };
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

/// `<path>.part`
pub fn part_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Write a zip to `archive` through a `.part` file.
///
/// `fill` adds the entries. On any error the partial file is removed and
/// nothing is left under `archive`.
pub fn write_atomically<F>(archive: &Path, fill: F) -> Result<()>
where
    F: FnOnce(&mut ZipWriter<BufWriter<fs::File>>) -> Result<()>,
{
    let part = part_path(archive);
    let result = (|| -> Result<()> {
        let file = fs::File::create(&part)?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        fill(&mut zip)?;
        let mut writer = zip.finish()?;
        writer.flush()?;
        Ok(())
    })();

    match result {
        Ok(()) => {
            fs::rename(&part, archive)?;
            Ok(())
        }
        Err(e) => {
            remove_file_if_exists(&part)?;
            Err(e)
        }
    }
}

/// Add every file below `dir` to `zip`, sorted by relative path.
pub fn add_directory<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    dir: &Path,
    compression: Compression,
) -> Result<usize> {
    let options = entry_options(compression);
    let mut entries: Vec<(String, PathBuf)> = walk_files(dir)?
        .into_iter()
        .filter_map(|path| relative_slash_path(dir, &path).map(|rel| (rel, path)))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, path) in &entries {
        zip.start_file(name.as_str(), options)?;
        let mut source = fs::File::open(path)?;
        std::io::copy(&mut source, zip)?;
    }
    Ok(entries.len())
}

/// Zip the contents of `dir` (paths relative to `dir`) into `archive`.
pub fn zip_directory(dir: &Path, archive: &Path, compression: Compression) -> Result<usize> {
    let mut count = 0;
    write_atomically(archive, |zip| {
        count = add_directory(zip, dir, compression)?;
        Ok(())
    })?;
    debug!(archive = %archive.display(), entries = count, "Packed directory");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn tree(root: &Path) {
        fs::create_dir_all(root.join("b/sub")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("z.xml"), "z").unwrap();
        fs::write(root.join("b/sub/x.xml"), "x").unwrap();
        fs::write(root.join("a/y.xml"), "y").unwrap();
    }

    #[test]
    fn test_entries_sorted_with_slashes() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("tree");
        tree(&src);
        let archive = dir.path().join("out.mbz");
        assert_eq!(zip_directory(&src, &archive, Compression::Deflated).unwrap(), 3);
        assert!(!part_path(&archive).exists());

        let mut zip = ZipArchive::new(fs::File::open(&archive).unwrap()).unwrap();
        let names: Vec<_> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["a/y.xml", "b/sub/x.xml", "z.xml"]);

        let mut content = String::new();
        zip.by_name("b/sub/x.xml")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "x");
    }

    #[test]
    fn test_equal_trees_equal_bytes() {
        let dir = TempDir::new().unwrap();
        let one = dir.path().join("one");
        let two = dir.path().join("two");
        tree(&one);
        tree(&two);
        zip_directory(&one, &dir.path().join("one.mbz"), Compression::Deflated).unwrap();
        zip_directory(&two, &dir.path().join("two.mbz"), Compression::Deflated).unwrap();
        assert_eq!(
            fs::read(dir.path().join("one.mbz")).unwrap(),
            fs::read(dir.path().join("two.mbz")).unwrap()
        );
    }

    #[test]
    fn test_failed_fill_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("broken.mbz");
        let result = write_atomically(&archive, |_| {
            Err(crate::error::Error::NotFound(PathBuf::from("x")))
        });
        assert!(result.is_err());
        assert!(!archive.exists());
        assert!(!part_path(&archive).exists());
    }

    #[test]
    fn test_part_path() {
        assert_eq!(part_path(Path::new("/o/c.mbz")), PathBuf::from("/o/c.mbz.part"));
    }
}
