//! SCORM 1.2 package writer.
//!
//! Wraps a rendered HTML page (plus any assets it references) into a zip
//! with a generated `imsmanifest.xml`: one organization containing one item
//! that launches the page as a single SCO.

use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::error::{Error, Result};
use crate::util::{escape_xml, relative_slash_path, walk_files};

use super::manifest::IMSCP_NS;

/// What goes into a generated package.
#[derive(Debug, Clone)]
pub struct PackageSpec {
    /// Identifier stem shared by manifest, organization, item and resource.
    pub identifier: String,
    /// Organization title, usually the course title.
    pub organization_title: String,
    /// Item title, usually the activity title.
    pub item_title: String,
    /// The launch page.
    pub launch: PathBuf,
    /// Optional directory of assets stored next to the launch page.
    pub assets: Option<PathBuf>,
}

impl PackageSpec {
    pub fn new(
        identifier: impl Into<String>,
        organization_title: impl Into<String>,
        item_title: impl Into<String>,
        launch: impl Into<PathBuf>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            organization_title: organization_title.into(),
            item_title: item_title.into(),
            launch: launch.into(),
            assets: None,
        }
    }

    pub fn with_assets(mut self, dir: impl Into<PathBuf>) -> Self {
        self.assets = Some(dir.into());
        self
    }
}

/// Write a SCORM package for `spec` to `output`.
pub fn write_package(spec: &PackageSpec, output: &Path) -> Result<PathBuf> {
    if !spec.launch.is_file() {
        return Err(Error::NotFound(spec.launch.clone()));
    }
    let file = fs::File::create(output)?;
    write_package_to_writer(spec, file)?;
    info!(path = %output.display(), "Wrote SCORM package");
    Ok(output.to_path_buf())
}

/// Write a SCORM package to any [`Write`] + [`Seek`] destination.
pub fn write_package_to_writer<W: Write + Seek>(spec: &PackageSpec, writer: W) -> Result<()> {
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());
    let mut zip = ZipWriter::new(writer);

    let launch_name = spec
        .launch
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "index.html".to_string());

    let mut hrefs = vec![launch_name.clone()];
    zip.start_file(launch_name.as_str(), options)?;
    zip.write_all(&fs::read(&spec.launch)?)?;

    if let Some(assets) = &spec.assets
        && assets.is_dir()
    {
        // Assets keep their directory name so relative links keep working.
        let base = assets.parent().unwrap_or(assets);
        for path in walk_files(assets)? {
            let Some(name) = relative_slash_path(base, &path) else {
                continue;
            };
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&fs::read(&path)?)?;
            hrefs.push(name);
        }
    }

    zip.start_file("imsmanifest.xml", options)?;
    zip.write_all(render_manifest(spec, &launch_name, &hrefs).as_bytes())?;

    zip.finish()?;
    Ok(())
}

/// Render the `imsmanifest.xml` for a single-SCO package.
pub fn render_manifest(spec: &PackageSpec, launch: &str, hrefs: &[String]) -> String {
    let id = identifier_token(&spec.identifier);
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!("<manifest identifier=\"MANIFEST-{id}\" version=\"1.0\"\n"));
    xml.push_str(&format!("    xmlns=\"{IMSCP_NS}\"\n"));
    xml.push_str("    xmlns:adlcp=\"http://www.adlnet.org/xsd/adlcp_rootv1p2\"\n");
    xml.push_str("    xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\">\n");
    xml.push_str("  <metadata>\n");
    xml.push_str("    <schema>ADL SCORM</schema>\n");
    xml.push_str("    <schemaversion>1.2</schemaversion>\n");
    xml.push_str("  </metadata>\n");
    xml.push_str(&format!("  <organizations default=\"ORG-{id}\">\n"));
    xml.push_str(&format!("    <organization identifier=\"ORG-{id}\">\n"));
    xml.push_str(&format!(
        "      <title>{}</title>\n",
        escape_xml(&spec.organization_title)
    ));
    xml.push_str(&format!(
        "      <item identifier=\"ITEM-{id}\" identifierref=\"RES-{id}\" isvisible=\"true\">\n"
    ));
    xml.push_str(&format!(
        "        <title>{}</title>\n",
        escape_xml(&spec.item_title)
    ));
    xml.push_str("      </item>\n    </organization>\n  </organizations>\n");
    xml.push_str("  <resources>\n");
    xml.push_str(&format!(
        "    <resource identifier=\"RES-{id}\" type=\"webcontent\" adlcp:scormtype=\"sco\" href=\"{}\">\n",
        escape(launch)
    ));
    for href in hrefs {
        xml.push_str(&format!("      <file href=\"{}\"/>\n", escape(href.as_str())));
    }
    xml.push_str("    </resource>\n  </resources>\n</manifest>\n");
    xml
}

/// Reduce free text to the characters allowed in an XML `ID`.
fn identifier_token(s: &str) -> String {
    let token: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect();
    if token.is_empty() {
        "PACKAGE".to_string()
    } else {
        token
    }
}
