//! mbz - Moodle backup archive builder

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zip::ZipArchive;

use mbz::scorm::resolve_entity;
use mbz::{
    ArchiveOptions, BackupSettings, Course, Error, SectionRef, build_archive, read_lesson,
    write_materials,
};

#[derive(Parser)]
#[command(name = "mbz")]
#[command(version, about = "Moodle backup archive builder", long_about = None)]
#[command(after_help = "EXAMPLES:
    mbz build course.json              Build output/<course>.mbz
    mbz build course.json --materials  Also write output/<course>.zip
    mbz inspect output/swen1.mbz       Show archive contents")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build a backup archive from a JSON course plan
    Build {
        /// Course plan (JSON)
        #[arg(value_name = "PLAN")]
        plan: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Archive name (defaults to the course name)
        #[arg(long)]
        name: Option<String>,

        /// Also write a zip of the raw materials
        #[arg(long)]
        materials: bool,

        /// Fail instead of replacing existing output
        #[arg(long)]
        no_replace: bool,

        /// Remove the uncompressed backup tree after packaging
        #[arg(long)]
        discard_expanded: bool,
    },
    /// Show what a backup archive contains
    Inspect {
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,
    },
}

/// Course plan read from JSON.
#[derive(Deserialize)]
struct Plan {
    course: CoursePlan,
    #[serde(default)]
    settings: Option<BackupSettings>,
    #[serde(default)]
    sections: Vec<SectionPlan>,
    /// Activities added to a section declared above, by section name.
    #[serde(default)]
    activities: Vec<PlacedActivity>,
}

#[derive(Deserialize)]
struct CoursePlan {
    name: String,
    title: String,
    id: u64,
}

#[derive(Deserialize)]
struct SectionPlan {
    name: String,
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    activities: Vec<ActivityPlan>,
}

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "lowercase")]
enum ActivityType {
    Resource,
    Scorm,
    Lesson,
}

#[derive(Deserialize)]
struct ActivityPlan {
    kind: ActivityType,
    name: String,
    #[serde(default)]
    title: Option<String>,
    path: Paths,
}

#[derive(Deserialize)]
struct PlacedActivity {
    section: String,
    #[serde(flatten)]
    activity: ActivityPlan,
}

/// One path, or several (resources may bundle files).
#[derive(Deserialize)]
#[serde(untagged)]
enum Paths {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl Paths {
    fn resolve(&self, base: &Path) -> Vec<PathBuf> {
        let paths = match self {
            Paths::One(p) => std::slice::from_ref(p),
            Paths::Many(ps) => ps.as_slice(),
        };
        paths.iter().map(|p| base.join(p)).collect()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    let result = match cli.command {
        Command::Build {
            plan,
            output,
            name,
            materials,
            no_replace,
            discard_expanded,
        } => {
            let options = ArchiveOptions::new(output)
                .replace_existing(!no_replace)
                .keep_expanded(!discard_expanded);
            build(&plan, name.as_deref(), materials, options)
        }
        Command::Inspect { archive } => inspect(&archive),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) {
    let default = if quiet { "mbz=warn" } else { "mbz=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build(
    plan_path: &Path,
    name: Option<&str>,
    materials: bool,
    mut options: ArchiveOptions,
) -> Result<(), String> {
    let text = fs::read_to_string(plan_path).map_err(|e| format!("{}: {e}", plan_path.display()))?;
    let plan: Plan =
        serde_json::from_str(&text).map_err(|e| format!("{}: {e}", plan_path.display()))?;
    let base = plan_path.parent().unwrap_or(Path::new("."));

    if let Some(settings) = plan.settings {
        options = options.with_settings(settings);
    }

    let mut course = Course::new(&plan.course.name, &plan.course.title, plan.course.id);
    let mut placements = Vec::new();
    for section_plan in &plan.sections {
        let section = course
            .create_section(&section_plan.name, &section_plan.title, &section_plan.summary)
            .map_err(|e| e.to_string())?;
        placements.extend(section_plan.activities.iter().map(|a| (section, a)));
    }
    for placed in &plan.activities {
        let section = course
            .require_section(&placed.section)
            .map_err(|e| e.to_string())?;
        placements.push((section, &placed.activity));
    }

    let mut skipped = 0;
    for (section, activity) in placements {
        match add_activity(&mut course, section, activity, base) {
            Ok(()) => {}
            Err(Error::NotFound(path)) => {
                warn!(
                    activity = %activity.name,
                    path = %path.display(),
                    "Skipping activity with missing source"
                );
                skipped += 1;
            }
            Err(e) => return Err(e.to_string()),
        }
    }
    course.log_summary();

    let name = name.unwrap_or(&plan.course.name).to_string();
    if materials {
        write_materials(&course, &name, &options).map_err(|e| e.to_string())?;
    }
    let report = build_archive(&mut course, &name, options).map_err(|e| e.to_string())?;

    info!(
        archive = %report.archive.display(),
        sections = report.sections,
        activities = report.activities,
        files = report.files,
        skipped,
        "Done"
    );
    Ok(())
}

fn add_activity(
    course: &mut Course,
    section: SectionRef,
    plan: &ActivityPlan,
    base: &Path,
) -> mbz::Result<()> {
    let paths = plan.path.resolve(base);
    let title = plan.title.clone().unwrap_or_else(|| plan.name.clone());
    match plan.kind {
        ActivityType::Resource => {
            course.add_resource_activity(section, &plan.name, title, &paths)?;
        }
        ActivityType::Scorm => {
            let Some(zip) = paths.first() else {
                return Ok(());
            };
            course.add_scorm_activity(section, &plan.name, title, zip)?;
        }
        ActivityType::Lesson => {
            let Some(path) = paths.first() else {
                return Ok(());
            };
            let document = read_lesson(path)?;
            let title = plan.title.clone().unwrap_or_else(|| document.title.clone());
            course.add_lesson_activity(section, &plan.name, title, document)?;
        }
    }
    Ok(())
}

/// Counts read from `moodle_backup.xml`.
#[derive(Default)]
struct ManifestSummary {
    name: String,
    course: String,
    sections: usize,
    activities: usize,
    files: usize,
}

fn inspect(path: &Path) -> Result<(), String> {
    let file = fs::File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut archive = ZipArchive::new(file).map_err(|e| e.to_string())?;
    let entries = archive.len();

    let mut xml = String::new();
    archive
        .by_name("moodle_backup.xml")
        .map_err(|e| format!("moodle_backup.xml: {e}"))?
        .read_to_string(&mut xml)
        .map_err(|e| e.to_string())?;
    let summary = summarize_manifest(&xml).map_err(|e| e.to_string())?;

    println!("Archive:    {}", path.display());
    println!("Name:       {}", summary.name);
    println!("Course:     {}", summary.course);
    println!("Sections:   {}", summary.sections);
    println!("Activities: {}", summary.activities);
    println!("Files:      {}", summary.files);
    println!("Entries:    {entries}");
    Ok(())
}

fn summarize_manifest(xml: &str) -> Result<ManifestSummary, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut summary = ManifestSummary::default();
    let mut path: Vec<String> = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match (path.last().map(String::as_str), name.as_str()) {
                    (Some("activities"), "activity") => summary.activities += 1,
                    (Some("sections"), "section") => summary.sections += 1,
                    _ => {}
                }
                path.push(name);
                text.clear();
            }
            Event::Text(t) => text.push_str(&String::from_utf8_lossy(t.as_ref())),
            Event::GeneralRef(r) => {
                if let Some(resolved) = resolve_entity(&String::from_utf8_lossy(r.as_ref())) {
                    text.push_str(&resolved);
                }
            }
            Event::End(_) => {
                match path.last().map(String::as_str) {
                    Some("name") if path.len() == 3 => summary.name = text.clone(),
                    Some("original_course_fullname") => summary.course = text.clone(),
                    Some("include_files") => summary.files = text.trim().parse().unwrap_or(0),
                    _ => {}
                }
                path.pop();
                text.clear();
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_manifest_resolves_entities() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<moodle_backup>
  <information>
    <name>c&amp;d.mbz</name>
    <original_course_fullname>C &amp; D &#x3C;1&#x3E;</original_course_fullname>
    <include_files>1</include_files>
    <contents>
      <activities>
        <activity><moduleid>25000</moduleid></activity>
        <activity><moduleid>25001</moduleid></activity>
      </activities>
      <sections>
        <section><sectionid>30000</sectionid></section>
      </sections>
    </contents>
  </information>
</moodle_backup>"#;
        let summary = summarize_manifest(xml).unwrap();
        assert_eq!(summary.name, "c&d.mbz");
        assert_eq!(summary.course, "C & D <1>");
        assert_eq!(summary.files, 1);
        assert_eq!(summary.activities, 2);
        assert_eq!(summary.sections, 1);
    }
}
