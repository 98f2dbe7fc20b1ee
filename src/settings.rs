//! Site and course constants written into every backup.
//!
//! Moodle's restore checks several of these (versions, site hash, course
//! format) against the importing site, so the defaults reproduce a real
//! export from a Moodle 4.5 site.

#[cfg(feature = "serde")]
use serde::Deserialize;

/// Fixed values embedded in the generated XML.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BackupSettings {
    pub moodle_version: String,
    pub moodle_release: String,
    pub backup_version: String,
    pub backup_release: String,
    /// Role assigned to enrolled users (the student archetype).
    pub role_id: u64,
    pub user_id: u64,
    pub original_wwwroot: String,
    pub original_site_identifier_hash: String,
    pub course_format: String,
    pub course_context_id: u64,
    pub category_id: u64,
    /// Category display name. Written verbatim, so must already be XML-escaped.
    pub category_name: String,
    pub course_start_date: u64,
    pub course_time_created: u64,
    pub course_time_modified: u64,
    pub enrol_id: u64,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            moodle_version: "2024100705".to_string(),
            moodle_release: "4.5.5 (Build: 20250609)".to_string(),
            backup_version: "2024100700".to_string(),
            backup_release: "4.5".to_string(),
            role_id: 5,
            user_id: 17726,
            original_wwwroot: "https://moodle.technikum-wien.at".to_string(),
            original_site_identifier_hash: "6118578f64415b7ca246939bfb24e84a".to_string(),
            course_format: "scfhtw".to_string(),
            course_context_id: 946563,
            category_id: 2711,
            category_name: "Software Engineering &amp; Architecture".to_string(),
            course_start_date: 1614121200,
            course_time_created: 1614080028,
            course_time_modified: 1756978865,
            enrol_id: 30241,
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn test_partial_override() {
        let settings: BackupSettings =
            serde_json::from_str(r#"{"course_format": "topics", "role_id": 7}"#).unwrap();
        assert_eq!(settings.course_format, "topics");
        assert_eq!(settings.role_id, 7);
        assert_eq!(settings.moodle_version, BackupSettings::default().moodle_version);
    }
}
