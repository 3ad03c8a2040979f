//! Enum vocabulary shared with the Allure JSON schema: statuses, stages,
//! severities, link types, and reserved label names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of a test, fixture, or step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Status {
    /// Finished successfully.
    Passed,
    /// Assertion failure (product defect).
    Failed,
    /// Unexpected error (test defect).
    Broken,
    /// Skipped without running.
    Skipped,
    /// No status recorded yet.
    #[default]
    Unknown,
}

impl Status {
    /// Returns the string used in the Allure JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Broken => "broken",
            Status::Skipped => "skipped",
            Status::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Execution stage of a result node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Stage {
    /// Registered but not started.
    #[default]
    Scheduled,
    /// Currently executing.
    Running,
    /// Execution finished.
    Finished,
    /// Deferred.
    Pending,
    /// Aborted before completion.
    Interrupted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Scheduled => "scheduled",
            Stage::Running => "running",
            Stage::Finished => "finished",
            Stage::Pending => "pending",
            Stage::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Severity scale used by the `severity` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Severity {
    Blocker,
    Critical,
    #[default]
    Normal,
    Minor,
    Trivial,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Blocker => "blocker",
            Severity::Critical => "critical",
            Severity::Normal => "normal",
            Severity::Minor => "minor",
            Severity::Trivial => "trivial",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Link type for external references attached to a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum LinkType {
    /// Plain link.
    #[default]
    #[serde(rename = "link")]
    Default,
    /// Issue tracker reference.
    Issue,
    /// Test management system reference.
    Tms,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::Default => write!(f, "link"),
            LinkType::Issue => write!(f, "issue"),
            LinkType::Tms => write!(f, "tms"),
        }
    }
}

/// How a parameter value is rendered in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ParameterMode {
    #[default]
    Default,
    /// Value hidden entirely.
    Hidden,
    /// Value masked, e.g. for secrets.
    Masked,
}

/// Attachment content types with their MIME names and file extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ContentType {
    #[default]
    Text,
    Json,
    Xml,
    Html,
    Csv,
    Tsv,
    Css,
    Uri,
    Svg,
    Png,
    Jpeg,
    Webm,
    Mp4,
    Zip,
    /// Allure screen-diff payload.
    #[serde(rename = "imagediff")]
    ImageDiff,
}

impl ContentType {
    /// Returns the MIME type string.
    pub fn as_mime(&self) -> &'static str {
        match self {
            ContentType::Text => "text/plain",
            ContentType::Json => "application/json",
            ContentType::Xml => "application/xml",
            ContentType::Html => "text/html",
            ContentType::Csv => "text/csv",
            ContentType::Tsv => "text/tab-separated-values",
            ContentType::Css => "text/css",
            ContentType::Uri => "text/uri-list",
            ContentType::Svg => "image/svg+xml",
            ContentType::Png => "image/png",
            ContentType::Jpeg => "image/jpeg",
            ContentType::Webm => "video/webm",
            ContentType::Mp4 => "video/mp4",
            ContentType::Zip => "application/zip",
            ContentType::ImageDiff => "application/vnd.allure.image.diff",
        }
    }

    /// Returns the file extension used for attachment sources.
    pub fn extension(&self) -> &'static str {
        match self {
            ContentType::Text => "txt",
            ContentType::Json => "json",
            ContentType::Xml => "xml",
            ContentType::Html => "html",
            ContentType::Csv => "csv",
            ContentType::Tsv => "tsv",
            ContentType::Css => "css",
            ContentType::Uri => "uri",
            ContentType::Svg => "svg",
            ContentType::Png => "png",
            ContentType::Jpeg => "jpg",
            ContentType::Webm => "webm",
            ContentType::Mp4 => "mp4",
            ContentType::Zip => "zip",
            ContentType::ImageDiff => "imagediff",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_mime())
    }
}

/// Reserved label names with special meaning in the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[non_exhaustive]
pub enum LabelName {
    #[serde(rename = "AS_ID")]
    AllureId,
    #[serde(rename = "suite")]
    Suite,
    #[serde(rename = "parentSuite")]
    ParentSuite,
    #[serde(rename = "subSuite")]
    SubSuite,
    #[serde(rename = "epic")]
    Epic,
    #[serde(rename = "feature")]
    Feature,
    #[serde(rename = "story")]
    Story,
    #[serde(rename = "severity")]
    Severity,
    #[default]
    #[serde(rename = "tag")]
    Tag,
    #[serde(rename = "owner")]
    Owner,
    #[serde(rename = "host")]
    Host,
    #[serde(rename = "thread")]
    Thread,
    #[serde(rename = "testMethod")]
    TestMethod,
    #[serde(rename = "testClass")]
    TestClass,
    #[serde(rename = "package")]
    Package,
    #[serde(rename = "framework")]
    Framework,
    #[serde(rename = "language")]
    Language,
}

impl LabelName {
    /// Returns the string name used in the Allure JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelName::AllureId => "AS_ID",
            LabelName::Suite => "suite",
            LabelName::ParentSuite => "parentSuite",
            LabelName::SubSuite => "subSuite",
            LabelName::Epic => "epic",
            LabelName::Feature => "feature",
            LabelName::Story => "story",
            LabelName::Severity => "severity",
            LabelName::Tag => "tag",
            LabelName::Owner => "owner",
            LabelName::Host => "host",
            LabelName::Thread => "thread",
            LabelName::TestMethod => "testMethod",
            LabelName::TestClass => "testClass",
            LabelName::Package => "package",
            LabelName::Framework => "framework",
            LabelName::Language => "language",
        }
    }
}

impl fmt::Display for LabelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&Status::Passed).unwrap(), "\"passed\"");
        assert_eq!(serde_json::to_string(&Status::Broken).unwrap(), "\"broken\"");
        assert_eq!(
            serde_json::to_string(&Status::Unknown).unwrap(),
            "\"unknown\""
        );
    }

    #[test]
    fn test_stage_serialization() {
        assert_eq!(
            serde_json::to_string(&Stage::Scheduled).unwrap(),
            "\"scheduled\""
        );
        assert_eq!(
            serde_json::to_string(&Stage::Finished).unwrap(),
            "\"finished\""
        );
    }

    #[test]
    fn test_link_type_serialization() {
        assert_eq!(
            serde_json::to_string(&LinkType::Default).unwrap(),
            "\"link\""
        );
        assert_eq!(serde_json::to_string(&LinkType::Issue).unwrap(), "\"issue\"");
    }

    #[test]
    fn test_content_type_mime_and_extension() {
        assert_eq!(ContentType::Json.as_mime(), "application/json");
        assert_eq!(ContentType::Json.extension(), "json");
        assert_eq!(ContentType::Jpeg.extension(), "jpg");
        assert_eq!(
            ContentType::ImageDiff.as_mime(),
            "application/vnd.allure.image.diff"
        );
    }

    #[test]
    fn test_label_name_as_str() {
        assert_eq!(LabelName::AllureId.as_str(), "AS_ID");
        assert_eq!(LabelName::ParentSuite.as_str(), "parentSuite");
        assert_eq!(LabelName::TestMethod.as_str(), "testMethod");
    }

    #[test]
    fn test_display_matches_wire_names() {
        assert_eq!(format!("{}", Status::Failed), "failed");
        assert_eq!(format!("{}", Stage::Running), "running");
        assert_eq!(format!("{}", Severity::Critical), "critical");
        assert_eq!(format!("{}", LinkType::Tms), "tms");
        assert_eq!(format!("{}", ContentType::Png), "image/png");
    }
}
