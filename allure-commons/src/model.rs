//! Result model: the mutable tree of containers, tests, fixtures, steps,
//! and attachments that the lifecycle engine builds while tests run.
//!
//! Nodes are plain data with public fields. Identity is carried by string
//! uuids: containers and tests own theirs, fixtures and steps receive one
//! when the lifecycle starts them so that concurrent flows can locate them
//! inside a shared parent.

use serde::{Deserialize, Serialize};

use crate::enums::{LabelName, LinkType, ParameterMode, Stage, Status};

/// Uniform access to the fields shared by tests, fixtures, and steps.
///
/// Cross-cutting operations such as attachments target "whatever is
/// innermost right now" and go through this trait instead of naming a
/// concrete node type.
pub trait ExecutableItem {
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
    fn stage(&self) -> Stage;
    fn set_stage(&mut self, stage: Stage);
    fn status(&self) -> Status;
    fn set_status(&mut self, status: Status);
    /// Status details, created on first access.
    fn status_details_mut(&mut self) -> &mut StatusDetails;
    fn set_description(&mut self, text: String);
    fn set_description_html(&mut self, html: String);
    fn set_start(&mut self, millis: i64);
    fn set_stop(&mut self, millis: i64);
    fn steps_mut(&mut self) -> &mut Vec<StepResult>;
    fn attachments_mut(&mut self) -> &mut Vec<Attachment>;
    fn parameters_mut(&mut self) -> &mut Vec<Parameter>;
}

macro_rules! impl_executable_item {
    ($ty:ty) => {
        impl ExecutableItem for $ty {
            fn name(&self) -> &str {
                &self.name
            }
            fn set_name(&mut self, name: String) {
                self.name = name;
            }
            fn stage(&self) -> Stage {
                self.stage
            }
            fn set_stage(&mut self, stage: Stage) {
                self.stage = stage;
            }
            fn status(&self) -> Status {
                self.status
            }
            fn set_status(&mut self, status: Status) {
                self.status = status;
            }
            fn status_details_mut(&mut self) -> &mut StatusDetails {
                self.status_details.get_or_insert_with(Default::default)
            }
            fn set_description(&mut self, text: String) {
                self.description = Some(text);
            }
            fn set_description_html(&mut self, html: String) {
                self.description_html = Some(html);
            }
            fn set_start(&mut self, millis: i64) {
                self.start = millis;
            }
            fn set_stop(&mut self, millis: i64) {
                self.stop = millis;
            }
            fn steps_mut(&mut self) -> &mut Vec<StepResult> {
                &mut self.steps
            }
            fn attachments_mut(&mut self) -> &mut Vec<Attachment> {
                &mut self.attachments
            }
            fn parameters_mut(&mut self) -> &mut Vec<Parameter> {
                &mut self.parameters
            }
        }
    };
}

/// Test result, written to `{uuid}-result.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub uuid: String,

    /// Tracks the test across runs. Derived from the full name and the
    /// parameter values once, at stop time, if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_id: Option<String>,

    /// Derived from the full name alone, once, at stop time, if unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_case_id: Option<String>,

    /// Display title.
    pub name: String,

    /// Fully qualified name, e.g. `module::function`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_html: Option<String>,

    pub status: Status,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,

    pub stage: Stage,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepResult>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,

    /// Unix millis; stamped by the lifecycle when the test starts.
    pub start: i64,

    pub stop: i64,
}

impl TestResult {
    /// Creates a scheduled test result with the given uuid and display name.
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            history_id: None,
            test_case_id: None,
            name: name.into(),
            full_name: None,
            description: None,
            description_html: None,
            status: Status::Unknown,
            status_details: None,
            stage: Stage::Scheduled,
            steps: Vec::new(),
            attachments: Vec::new(),
            parameters: Vec::new(),
            labels: Vec::new(),
            links: Vec::new(),
            start: 0,
            stop: 0,
        }
    }

    /// Creates a test result with a fresh random uuid.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(crate::writer::generate_uuid(), name)
    }

    /// Sets the fully qualified name, builder style.
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn add_label(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.labels.push(Label::new(name, value));
    }

    pub fn add_label_name(&mut self, name: LabelName, value: impl Into<String>) {
        self.add_label(name.as_str(), value);
    }

    pub fn add_link(&mut self, url: impl Into<String>, name: Option<String>, link_type: LinkType) {
        self.links.push(Link {
            name,
            url: url.into(),
            r#type: Some(link_type),
        });
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.push(Parameter::new(name, value));
    }
}

impl_executable_item!(TestResult);

/// Step result nested inside a test, fixture, or another step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    /// Indexing id assigned by the lifecycle; lets concurrent flows address
    /// this step inside a shared parent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_html: Option<String>,

    pub status: Status,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,

    pub stage: Stage,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepResult>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    pub start: i64,

    pub stop: i64,
}

impl StepResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: None,
            name: name.into(),
            description: None,
            description_html: None,
            status: Status::Unknown,
            status_details: None,
            stage: Stage::Scheduled,
            steps: Vec::new(),
            attachments: Vec::new(),
            parameters: Vec::new(),
            start: 0,
            stop: 0,
        }
    }

    pub fn add_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.parameters.push(Parameter::new(name, value));
    }
}

impl_executable_item!(StepResult);

/// Fixture result (setup or teardown), owned by a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureResult {
    /// Indexing id assigned by the lifecycle; never serialized, fixtures
    /// are identified by containment in the report.
    #[serde(skip)]
    pub uuid: Option<String>,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description_html: Option<String>,

    pub status: Status,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,

    pub stage: Stage,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepResult>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    pub start: i64,

    pub stop: i64,
}

impl FixtureResult {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: None,
            name: name.into(),
            description: None,
            description_html: None,
            status: Status::Unknown,
            status_details: None,
            stage: Stage::Scheduled,
            steps: Vec::new(),
            attachments: Vec::new(),
            parameters: Vec::new(),
            start: 0,
            stop: 0,
        }
    }
}

impl_executable_item!(FixtureResult);

/// Grouping scope for fixtures and the tests they apply to.
/// Written to `{uuid}-container.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultContainer {
    pub uuid: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Uuids of the test results that ran inside this scope.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,

    /// Setup fixtures, in start order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub befores: Vec<FixtureResult>,

    /// Teardown fixtures, in start order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub afters: Vec<FixtureResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<i64>,
}

impl TestResultContainer {
    pub fn new(uuid: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: None,
            children: Vec::new(),
            befores: Vec::new(),
            afters: Vec::new(),
            start: None,
            stop: None,
        }
    }

    /// Creates a container with a fresh random uuid and the given name.
    pub fn named(name: impl Into<String>) -> Self {
        let mut container = Self::new(crate::writer::generate_uuid());
        container.name = Some(name.into());
        container
    }

    pub fn add_child(&mut self, test_uuid: impl Into<String>) {
        self.children.push(test_uuid.into());
    }
}

/// Additional detail recorded alongside a status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flaky: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

impl StatusDetails {
    /// Creates details carrying just a failure message and optional trace.
    pub fn from_failure(message: impl Into<String>, trace: Option<String>) -> Self {
        Self {
            message: Some(message.into()),
            trace,
            ..Default::default()
        }
    }
}

/// Name/value pair used for categorization and filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn from_name(name: LabelName, value: impl Into<String>) -> Self {
        Self::new(name.as_str(), value)
    }

    /// Label naming the machine the test ran on.
    pub fn host(value: impl Into<String>) -> Self {
        Self::from_name(LabelName::Host, value)
    }

    /// Label naming the thread the test ran on.
    pub fn thread(value: impl Into<String>) -> Self {
        Self::from_name(LabelName::Thread, value)
    }
}

/// External reference attached to a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<LinkType>,
}

impl Link {
    pub fn new(url: impl Into<String>, name: Option<String>, link_type: LinkType) -> Self {
        Self {
            name,
            url: url.into(),
            r#type: Some(link_type),
        }
    }

    pub fn issue(url: impl Into<String>, name: Option<String>) -> Self {
        Self::new(url, name, LinkType::Issue)
    }

    pub fn tms(url: impl Into<String>, name: Option<String>) -> Self {
        Self::new(url, name, LinkType::Tms)
    }
}

/// Test or step parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,

    pub value: String,

    /// Excluded parameters do not participate in history-id derivation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ParameterMode>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            excluded: None,
            mode: None,
        }
    }

    pub fn excluded(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            excluded: Some(true),
            ..Self::new(name, value)
        }
    }

    pub fn hidden(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            mode: Some(ParameterMode::Hidden),
            ..Self::new(name, value)
        }
    }

    pub fn masked(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            mode: Some(ParameterMode::Masked),
            ..Self::new(name, value)
        }
    }
}

/// Reference to a written attachment file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,

    /// Writer-assigned source key, `{uuid}-attachment.{ext}`.
    pub source: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
}

impl Attachment {
    pub fn new(name: impl Into<String>, source: impl Into<String>, mime: Option<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            r#type: mime,
        }
    }
}

/// Defect category definition for `categories.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub name: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_statuses: Vec<Status>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_regex: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_regex: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flaky: Option<bool>,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            matched_statuses: Vec::new(),
            message_regex: None,
            trace_regex: None,
            flaky: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.matched_statuses.push(status);
        self
    }

    pub fn with_message_regex(mut self, regex: impl Into<String>) -> Self {
        self.message_regex = Some(regex.into());
        self
    }

    pub fn with_trace_regex(mut self, regex: impl Into<String>) -> Self {
        self.trace_regex = Some(regex.into());
        self
    }

    pub fn as_flaky(mut self) -> Self {
        self.flaky = Some(true);
        self
    }
}

/// Current time in milliseconds since the Unix epoch.
pub fn current_time_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_test_result_is_scheduled() {
        let result = TestResult::new("uuid-1", "My Test");
        assert_eq!(result.uuid, "uuid-1");
        assert_eq!(result.stage, Stage::Scheduled);
        assert_eq!(result.status, Status::Unknown);
        assert!(result.history_id.is_none());
    }

    #[test]
    fn test_test_result_serialization_uses_camel_case() {
        let mut result = TestResult::new("uuid-2", "Serialize me").with_full_name("m::serialize");
        result.add_label_name(LabelName::Severity, "critical");
        result.status = Status::Passed;
        result.stage = Stage::Finished;

        let json = serde_json::to_string_pretty(&result).unwrap();
        assert!(json.contains("\"fullName\": \"m::serialize\""));
        assert!(json.contains("\"status\": \"passed\""));
        assert!(json.contains("\"severity\""));
        // Unset optional fields stay out of the payload.
        assert!(!json.contains("historyId"));
    }

    #[test]
    fn test_fixture_uuid_not_serialized() {
        let mut fixture = FixtureResult::new("setup");
        fixture.uuid = Some("internal-id".to_string());
        let json = serde_json::to_string(&fixture).unwrap();
        assert!(!json.contains("internal-id"));
    }

    #[test]
    fn test_step_uuid_serialized_when_present() {
        let mut step = StepResult::new("step");
        step.uuid = Some("step-id".to_string());
        let json = serde_json::to_string(&step).unwrap();
        assert!(json.contains("step-id"));
    }

    #[test]
    fn test_executable_item_trait_over_all_three() {
        fn finish(item: &mut dyn ExecutableItem) {
            item.set_status(Status::Passed);
            item.set_stage(Stage::Finished);
            item.status_details_mut().flaky = Some(true);
        }

        let mut test = TestResult::new("u", "t");
        let mut fixture = FixtureResult::new("f");
        let mut step = StepResult::new("s");
        finish(&mut test);
        finish(&mut fixture);
        finish(&mut step);

        assert_eq!(test.status, Status::Passed);
        assert_eq!(fixture.stage, Stage::Finished);
        assert_eq!(step.status_details.unwrap().flaky, Some(true));
    }

    #[test]
    fn test_container_children() {
        let mut container = TestResultContainer::named("suite");
        container.add_child("test-1");
        container.add_child("test-2");
        assert_eq!(container.children, vec!["test-1", "test-2"]);
        assert!(container.name.as_deref() == Some("suite"));
    }

    #[test]
    fn test_parameter_constructors() {
        assert_eq!(Parameter::excluded("ts", "1").excluded, Some(true));
        assert_eq!(
            Parameter::masked("password", "hunter2").mode,
            Some(ParameterMode::Masked)
        );
        assert_eq!(
            Parameter::hidden("token", "abc").mode,
            Some(ParameterMode::Hidden)
        );
    }

    #[test]
    fn test_status_details_from_failure() {
        let details = StatusDetails::from_failure("boom", Some("trace".to_string()));
        assert_eq!(details.message.as_deref(), Some("boom"));
        assert_eq!(details.trace.as_deref(), Some("trace"));
        assert!(details.flaky.is_none());
    }

    #[test]
    fn test_category_builder() {
        let category = Category::new("Timeouts")
            .with_status(Status::Broken)
            .with_message_regex(".*timed out.*")
            .as_flaky();
        assert_eq!(category.matched_statuses, vec![Status::Broken]);
        assert_eq!(category.flaky, Some(true));
    }
}
