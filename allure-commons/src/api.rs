//! High-level facade over the lifecycle engine.
//!
//! Everything here is a composition of lifecycle operations plus
//! panic-to-status mapping. The `*_in` functions take an explicit
//! lifecycle so tests can run against isolated instances; the plain
//! variants delegate to the process-wide default instance.

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::path::Path;

use tracing::debug;

use crate::enums::{ContentType, LabelName, LinkType, Severity, Status};
use crate::error::AllureResult;
use crate::lifecycle::{lifecycle, AllureLifecycle};
use crate::model::{FixtureResult, Label, Link, Parameter, StatusDetails, StepResult};
use crate::writer::guess_mime_type;

type PanicPayload = Box<dyn std::any::Any + Send + 'static>;

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}

/// Maps a failure message to `Failed` when it matches one of the
/// configured patterns, `Broken` otherwise.
fn failure_status(message: &str, patterns: &[String]) -> Status {
    if patterns.iter().any(|p| message.contains(p.as_str())) {
        Status::Failed
    } else {
        Status::Broken
    }
}

fn finish_step<T>(
    lifecycle: &AllureLifecycle,
    outcome: Result<T, PanicPayload>,
) -> AllureResult<T> {
    match outcome {
        Ok(value) => {
            lifecycle.stop_step_with(|step| {
                // A status the body set explicitly wins over the default.
                if step.status == Status::Unknown {
                    step.status = Status::Passed;
                }
            })?;
            Ok(value)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let status = failure_status(&message, lifecycle.fail_message_patterns());
            debug!(%status, "step body panicked");
            // The panic is the primary failure; a stop error cannot outrank it.
            let _ = lifecycle.stop_step_with(|step| {
                step.status = status;
                step.status_details = Some(StatusDetails::from_failure(message, None));
            });
            resume_unwind(payload);
        }
    }
}

fn finish_fixture<T>(
    lifecycle: &AllureLifecycle,
    outcome: Result<T, PanicPayload>,
) -> AllureResult<T> {
    match outcome {
        Ok(value) => {
            lifecycle.stop_fixture_with(|fixture| {
                if fixture.status == Status::Unknown {
                    fixture.status = Status::Passed;
                }
            })?;
            Ok(value)
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let status = failure_status(&message, lifecycle.fail_message_patterns());
            debug!(%status, "fixture body panicked");
            let _ = lifecycle.stop_fixture_with(|fixture| {
                fixture.status = status;
                fixture.status_details = Some(StatusDetails::from_failure(message, None));
            });
            resume_unwind(payload);
        }
    }
}

// === Steps and fixtures ===

/// Runs `body` as a step of the given lifecycle. A panic marks the step
/// failed or broken (per the configured patterns) and is re-raised.
pub fn step_in<T>(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    body: impl FnOnce() -> T,
) -> AllureResult<T> {
    lifecycle.start_step(StepResult::new(name.into()))?;
    let outcome = catch_unwind(AssertUnwindSafe(body));
    finish_step(lifecycle, outcome)
}

/// Runs `body` as a step of the default lifecycle.
pub fn step<T>(name: impl Into<String>, body: impl FnOnce() -> T) -> AllureResult<T> {
    step_in(lifecycle(), name, body)
}

/// Records a named step with the given status and no body.
pub fn log_step_in(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    status: Status,
) -> AllureResult<()> {
    lifecycle.start_step(StepResult::new(name.into()))?;
    lifecycle.stop_step_with(|step| step.status = status)
}

/// Records a named step with the given status on the default lifecycle.
pub fn log_step(name: impl Into<String>, status: Status) -> AllureResult<()> {
    log_step_in(lifecycle(), name, status)
}

fn run_fixture<T>(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    body: impl FnOnce() -> T,
    teardown: bool,
) -> AllureResult<T> {
    let fixture = FixtureResult::new(name);
    if teardown {
        lifecycle.start_after_fixture(fixture)?;
    } else {
        lifecycle.start_before_fixture(fixture)?;
    }
    let outcome = catch_unwind(AssertUnwindSafe(body));
    finish_fixture(lifecycle, outcome)
}

/// Runs `body` as a setup fixture of the current container.
pub fn before_in<T>(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    body: impl FnOnce() -> T,
) -> AllureResult<T> {
    run_fixture(lifecycle, name, body, false)
}

/// Runs `body` as a setup fixture on the default lifecycle.
pub fn before<T>(name: impl Into<String>, body: impl FnOnce() -> T) -> AllureResult<T> {
    before_in(lifecycle(), name, body)
}

/// Runs `body` as a teardown fixture of the current container.
pub fn after_in<T>(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    body: impl FnOnce() -> T,
) -> AllureResult<T> {
    run_fixture(lifecycle, name, body, true)
}

/// Runs `body` as a teardown fixture on the default lifecycle.
pub fn after<T>(name: impl Into<String>, body: impl FnOnce() -> T) -> AllureResult<T> {
    after_in(lifecycle(), name, body)
}

// === Async variants ===
//
// The body may suspend and resume on a different worker thread, so the
// context is captured after the step starts and adopted again before the
// stop, making the stop land on the right flow regardless of where the
// continuation runs.

#[cfg(feature = "async")]
pub async fn step_async_in<T, Fut>(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    body: impl FnOnce() -> Fut,
) -> AllureResult<T>
where
    Fut: std::future::Future<Output = T>,
{
    use futures::FutureExt;

    lifecycle.start_step(StepResult::new(name.into()))?;
    let captured = lifecycle.context();
    let outcome = AssertUnwindSafe(body()).catch_unwind().await;
    lifecycle.restore_context(captured);
    finish_step(lifecycle, outcome)
}

#[cfg(feature = "async")]
pub async fn step_async<T, Fut>(name: impl Into<String>, body: impl FnOnce() -> Fut) -> AllureResult<T>
where
    Fut: std::future::Future<Output = T>,
{
    step_async_in(lifecycle(), name, body).await
}

#[cfg(feature = "async")]
async fn run_fixture_async<T, Fut>(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    body: impl FnOnce() -> Fut,
    teardown: bool,
) -> AllureResult<T>
where
    Fut: std::future::Future<Output = T>,
{
    use futures::FutureExt;

    let fixture = FixtureResult::new(name);
    if teardown {
        lifecycle.start_after_fixture(fixture)?;
    } else {
        lifecycle.start_before_fixture(fixture)?;
    }
    let captured = lifecycle.context();
    let outcome = AssertUnwindSafe(body()).catch_unwind().await;
    lifecycle.restore_context(captured);
    finish_fixture(lifecycle, outcome)
}

#[cfg(feature = "async")]
pub async fn before_async_in<T, Fut>(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    body: impl FnOnce() -> Fut,
) -> AllureResult<T>
where
    Fut: std::future::Future<Output = T>,
{
    run_fixture_async(lifecycle, name, body, false).await
}

#[cfg(feature = "async")]
pub async fn before_async<T, Fut>(
    name: impl Into<String>,
    body: impl FnOnce() -> Fut,
) -> AllureResult<T>
where
    Fut: std::future::Future<Output = T>,
{
    before_async_in(lifecycle(), name, body).await
}

#[cfg(feature = "async")]
pub async fn after_async_in<T, Fut>(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    body: impl FnOnce() -> Fut,
) -> AllureResult<T>
where
    Fut: std::future::Future<Output = T>,
{
    run_fixture_async(lifecycle, name, body, true).await
}

#[cfg(feature = "async")]
pub async fn after_async<T, Fut>(
    name: impl Into<String>,
    body: impl FnOnce() -> Fut,
) -> AllureResult<T>
where
    Fut: std::future::Future<Output = T>,
{
    after_async_in(lifecycle(), name, body).await
}

// === Attachments ===

/// Attaches plain text to the current step container.
pub fn attach_text_in(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    content: impl AsRef<str>,
) -> AllureResult<()> {
    lifecycle.add_attachment(
        name,
        ContentType::Text.as_mime(),
        content.as_ref().as_bytes(),
        ContentType::Text.extension(),
    )
}

pub fn attach_text(name: impl Into<String>, content: impl AsRef<str>) -> AllureResult<()> {
    attach_text_in(lifecycle(), name, content)
}

/// Serializes `value` to pretty JSON and attaches it.
pub fn attach_json_in<T: serde::Serialize>(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    value: &T,
) -> AllureResult<()> {
    let payload = serde_json::to_vec_pretty(value)?;
    lifecycle.add_attachment(
        name,
        ContentType::Json.as_mime(),
        &payload,
        ContentType::Json.extension(),
    )
}

pub fn attach_json<T: serde::Serialize>(name: impl Into<String>, value: &T) -> AllureResult<()> {
    attach_json_in(lifecycle(), name, value)
}

/// Attaches raw bytes with the given content type.
pub fn attach_binary_in(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    content: &[u8],
    content_type: ContentType,
) -> AllureResult<()> {
    lifecycle.add_attachment(
        name,
        content_type.as_mime(),
        content,
        content_type.extension(),
    )
}

pub fn attach_binary(
    name: impl Into<String>,
    content: &[u8],
    content_type: ContentType,
) -> AllureResult<()> {
    attach_binary_in(lifecycle(), name, content, content_type)
}

/// Reads a file and attaches its contents, guessing the MIME type from
/// the extension when none is given.
pub fn attach_file_in(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    path: impl AsRef<Path>,
    content_type: Option<ContentType>,
) -> AllureResult<()> {
    let path = path.as_ref();
    let content = std::fs::read(path)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("bin");
    let mime = content_type
        .map(|ct| ct.as_mime().to_string())
        .or_else(|| guess_mime_type(extension))
        .unwrap_or_else(|| "application/octet-stream".to_string());
    lifecycle.add_attachment(name, mime, &content, extension)
}

pub fn attach_file(
    name: impl Into<String>,
    path: impl AsRef<Path>,
    content_type: Option<ContentType>,
) -> AllureResult<()> {
    attach_file_in(lifecycle(), name, path, content_type)
}

/// Attaches an expected/actual/diff screenshot triple and tags the test
/// as a screenshot-diff test.
pub fn attach_screen_diff_in(
    lifecycle: &AllureLifecycle,
    expected: &[u8],
    actual: &[u8],
    diff: &[u8],
) -> AllureResult<()> {
    attach_binary_in(lifecycle, "expected", expected, ContentType::Png)?;
    attach_binary_in(lifecycle, "actual", actual, ContentType::Png)?;
    attach_binary_in(lifecycle, "diff", diff, ContentType::Png)?;
    lifecycle.update_test_case(|test| test.labels.push(Label::new("testType", "screenshotDiff")))
}

pub fn attach_screen_diff(expected: &[u8], actual: &[u8], diff: &[u8]) -> AllureResult<()> {
    attach_screen_diff_in(lifecycle(), expected, actual, diff)
}

// === Labels ===

/// Appends a label to the current test.
pub fn add_label_in(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    value: impl Into<String>,
) -> AllureResult<()> {
    let label = Label::new(name, value);
    lifecycle.update_test_case(|test| test.labels.push(label))
}

pub fn add_label(name: impl Into<String>, value: impl Into<String>) -> AllureResult<()> {
    add_label_in(lifecycle(), name, value)
}

/// Replaces all labels with the given name; other labels keep their order.
pub fn set_label_in(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    value: impl Into<String>,
) -> AllureResult<()> {
    let label = Label::new(name, value);
    lifecycle.update_test_case(move |test| {
        test.labels.retain(|existing| existing.name != label.name);
        test.labels.push(label);
    })
}

pub fn set_label(name: impl Into<String>, value: impl Into<String>) -> AllureResult<()> {
    set_label_in(lifecycle(), name, value)
}

/// Adds host and thread labels identifying where the test ran.
pub fn add_execution_labels_in(lifecycle: &AllureLifecycle) -> AllureResult<()> {
    let host = std::env::var("HOSTNAME").ok().or_else(|| {
        hostname::get()
            .ok()
            .and_then(|h| h.to_str().map(str::to_string))
    });
    let thread = format!("{:?}", std::thread::current().id());
    lifecycle.update_test_case(move |test| {
        if let Some(host) = host {
            test.labels.push(Label::host(host));
        }
        test.labels.push(Label::thread(thread));
    })
}

pub fn add_execution_labels() -> AllureResult<()> {
    add_execution_labels_in(lifecycle())
}

pub fn epic(value: impl Into<String>) -> AllureResult<()> {
    add_label_in(lifecycle(), LabelName::Epic.as_str(), value)
}

pub fn feature(value: impl Into<String>) -> AllureResult<()> {
    add_label_in(lifecycle(), LabelName::Feature.as_str(), value)
}

pub fn story(value: impl Into<String>) -> AllureResult<()> {
    add_label_in(lifecycle(), LabelName::Story.as_str(), value)
}

pub fn suite(value: impl Into<String>) -> AllureResult<()> {
    add_label_in(lifecycle(), LabelName::Suite.as_str(), value)
}

pub fn parent_suite(value: impl Into<String>) -> AllureResult<()> {
    add_label_in(lifecycle(), LabelName::ParentSuite.as_str(), value)
}

pub fn sub_suite(value: impl Into<String>) -> AllureResult<()> {
    add_label_in(lifecycle(), LabelName::SubSuite.as_str(), value)
}

pub fn severity(value: Severity) -> AllureResult<()> {
    set_label_in(lifecycle(), LabelName::Severity.as_str(), value.as_str())
}

pub fn owner(value: impl Into<String>) -> AllureResult<()> {
    add_label_in(lifecycle(), LabelName::Owner.as_str(), value)
}

pub fn tag(value: impl Into<String>) -> AllureResult<()> {
    add_label_in(lifecycle(), LabelName::Tag.as_str(), value)
}

pub fn tags(values: &[&str]) -> AllureResult<()> {
    for value in values {
        tag(*value)?;
    }
    Ok(())
}

pub fn allure_id(value: impl Into<String>) -> AllureResult<()> {
    add_label_in(lifecycle(), LabelName::AllureId.as_str(), value)
}

// === Links ===

/// Appends a link to the current test.
pub fn add_link_in(
    lifecycle: &AllureLifecycle,
    url: impl Into<String>,
    name: Option<String>,
    link_type: LinkType,
) -> AllureResult<()> {
    let link = Link::new(url, name, link_type);
    lifecycle.update_test_case(|test| test.links.push(link))
}

pub fn link(url: impl Into<String>, name: Option<String>) -> AllureResult<()> {
    add_link_in(lifecycle(), url, name, LinkType::Default)
}

pub fn issue(url: impl Into<String>, name: Option<String>) -> AllureResult<()> {
    add_link_in(lifecycle(), url, name, LinkType::Issue)
}

pub fn tms(url: impl Into<String>, name: Option<String>) -> AllureResult<()> {
    add_link_in(lifecycle(), url, name, LinkType::Tms)
}

// === Parameters ===

/// Appends a parameter to the innermost executable item, so a step
/// records its own parameters while a test records top-level ones.
pub fn add_parameter_in(
    lifecycle: &AllureLifecycle,
    name: impl Into<String>,
    value: impl ToString,
) -> AllureResult<()> {
    let parameter = Parameter::new(name, value.to_string());
    lifecycle.update_executable_item(|item| item.parameters_mut().push(parameter))
}

pub fn add_parameter(name: impl Into<String>, value: impl ToString) -> AllureResult<()> {
    add_parameter_in(lifecycle(), name, value)
}

/// Replaces the current test's parameters with the given name; other
/// parameters keep their order. Targets the test because parameters feed
/// its history id.
pub fn set_parameter_in(lifecycle: &AllureLifecycle, parameter: Parameter) -> AllureResult<()> {
    lifecycle.update_test_case(move |test| {
        test.parameters
            .retain(|existing| existing.name != parameter.name);
        test.parameters.push(parameter);
    })
}

pub fn set_parameter(parameter: Parameter) -> AllureResult<()> {
    set_parameter_in(lifecycle(), parameter)
}

// === Test metadata ===

/// Sets the markdown description of the current test.
pub fn description_in(lifecycle: &AllureLifecycle, text: impl Into<String>) -> AllureResult<()> {
    let text = text.into();
    lifecycle.update_test_case(|test| test.description = Some(text))
}

pub fn description(text: impl Into<String>) -> AllureResult<()> {
    description_in(lifecycle(), text)
}

/// Sets the HTML description of the current test.
pub fn description_html_in(lifecycle: &AllureLifecycle, html: impl Into<String>) -> AllureResult<()> {
    let html = html.into();
    lifecycle.update_test_case(|test| test.description_html = Some(html))
}

pub fn description_html(html: impl Into<String>) -> AllureResult<()> {
    description_html_in(lifecycle(), html)
}

/// Overrides the display name of the current test.
pub fn display_name_in(lifecycle: &AllureLifecycle, name: impl Into<String>) -> AllureResult<()> {
    let name = name.into();
    lifecycle.update_test_case(|test| test.name = name)
}

pub fn display_name(name: impl Into<String>) -> AllureResult<()> {
    display_name_in(lifecycle(), name)
}

/// Marks the current test as flaky.
pub fn flaky() -> AllureResult<()> {
    lifecycle().update_test_case(|test| {
        test.status_details.get_or_insert_with(Default::default).flaky = Some(true);
    })
}

/// Marks the current test as muted.
pub fn muted() -> AllureResult<()> {
    lifecycle().update_test_case(|test| {
        test.status_details.get_or_insert_with(Default::default).muted = Some(true);
    })
}

/// Marks the current test as a known issue and records the issue link.
pub fn known_issue(url: impl Into<String>) -> AllureResult<()> {
    let url = url.into();
    lifecycle().update_test_case(|test| {
        test.status_details.get_or_insert_with(Default::default).known = Some(true);
        test.links.push(Link::issue(url.clone(), Some(url)));
    })
}
