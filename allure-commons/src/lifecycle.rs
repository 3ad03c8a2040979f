//! The lifecycle engine: validates context transitions, mutates the shared
//! result tree under a single mutation lock, and hands finished nodes to
//! the writer.
//!
//! Every operation reads the calling flow's context from the carrier,
//! computes the new context value first (failing fast on an illegal
//! transition, before any model state is touched), then mutates the arena
//! under the lock, and finally publishes the new context back to the
//! carrier. The lock is held for single synchronous mutations, including
//! `update_*` callbacks, and never across step/fixture/test bodies or
//! suspension points.

use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::debug;

use crate::carrier::ContextCarrier;
use crate::config::get_config;
use crate::context::AllureContext;
use crate::enums::Stage;
use crate::error::{AllureError, AllureResult};
use crate::model::{
    current_time_ms, Attachment, ExecutableItem, FixtureResult, StepResult, TestResult,
    TestResultContainer,
};
use crate::storage::{step_mut, ResultStorage};
use crate::writer::{
    generate_uuid, history_id, test_case_id, FileSystemResultsWriter, ResultsWriter,
};

static INSTANCE: OnceLock<AllureLifecycle> = OnceLock::new();

/// Returns the process-wide default lifecycle, writing to the configured
/// results directory. Tests should construct their own instances instead.
pub fn lifecycle() -> &'static AllureLifecycle {
    INSTANCE.get_or_init(|| {
        let config = get_config();
        AllureLifecycle::new(Arc::new(FileSystemResultsWriter::new(&config.results_dir)))
            .with_fail_patterns(config.fail_message_patterns)
    })
}

/// The execution-context state machine and concurrent result-tree builder.
pub struct AllureLifecycle {
    storage: Mutex<ResultStorage>,
    carrier: ContextCarrier,
    writer: Arc<dyn ResultsWriter>,
    fail_patterns: Vec<String>,
}

impl AllureLifecycle {
    /// Creates an isolated lifecycle writing into the given sink.
    pub fn new(writer: Arc<dyn ResultsWriter>) -> Self {
        Self {
            storage: Mutex::new(ResultStorage::default()),
            carrier: ContextCarrier::new(),
            writer,
            fail_patterns: get_config().fail_message_patterns,
        }
    }

    /// Replaces the failure-message patterns used for failed-vs-broken
    /// classification.
    pub fn with_fail_patterns(mut self, patterns: Vec<String>) -> Self {
        self.fail_patterns = patterns;
        self
    }

    /// Failure-message substrings that classify a failure as `failed`.
    pub fn fail_message_patterns(&self) -> &[String] {
        &self.fail_patterns
    }

    // === Container operations ===

    /// Opens a container scope and pushes it onto the calling flow's
    /// container stack.
    pub fn start_test_container(&self, mut container: TestResultContainer) -> AllureResult<()> {
        require_uuid(&container.uuid, "container")?;
        let context = self.carrier.current().with_container(container.uuid.clone())?;
        debug!(uuid = %container.uuid, "starting test container");
        container.start = Some(current_time_ms());
        self.storage.lock().put_container(container);
        self.carrier.replace(context);
        Ok(())
    }

    /// Applies `update` to the innermost open container.
    pub fn update_test_container(
        &self,
        update: impl FnOnce(&mut TestResultContainer),
    ) -> AllureResult<()> {
        let context = self.carrier.current();
        let uuid = context.current_container()?;
        update(self.storage.lock().container_mut(uuid)?);
        Ok(())
    }

    /// Stamps the stop time of the innermost open container.
    pub fn stop_test_container(&self) -> AllureResult<()> {
        self.update_test_container(|container| container.stop = Some(current_time_ms()))
    }

    /// Pops the innermost container, hands it to the writer, and stops
    /// tracking it.
    pub fn write_test_container(&self) -> AllureResult<()> {
        let context = self.carrier.current();
        let uuid = context.current_container()?.to_owned();
        let context = context.with_no_last_container()?;
        let container = self.storage.lock().remove_container(&uuid)?;
        debug!(uuid = %uuid, "writing test container");
        self.writer.write_container(&container)?;
        self.carrier.replace(context);
        Ok(())
    }

    // === Fixture operations ===

    /// Starts a setup fixture inside the innermost open container.
    pub fn start_before_fixture(&self, fixture: FixtureResult) -> AllureResult<()> {
        self.start_fixture(fixture, false)
    }

    /// Starts a teardown fixture inside the innermost open container.
    pub fn start_after_fixture(&self, fixture: FixtureResult) -> AllureResult<()> {
        self.start_fixture(fixture, true)
    }

    fn start_fixture(&self, mut fixture: FixtureResult, teardown: bool) -> AllureResult<()> {
        let uuid = fixture.uuid.get_or_insert_with(generate_uuid).clone();
        let context = self.carrier.current().with_fixture_context(uuid)?;
        let container_uuid = context.current_container()?.to_owned();
        debug!(name = %fixture.name, container = %container_uuid, teardown, "starting fixture");
        fixture.stage = Stage::Running;
        fixture.start = current_time_ms();
        {
            let mut storage = self.storage.lock();
            let container = storage.container_mut(&container_uuid)?;
            if teardown {
                container.afters.push(fixture);
            } else {
                container.befores.push(fixture);
            }
        }
        self.carrier.replace(context);
        Ok(())
    }

    /// Applies `update` to the active fixture.
    pub fn update_fixture(&self, update: impl FnOnce(&mut FixtureResult)) -> AllureResult<()> {
        let context = self.carrier.current();
        let fixture_uuid = context.current_fixture()?;
        let container_uuid = context.current_container()?;
        update(self.storage.lock().fixture_mut(container_uuid, fixture_uuid)?);
        Ok(())
    }

    /// Finishes the active fixture and deactivates the fixture context
    /// along with any open steps.
    pub fn stop_fixture(&self) -> AllureResult<()> {
        self.stop_fixture_with(|_| ())
    }

    /// Like [`stop_fixture`](Self::stop_fixture), applying `before_stop`
    /// to the fixture first.
    pub fn stop_fixture_with(
        &self,
        before_stop: impl FnOnce(&mut FixtureResult),
    ) -> AllureResult<()> {
        let context = self.carrier.current();
        {
            let fixture_uuid = context.current_fixture()?;
            let container_uuid = context.current_container()?;
            let mut storage = self.storage.lock();
            let fixture = storage.fixture_mut(container_uuid, fixture_uuid)?;
            before_stop(fixture);
            fixture.stage = Stage::Finished;
            fixture.stop = current_time_ms();
        }
        self.carrier.replace(context.with_no_fixture_context());
        Ok(())
    }

    // === Test operations ===

    /// Registers a test and activates the test context. The test's uuid is
    /// recorded as a child of every container currently on the stack, not
    /// just the innermost one.
    pub fn schedule_test_case(&self, mut test: TestResult) -> AllureResult<()> {
        require_uuid(&test.uuid, "test")?;
        let context = self.carrier.current().with_test_context(test.uuid.clone())?;
        debug!(uuid = %test.uuid, name = %test.name, "scheduling test case");
        test.stage = Stage::Scheduled;
        {
            let mut storage = self.storage.lock();
            for container_uuid in context.container_stack() {
                storage
                    .container_mut(container_uuid)?
                    .children
                    .push(test.uuid.clone());
            }
            storage.put_test(test);
        }
        self.carrier.replace(context);
        Ok(())
    }

    /// Starts the previously scheduled test.
    pub fn start_test_case(&self) -> AllureResult<()> {
        self.update_test_case(|test| {
            test.stage = Stage::Running;
            test.start = current_time_ms();
        })
    }

    /// Convenience: schedules and immediately starts a test.
    pub fn start_new_test_case(&self, test: TestResult) -> AllureResult<()> {
        self.schedule_test_case(test)?;
        self.start_test_case()
    }

    /// Applies `update` to the active test.
    pub fn update_test_case(&self, update: impl FnOnce(&mut TestResult)) -> AllureResult<()> {
        let context = self.carrier.current();
        let uuid = context.current_test()?;
        update(self.storage.lock().test_mut(uuid)?);
        Ok(())
    }

    /// Finishes the active test. The history id and the test-case id are
    /// derived here, exactly once, only if still unset.
    pub fn stop_test_case(&self) -> AllureResult<()> {
        self.stop_test_case_with(|_| ())
    }

    /// Like [`stop_test_case`](Self::stop_test_case), applying
    /// `before_stop` to the test first.
    pub fn stop_test_case_with(&self, before_stop: impl FnOnce(&mut TestResult)) -> AllureResult<()> {
        self.update_test_case(|test| {
            before_stop(test);
            test.stage = Stage::Finished;
            test.stop = current_time_ms();
            if let Some(full_name) = test.full_name.clone() {
                if test.history_id.is_none() {
                    test.history_id = Some(history_id(&full_name, &test.parameters));
                }
                if test.test_case_id.is_none() {
                    test.test_case_id = Some(test_case_id(&full_name));
                }
            }
        })
    }

    /// Hands the active test to the writer, stops tracking it, and
    /// deactivates the test context.
    pub fn write_test_case(&self) -> AllureResult<()> {
        let context = self.carrier.current();
        let uuid = context.current_test()?.to_owned();
        let test = self.storage.lock().remove_test(&uuid)?;
        debug!(uuid = %uuid, "writing test case");
        self.writer.write_test(&test)?;
        self.carrier.replace(context.with_no_test_context());
        Ok(())
    }

    // === Step operations ===

    /// Starts a step under the current step container (innermost step,
    /// else fixture, else test). The step is appended to its parent
    /// immediately, so concurrent flows sharing the parent see it.
    pub fn start_step(&self, mut step: StepResult) -> AllureResult<()> {
        let uuid = step.uuid.get_or_insert_with(generate_uuid).clone();
        let context = self.carrier.current();
        let new_context = context.clone().with_step(uuid)?;
        debug!(name = %step.name, "starting step");
        step.stage = Stage::Running;
        step.start = current_time_ms();
        {
            let mut storage = self.storage.lock();
            let root = root_steps_mut(&mut storage, &context)?;
            if context.has_step() {
                step_mut(root, context.step_path())?.steps.push(step);
            } else {
                root.push(step);
            }
        }
        self.carrier.replace(new_context);
        Ok(())
    }

    /// Applies `update` to the innermost open step.
    pub fn update_step(&self, update: impl FnOnce(&mut StepResult)) -> AllureResult<()> {
        let context = self.carrier.current();
        context.current_step()?;
        let mut storage = self.storage.lock();
        let root = root_steps_mut(&mut storage, &context)?;
        update(step_mut(root, context.step_path())?);
        Ok(())
    }

    /// Finishes the innermost open step and pops it; the previous step, if
    /// any, becomes current again.
    pub fn stop_step(&self) -> AllureResult<()> {
        self.stop_step_with(|_| ())
    }

    /// Like [`stop_step`](Self::stop_step), applying `before_stop` to the
    /// step first.
    pub fn stop_step_with(&self, before_stop: impl FnOnce(&mut StepResult)) -> AllureResult<()> {
        let context = self.carrier.current();
        let popped = context.clone().with_no_last_step()?;
        {
            let mut storage = self.storage.lock();
            let root = root_steps_mut(&mut storage, &context)?;
            let step = step_mut(root, context.step_path())?;
            before_stop(step);
            step.stage = Stage::Finished;
            step.stop = current_time_ms();
        }
        self.carrier.replace(popped);
        Ok(())
    }

    // === Cross-cutting operations ===

    /// Applies `update` to whichever executable item is innermost: the
    /// current step, else the active fixture, else the active test.
    pub fn update_executable_item(
        &self,
        update: impl FnOnce(&mut dyn ExecutableItem),
    ) -> AllureResult<()> {
        let context = self.carrier.current();
        let mut storage = self.storage.lock();
        if context.has_step() {
            let root = root_steps_mut(&mut storage, &context)?;
            update(step_mut(root, context.step_path())?);
        } else if let Ok(fixture_uuid) = context.current_fixture() {
            let container_uuid = context.current_container()?;
            update(storage.fixture_mut(container_uuid, fixture_uuid)?);
        } else if let Ok(test_uuid) = context.current_test() {
            update(storage.test_mut(test_uuid)?);
        } else {
            return Err(AllureError::state_conflict(
                "no fixture, test, or step context is active",
            ));
        }
        Ok(())
    }

    /// Writes attachment bytes under a generated source key and appends an
    /// attachment record to the current step container.
    pub fn add_attachment(
        &self,
        name: impl Into<String>,
        mime: impl Into<String>,
        content: &[u8],
        extension: &str,
    ) -> AllureResult<()> {
        let extension = extension.trim_start_matches('.');
        let source = if extension.is_empty() {
            format!("{}-attachment", generate_uuid())
        } else {
            format!("{}-attachment.{extension}", generate_uuid())
        };
        self.writer.write_attachment(&source, content)?;
        let attachment = Attachment::new(name, source, Some(mime.into()));
        self.update_executable_item(|item| item.attachments_mut().push(attachment))
    }

    // === Context hand-off ===

    /// Captures the calling flow's current context.
    pub fn context(&self) -> AllureContext {
        self.carrier.current()
    }

    /// Runs `action` with the calling flow's context temporarily replaced
    /// by `captured` (left as-is when `None`). The flow's original context
    /// is restored afterwards, even on panic. Returns the action's value
    /// and the context as `action` left it, which the caller may adopt via
    /// [`restore_context`](Self::restore_context).
    pub fn run_in_context<T>(
        &self,
        captured: Option<AllureContext>,
        action: impl FnOnce() -> T,
    ) -> (T, AllureContext) {
        let original = self.carrier.current();
        if let Some(captured) = captured {
            self.carrier.replace(captured);
        }
        let guard = RestoreGuard {
            carrier: &self.carrier,
            original: Some(original),
        };
        let value = action();
        let after = self.carrier.current();
        drop(guard);
        (value, after)
    }

    /// Permanently adopts a context captured on another flow.
    pub fn restore_context(&self, context: AllureContext) {
        self.carrier.replace(context);
    }
}

/// Restores a flow's original context on drop, so `run_in_context` cannot
/// leak a borrowed context past a panic.
struct RestoreGuard<'a> {
    carrier: &'a ContextCarrier,
    original: Option<AllureContext>,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        if let Some(original) = self.original.take() {
            self.carrier.replace(original);
        }
    }
}

/// Resolves the step list the context's step path starts from: the active
/// fixture's steps when a fixture is active, else the active test's steps.
fn root_steps_mut<'a>(
    storage: &'a mut ResultStorage,
    context: &AllureContext,
) -> AllureResult<&'a mut Vec<StepResult>> {
    if let Ok(fixture_uuid) = context.current_fixture() {
        let container_uuid = context.current_container()?;
        Ok(&mut storage.fixture_mut(container_uuid, fixture_uuid)?.steps)
    } else {
        let test_uuid = context.current_test()?;
        Ok(&mut storage.test_mut(test_uuid)?.steps)
    }
}

fn require_uuid(uuid: &str, what: &str) -> AllureResult<()> {
    if uuid.is_empty() {
        return Err(AllureError::invalid_argument(format!(
            "{what} uuid must not be empty"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::Status;
    use crate::writer::InMemoryResultsWriter;

    fn isolated() -> (AllureLifecycle, Arc<InMemoryResultsWriter>) {
        let writer = Arc::new(InMemoryResultsWriter::new());
        let lifecycle = AllureLifecycle::new(writer.clone());
        (lifecycle, writer)
    }

    #[test]
    fn test_empty_uuid_is_rejected() {
        let (lifecycle, _writer) = isolated();
        let err = lifecycle
            .start_test_container(TestResultContainer::new(""))
            .unwrap_err();
        assert!(matches!(err, AllureError::InvalidArgument(_)));

        let err = lifecycle
            .schedule_test_case(TestResult::new("", "nameless"))
            .unwrap_err();
        assert!(matches!(err, AllureError::InvalidArgument(_)));
    }

    #[test]
    fn test_stop_without_start_is_a_state_conflict() {
        let (lifecycle, _writer) = isolated();
        assert!(matches!(
            lifecycle.stop_test_case().unwrap_err(),
            AllureError::StateConflict(_)
        ));
        assert!(matches!(
            lifecycle.stop_step().unwrap_err(),
            AllureError::StateConflict(_)
        ));
        assert!(matches!(
            lifecycle.stop_fixture().unwrap_err(),
            AllureError::StateConflict(_)
        ));
        assert!(matches!(
            lifecycle.write_test_container().unwrap_err(),
            AllureError::StateConflict(_)
        ));
    }

    #[test]
    fn test_full_unwind_leaves_empty_context() {
        let (lifecycle, _writer) = isolated();
        lifecycle
            .start_test_container(TestResultContainer::new("c1"))
            .unwrap();
        lifecycle
            .start_new_test_case(TestResult::new("t1", "test one"))
            .unwrap();
        lifecycle.start_step(StepResult::new("s1")).unwrap();
        lifecycle.stop_step().unwrap();
        lifecycle.stop_test_case().unwrap();
        lifecycle.write_test_case().unwrap();
        lifecycle.stop_test_container().unwrap();
        lifecycle.write_test_container().unwrap();

        assert!(lifecycle.context().is_empty());
    }

    #[test]
    fn test_failed_transition_leaves_state_untouched() {
        let (lifecycle, writer) = isolated();
        lifecycle
            .start_new_test_case(TestResult::new("t1", "test one"))
            .unwrap();
        // A second test must not disturb the first one's context.
        let err = lifecycle
            .start_new_test_case(TestResult::new("t2", "test two"))
            .unwrap_err();
        assert!(matches!(err, AllureError::StateConflict(_)));
        assert_eq!(lifecycle.context().current_test().unwrap(), "t1");

        lifecycle.stop_test_case().unwrap();
        lifecycle.write_test_case().unwrap();
        assert_eq!(writer.test_results().len(), 1);
    }

    #[test]
    fn test_update_executable_item_picks_innermost() {
        let (lifecycle, writer) = isolated();
        lifecycle
            .start_new_test_case(TestResult::new("t1", "test one"))
            .unwrap();
        lifecycle
            .update_executable_item(|item| item.set_status(Status::Skipped))
            .unwrap();

        lifecycle.start_step(StepResult::new("s1")).unwrap();
        lifecycle
            .update_executable_item(|item| item.set_status(Status::Passed))
            .unwrap();
        lifecycle.stop_step().unwrap();
        lifecycle.stop_test_case().unwrap();
        lifecycle.write_test_case().unwrap();

        let tests = writer.test_results();
        assert_eq!(tests[0].status, Status::Skipped);
        assert_eq!(tests[0].steps[0].status, Status::Passed);
    }

    #[test]
    fn test_attachment_goes_to_current_step() {
        let (lifecycle, writer) = isolated();
        lifecycle
            .start_new_test_case(TestResult::new("t1", "test one"))
            .unwrap();
        lifecycle.start_step(StepResult::new("s1")).unwrap();
        lifecycle
            .add_attachment("log", "text/plain", b"hello", "txt")
            .unwrap();
        lifecycle.stop_step().unwrap();
        lifecycle.stop_test_case().unwrap();
        lifecycle.write_test_case().unwrap();

        let tests = writer.test_results();
        let attachment = &tests[0].steps[0].attachments[0];
        assert_eq!(attachment.name, "log");
        assert!(attachment.source.ends_with("-attachment.txt"));

        let payloads = writer.attachments();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].0, attachment.source);
        assert_eq!(payloads[0].1, b"hello");
    }

    #[test]
    fn test_run_in_context_restores_on_panic() {
        let (lifecycle, _writer) = isolated();
        lifecycle
            .start_new_test_case(TestResult::new("t1", "test one"))
            .unwrap();
        let original = lifecycle.context();

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            lifecycle.run_in_context(Some(AllureContext::new()), || panic!("boom"))
        }));
        assert!(outcome.is_err());
        assert_eq!(lifecycle.context(), original);
    }
}
