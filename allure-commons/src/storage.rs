//! Uuid-keyed arena for in-flight result nodes.
//!
//! Containers and tests are owned here from start until they are handed to
//! the writer. Fixtures and steps live inside their parent node from the
//! moment they start; they are located again by uuid, following the path
//! recorded in the calling flow's context. All access happens under the
//! lifecycle's single mutation lock.

use std::collections::HashMap;

use crate::error::{AllureError, AllureResult};
use crate::model::{FixtureResult, StepResult, TestResult, TestResultContainer};

#[derive(Debug, Default)]
pub(crate) struct ResultStorage {
    containers: HashMap<String, TestResultContainer>,
    tests: HashMap<String, TestResult>,
}

impl ResultStorage {
    pub fn put_container(&mut self, container: TestResultContainer) {
        self.containers.insert(container.uuid.clone(), container);
    }

    pub fn container_mut(&mut self, uuid: &str) -> AllureResult<&mut TestResultContainer> {
        self.containers
            .get_mut(uuid)
            .ok_or_else(|| AllureError::state_conflict(format!("container {uuid} is not tracked")))
    }

    pub fn remove_container(&mut self, uuid: &str) -> AllureResult<TestResultContainer> {
        self.containers
            .remove(uuid)
            .ok_or_else(|| AllureError::state_conflict(format!("container {uuid} is not tracked")))
    }

    pub fn put_test(&mut self, test: TestResult) {
        self.tests.insert(test.uuid.clone(), test);
    }

    pub fn test_mut(&mut self, uuid: &str) -> AllureResult<&mut TestResult> {
        self.tests
            .get_mut(uuid)
            .ok_or_else(|| AllureError::state_conflict(format!("test {uuid} is not tracked")))
    }

    pub fn remove_test(&mut self, uuid: &str) -> AllureResult<TestResult> {
        self.tests
            .remove(uuid)
            .ok_or_else(|| AllureError::state_conflict(format!("test {uuid} is not tracked")))
    }

    /// Locates a fixture inside the given container, searching both the
    /// setup and teardown lists.
    pub fn fixture_mut(
        &mut self,
        container_uuid: &str,
        fixture_uuid: &str,
    ) -> AllureResult<&mut FixtureResult> {
        let container = self.container_mut(container_uuid)?;
        container
            .befores
            .iter_mut()
            .chain(container.afters.iter_mut())
            .find(|fixture| fixture.uuid.as_deref() == Some(fixture_uuid))
            .ok_or_else(|| {
                AllureError::state_conflict(format!(
                    "fixture {fixture_uuid} is not tracked by container {container_uuid}"
                ))
            })
    }
}

/// Walks `steps` down the uuid `path` (outermost first) and returns the
/// innermost step.
pub(crate) fn step_mut<'a>(
    steps: &'a mut [StepResult],
    path: &[String],
) -> AllureResult<&'a mut StepResult> {
    let (first, rest) = path
        .split_first()
        .ok_or_else(|| AllureError::state_conflict("no step context is active"))?;
    let mut current = find_step(steps, first)?;
    for uuid in rest {
        current = find_step(&mut current.steps, uuid)?;
    }
    Ok(current)
}

fn find_step<'a>(steps: &'a mut [StepResult], uuid: &str) -> AllureResult<&'a mut StepResult> {
    steps
        .iter_mut()
        .find(|step| step.uuid.as_deref() == Some(uuid))
        .ok_or_else(|| {
            AllureError::state_conflict(format!("step {uuid} is not tracked by its parent"))
        })
}
