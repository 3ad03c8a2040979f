//! Immutable execution-context value and its validated transitions.
//!
//! A context describes what one logical execution flow is currently
//! recording into: a stack of open containers, at most one fixture, at most
//! one test, and a stack of open steps. Every `with_*` operation consumes
//! the receiver and returns a new value or a state-conflict error; nothing
//! is ever mutated in place, so capturing a context for another flow is a
//! plain clone.

use crate::error::{AllureError, AllureResult};

/// Execution context of one logical flow. Cheap to clone, never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllureContext {
    /// Open containers; the last element is the innermost.
    container_stack: Vec<String>,
    fixture: Option<String>,
    test: Option<String>,
    /// Open steps; the last element is the innermost.
    step_stack: Vec<String>,
}

impl AllureContext {
    /// An empty context: nothing active.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_container(&self) -> bool {
        !self.container_stack.is_empty()
    }

    pub fn has_fixture(&self) -> bool {
        self.fixture.is_some()
    }

    pub fn has_test(&self) -> bool {
        self.test.is_some()
    }

    pub fn has_step(&self) -> bool {
        !self.step_stack.is_empty()
    }

    /// True when no container, fixture, test, or step is active.
    pub fn is_empty(&self) -> bool {
        !self.has_container() && !self.has_fixture() && !self.has_test() && !self.has_step()
    }

    /// Uuids of the open containers, innermost first.
    pub fn container_stack(&self) -> impl Iterator<Item = &str> {
        self.container_stack.iter().rev().map(String::as_str)
    }

    /// Uuids of the open steps, innermost first.
    pub fn step_stack(&self) -> impl Iterator<Item = &str> {
        self.step_stack.iter().rev().map(String::as_str)
    }

    /// Uuid path from the outermost step down to the innermost one.
    pub(crate) fn step_path(&self) -> &[String] {
        &self.step_stack
    }

    /// Uuid of the innermost open container.
    pub fn current_container(&self) -> AllureResult<&str> {
        self.container_stack
            .last()
            .map(String::as_str)
            .ok_or_else(|| AllureError::state_conflict("no container context is active"))
    }

    /// Uuid of the active fixture.
    pub fn current_fixture(&self) -> AllureResult<&str> {
        self.fixture
            .as_deref()
            .ok_or_else(|| AllureError::state_conflict("no fixture context is active"))
    }

    /// Uuid of the active test.
    pub fn current_test(&self) -> AllureResult<&str> {
        self.test
            .as_deref()
            .ok_or_else(|| AllureError::state_conflict("no test context is active"))
    }

    /// Uuid of the innermost open step.
    pub fn current_step(&self) -> AllureResult<&str> {
        self.step_stack
            .last()
            .map(String::as_str)
            .ok_or_else(|| AllureError::state_conflict("no step context is active"))
    }

    /// Uuid of the node the next step or attachment belongs to: the
    /// innermost step if any, else the fixture, else the test.
    pub fn current_step_container(&self) -> AllureResult<&str> {
        self.step_stack
            .last()
            .or(self.fixture.as_ref())
            .or(self.test.as_ref())
            .map(String::as_str)
            .ok_or_else(|| {
                AllureError::state_conflict("no fixture, test, or step context is active")
            })
    }

    /// Pushes a container. The container stack may only change while no
    /// fixture and no test are active.
    pub fn with_container(mut self, uuid: impl Into<String>) -> AllureResult<Self> {
        if self.fixture.is_some() {
            return Err(AllureError::state_conflict(
                "cannot modify the container stack: a fixture context is active",
            ));
        }
        if self.test.is_some() {
            return Err(AllureError::state_conflict(
                "cannot modify the container stack: a test context is active",
            ));
        }
        self.container_stack.push(uuid.into());
        Ok(self)
    }

    /// Pops the innermost container. Three distinct failure conditions:
    /// an active fixture, an active test, or an empty stack.
    pub fn with_no_last_container(mut self) -> AllureResult<Self> {
        if self.fixture.is_some() {
            return Err(AllureError::state_conflict(
                "cannot remove the last container: a fixture context is active",
            ));
        }
        if self.test.is_some() {
            return Err(AllureError::state_conflict(
                "cannot remove the last container: a test context is active",
            ));
        }
        if self.container_stack.pop().is_none() {
            return Err(AllureError::state_conflict(
                "cannot remove the last container: no container context is active",
            ));
        }
        Ok(self)
    }

    /// Activates the fixture context. Requires an open container and no
    /// already-active fixture; fixtures never nest. Clears the step stack.
    pub fn with_fixture_context(mut self, uuid: impl Into<String>) -> AllureResult<Self> {
        if self.container_stack.is_empty() {
            return Err(AllureError::state_conflict(
                "cannot activate the fixture context: no container context is active",
            ));
        }
        if self.fixture.is_some() {
            return Err(AllureError::state_conflict(
                "cannot activate the fixture context: another fixture context is already active",
            ));
        }
        self.fixture = Some(uuid.into());
        self.step_stack.clear();
        Ok(self)
    }

    /// Deactivates the fixture context and the whole step stack with it.
    /// Safe to call when no fixture is active.
    pub fn with_no_fixture_context(mut self) -> Self {
        self.fixture = None;
        self.step_stack.clear();
        self
    }

    /// Activates the test context. Forbidden while a fixture is active and
    /// while another test is active; tests never nest.
    pub fn with_test_context(mut self, uuid: impl Into<String>) -> AllureResult<Self> {
        if self.fixture.is_some() {
            return Err(AllureError::state_conflict(
                "cannot activate the test context: a fixture context is active",
            ));
        }
        if self.test.is_some() {
            return Err(AllureError::state_conflict(
                "cannot activate the test context: another test context is already active",
            ));
        }
        self.test = Some(uuid.into());
        Ok(self)
    }

    /// Deactivates the test context, the fixture context, and the step
    /// stack. Safe to call when nothing is active.
    pub fn with_no_test_context(mut self) -> Self {
        self.fixture = None;
        self.test = None;
        self.step_stack.clear();
        self
    }

    /// Pushes a step. Steps require a fixture or a test to attach to.
    pub fn with_step(mut self, uuid: impl Into<String>) -> AllureResult<Self> {
        if self.fixture.is_none() && self.test.is_none() {
            return Err(AllureError::state_conflict(
                "cannot activate the step context: neither a fixture nor a test context is active",
            ));
        }
        self.step_stack.push(uuid.into());
        Ok(self)
    }

    /// Pops the innermost step.
    pub fn with_no_last_step(mut self) -> AllureResult<Self> {
        if self.step_stack.pop().is_none() {
            return Err(AllureError::state_conflict(
                "cannot remove the last step: no step context is active",
            ));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn ctx() -> AllureContext {
        AllureContext::new()
    }

    #[test]
    fn test_empty_context_has_nothing_active() {
        let context = ctx();
        assert!(context.is_empty());
        assert!(context.current_container().is_err());
        assert!(context.current_fixture().is_err());
        assert!(context.current_test().is_err());
        assert!(context.current_step().is_err());
        assert!(context.current_step_container().is_err());
    }

    #[test]
    fn test_container_push_pop_is_lifo() {
        let context = ctx()
            .with_container("c1")
            .unwrap()
            .with_container("c2")
            .unwrap();
        assert_eq!(context.current_container().unwrap(), "c2");
        assert_eq!(
            context.container_stack().collect::<Vec<_>>(),
            vec!["c2", "c1"]
        );

        let context = context.with_no_last_container().unwrap();
        assert_eq!(context.current_container().unwrap(), "c1");

        let context = context.with_no_last_container().unwrap();
        assert!(context.is_empty());
    }

    #[test]
    fn test_pop_empty_container_stack_fails() {
        let err = ctx().with_no_last_container().unwrap_err();
        assert!(err.to_string().contains("no container context is active"));
    }

    #[test]
    fn test_container_stack_frozen_while_fixture_active() {
        let context = ctx()
            .with_container("c1")
            .unwrap()
            .with_fixture_context("f1")
            .unwrap();

        let err = context.clone().with_container("c2").unwrap_err();
        assert!(err.to_string().contains("fixture context is active"));

        let err = context.with_no_last_container().unwrap_err();
        assert!(err.to_string().contains("fixture context is active"));
    }

    #[test]
    fn test_container_stack_frozen_while_test_active() {
        let context = ctx()
            .with_container("c1")
            .unwrap()
            .with_test_context("t1")
            .unwrap();

        let err = context.clone().with_container("c2").unwrap_err();
        assert!(err.to_string().contains("test context is active"));

        let err = context.with_no_last_container().unwrap_err();
        assert!(err.to_string().contains("test context is active"));
    }

    #[test]
    fn test_fixture_requires_container() {
        let err = ctx().with_fixture_context("f1").unwrap_err();
        assert!(err.to_string().contains("container context is not active")
            || err.to_string().contains("no container context is active"));
    }

    #[test]
    fn test_fixture_does_not_nest() {
        let context = ctx()
            .with_container("c1")
            .unwrap()
            .with_fixture_context("f1")
            .unwrap();
        let err = context.with_fixture_context("f2").unwrap_err();
        assert!(err.to_string().contains("already active"));
    }

    #[test]
    fn test_test_forbidden_while_fixture_active() {
        let context = ctx()
            .with_container("c1")
            .unwrap()
            .with_fixture_context("f1")
            .unwrap();
        let err = context.with_test_context("t1").unwrap_err();
        assert!(err.to_string().contains("fixture context is active"));
    }

    #[test]
    fn test_test_does_not_nest() {
        let context = ctx().with_test_context("t1").unwrap();
        let err = context.with_test_context("t2").unwrap_err();
        assert!(err.to_string().contains("already active"));
    }

    #[test]
    fn test_step_requires_fixture_or_test() {
        let err = ctx().with_step("s1").unwrap_err();
        assert!(err
            .to_string()
            .contains("neither a fixture nor a test context is active"));

        let with_test = ctx().with_test_context("t1").unwrap().with_step("s1");
        assert!(with_test.is_ok());

        let with_fixture = ctx()
            .with_container("c1")
            .unwrap()
            .with_fixture_context("f1")
            .unwrap()
            .with_step("s1");
        assert!(with_fixture.is_ok());
    }

    #[test]
    fn test_step_stack_order_and_pop() {
        let context = ctx()
            .with_test_context("t1")
            .unwrap()
            .with_step("s1")
            .unwrap()
            .with_step("s2")
            .unwrap();
        assert_eq!(context.step_stack().collect::<Vec<_>>(), vec!["s2", "s1"]);
        assert_eq!(context.current_step().unwrap(), "s2");

        let context = context.with_no_last_step().unwrap();
        assert_eq!(context.step_stack().collect::<Vec<_>>(), vec!["s1"]);
        assert_eq!(context.current_step().unwrap(), "s1");
    }

    #[test]
    fn test_clearing_test_clears_steps() {
        let context = ctx()
            .with_test_context("t1")
            .unwrap()
            .with_step("s1")
            .unwrap()
            .with_step("s2")
            .unwrap()
            .with_no_test_context();
        assert!(!context.has_step());
        assert!(!context.has_test());
    }

    #[test]
    fn test_clearing_fixture_clears_steps() {
        let context = ctx()
            .with_container("c1")
            .unwrap()
            .with_fixture_context("f1")
            .unwrap()
            .with_step("s1")
            .unwrap()
            .with_no_fixture_context();
        assert!(!context.has_step());
        assert!(!context.has_fixture());
        // The container survives.
        assert_eq!(context.current_container().unwrap(), "c1");
    }

    #[test]
    fn test_activating_fixture_clears_stale_steps() {
        // A test's steps must not leak into a subsequently started fixture.
        let context = ctx()
            .with_container("c1")
            .unwrap()
            .with_test_context("t1")
            .unwrap()
            .with_step("s1")
            .unwrap()
            .with_no_test_context()
            .with_fixture_context("f1")
            .unwrap();
        assert!(!context.has_step());
    }

    #[rstest]
    #[case::innermost_step_wins(true, false, true, "s1")]
    #[case::fixture_when_no_step(true, false, false, "f1")]
    #[case::test_when_no_step_or_fixture(false, true, false, "t1")]
    fn test_current_step_container_resolution(
        #[case] with_fixture: bool,
        #[case] with_test: bool,
        #[case] with_step: bool,
        #[case] expected: &str,
    ) {
        let mut context = ctx().with_container("c1").unwrap();
        if with_test && !with_fixture {
            context = context.with_test_context("t1").unwrap();
        }
        if with_fixture {
            context = context.with_fixture_context("f1").unwrap();
        }
        if with_step {
            context = context.with_step("s1").unwrap();
        }
        assert_eq!(context.current_step_container().unwrap(), expected);
    }

    #[test]
    fn test_full_unwind_returns_empty_context() {
        let context = ctx()
            .with_container("c1")
            .unwrap()
            .with_test_context("t1")
            .unwrap()
            .with_step("s1")
            .unwrap()
            .with_no_last_step()
            .unwrap()
            .with_no_test_context()
            .with_no_last_container()
            .unwrap();
        assert!(context.is_empty());
        assert_eq!(context, AllureContext::new());
    }
}
