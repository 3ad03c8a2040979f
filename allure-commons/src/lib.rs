//! Allure Commons - execution-context state machine and lifecycle engine
//! for Allure test reporting.
//!
//! This crate is the core that test-framework adapters build on. It tracks
//! which container, fixture, test, and step are current for each logical
//! execution flow, enforces legal state transitions, supports context
//! capture/restore across thread and async boundaries, and safely mutates
//! a shared result tree under concurrent access before handing finished
//! nodes to a pluggable writer.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use allure_commons::api;
//! use allure_commons::lifecycle::AllureLifecycle;
//! use allure_commons::model::{TestResult, TestResultContainer};
//! use allure_commons::writer::FileSystemResultsWriter;
//!
//! # fn main() -> allure_commons::error::AllureResult<()> {
//! let lifecycle = AllureLifecycle::new(Arc::new(FileSystemResultsWriter::new("allure-results")));
//!
//! lifecycle.start_test_container(TestResultContainer::named("suite"))?;
//! lifecycle.start_new_test_case(
//!     TestResult::named("my test").with_full_name("module::my_test"),
//! )?;
//!
//! api::step_in(&lifecycle, "do something", || {
//!     // test code here
//! })?;
//!
//! lifecycle.stop_test_case()?;
//! lifecycle.write_test_case()?;
//! lifecycle.stop_test_container()?;
//! lifecycle.write_test_container()?;
//! # Ok(())
//! # }
//! ```
//!
//! Flows are isolated per thread: a spawned worker starts with an empty
//! context and joins an existing one only through an explicit hand-off
//! (`lifecycle.context()` to capture, `restore_context` or
//! `run_in_context` to adopt).

pub mod api;
pub mod carrier;
pub mod config;
pub mod context;
pub mod enums;
pub mod error;
pub mod lifecycle;
pub mod model;
mod storage;
pub mod writer;

// Re-exports for convenience
pub use config::{configure, get_config, AllureConfig, AllureConfigBuilder};
pub use context::AllureContext;
pub use enums::{ContentType, LabelName, LinkType, ParameterMode, Severity, Stage, Status};
pub use error::{AllureError, AllureResult};
pub use lifecycle::{lifecycle, AllureLifecycle};
pub use model::{
    current_time_ms, Attachment, Category, ExecutableItem, FixtureResult, Label, Link, Parameter,
    StatusDetails, StepResult, TestResult, TestResultContainer,
};
pub use writer::{
    generate_uuid, history_id, test_case_id, FileSystemResultsWriter, InMemoryResultsWriter,
    ResultsWriter, DEFAULT_RESULTS_DIR,
};

/// Commonly used items for adapter and test code.
pub mod prelude {
    pub use crate::api::{
        after, attach_binary, attach_file, attach_json, attach_text, before, step,
    };
    pub use crate::enums::{ContentType, Severity, Stage, Status};
    pub use crate::error::{AllureError, AllureResult};
    pub use crate::lifecycle::{lifecycle, AllureLifecycle};
    pub use crate::model::{FixtureResult, StepResult, TestResult, TestResultContainer};
}

/// BDD-style step helpers.
pub mod bdd {
    use crate::api::step;
    use crate::error::AllureResult;

    /// Runs a "Given" step (precondition).
    pub fn given<T>(description: impl Into<String>, body: impl FnOnce() -> T) -> AllureResult<T> {
        step(format!("Given {}", description.into()), body)
    }

    /// Runs a "When" step (action).
    pub fn when<T>(description: impl Into<String>, body: impl FnOnce() -> T) -> AllureResult<T> {
        step(format!("When {}", description.into()), body)
    }

    /// Runs a "Then" step (assertion).
    pub fn then<T>(description: impl Into<String>, body: impl FnOnce() -> T) -> AllureResult<T> {
        step(format!("Then {}", description.into()), body)
    }

    /// Runs an "And" step (continuation).
    pub fn and<T>(description: impl Into<String>, body: impl FnOnce() -> T) -> AllureResult<T> {
        step(format!("And {}", description.into()), body)
    }
}

/// Builder for the `environment.properties` file shown in the report.
pub struct EnvironmentBuilder {
    properties: Vec<(String, String)>,
    results_dir: String,
}

impl EnvironmentBuilder {
    pub fn new() -> Self {
        Self {
            properties: Vec::new(),
            results_dir: DEFAULT_RESULTS_DIR.to_string(),
        }
    }

    pub fn results_dir(mut self, path: impl Into<String>) -> Self {
        self.results_dir = path.into();
        self
    }

    /// Adds a key/value pair.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Adds a key/value pair read from an environment variable, skipping
    /// it when the variable is unset.
    pub fn set_from_env(mut self, key: impl Into<String>, env_var: &str) -> Self {
        if let Ok(value) = std::env::var(env_var) {
            self.properties.push((key.into(), value));
        }
        self
    }

    /// Writes the `environment.properties` file.
    pub fn write(self) -> AllureResult<std::path::PathBuf> {
        FileSystemResultsWriter::new(&self.results_dir).write_environment(&self.properties)
    }
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts building the environment info.
pub fn environment() -> EnvironmentBuilder {
    EnvironmentBuilder::new()
}

/// Builder for the `categories.json` defect classification file.
pub struct CategoriesBuilder {
    categories: Vec<Category>,
    results_dir: String,
}

impl CategoriesBuilder {
    pub fn new() -> Self {
        Self {
            categories: Vec::new(),
            results_dir: DEFAULT_RESULTS_DIR.to_string(),
        }
    }

    pub fn results_dir(mut self, path: impl Into<String>) -> Self {
        self.results_dir = path.into();
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.push(category);
        self
    }

    /// Adds the standard category matching failed tests.
    pub fn with_product_defects(self) -> Self {
        self.with_category(Category::new("Product defects").with_status(Status::Failed))
    }

    /// Adds the standard category matching broken tests.
    pub fn with_test_defects(self) -> Self {
        self.with_category(Category::new("Test defects").with_status(Status::Broken))
    }

    /// Writes the `categories.json` file.
    pub fn write(self) -> AllureResult<std::path::PathBuf> {
        FileSystemResultsWriter::new(&self.results_dir).write_categories(&self.categories)
    }
}

impl Default for CategoriesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Starts building the defect categories.
pub fn categories() -> CategoriesBuilder {
    CategoriesBuilder::new()
}
