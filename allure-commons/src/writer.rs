//! Result sinks: the writer trait, the filesystem writer used in normal
//! runs, and an in-memory writer for tests. Also home to the uuid and
//! hash helpers used for node identity.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use parking_lot::Mutex;
use tracing::debug;

use crate::error::AllureResult;
use crate::model::{Category, Parameter, TestResult, TestResultContainer};

/// Default directory for result files.
pub const DEFAULT_RESULTS_DIR: &str = "allure-results";

/// Sink consuming finished result nodes and attachment payloads.
///
/// The lifecycle engine treats the sink as opaque: nodes are handed over
/// exactly once, on their `write_*` operation, and never touched again.
pub trait ResultsWriter: Send + Sync {
    fn write_test(&self, result: &TestResult) -> AllureResult<()>;
    fn write_container(&self, container: &TestResultContainer) -> AllureResult<()>;
    /// Stores attachment bytes under the given source key.
    fn write_attachment(&self, source: &str, content: &[u8]) -> AllureResult<()>;
    /// Discards everything written so far.
    fn clean_up(&self) -> AllureResult<()>;
}

/// Writer producing the standard `allure-results` directory layout.
#[derive(Debug, Clone)]
pub struct FileSystemResultsWriter {
    results_dir: PathBuf,
}

impl FileSystemResultsWriter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            results_dir: path.as_ref().to_path_buf(),
        }
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Creates the results directory, optionally wiping a previous run.
    pub fn init(&self, clean: bool) -> AllureResult<()> {
        if clean && self.results_dir.exists() {
            fs::remove_dir_all(&self.results_dir)?;
        }
        fs::create_dir_all(&self.results_dir)?;
        Ok(())
    }

    fn ensure_dir(&self) -> AllureResult<()> {
        if !self.results_dir.exists() {
            fs::create_dir_all(&self.results_dir)?;
        }
        Ok(())
    }

    fn write_json(&self, filename: &str, json: String) -> AllureResult<()> {
        self.ensure_dir()?;
        fs::write(self.results_dir.join(filename), json)?;
        Ok(())
    }

    /// Writes the `environment.properties` file. Keys and values are
    /// escaped per the Java properties format.
    pub fn write_environment(&self, properties: &[(String, String)]) -> AllureResult<PathBuf> {
        self.ensure_dir()?;
        let path = self.results_dir.join("environment.properties");
        let mut file = File::create(&path)?;
        for (key, value) in properties {
            writeln!(
                file,
                "{}={}",
                escape_property_value(key),
                escape_property_value(value)
            )?;
        }
        Ok(path)
    }

    /// Writes the `categories.json` file.
    pub fn write_categories(&self, categories: &[Category]) -> AllureResult<PathBuf> {
        self.ensure_dir()?;
        let path = self.results_dir.join("categories.json");
        fs::write(&path, serde_json::to_string_pretty(categories)?)?;
        Ok(path)
    }
}

impl ResultsWriter for FileSystemResultsWriter {
    fn write_test(&self, result: &TestResult) -> AllureResult<()> {
        debug!(uuid = %result.uuid, "writing test result");
        self.write_json(
            &format!("{}-result.json", result.uuid),
            serde_json::to_string_pretty(result)?,
        )
    }

    fn write_container(&self, container: &TestResultContainer) -> AllureResult<()> {
        debug!(uuid = %container.uuid, "writing container");
        self.write_json(
            &format!("{}-container.json", container.uuid),
            serde_json::to_string_pretty(container)?,
        )
    }

    fn write_attachment(&self, source: &str, content: &[u8]) -> AllureResult<()> {
        self.ensure_dir()?;
        fs::write(self.results_dir.join(source), content)?;
        Ok(())
    }

    fn clean_up(&self) -> AllureResult<()> {
        self.init(true)
    }
}

/// Writer that keeps everything in memory; the reference sink for tests.
#[derive(Debug, Default)]
pub struct InMemoryResultsWriter {
    state: Mutex<InMemoryState>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    tests: Vec<TestResult>,
    containers: Vec<TestResultContainer>,
    attachments: Vec<(String, Vec<u8>)>,
}

impl InMemoryResultsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test results written so far, in write order.
    pub fn test_results(&self) -> Vec<TestResult> {
        self.state.lock().tests.clone()
    }

    /// Containers written so far, in write order.
    pub fn containers(&self) -> Vec<TestResultContainer> {
        self.state.lock().containers.clone()
    }

    /// Attachment payloads written so far, as (source, bytes) pairs.
    pub fn attachments(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().attachments.clone()
    }
}

impl ResultsWriter for InMemoryResultsWriter {
    fn write_test(&self, result: &TestResult) -> AllureResult<()> {
        self.state.lock().tests.push(result.clone());
        Ok(())
    }

    fn write_container(&self, container: &TestResultContainer) -> AllureResult<()> {
        self.state.lock().containers.push(container.clone());
        Ok(())
    }

    fn write_attachment(&self, source: &str, content: &[u8]) -> AllureResult<()> {
        self.state
            .lock()
            .attachments
            .push((source.to_string(), content.to_vec()));
        Ok(())
    }

    fn clean_up(&self) -> AllureResult<()> {
        let mut state = self.state.lock();
        state.tests.clear();
        state.containers.clear();
        state.attachments.clear();
        Ok(())
    }
}

/// Escapes a string for the Java properties format. Backslashes must go
/// first, then line breaks, then the separator.
fn escape_property_value(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('=', "\\=")
}

/// Guesses a MIME type from a file extension.
pub(crate) fn guess_mime_type(extension: &str) -> Option<String> {
    match extension.to_lowercase().as_str() {
        "txt" | "log" => Some("text/plain".to_string()),
        "json" => Some("application/json".to_string()),
        "xml" => Some("application/xml".to_string()),
        "html" | "htm" => Some("text/html".to_string()),
        "css" => Some("text/css".to_string()),
        "csv" => Some("text/csv".to_string()),
        "png" => Some("image/png".to_string()),
        "jpg" | "jpeg" => Some("image/jpeg".to_string()),
        "gif" => Some("image/gif".to_string()),
        "svg" => Some("image/svg+xml".to_string()),
        "webp" => Some("image/webp".to_string()),
        "mp4" => Some("video/mp4".to_string()),
        "webm" => Some("video/webm".to_string()),
        "pdf" => Some("application/pdf".to_string()),
        "zip" => Some("application/zip".to_string()),
        _ => None,
    }
}

/// Generates a new v4 uuid string.
pub fn generate_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Derives the history id from the full name and the multiset of
/// non-excluded parameter values. Values are sorted first, so the id is
/// independent of parameter order and parameter names.
pub fn history_id(full_name: &str, parameters: &[Parameter]) -> String {
    let mut values: Vec<&str> = parameters
        .iter()
        .filter(|p| !p.excluded.unwrap_or(false))
        .map(|p| p.value.as_str())
        .collect();
    values.sort_unstable();

    let mut hasher = Md5::new();
    hasher.update(full_name.as_bytes());
    for value in values {
        // Separator keeps ["ab"] and ["a", "b"] distinct.
        hasher.update([0u8]);
        hasher.update(value.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Derives the test-case id from the full name alone.
pub fn test_case_id(full_name: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(full_name.as_bytes());
    format!("{:x}", hasher.finalize())
}
