//! Process-wide runtime configuration, installed once via a builder.

use std::sync::OnceLock;

use crate::error::AllureResult;
use crate::writer::{FileSystemResultsWriter, DEFAULT_RESULTS_DIR};

static CONFIG: OnceLock<AllureConfig> = OnceLock::new();

/// Configuration consumed by the default lifecycle instance.
#[derive(Debug, Clone)]
pub struct AllureConfig {
    /// Directory where results are written.
    pub results_dir: String,
    /// Whether to wipe the results directory on init.
    pub clean_results: bool,
    /// Substrings matched against a failure message to classify it as a
    /// product failure (`failed`) rather than a test defect (`broken`).
    pub fail_message_patterns: Vec<String>,
}

impl Default for AllureConfig {
    fn default() -> Self {
        Self {
            results_dir: DEFAULT_RESULTS_DIR.to_string(),
            clean_results: true,
            // Covers assert!/assert_eq!/assert_ne! panic messages.
            fail_message_patterns: vec!["assertion".to_string()],
        }
    }
}

/// Builder for the process-wide configuration.
#[derive(Debug, Default)]
pub struct AllureConfigBuilder {
    config: AllureConfig,
}

impl AllureConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the results directory.
    pub fn results_dir(mut self, path: impl Into<String>) -> Self {
        self.config.results_dir = path.into();
        self
    }

    /// Sets whether to wipe the results directory on init.
    pub fn clean_results(mut self, clean: bool) -> Self {
        self.config.clean_results = clean;
        self
    }

    /// Adds a failure-message substring that maps a failure to `failed`
    /// instead of `broken`.
    pub fn fail_message_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.fail_message_patterns.push(pattern.into());
        self
    }

    /// Prepares the results directory and installs the configuration.
    /// A second call keeps the first configuration.
    pub fn init(self) -> AllureResult<()> {
        let writer = FileSystemResultsWriter::new(&self.config.results_dir);
        writer.init(self.config.clean_results)?;
        CONFIG.set(self.config).ok();
        Ok(())
    }
}

/// Starts building the process-wide configuration.
pub fn configure() -> AllureConfigBuilder {
    AllureConfigBuilder::new()
}

/// Returns the installed configuration, or the default if none was set.
pub fn get_config() -> AllureConfig {
    CONFIG.get().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AllureConfig::default();
        assert_eq!(config.results_dir, DEFAULT_RESULTS_DIR);
        assert!(config.clean_results);
        assert_eq!(config.fail_message_patterns, vec!["assertion".to_string()]);
    }

    #[test]
    fn test_builder_accumulates() {
        let builder = AllureConfigBuilder::new()
            .results_dir("custom-results")
            .clean_results(false)
            .fail_message_pattern("expected");

        assert_eq!(builder.config.results_dir, "custom-results");
        assert!(!builder.config.clean_results);
        assert_eq!(
            builder.config.fail_message_patterns,
            vec!["assertion".to_string(), "expected".to_string()]
        );
    }
}
