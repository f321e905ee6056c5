//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.storymetrics.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Vision model settings.
    #[serde(default)]
    pub vision: VisionConfig,

    /// Input scanning settings.
    #[serde(default)]
    pub input: InputConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of concurrent extraction calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
            concurrency: default_concurrency(),
        }
    }
}

fn default_output() -> String {
    "story_report.md".to_string()
}

fn default_concurrency() -> usize {
    4
}

/// Vision model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens in the model response.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on transport failure.
    #[serde(default = "default_retries")]
    pub retries: usize,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_url: default_api_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> usize {
    500
}

fn default_timeout() -> u64 {
    120
}

fn default_retries() -> usize {
    3
}

/// Input scanning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// File extensions to accept.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Maximum screenshot size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Maximum number of screenshots per run.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            max_file_size: default_max_file_size(),
            max_files: default_max_files(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec!["jpg", "jpeg", "png", "webp"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_file_size() -> usize {
    10 * 1024 * 1024 // 10MB
}

fn default_max_files() -> usize {
    50
}

/// How the report's metric table is sorted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Largest values first (name breaks ties).
    #[default]
    Value,
    /// Alphabetical by canonical key.
    Name,
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Metric table sort order.
    #[serde(default)]
    pub sort_by: SortBy,

    /// Include the failed files section.
    #[serde(default = "default_true")]
    pub include_failed: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sort_by: SortBy::default(),
            include_failed: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(".storymetrics.toml");

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        // Vision settings - always override since they have defaults in CLI
        self.vision.model = args.model.clone();
        self.vision.api_url = args.api_url.clone();
        self.vision.temperature = args.temperature;

        // Timeout - only override if explicitly provided via CLI
        if let Some(timeout) = args.timeout {
            self.vision.timeout_seconds = timeout;
        }

        // Input settings - always override
        self.input.max_files = args.max_files;

        // Optional settings - only override if provided
        if let Some(ref extensions) = args.extensions {
            self.input.extensions = extensions.clone();
        }

        // General settings
        self.general.concurrency = args.concurrency;

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.vision.model, "gpt-4o");
        assert_eq!(config.input.max_files, 50);
        assert!(config.input.extensions.contains(&"png".to_string()));
        assert_eq!(config.report.sort_by, SortBy::Value);
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
output = "custom_report.md"
verbose = true

[vision]
model = "gpt-4o-mini"
temperature = 0.2

[input]
max_files = 20
extensions = ["png"]

[report]
sort_by = "name"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.output, "custom_report.md");
        assert!(config.general.verbose);
        assert_eq!(config.vision.model, "gpt-4o-mini");
        assert_eq!(config.vision.temperature, 0.2);
        assert_eq!(config.input.max_files, 20);
        assert_eq!(config.input.extensions, vec!["png"]);
        assert_eq!(config.report.sort_by, SortBy::Name);
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[vision]"));
        assert!(toml_str.contains("[input]"));
        assert!(toml_str.contains("[report]"));
    }
}
