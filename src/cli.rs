//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation, default values, and group-spec parsing.

use clap::Parser;
use std::collections::HashSet;
use std::path::PathBuf;

/// Storymetrics - AI-powered story insights extractor
///
/// Extract engagement metrics from story insights screenshots using a
/// vision model and combine them into one consolidated metric set.
/// Markdown/JSON reports. Built in Rust.
///
/// Examples:
///   storymetrics story1.png story2.png
///   storymetrics ./screenshots --groups "0,1;3,4"
///   storymetrics story1.png story2.png --groups "[[0,1]]" --format json
///   storymetrics ./screenshots --dry-run
///   storymetrics --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Screenshot files or directories of screenshots to process
    ///
    /// Files are taken in the order given; this order is the index space
    /// that --groups refers to. Not required when using --init-config.
    #[arg(value_name = "IMAGES", required_unless_present = "init_config")]
    pub images: Vec<PathBuf>,

    /// Duplicate groups, by upload index
    ///
    /// Screenshots in one group are treated as views of the same story and
    /// de-duplicated (per-metric maximum) instead of summed. Accepts JSON
    /// ("[[0,1],[3,4]]") or shorthand ("0,1;3,4" - groups separated by ';').
    #[arg(short, long, value_name = "SPEC")]
    pub groups: Option<String>,

    /// Vision model to use for extraction
    ///
    /// Any model reachable through the configured OpenAI-compatible API.
    /// Can also be set via STORYMETRICS_MODEL env var or .storymetrics.toml.
    #[arg(short, long, default_value = "gpt-4o", env = "STORYMETRICS_MODEL")]
    pub model: String,

    /// OpenAI-compatible API base URL
    #[arg(
        long,
        default_value = "https://api.openai.com/v1",
        env = "OPENAI_API_URL"
    )]
    pub api_url: String,

    /// Output file path for the report
    #[arg(short, long, default_value = "story_report.md", value_name = "FILE")]
    pub output: PathBuf,

    /// Path to configuration file
    ///
    /// If not specified, looks for .storymetrics.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// File extensions to accept (comma-separated)
    ///
    /// Example: --extensions png,jpg
    #[arg(long, value_name = "EXTS", value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Number of concurrent extraction calls
    #[arg(long, default_value = "4", value_name = "NUM")]
    pub concurrency: usize,

    /// Maximum number of screenshots to process
    #[arg(long, default_value = "50", value_name = "COUNT")]
    pub max_files: usize,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Temperature for the vision model (0.0 - 1.0)
    ///
    /// Lower values produce more consistent/deterministic output
    #[arg(long, default_value = "0.1")]
    pub temperature: f32,

    /// Request timeout in seconds
    ///
    /// How long to wait for one extraction call. Default: from config or 120s.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Dry run: scan screenshots without calling the vision API
    ///
    /// Shows which files would be processed and exits.
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .storymetrics.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parse the --groups spec into a group partition.
    ///
    /// Returns an empty partition when the flag was not given.
    pub fn group_partition(&self) -> Result<Vec<Vec<usize>>, String> {
        match self.groups.as_deref() {
            Some(spec) => parse_groups(spec),
            None => Ok(Vec::new()),
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.images.is_empty() {
            return Err("At least one screenshot file or directory is required".to_string());
        }

        // Validate API URL format (not needed for dry-run)
        if !self.dry_run {
            if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        // Validate temperature range
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 1.0".to_string());
        }

        // Validate concurrency
        if self.concurrency == 0 {
            return Err("Concurrency must be at least 1".to_string());
        }

        // Validate max files
        if self.max_files == 0 {
            return Err("Max files must be at least 1".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        // Validate timeout if provided
        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        // Validate the group spec early so a typo fails before any API call
        self.group_partition()?;

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

/// Parse a group spec into index groups.
///
/// Accepts the JSON array-of-arrays the web UI produces ("[[0,1],[3,4]]")
/// or the shorthand "0,1;3,4". Duplicate indices within one group are
/// dropped (groups are sets); empty groups are dropped.
pub fn parse_groups(spec: &str) -> Result<Vec<Vec<usize>>, String> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Ok(Vec::new());
    }

    let groups: Vec<Vec<usize>> = if spec.starts_with('[') {
        serde_json::from_str(spec).map_err(|e| format!("Invalid group JSON: {}", e))?
    } else {
        spec.split(';')
            .map(|group| {
                group
                    .split(',')
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .map(|token| {
                        token
                            .parse::<usize>()
                            .map_err(|_| format!("Invalid group index: '{}'", token))
                    })
                    .collect::<Result<Vec<usize>, String>>()
            })
            .collect::<Result<Vec<Vec<usize>>, String>>()?
    };

    let deduped = groups
        .into_iter()
        .map(|group| {
            let mut seen = HashSet::new();
            group.into_iter().filter(|i| seen.insert(*i)).collect()
        })
        .filter(|group: &Vec<usize>| !group.is_empty())
        .collect();

    Ok(deduped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_args() -> Args {
        Args {
            images: vec![PathBuf::from("story.png")],
            groups: None,
            model: "gpt-4o".to_string(),
            api_url: "https://api.openai.com/v1".to_string(),
            output: PathBuf::from("test.md"),
            config: None,
            verbose: false,
            quiet: false,
            extensions: None,
            concurrency: 4,
            max_files: 50,
            format: OutputFormat::Markdown,
            temperature: 0.1,
            timeout: None,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_groups_shorthand() {
        let groups = parse_groups("0,1;3,4").unwrap();
        assert_eq!(groups, vec![vec![0, 1], vec![3, 4]]);
    }

    #[test]
    fn test_parse_groups_json() {
        let groups = parse_groups("[[0,1],[3,4]]").unwrap();
        assert_eq!(groups, vec![vec![0, 1], vec![3, 4]]);
    }

    #[test]
    fn test_parse_groups_dedups_within_group() {
        let groups = parse_groups("0,1,0,1").unwrap();
        assert_eq!(groups, vec![vec![0, 1]]);
    }

    #[test]
    fn test_parse_groups_drops_empty_groups() {
        let groups = parse_groups("0,1;;2").unwrap();
        assert_eq!(groups, vec![vec![0, 1], vec![2]]);
    }

    #[test]
    fn test_parse_groups_rejects_garbage() {
        assert!(parse_groups("0,x").is_err());
        assert!(parse_groups("[[0,-1]]").is_err());
    }

    #[test]
    fn test_parse_groups_empty_spec() {
        assert!(parse_groups("").unwrap().is_empty());
        assert!(parse_groups("   ").unwrap().is_empty());
    }

    #[test]
    fn test_validation_bad_group_spec() {
        let mut args = make_args();
        args.groups = Some("not a spec".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_api_url() {
        let mut args = make_args();
        args.api_url = "localhost:8080".to_string();
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_temperature_range() {
        let mut args = make_args();
        args.temperature = 1.5;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
