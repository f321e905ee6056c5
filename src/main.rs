//! Storymetrics - AI-powered story insights extractor
//!
//! A CLI tool that sends story insights screenshots to a vision model,
//! extracts numeric engagement metrics from each one, and combines them
//! into a single consolidated metric set, de-duplicating screenshots the
//! caller marked as views of the same story.
//!
//! Exit codes:
//!   0 - Success (including partial success with some failed screenshots)
//!   1 - Runtime error (bad arguments, missing API key, no input files, etc.)
//!   2 - Every screenshot failed extraction (report still written)

mod cli;
mod config;
mod input;
mod metrics;
mod models;
mod report;
mod vision;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::Config;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use input::{ImageScanner, SourceImage};
use models::{CombinedReport, FailedSource, MetricMap, ReportMetadata, SourceOutcome};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use vision::VisionClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Storymetrics v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    // Run the extraction
    match run_extraction(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Extraction failed: {}", e);
            eprintln!("\n❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .storymetrics.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(".storymetrics.toml");

    if path.exists() {
        eprintln!("⚠️  .storymetrics.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .storymetrics.toml")?;

    println!("✅ Created .storymetrics.toml with default settings.");
    println!("   Edit it to customize model, API URL, extensions, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Run the complete extraction workflow. Returns exit code (0 or 2).
async fn run_extraction(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    // Load configuration
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    // Step 1: Resolve the screenshots
    let scan_config = input::ScanConfig::from(&config.input);
    let scanner = ImageScanner::new(scan_config);
    let images = scanner.collect(&args.images)?;

    if images.is_empty() {
        anyhow::bail!("No screenshots to process. Supply JPEG, PNG, or WebP images.");
    }

    // Handle --dry-run: list screenshots and exit
    if args.dry_run {
        return handle_dry_run(&images);
    }

    // Step 2: Parse the duplicate groups (validated earlier, parsed once more here)
    let partition = args
        .group_partition()
        .map_err(|e| anyhow::anyhow!(e))?;

    for (group_index, group) in partition.iter().enumerate() {
        for &index in group {
            if index >= images.len() {
                warn!(
                    "Group {} references screenshot index {} but only {} were uploaded; ignoring it",
                    group_index,
                    index,
                    images.len()
                );
            }
        }
    }

    // Step 3: Initialize the vision client
    println!("🤖 Initializing vision extraction...");
    println!("   Model: {}", config.vision.model);
    println!("   API: {}", config.vision.api_url);
    println!("   Screenshots: {}", images.len());
    if !partition.is_empty() {
        println!("   Duplicate groups: {}", partition.len());
    }

    let client = VisionClient::new(config.vision.clone())?;

    // Step 4: Extract metrics from every screenshot concurrently
    println!("\n🔬 Extracting metrics...\n");

    let progress = make_progress_bar(images.len() as u64, !args.quiet);
    let outcomes = extract_all(&client, &images, config.general.concurrency, &progress).await;
    progress.finish_and_clear();

    // Step 5: Aggregate
    let batch = build_batch(&outcomes);
    let combined = metrics::aggregate(&batch, &partition);

    let failed_files: Vec<FailedSource> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            SourceOutcome::Failed(failed) => Some(failed.clone()),
            SourceOutcome::Extracted(_) => None,
        })
        .collect();
    let files_processed = outcomes.iter().filter(|o| !o.is_failed()).count();

    // Step 6: Build and save the report
    println!("📝 Generating report...");

    let duration = start_time.elapsed().as_secs_f64();
    let combined_report = CombinedReport {
        success: files_processed > 0,
        metadata: ReportMetadata {
            analysis_date: Utc::now(),
            model_used: config.vision.model.clone(),
            files_processed,
            total_files_uploaded: outcomes.len(),
            group_count: partition.len(),
            duration_seconds: duration,
        },
        metrics: combined,
        failed_files,
    };

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&combined_report)?,
        OutputFormat::Markdown => {
            report::generate_markdown_report(&combined_report, &config.report)
        }
    };

    std::fs::write(&args.output, &output)
        .with_context(|| format!("Failed to write report to {}", args.output.display()))?;

    // Print summary
    println!("\n📊 Extraction Summary:");
    println!(
        "   Screenshots processed: {}/{}",
        combined_report.metadata.files_processed, combined_report.metadata.total_files_uploaded
    );
    println!("   Metrics extracted: {}", combined_report.metrics.len());
    if !combined_report.failed_files.is_empty() {
        println!(
            "   ⚠️  Failed screenshots: {}",
            combined_report.failed_files.len()
        );
    }
    println!("   Duration: {:.1}s", duration);
    println!(
        "\n✅ Done! Report saved to: {}",
        args.output.display()
    );

    if combined_report.all_failed() {
        eprintln!("\n⛔ Failed to process any screenshots successfully (exit code 2).");
        return Ok(2);
    }

    Ok(0)
}

/// Extract metrics from every screenshot with bounded concurrency.
///
/// Results land in indexed slots so upload order is preserved no matter
/// which calls finish first; the caller's group indices depend on it.
async fn extract_all(
    client: &VisionClient,
    images: &[SourceImage],
    concurrency: usize,
    progress: &ProgressBar,
) -> Vec<SourceOutcome> {
    let mut slots: Vec<Option<SourceOutcome>> = vec![None; images.len()];

    let mut results = stream::iter(images.iter().enumerate())
        .map(|(index, image)| async move {
            debug!("Processing screenshot {}: {}", index, image.name);
            let result = client.extract_metrics(&image.bytes, image.format).await;
            (index, image, result)
        })
        .buffer_unordered(concurrency.max(1));

    while let Some((index, image, result)) = results.next().await {
        let outcome = match result {
            Ok(extracted) => {
                info!(
                    "Extracted {} metric(s) from {}",
                    extracted.len(),
                    image.name
                );
                SourceOutcome::Extracted(extracted)
            }
            Err(e) => {
                warn!("Failed to process {}: {}", image.name, e);
                SourceOutcome::Failed(FailedSource {
                    filename: image.name.clone(),
                    error: e.to_string(),
                })
            }
        };

        slots[index] = Some(outcome);
        progress.inc(1);
    }

    slots
        .into_iter()
        .map(|slot| slot.expect("every screenshot yields an outcome"))
        .collect()
}

/// One metric map per uploaded screenshot, in upload order.
///
/// Failed slots hold an empty map so group indices stay valid.
fn build_batch(outcomes: &[SourceOutcome]) -> Vec<MetricMap> {
    outcomes.iter().map(SourceOutcome::metrics).collect()
}

fn make_progress_bar(len: u64, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// Handle --dry-run: list screenshots that would be processed, exit.
fn handle_dry_run(images: &[SourceImage]) -> Result<i32> {
    println!("\n🔍 Dry run: scanning screenshots (no API calls)...\n");

    println!("   Found {} screenshot(s) that would be processed:\n", images.len());
    for (index, image) in images.iter().enumerate() {
        println!(
            "     [{}] 🖼️  {} ({} bytes, {})",
            index,
            image.name,
            image.bytes.len(),
            image.format.mime_type()
        );
    }

    println!("\n✅ Dry run complete. No extraction calls were made.");
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from .storymetrics.toml");
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_keeps_upload_index_space() {
        let mut extracted = MetricMap::new();
        extracted.insert("reach".to_string(), 80.0);

        let outcomes = vec![
            SourceOutcome::Extracted(extracted.clone()),
            SourceOutcome::Failed(FailedSource {
                filename: "story2.png".to_string(),
                error: "timeout".to_string(),
            }),
            SourceOutcome::Extracted(extracted),
        ];

        let batch = build_batch(&outcomes);

        assert_eq!(batch.len(), 3);
        assert!(batch[1].is_empty());
        // A group declared against upload indices still addresses the
        // surviving screenshots correctly.
        let combined = metrics::aggregate(&batch, &[vec![0, 2]]);
        assert_eq!(combined.get("reach"), Some(&80.0));
    }
}
