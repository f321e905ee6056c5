//! Screenshot discovery and validation.
//!
//! This module resolves the paths given on the command line (files or
//! directories) into a validated, size-capped list of screenshots,
//! preserving the order in which they were supplied. That order is the
//! index space the caller's duplicate groups refer to.

use anyhow::{bail, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Accepted screenshot encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    /// Sniff the format from the file's leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(ImageFormat::Png)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(ImageFormat::Webp)
        } else {
            None
        }
    }

    /// MIME type used in the vision API data URL.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }
}

/// Configuration for screenshot scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// File extensions to include (e.g., ["jpg", "jpeg", "png", "webp"])
    pub extensions: Vec<String>,
    /// Maximum file size in bytes
    pub max_file_size: usize,
    /// Maximum number of screenshots to process
    pub max_files: Option<usize>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["jpg", "jpeg", "png", "webp"]
                .into_iter()
                .map(String::from)
                .collect(),
            max_file_size: 10 * 1024 * 1024, // 10MB per screenshot
            max_files: None,
        }
    }
}

impl From<&crate::config::InputConfig> for ScanConfig {
    fn from(config: &crate::config::InputConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            max_file_size: config.max_file_size,
            max_files: Some(config.max_files),
        }
    }
}

/// A loaded, validated screenshot.
#[derive(Debug, Clone)]
pub struct SourceImage {
    /// Path the screenshot was loaded from.
    pub path: PathBuf,
    /// File name used in reports and error messages.
    pub name: String,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// Sniffed encoding.
    pub format: ImageFormat,
}

/// Scanner that resolves CLI paths into validated screenshots.
pub struct ImageScanner {
    config: ScanConfig,
}

impl ImageScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Resolve and load every screenshot reachable from `paths`.
    ///
    /// Files are taken in the order given; directories are expanded to
    /// their matching files in sorted order. Unreadable files, files with
    /// an unrecognized encoding, and oversized files are skipped with a
    /// warning. A path that exists but is neither file nor directory is an
    /// error.
    pub fn collect(&self, paths: &[PathBuf]) -> Result<Vec<SourceImage>> {
        let mut images = Vec::new();

        for path in paths {
            if self.at_capacity(images.len()) {
                warn!("Reached max file limit; ignoring remaining inputs");
                break;
            }

            if path.is_file() {
                if let Some(image) = self.load(path) {
                    images.push(image);
                }
            } else if path.is_dir() {
                self.collect_dir(path, &mut images);
            } else {
                bail!("Input path does not exist: {}", path.display());
            }
        }

        Ok(images)
    }

    fn collect_dir(&self, dir: &Path, images: &mut Vec<SourceImage>) {
        let walker = WalkDir::new(dir).sort_by_file_name().into_iter();

        for entry in walker.filter_map(|e| e.ok()) {
            if self.at_capacity(images.len()) {
                break;
            }

            let path = entry.path();
            if path.is_file() && self.matches_extension(path) {
                if let Some(image) = self.load(path) {
                    images.push(image);
                }
            }
        }
    }

    fn at_capacity(&self, count: usize) -> bool {
        self.config.max_files.is_some_and(|max| count >= max)
    }

    /// Check the extension against the configured list, case-insensitively.
    fn matches_extension(&self, path: &Path) -> bool {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        self.config.extensions.iter().any(|allowed| *allowed == ext)
    }

    /// Load and validate a single screenshot; None when it should be skipped.
    fn load(&self, path: &Path) -> Option<SourceImage> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        match fs::metadata(path) {
            Ok(metadata) if metadata.len() > self.config.max_file_size as u64 => {
                warn!(
                    "Skipping {}: {} bytes exceeds the {} byte limit",
                    name,
                    metadata.len(),
                    self.config.max_file_size
                );
                return None;
            }
            Err(e) => {
                warn!("Skipping {}: {}", name, e);
                return None;
            }
            _ => {}
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {}: {}", name, e);
                return None;
            }
        };

        let Some(format) = ImageFormat::sniff(&bytes) else {
            warn!("Skipping {}: not a JPEG, PNG, or WebP image", name);
            return None;
        };

        debug!("Loaded {} ({} bytes, {})", name, bytes.len(), format.mime_type());

        Some(SourceImage {
            path: path.to_path_buf(),
            name,
            bytes,
            format,
        })
    }
}
