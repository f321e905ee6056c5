//! Vision model integration.
//!
//! This module provides the client that turns screenshot bytes into raw
//! metric extractions via an OpenAI-compatible vision API.

pub mod client;

pub use client::{ExtractError, VisionClient, API_KEY_ENV};
