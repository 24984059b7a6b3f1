//! # clickstream-core
//!
//! Core library for clickstream - windowed and grouped analytics over
//! music-streaming activity logs.
//!
//! This library provides:
//! - The event record model with typed user identity
//! - JSON-lines log ingestion
//! - A small aggregation engine: partitioned ordering, window frames,
//!   grouping and set utilities
//! - The named analyses built on top of it (hourly plays, downgrade phases,
//!   unvisited pages, top artists, plays between home visits)
//! - Configuration management
//! - Logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Layer 0 (Raw):** JSON-lines event log on disk (immutable)
//! - **Layer 1 (Records):** `Vec<EventRecord>` in ingestion order, never mutated
//! - **Layer 2 (Derived):** frames, window columns and aggregates (regenerable)
//!
//! ## Example
//!
//! ```rust,no_run
//! use clickstream_core::analytics::{Report, ReportOptions};
//! use clickstream_core::{ingest, Config};
//! use std::path::Path;
//!
//! let config = Config::load().expect("failed to load config");
//! let pipeline = config.pipeline_config().expect("invalid config");
//!
//! let records = ingest::load_event_log(Path::new("sparkify.json")).expect("failed to read log");
//! let report = Report::generate(&records, &pipeline, &ReportOptions::default())
//!     .expect("analysis failed");
//! println!("{} song-play hours", report.hourly_histogram.len());
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use ingest::{load_event_log, parse_event_log};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod types;
