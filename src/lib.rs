//! # scholar-record
//!
//! Harvests every publication of a Google Scholar profile into one JSON array.
//!
//! ## Modules
//!
//! - [`page`] - Listing page fetcher
//! - [`detail`] - Per-publication record extractor
//! - [`fields`] - Detail table label mapping
//! - [`harvest`] - Pagination loop
//! - [`output`] - Result set sinks
//! - [`serpapi`] - SerpApi listing source
//! - [`client`] - HTTP transport
//! - [`config`] - Run configuration
//! - [`cookies`] - Cookie persistence
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scholar_record::{config::Config, harvest, output::OutputSink};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new("61Ou1P8AAAAJ");
//!     let report = harvest::harvest(&config).await?;
//!     OutputSink::from_config(&config).write(&report.records, false)?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod cookies;
pub mod detail;
pub mod error;
pub mod fields;
pub mod harvest;
pub mod output;
pub mod page;
pub mod record;
pub mod serpapi;

pub use config::Config;
pub use error::{Result, ScholarError};
pub use record::PublicationRecord;
