//! # eJustice Finder
//!
//! Searches the Belgian eJustice portal for published judicial decisions and
//! resolves each hit to the URL of its PDF.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (SearchRequest, RawRecord, SearchReport, etc.)
//! - [`portal`]: Scrapers for the portal's CGI endpoints and the batch fetcher
//! - [`pipeline`]: End-to-end search runs with bounded-concurrency resolution
//! - [`server`]: HTTP front end
//! - [`utils`]: HTTP transport and header profiles
//! - [`config`]: Configuration management

pub mod config;
pub mod models;
pub mod pipeline;
pub mod portal;
pub mod server;
pub mod utils;

// Re-export commonly used types
pub use models::{RawRecord, ResolvedDocument, SearchReport, SearchRequest};
pub use pipeline::SearchPipeline;
pub use portal::{DocumentResolver, RecordBatchFetcher, ScrapeError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
