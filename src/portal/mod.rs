//! Scraping components for the eJustice judicial-decision search portal.
//!
//! The portal has no structured API. Everything here talks to CGI scripts that
//! answer with HTML (and, for the detail view, a frameset):
//!
//! - [`fetch_search_meta`]: posts the search form and reads the hit counters
//! - [`fetch_option_lists`]: reads the `<select>` option lists of the static search form
//! - [`parse_list_page`]: turns one list page into ordered [`RawRecord`](crate::models::RawRecord)s
//! - [`RecordBatchFetcher`]: lazily pulls 100-record batches and buffers the surplus
//! - [`DocumentResolver`]: follows detail → frames → body to find a record's PDF path
//!
//! All network access goes through the [`Transport`](crate::utils::Transport)
//! trait so every component can be driven by [`MockTransport`] in tests.

mod fetcher;
mod list;
mod meta;
pub mod mock;
mod options;
mod resolver;

pub use fetcher::{RecordBatchFetcher, BATCH_SIZE, FIRST_ROW_ID};
pub use list::parse_list_page;
pub use meta::{fetch_search_meta, parse_search_meta};
pub use mock::MockTransport;
pub use options::{fetch_option_lists, parse_option_lists, OPTION_LIST_LANGUAGES};
pub use resolver::{
    extract_frame_sources, extract_hidden_field, extract_pdf_path, frame_source, DocumentResolver,
    FrameSources, Resolution,
};

use serde::Serialize;

/// Origin of the public portal
pub const DEFAULT_BASE_URL: &str = "https://www.ejustice.just.fgov.be";

/// The three error families callers need to tell apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Rejected before any network call
    Validation,
    /// Network failure, timeout or non-success status
    Transport,
    /// An expected element is missing from a response
    Extraction,
}

/// Errors that can occur while scraping the portal
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// Invalid input, detected before any request is made
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Connection, body or client construction failure
    #[error("Request error during `{stage}`: {message}")]
    Request { stage: &'static str, message: String },

    /// Non-success HTTP status
    #[error("Unexpected HTTP status {status} during `{stage}`")]
    HttpStatus { stage: &'static str, status: u16 },

    /// The request did not complete within the configured timeout
    #[error("Request timed out during `{stage}`")]
    Timeout { stage: &'static str },

    /// A structural element (container, frame, hidden field) is missing
    #[error("Extraction failed during `{stage}`: {message}")]
    Extraction { stage: &'static str, message: String },
}

impl ScrapeError {
    pub fn request(stage: &'static str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ScrapeError::Timeout { stage };
        }
        ScrapeError::Request {
            stage,
            message: err.to_string(),
        }
    }

    pub fn extraction(stage: &'static str, message: impl Into<String>) -> Self {
        ScrapeError::Extraction {
            stage,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::Validation(_) => ErrorKind::Validation,
            ScrapeError::Request { .. }
            | ScrapeError::HttpStatus { .. }
            | ScrapeError::Timeout { .. } => ErrorKind::Transport,
            ScrapeError::Extraction { .. } => ErrorKind::Extraction,
        }
    }

    /// The pipeline stage the error was raised in, if any
    pub fn stage(&self) -> Option<&'static str> {
        match self {
            ScrapeError::Validation(_) => None,
            ScrapeError::Request { stage, .. }
            | ScrapeError::HttpStatus { stage, .. }
            | ScrapeError::Timeout { stage }
            | ScrapeError::Extraction { stage, .. } => Some(stage),
        }
    }
}

/// URLs of the portal scripts, derived from one origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    origin: String,
}

impl Endpoints {
    pub fn new(origin: impl Into<String>) -> Self {
        let origin = origin.into();
        Self {
            origin: origin.trim_end_matches('/').to_string(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Base path frame sources are relative to
    pub fn cgi_base(&self) -> String {
        format!("{}/cgi/", self.origin)
    }

    /// Search form target, answers with hit counters
    pub fn search(&self) -> String {
        format!("{}/cgi/rech.pl", self.origin)
    }

    /// Paginated list of records
    pub fn list_body(&self) -> String {
        format!("{}/cgi/list_body.pl", self.origin)
    }

    /// Detail view, answers with the Body/Foot frameset
    pub fn article(&self) -> String {
        format!("{}/cgi/article.pl", self.origin)
    }

    /// Resolve a frame `src` against the CGI base path
    pub fn frame(&self, src: &str) -> String {
        format!("{}{}", self.cgi_base(), src)
    }

    /// Static search form for a language letter (`n`, `f`, `d`)
    pub fn option_list_page(&self, letter: &str) -> String {
        format!("{}/doc/rech_{}2.htm", self.origin, letter)
    }

    /// Absolute document URL for a path extracted from a Body frame
    pub fn document_url(&self, path: &str) -> String {
        format!("{}{}", self.origin, path)
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let endpoints = Endpoints::new("https://www.ejustice.just.fgov.be/");

        assert_eq!(
            endpoints.list_body(),
            "https://www.ejustice.just.fgov.be/cgi/list_body.pl"
        );
        assert_eq!(
            endpoints.frame("article_body.pl?numac=1"),
            "https://www.ejustice.just.fgov.be/cgi/article_body.pl?numac=1"
        );
        assert_eq!(
            endpoints.option_list_page("n"),
            "https://www.ejustice.just.fgov.be/doc/rech_n2.htm"
        );
        assert_eq!(
            endpoints.document_url("/mopdf/2023/05/25_1.pdf#Page24"),
            "https://www.ejustice.just.fgov.be/mopdf/2023/05/25_1.pdf#Page24"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ScrapeError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ScrapeError::HttpStatus {
                stage: "list_body",
                status: 500
            }
            .kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            ScrapeError::Timeout { stage: "article" }.kind(),
            ErrorKind::Transport
        );
        let err = ScrapeError::extraction("article", "missing Body frame");
        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert_eq!(err.stage(), Some("article"));
    }
}
