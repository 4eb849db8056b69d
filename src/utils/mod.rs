//! Utility modules supporting the scraping pipeline.
//!
//! - [`Transport`]: the GET / form-POST seam every portal component talks through
//! - [`HttpClient`]: `reqwest`-backed transport with timeouts and request pacing
//! - [`HeaderSet`] constants: the header profiles the portal expects per endpoint
//!
//! # HTTP Client
//!
//! ```rust,no_run
//! use ejustice_finder::utils::{HttpClient, Transport, FORM_HEADERS};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let html = client
//!     .get("option_list", "https://www.ejustice.just.fgov.be/doc/rech_n2.htm", FORM_HEADERS)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod http;

pub use http::{
    HeaderSet, HttpClient, Transport, ARTICLE_HEADERS, FORM_HEADERS, SEARCH_HEADERS,
};
