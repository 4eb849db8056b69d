//! Resolution of a record to its downloadable document path.
//!
//! The detail endpoint answers with a frameset rather than content:
//!
//! ```text
//! <frame  src=article_body.pl?numac=2023042064&caller=list&...  name=Body scrolling=AUTO marginheight=0>
//! <frame  src=article_foot.pl?numac=2023042064&caller=list&...  name=Foot scrolling=NO  resize marginheight=0 >
//! ```
//!
//! Both frames are fetched; the Body frame carries the document path in a
//! hidden `urlpdf` input.

use scraper::{Html, Selector};
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::FormFields;
use crate::portal::{Endpoints, ScrapeError};
use crate::utils::{Transport, ARTICLE_HEADERS, FORM_HEADERS};

const STAGE_ARTICLE: &str = "article";
const STAGE_BODY: &str = "article_body";
const STAGE_FOOT: &str = "article_foot";

/// Name of the hidden input holding the document path
const PDF_FIELD: &str = "urlpdf";

/// Frame sources declared by a detail page, relative to the CGI base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSources {
    pub body: String,
    pub foot: String,
}

/// Outcome of a successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Document path relative to the portal origin
    pub pdf_url: String,
}

/// `src` of the frame called `name`, if declared.
pub fn frame_source(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse("frame").ok()?;
    document
        .select(&selector)
        .find(|frame| frame.value().attr("name") == Some(name))
        .and_then(|frame| frame.value().attr("src"))
        .map(|src| src.trim().to_string())
        .filter(|src| !src.is_empty())
}

/// Body and Foot frame sources of a parsed detail page, or `None` if either is missing.
pub fn extract_frame_sources(document: &Html) -> Option<FrameSources> {
    Some(FrameSources {
        body: frame_source(document, "Body")?,
        foot: frame_source(document, "Foot")?,
    })
}

/// Value of the hidden input called `name`, if present.
pub fn extract_hidden_field(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse("input").ok()?;
    document
        .select(&selector)
        .filter(|input| {
            input
                .value()
                .attr("type")
                .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
        })
        .find(|input| input.value().attr("name") == Some(name))
        .and_then(|input| input.value().attr("value"))
        .map(|value| value.to_string())
}

/// Document path carried by a parsed Body frame, or `None` if absent or blank.
///
/// Unlike the raw `urlpdf` field value (see [`extract_hidden_field`]), the
/// returned path has surrounding whitespace trimmed: the portal pads the page
/// anchor (`#Page24  `), and the path is joined onto the origin as a URL.
pub fn extract_pdf_path(document: &Html) -> Option<String> {
    extract_hidden_field(document, PDF_FIELD)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Follows the detail → frames → body chain for one record.
///
/// Holds no per-call state, so one resolver can serve many concurrent
/// resolutions.
#[derive(Debug, Clone)]
pub struct DocumentResolver {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
}

impl DocumentResolver {
    pub fn new(transport: Arc<dyn Transport>, endpoints: Endpoints) -> Self {
        Self {
            transport,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Resolve a record's form fields to its document path.
    ///
    /// Fails with an extraction error, before any frame is requested, when
    /// the detail page lacks either frame declaration.
    pub async fn resolve(&self, form: &FormFields) -> Result<Resolution, ScrapeError> {
        let numac = form.get("numac").unwrap_or_default();
        debug!(stage = STAGE_ARTICLE, numac, "requesting detail frameset");

        let detail = self
            .transport
            .post_form(
                STAGE_ARTICLE,
                &self.endpoints.article(),
                ARTICLE_HEADERS,
                form.to_urlencoded(),
            )
            .await?;

        let frames = extract_frame_sources(&Html::parse_document(&detail)).ok_or_else(|| {
            ScrapeError::extraction(STAGE_ARTICLE, "Body/Foot frame declarations not found")
        })?;

        let body_url = self.endpoints.frame(&frames.body);
        let foot_url = self.endpoints.frame(&frames.foot);
        let (body, _foot) = tokio::try_join!(
            self.transport.get(STAGE_BODY, &body_url, FORM_HEADERS),
            self.transport.get(STAGE_FOOT, &foot_url, FORM_HEADERS),
        )?;

        let pdf_url = extract_pdf_path(&Html::parse_document(&body)).ok_or_else(|| {
            ScrapeError::extraction(STAGE_BODY, format!("hidden `{}` field not found", PDF_FIELD))
        })?;

        info!(stage = STAGE_BODY, numac, pdf_url = %pdf_url, "resolved document");
        Ok(Resolution { pdf_url })
    }
}
