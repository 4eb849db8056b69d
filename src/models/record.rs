//! Records scraped from the list endpoint and what they resolve to.

use serde::Serialize;
use std::collections::BTreeMap;

use super::FormFields;

/// One entry of a list page, together with everything needed to resolve it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    /// Short labels from the entry's leading cell (publication date, source, ...)
    #[serde(rename = "pub")]
    pub labels: Vec<String>,

    /// Display text of the entry link
    pub text: String,

    /// The entry link, if the entry carries one
    pub link: Option<String>,

    /// Fields of the entry's embedded form, posted verbatim to the detail endpoint
    pub form_input_values: FormFields,
}

impl RawRecord {
    /// Publication number (`numac`) of the record, when the form carries one
    pub fn numac(&self) -> Option<&str> {
        self.form_input_values.get("numac")
    }
}

/// Pagination bookmarks found in the leading `allrows` form of a list page.
///
/// They are kept as metadata only; the fetcher never moves its cursor from them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Bookmarks {
    pub prev_row_id: Option<String>,
    pub next_row_id: Option<String>,
}

/// One parsed list page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub records: Vec<RawRecord>,
    pub bookmarks: Bookmarks,
}

/// A record as returned to API consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDocument {
    #[serde(rename = "pub")]
    pub labels: Vec<String>,

    /// Absolute URL of the document, `None` if resolution produced nothing
    pub pdf_url: Option<String>,

    pub text: String,
}

impl ResolvedDocument {
    pub fn new(record: RawRecord, pdf_url: Option<String>) -> Self {
        Self {
            labels: record.labels,
            pdf_url,
            text: record.text,
        }
    }
}

/// Hit counters shown on the search result summary page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMeta {
    pub nr_docs_found: String,
    pub nr_sources_found: String,
    pub nr_words_found: String,
}

/// Option lists of the search form, keyed by `<select>` name
pub type OptionLists = BTreeMap<String, Vec<String>>;

/// Final output of one search run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchReport {
    pub nr_docs_found: String,
    pub nr_sources_found: String,
    pub nr_words_found: String,
    pub details: Vec<ResolvedDocument>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_lists: Option<BTreeMap<String, OptionLists>>,
}

impl SearchReport {
    pub fn new(meta: SearchMeta, details: Vec<ResolvedDocument>) -> Self {
        Self {
            nr_docs_found: meta.nr_docs_found,
            nr_sources_found: meta.nr_sources_found,
            nr_words_found: meta.nr_words_found,
            details,
            option_lists: None,
        }
    }
}
