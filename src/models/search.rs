//! Search request model and the two form shapes derived from it.

use serde::{Deserialize, Serialize};

use super::Query;

/// Source filter used when none is given
pub const DEFAULT_SOURCE: &str = "GRONDWETTELIJK HOF";

/// Sort key understood by the portal (`trier`)
pub const DEFAULT_SORT: &str = "afkondiging";

/// Sort directive sent with every list request (`tri`)
pub const RANK_DIRECTIVE: &str = "dd AS RANK ";

/// Tables searched by the list endpoint (`fromtab`)
pub const FROM_TABLES: &str = " moftxt UNION montxt UNION modtxt";

/// Date-range placeholders posted empty by the search form
const RECH_DATE_FIELDS: &[&str] = &[
    "dt", "ddda", "dddm", "dddj", "ddfa", "ddfm", "ddfj", "pdda", "pddm",
];

/// Date-range placeholders posted empty by the list form
const LIST_DATE_FIELDS: &[&str] = &[
    "dt", "ddda", "dddm", "dddj", "ddfa", "ddfm", "ddfj", "pdda", "pddm", "pddj", "pdfa", "pdfm",
    "pdfj",
];

/// Interface language of the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Nl,
    Fr,
    De,
}

impl Language {
    /// Value of the `language` form field
    pub fn code(&self) -> &'static str {
        match self {
            Language::Nl => "nl",
            Language::Fr => "fr",
            Language::De => "de",
        }
    }

    /// Single-letter code used in static page names (`rech_n2.htm`)
    pub fn letter(&self) -> &'static str {
        match self {
            Language::Nl => "n",
            Language::Fr => "f",
            Language::De => "d",
        }
    }

    /// Label of the search form's submit button (`rech`)
    fn submit_label(&self) -> &'static str {
        match self {
            Language::Nl => "Opzoeking",
            Language::Fr => "Recherche",
            Language::De => "Suche",
        }
    }
}

/// Parameters of one search session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text term searched in titles and bodies
    pub text: String,

    /// Source filter (`bron`)
    pub source: String,

    /// Sort key (`trier`)
    pub sort: String,

    pub language: Language,

    /// Number of records to return
    pub count: usize,

    /// Number of leading records to skip
    pub offset: usize,

    /// Also fetch the search form's option lists
    pub with_options: bool,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            source: DEFAULT_SOURCE.to_string(),
            sort: DEFAULT_SORT.to_string(),
            language: Language::default(),
            count: 10,
            offset: 0,
            with_options: false,
        }
    }
}

impl SearchRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_options(mut self, with_options: bool) -> Self {
        self.with_options = with_options;
        self
    }

    /// Check the request before anything is sent.
    ///
    /// The text and source end up inside a quoted filter expression, so quotes
    /// are rejected rather than escaped.
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("search text must not be empty".to_string());
        }
        if self.count == 0 {
            return Err("count must be positive".to_string());
        }
        for (name, value) in [("text", &self.text), ("source", &self.source)] {
            if value.contains('\'') {
                return Err(format!("{} must not contain quotes", name));
            }
        }
        Ok(())
    }

    /// The free-text filter fragment (`sql`) evaluated by the list endpoint
    pub fn sql_filter(&self) -> String {
        format!(
            "bron ='{source}' and ( ( htit contains  ( '{text}')      ) or ( text contains  ( '{text}')      ) )",
            source = self.source,
            text = self.text,
        )
    }

    /// Form posted to the search endpoint to obtain hit counters
    pub fn search_form(&self) -> Query {
        Query::builder()
            .field("rech", self.language.submit_label())
            .field("trier", &self.sort)
            .empty_fields(RECH_DATE_FIELDS)
            .field("numac", "")
            .field("bron", &self.source)
            .field("htit", "")
            .field("text1", &self.text)
            .field("choix1", "EN")
            .field("text2", "")
            .field("choix2", "EN")
            .field("text3", "")
            .field("exp", "")
            .field("nl", "n")
            .field("fr", "f")
            .field("du", "d")
            .field("language", self.language.code())
            .build()
    }

    /// Query reused for every paginated list request of the session.
    ///
    /// `rech` echoes the number of documents found by the search form.
    pub fn list_query(&self, rech: &str) -> Query {
        Query::builder()
            .field("language", self.language.code())
            .field("du", "d")
            .field("fr", "f")
            .field("choix1", "EN")
            .field("choix2", "EN")
            .field("fromtab", FROM_TABLES)
            .field("nl", "n")
            .field("trier", &self.sort)
            .field("bron", &self.source)
            .field("text1", &self.text)
            .field("sql", self.sql_filter())
            .field("rech", rech)
            .field("tri", RANK_DIRECTIVE)
            .empty_fields(LIST_DATE_FIELDS)
            .field("numac", "")
            .field("exp", "")
            .build()
    }
}
