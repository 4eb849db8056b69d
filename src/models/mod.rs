//! Core data models for search sessions, scraped records and results.

mod query;
mod record;
mod search;

pub use query::{encode_form, FormFields, Query, QueryBuilder};
pub use record::{
    Bookmarks, ListPage, OptionLists, RawRecord, ResolvedDocument, SearchMeta, SearchReport,
};
pub use search::{
    Language, SearchRequest, DEFAULT_SORT, DEFAULT_SOURCE, FROM_TABLES, RANK_DIRECTIVE,
};
