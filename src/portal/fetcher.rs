//! Lazy, buffered retrieval of records from the paginated list endpoint.

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info};

use crate::models::{encode_form, Bookmarks, Query, RawRecord};
use crate::portal::{list::parse_list_page, Endpoints, ScrapeError};
use crate::utils::{Transport, FORM_HEADERS};

/// Number of records the list endpoint returns for a full page
pub const BATCH_SIZE: usize = 100;

/// Cursor value of the first page
pub const FIRST_ROW_ID: usize = 1;

const STAGE: &str = "list_body";

/// Pulls records from the list endpoint in batches of [`BATCH_SIZE`].
///
/// One fetcher serves one search session. It keeps a cursor (`row_id`) and a
/// FIFO buffer of records that were fetched but not yet handed out, so
/// successive [`request_records`](Self::request_records) calls return a
/// gap-free, duplicate-free continuation of the result list.
///
/// A batch shorter than [`BATCH_SIZE`] marks the source as exhausted; no
/// further request is ever issued by this fetcher after that.
///
/// `request_records` takes `&mut self`, so a fetcher cannot be driven by two
/// calls at once.
#[derive(Debug)]
pub struct RecordBatchFetcher {
    transport: Arc<dyn Transport>,
    url: String,
    query: Query,
    cursor: usize,
    buffer: VecDeque<RawRecord>,
    exhausted: bool,
    fetched: usize,
    bookmarks: Option<Bookmarks>,
}

impl RecordBatchFetcher {
    pub fn new(transport: Arc<dyn Transport>, endpoints: &Endpoints, query: Query) -> Self {
        Self {
            transport,
            url: endpoints.list_body(),
            query,
            cursor: FIRST_ROW_ID,
            buffer: VecDeque::new(),
            exhausted: false,
            fetched: 0,
            bookmarks: None,
        }
    }

    /// Return the next `n` records, or fewer if the source runs out.
    ///
    /// Batches are fetched strictly one after another until the buffer holds
    /// `n` records or the source is exhausted. If a batch fails, batches
    /// committed earlier in the same call stay buffered.
    pub async fn request_records(&mut self, n: usize) -> Result<Vec<RawRecord>, ScrapeError> {
        if n == 0 {
            return Err(ScrapeError::Validation(
                "requested record count must be positive".to_string(),
            ));
        }

        while self.buffer.len() < n && !self.exhausted {
            let page = self.fetch_batch().await?;
            let batch_len = page.records.len();

            self.buffer.extend(page.records);
            self.bookmarks = Some(page.bookmarks);
            self.fetched += batch_len;

            if batch_len < BATCH_SIZE {
                self.exhausted = true;
                info!(
                    stage = STAGE,
                    row_id = self.cursor,
                    batch_len,
                    total = self.cursor + batch_len - 1,
                    fetched = self.fetched,
                    "fetched last batch"
                );
            } else {
                info!(
                    stage = STAGE,
                    row_id = self.cursor,
                    batch_len,
                    fetched = self.fetched,
                    "fetched batch"
                );
                self.cursor += BATCH_SIZE;
            }
        }

        let take = n.min(self.buffer.len());
        let records: Vec<RawRecord> = self.buffer.drain(..take).collect();
        info!(
            stage = STAGE,
            returned = records.len(),
            buffered = self.buffer.len(),
            "items left in the buffer"
        );
        Ok(records)
    }

    async fn fetch_batch(&self) -> Result<crate::models::ListPage, ScrapeError> {
        let row_id = self.cursor.to_string();
        let body = encode_form(std::iter::once(("row_id", row_id.as_str())).chain(self.query.iter()));

        debug!(stage = STAGE, row_id = self.cursor, "requesting batch");
        let html = self
            .transport
            .post_form(STAGE, &self.url, FORM_HEADERS, body)
            .await?;
        parse_list_page(&html)
    }

    /// Cursor value the next batch would be requested with
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether a short batch has been seen
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Records fetched but not yet returned
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Records fetched from the network so far
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Bookmarks of the most recent page, kept as metadata only
    pub fn last_bookmarks(&self) -> Option<&Bookmarks> {
        self.bookmarks.as_ref()
    }
}
