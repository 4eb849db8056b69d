//! End-to-end search runs.
//!
//! A run submits the search form for the hit counters, opens a fresh
//! [`RecordBatchFetcher`] over the list query, pulls the requested window of
//! records and resolves each of them to a document URL with bounded
//! concurrency. Result order always follows list order.

use futures_util::stream::{self, StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{Config, FailurePolicy, ResolverConfig};
use crate::models::{OptionLists, RawRecord, ResolvedDocument, SearchRequest, SearchReport};
use crate::portal::{
    fetch_option_lists, fetch_search_meta, DocumentResolver, Endpoints, RecordBatchFetcher,
    ScrapeError,
};
use crate::utils::{HttpClient, Transport};

/// Languages whose option lists are attached to a report
const REPORT_OPTION_LANGUAGES: [&str; 2] = ["f", "n"];

/// Runs search sessions against one portal.
///
/// The pipeline itself is stateless between runs; every run gets its own
/// fetcher, so concurrent runs never share a cursor.
#[derive(Debug, Clone)]
pub struct SearchPipeline {
    transport: Arc<dyn Transport>,
    endpoints: Endpoints,
    resolver: DocumentResolver,
    settings: ResolverConfig,
}

impl SearchPipeline {
    pub fn new(transport: Arc<dyn Transport>, config: &Config) -> Self {
        let endpoints = Endpoints::new(config.backend.base_url.clone());
        let resolver = DocumentResolver::new(transport.clone(), endpoints.clone());
        Self {
            transport,
            endpoints,
            resolver,
            settings: config.resolver.clone(),
        }
    }

    /// Build a pipeline over a real HTTP client
    pub fn from_config(config: &Config) -> Result<Self, ScrapeError> {
        let client = HttpClient::from_config(&config.backend)?;
        Ok(Self::new(Arc::new(client), config))
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn resolver(&self) -> &DocumentResolver {
        &self.resolver
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Run one search and resolve the requested window of records.
    pub async fn run(&self, request: &SearchRequest) -> Result<SearchReport, ScrapeError> {
        request.validate().map_err(ScrapeError::Validation)?;

        info!(
            text = %request.text,
            source = %request.source,
            count = request.count,
            offset = request.offset,
            "starting search"
        );

        let meta =
            fetch_search_meta(self.transport.as_ref(), &self.endpoints, &request.search_form())
                .await?;

        let option_lists = if request.with_options {
            Some(self.option_lists().await)
        } else {
            None
        };

        let query = request.list_query(&meta.nr_docs_found);
        let mut fetcher = RecordBatchFetcher::new(self.transport.clone(), &self.endpoints, query);

        if request.offset > 0 {
            let skipped = fetcher.request_records(request.offset).await?;
            info!(skipped = skipped.len(), "skipped leading records");
        }
        let records = fetcher.request_records(request.count).await?;
        info!(
            fetched = fetcher.fetched(),
            buffered = fetcher.buffered(),
            "records pulled"
        );

        let details = self.resolve_all(records).await?;
        info!(
            docs = %meta.nr_docs_found,
            returned = details.len(),
            "search finished"
        );

        let mut report = SearchReport::new(meta, details);
        report.option_lists = option_lists;
        Ok(report)
    }

    /// Fetch the option lists of the French and Dutch search forms concurrently.
    ///
    /// A failing language is logged and left out.
    async fn option_lists(&self) -> BTreeMap<String, OptionLists> {
        let [first, second] = REPORT_OPTION_LANGUAGES;
        let (a, b) = tokio::join!(
            fetch_option_lists(self.transport.as_ref(), &self.endpoints, first),
            fetch_option_lists(self.transport.as_ref(), &self.endpoints, second),
        );

        let mut lists = BTreeMap::new();
        for (letter, result) in [(first, a), (second, b)] {
            match result {
                Ok(options) => {
                    info!(letter, selects = options.len(), "option lists fetched");
                    lists.insert(letter.to_string(), options);
                }
                Err(err) => warn!(letter, error = %err, "option lists unavailable"),
            }
        }
        lists
    }

    /// Resolve records to documents, at most `max_concurrent` at a time.
    ///
    /// Output order matches input order. Under [`FailurePolicy::Isolate`] a
    /// failed record is kept with no document URL; under
    /// [`FailurePolicy::Abort`] the first failure ends the batch.
    pub async fn resolve_all(
        &self,
        records: Vec<RawRecord>,
    ) -> Result<Vec<ResolvedDocument>, ScrapeError> {
        let policy = self.settings.failure_policy;
        let limit = self.settings.max_concurrent.max(1);
        let resolver = &self.resolver;
        let endpoints = &self.endpoints;

        stream::iter(records)
            .map(|record| async move {
                match resolver.resolve(&record.form_input_values).await {
                    Ok(resolution) => {
                        let url = endpoints.document_url(&resolution.pdf_url);
                        Ok(ResolvedDocument::new(record, Some(url)))
                    }
                    Err(err) if policy == FailurePolicy::Isolate => {
                        warn!(
                            numac = record.numac().unwrap_or_default(),
                            stage = err.stage().unwrap_or_default(),
                            error = %err,
                            "record not resolved"
                        );
                        Ok(ResolvedDocument::new(record, None))
                    }
                    Err(err) => Err(err),
                }
            })
            .buffered(limit)
            .try_collect()
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::mock::{
        simulated_article_source, simulated_body_source, simulated_list_source,
        summary_page_html, Method, MockTransport,
    };
    use crate::portal::ErrorKind;

    const ORIGIN: &str = "https://www.ejustice.just.fgov.be";

    fn portal(total: usize) -> MockTransport {
        with_portal(MockTransport::new(), total)
    }

    /// Add the standard portal routes after any routes already on `mock`.
    fn with_portal(mock: MockTransport, total: usize) -> MockTransport {
        mock.on_post(format!("{ORIGIN}/cgi/rech.pl"), summary_page_html(total, 1, 1))
            .route(
                Method::Post,
                format!("{ORIGIN}/cgi/list_body.pl"),
                simulated_list_source(total),
            )
            .route(
                Method::Post,
                format!("{ORIGIN}/cgi/article.pl"),
                simulated_article_source(),
            )
            .route(
                Method::Get,
                format!("{ORIGIN}/cgi/article_body.pl"),
                simulated_body_source(),
            )
            .on_get(format!("{ORIGIN}/cgi/article_foot.pl"), "<html></html>")
    }

    fn pipeline(
        mock: MockTransport,
        policy: FailurePolicy,
    ) -> (Arc<MockTransport>, SearchPipeline) {
        let mock = Arc::new(mock);
        let mut config = Config::default();
        config.resolver.failure_policy = policy;
        config.resolver.max_concurrent = 3;
        let pipeline = SearchPipeline::new(mock.clone(), &config);
        (mock, pipeline)
    }

    fn pdf_urls(report: &SearchReport) -> Vec<Option<String>> {
        report.details.iter().map(|d| d.pdf_url.clone()).collect()
    }

    #[tokio::test]
    async fn test_run_resolves_in_list_order() {
        let (mock, pipeline) = pipeline(portal(250), FailurePolicy::Isolate);

        let report = pipeline
            .run(&SearchRequest::new("lavrysen").count(5))
            .await
            .unwrap();

        assert_eq!(report.nr_docs_found, "250");
        assert_eq!(report.details.len(), 5);
        assert_eq!(
            pdf_urls(&report),
            (1..=5)
                .map(|n| Some(format!("{ORIGIN}/mopdf/{n}.pdf")))
                .collect::<Vec<_>>()
        );
        assert_eq!(report.details[0].text, "Decision 1");
        assert!(report.option_lists.is_none());

        assert_eq!(mock.calls_to(&format!("{ORIGIN}/cgi/article.pl")).len(), 5);
        assert_eq!(mock.calls_to(&format!("{ORIGIN}/cgi/list_body.pl")).len(), 1);
    }

    #[tokio::test]
    async fn test_list_query_echoes_document_count() {
        let (mock, pipeline) = pipeline(portal(42), FailurePolicy::Isolate);
        pipeline
            .run(&SearchRequest::new("lavrysen").count(1))
            .await
            .unwrap();

        let list_call = &mock.calls_to(&format!("{ORIGIN}/cgi/list_body.pl"))[0];
        assert_eq!(list_call.form_value("rech").as_deref(), Some("42"));
        assert_eq!(list_call.form_value("row_id").as_deref(), Some("1"));
        assert_eq!(list_call.form_value("text1").as_deref(), Some("lavrysen"));
    }

    #[tokio::test]
    async fn test_offset_skips_leading_records() {
        let (mock, pipeline) = pipeline(portal(250), FailurePolicy::Isolate);

        let report = pipeline
            .run(&SearchRequest::new("lavrysen").offset(99).count(3))
            .await
            .unwrap();

        assert_eq!(
            pdf_urls(&report),
            (100..=102)
                .map(|n| Some(format!("{ORIGIN}/mopdf/{n}.pdf")))
                .collect::<Vec<_>>()
        );
        let row_ids: Vec<String> = mock
            .calls_to(&format!("{ORIGIN}/cgi/list_body.pl"))
            .iter()
            .filter_map(|c| c.form_value("row_id"))
            .collect();
        assert_eq!(row_ids, vec!["1", "101"]);
    }

    #[tokio::test]
    async fn test_isolate_keeps_failed_record() {
        // Earlier registrations win, so the blank Body frame shadows record 2.
        let mock = with_portal(
            MockTransport::new().route(
                Method::Get,
                format!("{ORIGIN}/cgi/article_body.pl?numac=2&"),
                |_| Ok("<html><body>geen pdf</body></html>".to_string()),
            ),
            10,
        );
        let (_, pipeline) = pipeline(mock, FailurePolicy::Isolate);

        let report = pipeline
            .run(&SearchRequest::new("lavrysen").count(3))
            .await
            .unwrap();

        assert_eq!(
            pdf_urls(&report),
            vec![
                Some(format!("{ORIGIN}/mopdf/1.pdf")),
                None,
                Some(format!("{ORIGIN}/mopdf/3.pdf")),
            ]
        );
        assert_eq!(report.details[1].text, "Decision 2");
    }

    #[tokio::test]
    async fn test_abort_propagates_first_failure() {
        let mock = with_portal(
            MockTransport::new().fail(
                Method::Get,
                format!("{ORIGIN}/cgi/article_foot.pl?numac=3&"),
                500,
            ),
            10,
        );
        let (_, pipeline) = pipeline(mock, FailurePolicy::Abort);

        let err = pipeline
            .run(&SearchRequest::new("lavrysen").count(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.stage(), Some("article_foot"));
    }

    #[tokio::test]
    async fn test_invalid_request_makes_no_call() {
        let (mock, pipeline) = pipeline(portal(10), FailurePolicy::Isolate);

        let err = pipeline.run(&SearchRequest::new("")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_option_lists_attached_when_requested() {
        let mock = portal(3).on_get(
            format!("{ORIGIN}/doc/rech_f2.htm"),
            r#"<select name="bron"><option value="COUR CONSTITUTIONNELLE">x</option></select>"#,
        );
        let (_, pipeline) = pipeline(mock, FailurePolicy::Isolate);

        let report = pipeline
            .run(&SearchRequest::new("lavrysen").count(1).with_options(true))
            .await
            .unwrap();

        // The Dutch page is not routed and answers 404, so only French is kept.
        let lists = report.option_lists.unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists["f"]["bron"], vec!["COUR CONSTITUTIONNELLE"]);
    }

    #[tokio::test]
    async fn test_short_source_returns_fewer_records() {
        let (_, pipeline) = pipeline(portal(2), FailurePolicy::Isolate);

        let report = pipeline
            .run(&SearchRequest::new("lavrysen").count(10))
            .await
            .unwrap();
        assert_eq!(report.details.len(), 2);
    }
}
