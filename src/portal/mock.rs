//! Scripted transport for testing purposes.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::portal::ScrapeError;
use crate::utils::{HeaderSet, Transport};

/// HTTP method of a recorded call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One request seen by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: Method,
    pub stage: &'static str,
    pub url: String,
    pub body: Option<String>,
}

impl RecordedCall {
    /// Decode a form field from the POST body
    pub fn form_value(&self, name: &str) -> Option<String> {
        let body = self.body.as_ref()?;
        url::form_urlencoded::parse(body.as_bytes())
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.into_owned())
    }
}

type Responder = Box<dyn Fn(&RecordedCall) -> Result<String, ScrapeError> + Send + Sync>;

struct Route {
    method: Method,
    url_prefix: String,
    respond: Responder,
}

/// A transport that answers from registered routes and records every call.
///
/// Routes are matched by method and URL prefix, first registration wins.
/// Unmatched requests fail with a 404 status error.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("routes", &self.routes.lock().unwrap().len())
            .field("calls", &self.calls.lock().unwrap().len())
            .finish()
    }
}

impl MockTransport {
    /// Create a new mock transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer GETs to URLs starting with `url_prefix` with a fixed body.
    pub fn on_get(self, url_prefix: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        self.route(Method::Get, url_prefix, move |_| Ok(body.clone()))
    }

    /// Answer POSTs to URLs starting with `url_prefix` with a fixed body.
    pub fn on_post(self, url_prefix: impl Into<String>, body: impl Into<String>) -> Self {
        let body = body.into();
        self.route(Method::Post, url_prefix, move |_| Ok(body.clone()))
    }

    /// Answer matching requests with a function of the request.
    pub fn route<F>(self, method: Method, url_prefix: impl Into<String>, respond: F) -> Self
    where
        F: Fn(&RecordedCall) -> Result<String, ScrapeError> + Send + Sync + 'static,
    {
        self.routes.lock().unwrap().push(Route {
            method,
            url_prefix: url_prefix.into(),
            respond: Box::new(respond),
        });
        self
    }

    /// Fail matching requests with an HTTP status error.
    pub fn fail(self, method: Method, url_prefix: impl Into<String>, status: u16) -> Self {
        self.route(method, url_prefix, move |call| {
            Err(ScrapeError::HttpStatus {
                stage: call.stage,
                status,
            })
        })
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made with `method`.
    pub fn count(&self, method: Method) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Calls whose URL starts with `url_prefix`.
    pub fn calls_to(&self, url_prefix: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.url.starts_with(url_prefix))
            .cloned()
            .collect()
    }

    fn dispatch(&self, call: RecordedCall) -> Result<String, ScrapeError> {
        self.calls.lock().unwrap().push(call.clone());
        let routes = self.routes.lock().unwrap();
        match routes
            .iter()
            .find(|r| r.method == call.method && call.url.starts_with(&r.url_prefix))
        {
            Some(route) => (route.respond)(&call),
            None => Err(ScrapeError::HttpStatus {
                stage: call.stage,
                status: 404,
            }),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(
        &self,
        stage: &'static str,
        url: &str,
        _headers: HeaderSet,
    ) -> Result<String, ScrapeError> {
        self.dispatch(RecordedCall {
            method: Method::Get,
            stage,
            url: url.to_string(),
            body: None,
        })
    }

    async fn post_form(
        &self,
        stage: &'static str,
        url: &str,
        _headers: HeaderSet,
        body: String,
    ) -> Result<String, ScrapeError> {
        self.dispatch(RecordedCall {
            method: Method::Post,
            stage,
            url: url.to_string(),
            body: Some(body),
        })
    }
}

/// Render a list page holding entries `first..first + count` (numbered from 1).
pub fn list_page_html(first: usize, count: usize) -> String {
    let entries: String = (first..first + count)
        .map(|n| {
            format!(
                r#"<li><a href="article.pl?numac={n}">Decision {n}</a><table><tr><td><font>2023-01-01</font></td><td><form action="article.pl" method="post"><input type="hidden" name="numac" value="{n}"><input type="hidden" name="caller" value="list"></form></td></tr></table></li>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><form name="allrows"><input type="hidden" name="prev_row_id" value="{}"><input type="hidden" name="next_row_id" value="{}"></form><ol>{}</ol></body></html>"#,
        first,
        first + count,
        entries
    )
}

/// A list endpoint serving `total` records in pages of at most 100, keyed on `row_id`.
pub fn simulated_list_source(
    total: usize,
) -> impl Fn(&RecordedCall) -> Result<String, ScrapeError> + Send + Sync + 'static {
    move |call| {
        let row_id: usize = call
            .form_value("row_id")
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| ScrapeError::extraction(call.stage, "request without row_id"))?;
        let available = total.saturating_sub(row_id - 1);
        Ok(list_page_html(row_id, available.min(100)))
    }
}

/// Render a search summary page with the given counters.
pub fn summary_page_html(docs: usize, sources: usize, words: usize) -> String {
    format!(
        "<html><body><table>\
<tr><th align=left>Aantal gevonden documenten : {docs}</th></tr>\
<tr><td>&nbsp;</td></tr><tr><td>&nbsp;</td></tr><tr><td>&nbsp;</td></tr>\
<tr><th>Bronnen</th><th>:</th><th> {sources} </th></tr>\
<tr><td>&nbsp;</td></tr>\
<tr><th>Woorden</th><th>:</th><th> {words} </th></tr>\
</table></body></html>"
    )
}

/// Render a detail frameset whose frames point at `numac`.
pub fn frameset_html(numac: &str) -> String {
    format!(
        "<HTML><FRAMESET ROWS=\"*,60\">\n\
<frame  src=article_body.pl?numac={numac}&caller=list&row_id=1  name=Body scrolling=AUTO marginheight=0>\n\
<frame  src=article_foot.pl?numac={numac}&caller=list&row_id=1  name=Foot scrolling=NO  resize marginheight=0 >\n\
</FRAMESET></HTML>"
    )
}

/// Render a Body frame carrying `path` in its hidden `urlpdf` input.
pub fn body_frame_html(path: &str) -> String {
    format!(
        r#"<html><body><form name="pdf"><input type="hidden" name="urlpdf" value="{path}"></form></body></html>"#
    )
}

/// Detail endpoint answering with a frameset for the posted `numac`.
pub fn simulated_article_source(
) -> impl Fn(&RecordedCall) -> Result<String, ScrapeError> + Send + Sync + 'static {
    |call| {
        let numac = call
            .form_value("numac")
            .ok_or_else(|| ScrapeError::extraction(call.stage, "request without numac"))?;
        Ok(frameset_html(&numac))
    }
}

/// Body frame endpoint answering with `/mopdf/{numac}.pdf` for the requested `numac`.
pub fn simulated_body_source(
) -> impl Fn(&RecordedCall) -> Result<String, ScrapeError> + Send + Sync + 'static {
    |call| {
        let numac = url::Url::parse(&call.url)
            .ok()
            .and_then(|url| {
                url.query_pairs()
                    .find(|(name, _)| name == "numac")
                    .map(|(_, value)| value.into_owned())
            })
            .ok_or_else(|| ScrapeError::extraction(call.stage, "frame without numac"))?;
        Ok(body_frame_html(&format!("/mopdf/{}.pdf", numac)))
    }
}
