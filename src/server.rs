//! HTTP front end.
//!
//! `GET /api/search?text=..&source=..&count=..&offset=..&language=..&with_options=..`
//! runs the pipeline and answers with the report as JSON. `count + offset` is
//! capped by `server.max_count`. `GET /api/trial` does the same but falls
//! back to a fixed demo term when no text is given.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::models::{Language, SearchReport, SearchRequest};
use crate::pipeline::SearchPipeline;
use crate::portal::{ErrorKind, ScrapeError};

const HEALTHZ_PATH: &str = "/healthz";
const SEARCH_PATH: &str = "/api/search";
const TRIAL_PATH: &str = "/api/trial";

/// Search term used by the trial endpoint when none is given
const TRIAL_TEXT: &str = "lavrysen";

/// Server failures
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid listen address `{0}`")]
    Address(String),

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
}

/// Query parameters accepted by the search endpoints
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub text: Option<String>,
    pub source: Option<String>,
    pub count: Option<usize>,
    pub offset: Option<usize>,
    pub language: Option<Language>,
    pub with_options: Option<bool>,
}

impl SearchParams {
    fn into_request(self, fallback_text: Option<&str>) -> SearchRequest {
        let text = self
            .text
            .filter(|t| !t.trim().is_empty())
            .or_else(|| fallback_text.map(str::to_string))
            .unwrap_or_default();

        let mut request = SearchRequest::new(text);
        if let Some(source) = self.source.filter(|s| !s.trim().is_empty()) {
            request = request.source(source);
        }
        if let Some(count) = self.count {
            request = request.count(count);
        }
        if let Some(offset) = self.offset {
            request = request.offset(offset);
        }
        if let Some(language) = self.language {
            request = request.language(language);
        }
        if let Some(with_options) = self.with_options {
            request = request.with_options(with_options);
        }
        request
    }
}

/// Shared handler state
#[derive(Debug, Clone)]
struct AppState {
    pipeline: Arc<SearchPipeline>,
    max_count: usize,
}

impl AppState {
    /// Reject windows larger than `max_count` before any request is made.
    async fn run(&self, request: SearchRequest) -> Result<Json<SearchReport>, ApiError> {
        let window = request.count.saturating_add(request.offset);
        if window > self.max_count {
            return Err(ScrapeError::Validation(format!(
                "count + offset must not exceed {}, got {}",
                self.max_count, window
            ))
            .into());
        }
        Ok(Json(self.pipeline.run(&request).await?))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorKind,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<&'static str>,
}

/// A pipeline error mapped to an HTTP status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl From<ScrapeError> for ApiError {
    fn from(err: ScrapeError) -> Self {
        let status = match &err {
            ScrapeError::Validation(_) => StatusCode::BAD_REQUEST,
            ScrapeError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            ScrapeError::Request { .. }
            | ScrapeError::HttpStatus { .. }
            | ScrapeError::Extraction { .. } => StatusCode::BAD_GATEWAY,
        };
        if status != StatusCode::BAD_REQUEST {
            error!(stage = err.stage().unwrap_or_default(), error = %err, "search failed");
        }
        ApiError {
            status,
            body: ErrorBody {
                error: err.kind(),
                message: err.to_string(),
                stage: err.stage(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse { status: "ok" })
}

async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchReport>, ApiError> {
    state.run(params.into_request(None)).await
}

async fn trial(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchReport>, ApiError> {
    state.run(params.into_request(Some(TRIAL_TEXT))).await
}

/// Build the application router
pub fn router(pipeline: Arc<SearchPipeline>, config: &ServerConfig) -> Router {
    let state = AppState {
        pipeline,
        max_count: config.max_count,
    };
    Router::new()
        .route(HEALTHZ_PATH, get(healthz))
        .route(SEARCH_PATH, get(search))
        .route(TRIAL_PATH, get(trial))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn serve(
    config: &ServerConfig,
    pipeline: Arc<SearchPipeline>,
) -> Result<(), ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|_| ServerError::Address(format!("{}:{}", config.host, config.port)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "listening");

    axum::serve(listener, router(pipeline, config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::portal::mock::{
        simulated_article_source, simulated_body_source, simulated_list_source,
        summary_page_html, Method, MockTransport,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    const ORIGIN: &str = "https://www.ejustice.just.fgov.be";

    fn app(mock: MockTransport) -> (Arc<MockTransport>, Router) {
        let mock = Arc::new(mock);
        let pipeline = SearchPipeline::new(mock.clone(), &Config::default());
        (mock, router(Arc::new(pipeline), &ServerConfig::default()))
    }

    fn portal() -> MockTransport {
        MockTransport::new()
            .on_post(format!("{ORIGIN}/cgi/rech.pl"), summary_page_html(3, 1, 2))
            .route(
                Method::Post,
                format!("{ORIGIN}/cgi/list_body.pl"),
                simulated_list_source(3),
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
            .on_get(format!("{ORIGIN}/cgi/article_foot.pl"), "")
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_healthz() {
        let (_, router) = app(MockTransport::new());
        let (status, body) = get_json(router, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_search_returns_camel_case_report() {
        let (_, router) = app(portal());
        let (status, body) = get_json(router, "/api/search?text=lavrysen&count=2").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nrDocsFound"], "3");
        assert_eq!(body["nrSourcesFound"], "1");
        assert_eq!(body["nrWordsFound"], "2");
        assert_eq!(body["details"].as_array().unwrap().len(), 2);
        assert_eq!(body["details"][0]["pdfUrl"], format!("{ORIGIN}/mopdf/1.pdf"));
        assert_eq!(body["details"][0]["text"], "Decision 1");
        assert_eq!(body["details"][0]["pub"][0], "2023-01-01");
    }

    #[tokio::test]
    async fn test_trial_uses_demo_term() {
        let (mock, router) = app(portal());
        let (status, _) = get_json(router, "/api/trial?count=1").await;

        assert_eq!(status, StatusCode::OK);
        let search = &mock.calls_to(&format!("{ORIGIN}/cgi/rech.pl"))[0];
        assert_eq!(search.form_value("text1").as_deref(), Some("lavrysen"));
    }

    #[tokio::test]
    async fn test_missing_text_is_bad_request() {
        let (mock, router) = app(portal());
        let (status, body) = get_json(router, "/api/search").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_portal_failure_is_bad_gateway() {
        let (_, router) = app(MockTransport::new().fail(
            Method::Post,
            format!("{ORIGIN}/cgi/rech.pl"),
            503,
        ));
        let (status, body) = get_json(router, "/api/search?text=lavrysen").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "transport");
        assert_eq!(body["stage"], "rech");
    }

    #[tokio::test]
    async fn test_oversized_window_is_rejected_without_upstream_calls() {
        let (mock, router) = app(portal());
        let (status, body) = get_json(router, "/api/search?text=lavrysen&count=1000000").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_offset_counts_towards_window() {
        let (mock, router) = app(portal());
        let (status, _) = get_json(router, "/api/search?text=lavrysen&count=1&offset=100").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_language_and_option_lists_params() {
        let mock = portal().on_get(
            format!("{ORIGIN}/doc/rech_f2.htm"),
            r#"<select name="bron"><option value="COUR CONSTITUTIONNELLE">x</option></select>"#,
        );
        let (mock, router) = app(mock);
        let (status, body) = get_json(
            router,
            "/api/search?text=lavrysen&count=1&language=fr&with_options=true",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["optionLists"]["f"]["bron"][0],
            "COUR CONSTITUTIONNELLE"
        );
        let search = &mock.calls_to(&format!("{ORIGIN}/cgi/rech.pl"))[0];
        assert_eq!(search.form_value("language").as_deref(), Some("fr"));
        assert_eq!(search.form_value("rech").as_deref(), Some("Recherche"));
    }
}
