//! Hit counters from the search form submission.

use regex::Regex;
use scraper::{Html, Selector};
use tracing::info;

use crate::models::{Query, SearchMeta};
use crate::portal::{Endpoints, ScrapeError};
use crate::utils::{Transport, SEARCH_HEADERS};

const STAGE: &str = "rech";

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css)
        .map_err(|_| ScrapeError::extraction(STAGE, format!("invalid selector `{}`", css)))
}

fn strip_whitespace(value: &str) -> String {
    value.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Read the document, source and word counters from a search summary page.
///
/// The counters live in the summary table: documents in the first header
/// cell (after its label), sources in row 5 and words in row 7, third header
/// cell each.
pub fn parse_search_meta(html: &str) -> Result<SearchMeta, ScrapeError> {
    let document = Html::parse_document(html);

    if document.select(&selector("body table tbody")?).next().is_none() {
        return Err(ScrapeError::extraction(STAGE, "summary table not found"));
    }

    let trailing_number = Regex::new(r"(\d+)\s*$")
        .map_err(|err| ScrapeError::extraction(STAGE, err.to_string()))?;

    let nr_docs_found = document
        .select(&selector("body table tbody tr th")?)
        .next()
        .map(|th| th.inner_html())
        .and_then(|inner| {
            trailing_number
                .captures(&inner)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        })
        .unwrap_or_default();

    let cell_text = |css: &str| -> Result<String, ScrapeError> {
        let text: String = document
            .select(&selector(css)?)
            .flat_map(|cell| cell.text())
            .collect();
        Ok(strip_whitespace(&text))
    };
    let nr_sources_found = cell_text("body table tbody tr:nth-child(5) th:nth-child(3)")?;
    let nr_words_found = cell_text("body table tbody tr:nth-child(7) th:nth-child(3)")?;

    if nr_docs_found.is_empty() || nr_sources_found.is_empty() || nr_words_found.is_empty() {
        return Err(ScrapeError::extraction(STAGE, "unexpected summary table content"));
    }

    Ok(SearchMeta {
        nr_docs_found,
        nr_sources_found,
        nr_words_found,
    })
}

/// Submit the search form and read the hit counters.
pub async fn fetch_search_meta(
    transport: &dyn Transport,
    endpoints: &Endpoints,
    form: &Query,
) -> Result<SearchMeta, ScrapeError> {
    let html = transport
        .post_form(
            STAGE,
            &endpoints.search(),
            SEARCH_HEADERS,
            form.fields().to_urlencoded(),
        )
        .await?;

    let meta = parse_search_meta(&html)?;
    info!(
        stage = STAGE,
        docs = %meta.nr_docs_found,
        sources = %meta.nr_sources_found,
        words = %meta.nr_words_found,
        "search summary"
    );
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::mock::MockTransport;
    use crate::portal::ErrorKind;

    const SUMMARY_PAGE: &str = "<html><body>
<table>
<tr><th align=left>Aantal gevonden documenten :
 2137
</th></tr>
<tr><td>&nbsp;</td></tr>
<tr><td>Opzoeking</td></tr>
<tr><td>&nbsp;</td></tr>
<tr><th>Bronnen</th><th>:</th><th>
  1
</th></tr>
<tr><td>&nbsp;</td></tr>
<tr><th>Woorden</th><th>:</th><th> 1 3 </th></tr>
</table>
</body></html>";

    #[test]
    fn test_parse_counters() {
        let meta = parse_search_meta(SUMMARY_PAGE).unwrap();
        assert_eq!(meta.nr_docs_found, "2137");
        assert_eq!(meta.nr_sources_found, "1");
        assert_eq!(meta.nr_words_found, "13");
    }

    #[test]
    fn test_missing_table() {
        let err = parse_search_meta("<html><body><p>Fout</p></body></html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
    }

    #[test]
    fn test_missing_counters() {
        let err =
            parse_search_meta("<html><body><table><tr><th>x</th></tr></table></body></html>")
                .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
    }

    #[tokio::test]
    async fn test_fetch_posts_search_form() {
        let mock = MockTransport::new()
            .on_post("https://www.ejustice.just.fgov.be/cgi/rech.pl", SUMMARY_PAGE);
        let form = Query::builder()
            .field("rech", "Opzoeking")
            .field("text1", "lavrysen")
            .build();

        let meta = fetch_search_meta(&mock, &Endpoints::default(), &form)
            .await
            .unwrap();
        assert_eq!(meta.nr_docs_found, "2137");
        assert_eq!(
            mock.calls()[0].body.as_deref(),
            Some("rech=Opzoeking&text1=lavrysen")
        );
    }
}
