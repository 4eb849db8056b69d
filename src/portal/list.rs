//! Parser for the list endpoint's HTML pages.

use scraper::{ElementRef, Html, Selector};

use crate::models::{Bookmarks, FormFields, ListPage, RawRecord};
use crate::portal::ScrapeError;

const STAGE: &str = "list_body";

struct ListSelectors {
    container: Selector,
    item: Selector,
    anchor: Selector,
    form: Selector,
    input: Selector,
    labels: Selector,
    bookmarks: Selector,
}

impl ListSelectors {
    fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            container: selector("ol")?,
            item: selector("ol li")?,
            anchor: selector("a")?,
            form: selector("table tr td:nth-child(2) form")?,
            input: selector("input")?,
            labels: selector("table tr:first-child td:first-child font")?,
            bookmarks: selector(
                "html > body form[name='allrows']:first-child input[type='hidden']",
            )?,
        })
    }
}

fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css)
        .map_err(|_| ScrapeError::extraction(STAGE, format!("invalid selector `{}`", css)))
}

/// Parse one list page into its records, in document order.
///
/// A page without entries yields an empty list. A page without the `<ol>`
/// container at all means the layout changed and is reported as an
/// extraction error.
pub fn parse_list_page(html: &str) -> Result<ListPage, ScrapeError> {
    let document = Html::parse_document(html);
    let selectors = ListSelectors::new()?;

    if document.select(&selectors.container).next().is_none() {
        return Err(ScrapeError::extraction(
            STAGE,
            "list container <ol> not found",
        ));
    }

    let records = document
        .select(&selectors.item)
        .map(|item| parse_entry(&selectors, item))
        .collect();

    Ok(ListPage {
        records,
        bookmarks: parse_bookmarks(&selectors, &document),
    })
}

fn parse_entry(selectors: &ListSelectors, item: ElementRef<'_>) -> RawRecord {
    let anchors: Vec<ElementRef<'_>> = item.select(&selectors.anchor).collect();

    let link = anchors
        .first()
        .and_then(|a| a.value().attr("href"))
        .map(str::to_string);

    let text = anchors
        .iter()
        .flat_map(|a| a.text())
        .collect::<String>()
        .trim()
        .to_string();

    // Every input of the entry's form, hidden or not, is part of the detail request.
    let mut form_input_values = FormFields::new();
    for form in item.select(&selectors.form) {
        for input in form.select(&selectors.input) {
            if let Some(name) = input.value().attr("name") {
                form_input_values.insert(name, input.value().attr("value").unwrap_or_default());
            }
        }
    }

    let labels = item
        .select(&selectors.labels)
        .map(|font| text_content(&font))
        .collect();

    RawRecord {
        labels,
        text,
        link,
        form_input_values,
    }
}

fn parse_bookmarks(selectors: &ListSelectors, document: &Html) -> Bookmarks {
    let mut bookmarks = Bookmarks::default();
    for input in document.select(&selectors.bookmarks) {
        let value = input.value().attr("value").map(str::to_string);
        match input.value().attr("name") {
            Some("prev_row_id") => bookmarks.prev_row_id = value,
            Some("next_row_id") => bookmarks.next_row_id = value,
            _ => {}
        }
    }
    bookmarks
}

fn text_content(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawRecord;

    fn entry(numac: &str, date: &str, title: &str) -> String {
        format!(
            r#"<li>
  <a href="article.pl?language=nl&numac={numac}">  {title}  </a>
  <table>
    <tr>
      <td><font> {date} </font><font>GRONDWETTELIJK HOF</font></td>
      <td>
        <form action="article.pl" method="post">
          <input type="hidden" name="numac" value="{numac}">
          <input type="hidden" name="caller" value="list">
          <input type="hidden" name="article_lang" value="N">
          <input type="hidden" name="pub_date" value="{date}">
          <input type="hidden" name="tri" value="dd AS RANK ">
          <input type="submit" value="Bekijk">
        </form>
      </td>
    </tr>
  </table>
</li>"#
        )
    }

    fn page(entries: &[String]) -> String {
        format!(
            r#"<html><body><form name="allrows" action="list_body.pl" method="post"><input type="hidden" name="prev_row_id" value="1"><input type="hidden" name="next_row_id" value="101"></form>
<h3>Resultaten</h3>
<ol>{}</ol>
</body></html>"#,
            entries.join("\n")
        )
    }

    #[test]
    fn test_parses_three_entries_in_order() {
        let html = page(&[
            entry("2023042064", "2023-05-30", "Arrest nr. 75/2023"),
            entry("2023041870", "2023-05-22", "Arrest nr. 70/2023"),
            entry("2023041520", "2023-05-10", "Arrest nr. 61/2023"),
        ]);

        let page = parse_list_page(&html).unwrap();
        assert_eq!(page.records.len(), 3);

        let first: &RawRecord = &page.records[0];
        assert_eq!(first.text, "Arrest nr. 75/2023");
        assert_eq!(
            first.link.as_deref(),
            Some("article.pl?language=nl&numac=2023042064")
        );
        assert_eq!(first.labels, vec!["2023-05-30", "GRONDWETTELIJK HOF"]);
        assert_eq!(first.numac(), Some("2023042064"));
        assert_eq!(first.form_input_values.get("caller"), Some("list"));
        assert_eq!(first.form_input_values.get("tri"), Some("dd AS RANK "));
        // Unnamed submit button is not a form field.
        assert_eq!(first.form_input_values.len(), 5);

        let numacs: Vec<_> = page.records.iter().filter_map(|r| r.numac()).collect();
        assert_eq!(numacs, vec!["2023042064", "2023041870", "2023041520"]);
    }

    #[test]
    fn test_form_fields_keep_document_order() {
        let html = page(&[entry("1", "2023-01-01", "x")]);
        let page = parse_list_page(&html).unwrap();

        let names: Vec<_> = page.records[0]
            .form_input_values
            .iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["numac", "caller", "article_lang", "pub_date", "tri"]);
    }

    #[test]
    fn test_bookmarks_are_captured() {
        let html = page(&[entry("1", "2023-01-01", "x")]);
        let page = parse_list_page(&html).unwrap();

        assert_eq!(page.bookmarks.prev_row_id.as_deref(), Some("1"));
        assert_eq!(page.bookmarks.next_row_id.as_deref(), Some("101"));
    }

    #[test]
    fn test_empty_list_is_not_an_error() {
        let page = parse_list_page(&page(&[])).unwrap();
        assert!(page.records.is_empty());
    }

    #[test]
    fn test_missing_container_is_extraction_error() {
        let err = parse_list_page("<html><body><p>Onderhoud</p></body></html>").unwrap_err();
        assert_eq!(err.kind(), crate::portal::ErrorKind::Extraction);
        assert_eq!(err.stage(), Some("list_body"));
    }
}
