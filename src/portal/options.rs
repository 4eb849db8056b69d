//! Option lists of the static search form (`rech_{n,f,d}2.htm`).

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use crate::models::OptionLists;
use crate::portal::{Endpoints, ScrapeError};
use crate::utils::{Transport, FORM_HEADERS};

const STAGE: &str = "option_list";

/// Language letters for which a static search form exists
pub const OPTION_LIST_LANGUAGES: [&str; 3] = ["n", "f", "d"];

/// Collect every named `<select>` with its option values.
///
/// Values are whitespace-collapsed and trimmed; empty values are dropped and
/// selects left without values are omitted.
pub fn parse_option_lists(html: &str) -> OptionLists {
    let document = Html::parse_document(html);
    let mut lists = OptionLists::new();

    let Ok(select) = Selector::parse("select") else {
        return lists;
    };

    for element in document.select(&select) {
        let Some(name) = element.value().attr("name") else {
            continue;
        };

        let values: Vec<String> = element
            .children()
            .filter_map(ElementRef::wrap)
            .filter_map(|option| option.value().attr("value"))
            .map(|value| value.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|value| !value.is_empty())
            .collect();

        if !values.is_empty() {
            lists.insert(name.to_string(), values);
        }
    }
    lists
}

/// Fetch the option lists of the search form for a language letter.
///
/// The letter is checked before any request is made.
pub async fn fetch_option_lists(
    transport: &dyn Transport,
    endpoints: &Endpoints,
    letter: &str,
) -> Result<OptionLists, ScrapeError> {
    if !OPTION_LIST_LANGUAGES.contains(&letter) {
        return Err(ScrapeError::Validation(format!(
            "invalid language `{}`, must be one of {:?}",
            letter, OPTION_LIST_LANGUAGES
        )));
    }

    let html = transport
        .get(STAGE, &endpoints.option_list_page(letter), FORM_HEADERS)
        .await?;
    let lists = parse_option_lists(&html);
    debug!(stage = STAGE, letter, selects = lists.len(), "option lists");
    Ok(lists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::mock::{Method, MockTransport};
    use crate::portal::ErrorKind;

    const FORM_PAGE: &str = r#"<html><body><form>
<select name="bron">
  <option value="">---</option>
  <option value="GRONDWETTELIJK   HOF ">Grondwettelijk Hof</option>
  <option value=" RAAD VAN
  STATE">Raad van State</option>
</select>
<select name="dt">
  <option value="WET">Wet</option>
  <option value="DECREET">Decreet</option>
</select>
<select name="leeg"><option value=" "></option></select>
<select><option value="x">x</option></select>
</form></body></html>"#;

    #[test]
    fn test_parse_option_lists() {
        let lists = parse_option_lists(FORM_PAGE);

        assert_eq!(lists.len(), 2);
        assert_eq!(lists["bron"], vec!["GRONDWETTELIJK HOF", "RAAD VAN STATE"]);
        assert_eq!(lists["dt"], vec!["WET", "DECREET"]);
        assert!(!lists.contains_key("leeg"));
    }

    #[tokio::test]
    async fn test_invalid_language_makes_no_request() {
        let mock = MockTransport::new();
        let err = fetch_option_lists(&mock, &Endpoints::default(), "x")
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(mock.count(Method::Get), 0);
    }

    #[tokio::test]
    async fn test_fetch_uses_language_page() {
        let mock = MockTransport::new().on_get(
            "https://www.ejustice.just.fgov.be/doc/rech_f2.htm",
            FORM_PAGE,
        );
        let lists = fetch_option_lists(&mock, &Endpoints::default(), "f")
            .await
            .unwrap();
        assert!(lists.contains_key("bron"));
    }
}
