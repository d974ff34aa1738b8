//! Extraction of `<input>` elements from device web pages.
//!
//! Older firmware reports command results by rendering an HTML form; the
//! interesting state lives in the attributes of named `<input>` elements.

use std::collections::BTreeMap;

use scraper::{Html, Selector};
use serde::Serialize;

/// Attributes of one element, keyed by attribute name.
pub type Attributes = BTreeMap<String, String>;

/// Result of [`parse_output`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScrapeOutput {
    /// Name and value filter: attributes of the first match, or an empty
    /// map if nothing matched.
    Element(Attributes),
    /// Name filter only: every `<input>` with that name.
    Elements(Vec<Attributes>),
    /// No filter: the body unchanged.
    Raw(String),
}

/// Filters the `<input>` elements of `body`.
///
/// Empty `target`/`value` strings are treated as absent.
pub fn parse_output(body: &str, target: Option<&str>, value: Option<&str>) -> ScrapeOutput {
    let target = target.filter(|t| !t.is_empty());
    let value = value.filter(|v| !v.is_empty());

    let Some(target) = target else {
        return ScrapeOutput::Raw(body.to_string());
    };
    let Ok(selector) = Selector::parse("input") else {
        return ScrapeOutput::Raw(body.to_string());
    };

    let document = Html::parse_document(body);
    let mut named = document
        .select(&selector)
        .filter(|input| input.value().attr("name") == Some(target));

    match value {
        Some(value) => ScrapeOutput::Element(
            named
                .find(|input| input.value().attr("value") == Some(value))
                .map(|input| attributes_of(input.value()))
                .unwrap_or_default(),
        ),
        None => ScrapeOutput::Elements(named.map(|input| attributes_of(input.value())).collect()),
    }
}

fn attributes_of(element: &scraper::node::Element) -> Attributes {
    element
        .attrs()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><form>
        <input type="radio" name="state" value="off">
        <input type="radio" name="state" value="on" checked>
        <input type="hidden" name="sid" value="0123456789abcdef">
    </form></body></html>"#;

    #[test]
    fn name_and_value_return_matching_attributes() {
        let ScrapeOutput::Element(attrs) = parse_output(PAGE, Some("state"), Some("on")) else {
            panic!("name + value filter should yield a single element");
        };
        assert_eq!(attrs.get("name").map(String::as_str), Some("state"));
        assert_eq!(attrs.get("value").map(String::as_str), Some("on"));
        assert_eq!(attrs.get("type").map(String::as_str), Some("radio"));
        assert!(attrs.contains_key("checked"), "boolean attributes are kept");
    }

    #[test]
    fn name_and_unknown_value_return_empty_attributes() {
        assert_eq!(
            parse_output(PAGE, Some("state"), Some("standby")),
            ScrapeOutput::Element(Attributes::new())
        );
    }

    #[test]
    fn name_only_returns_every_named_input() {
        let ScrapeOutput::Elements(found) = parse_output(PAGE, Some("state"), None) else {
            panic!("name filter should yield a list");
        };
        assert_eq!(found.len(), 2);
        assert_eq!(found[0]["value"], "off");
        assert_eq!(found[1]["value"], "on");
    }

    #[test]
    fn no_filter_returns_body_unchanged() {
        assert_eq!(
            parse_output(PAGE, None, Some("on")),
            ScrapeOutput::Raw(PAGE.to_string())
        );
        assert_eq!(
            parse_output(PAGE, Some(""), None),
            ScrapeOutput::Raw(PAGE.to_string()),
            "empty target counts as absent"
        );
    }

    #[test]
    fn empty_value_behaves_like_name_only() {
        assert!(matches!(
            parse_output(PAGE, Some("sid"), Some("")),
            ScrapeOutput::Elements(ref v) if v.len() == 1
        ));
    }
}
