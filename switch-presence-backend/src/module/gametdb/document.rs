//! Minimal markup model the page extractor works against

use scraper::{Html, Selector};

/// An element with its attributes and flattened text
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MarkupElement {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: String,
}

impl MarkupElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }
}

pub trait MarkupDocument {
    /// Every element with the given tag, in document order
    fn elements(&self, tag: &str) -> Vec<MarkupElement>;

    /// First element with the given tag accepted by `predicate`
    fn find_first(&self, tag: &str, predicate: &dyn Fn(&MarkupElement) -> bool) -> Option<MarkupElement> {
        self.elements(tag).into_iter().find(|element| predicate(element))
    }
}

/// HTML document parsed with `scraper` (html5ever, never fails)
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }
}

impl MarkupDocument for HtmlDocument {
    fn elements(&self, tag: &str) -> Vec<MarkupElement> {
        let selector = match Selector::parse(tag) {
            Ok(selector) => selector,
            Err(e) => {
                tracing::warn!("Invalid tag selector '{}': {:?}", tag, e);
                return Vec::new();
            }
        };

        self.html
            .select(&selector)
            .map(|element| MarkupElement {
                tag: element.value().name().to_string(),
                attrs: element
                    .value()
                    .attrs()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
                text: element.text().collect::<String>(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_elements_in_order() {
        let doc = HtmlDocument::parse(
            r#"<html><body><img src="a.png"><p>x</p><img src="b.png" alt="b"></body></html>"#,
        );
        let images = doc.elements("img");
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].attr("src"), Some("a.png"));
        assert_eq!(images[1].attr("alt"), Some("b"));
    }

    #[test]
    fn test_find_first_with_class() {
        let doc = HtmlDocument::parse(
            r#"<h1>Plain</h1><h1 class="big notranslate">Marked <span>title</span></h1>"#,
        );
        let heading = doc.find_first("h1", &|e| e.has_class("notranslate")).unwrap();
        assert_eq!(heading.text, "Marked title");
        assert!(doc.find_first("h2", &|_| true).is_none());
    }
}
