//! Main-content extraction

use super::{ExtractError, Extracted, Extractor};
use scraper::{ElementRef, Html, Node, Selector};

/// Candidate containers, most specific first
const CONTENT_CANDIDATES: &[&str] = &[
    "article",
    "main",
    "[role=\"main\"]",
    ".markdown",
    ".md-content",
    ".document",
    "#content",
    "body",
];

const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Framework-agnostic extractor built on CSS candidate selectors
///
/// The title comes from `<title>`, falling back to the first `<h1>`. The main
/// content is the inner HTML of the first candidate container that has any
/// visible text; a page with no text at all yields empty content.
pub struct MainContentExtractor {
    candidates: Vec<Selector>,
    title: Option<Selector>,
    heading: Option<Selector>,
}

impl MainContentExtractor {
    pub fn new() -> Self {
        Self {
            candidates: CONTENT_CANDIDATES
                .iter()
                .filter_map(|s| Selector::parse(s).ok())
                .collect(),
            title: Selector::parse("title").ok(),
            heading: Selector::parse("h1").ok(),
        }
    }

    fn extract_title(&self, document: &Html) -> String {
        let first_text = |selector: &Option<Selector>| {
            selector.as_ref().and_then(|sel| {
                document
                    .select(sel)
                    .map(|el| collapse_whitespace(&el.text().collect::<String>()))
                    .find(|t| !t.is_empty())
            })
        };

        first_text(&self.title)
            .or_else(|| first_text(&self.heading))
            .unwrap_or_default()
    }

    fn extract_content(&self, document: &Html) -> String {
        for selector in &self.candidates {
            if let Some(element) = document.select(selector).find(has_text) {
                return element.inner_html().trim().to_string();
            }
        }
        String::new()
    }
}

impl Default for MainContentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for MainContentExtractor {
    fn extract(&self, html: &str) -> Result<Extracted, ExtractError> {
        if html.trim().is_empty() {
            return Err(ExtractError::EmptyDocument);
        }

        let document = Html::parse_document(html);

        Ok(Extracted {
            title: self.extract_title(&document),
            content: self.extract_content(&document),
        })
    }
}

/// Whether an element contains visible text (script and style bodies excluded)
fn has_text(element: &ElementRef<'_>) -> bool {
    element.descendants().any(|node| match node.value() {
        Node::Text(text) => {
            !text.trim().is_empty()
                && node
                    .parent()
                    .and_then(|parent| parent.value().as_element().map(|el| el.name()))
                    .map_or(true, |name| !INVISIBLE_TAGS.contains(&name))
        }
        _ => false,
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
