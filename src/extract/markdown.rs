//! HTML to Markdown conversion

use super::{ConvertError, Converter};
use htmd::HtmlToMarkdown;

/// Tags whose subtrees never reach the Markdown output
const SKIPPED_TAGS: &[&str] = &["script", "style", "nav", "footer", "noscript"];

/// [`Converter`] backed by `htmd`
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmdConverter;

impl HtmdConverter {
    pub fn new() -> Self {
        Self
    }

    fn converter() -> HtmlToMarkdown {
        HtmlToMarkdown::builder()
            .skip_tags(SKIPPED_TAGS.to_vec())
            .build()
    }
}

impl Converter for HtmdConverter {
    fn convert(&self, html: &str) -> Result<String, ConvertError> {
        let markdown = Self::converter()
            .convert(html)
            .map_err(|e| ConvertError::Conversion(e.to_string()))?;

        Ok(markdown.trim().to_string())
    }
}
