//! Structural extraction: one fetched page into (title, body text, next link).

use crate::scraper::error::ExtractError;
use scraper::{Html, Selector};

/// CSS selector configuration for chapter pages.
///
/// Defaults cover the common web-novel layout; override per site via config
/// file or CLI flags.
#[derive(Debug, Clone)]
pub struct Selectors {
    /// Selector for the chapter title element.
    pub title: String,
    /// Selector for the chapter content container.
    pub content: String,
    /// Selector for the next-chapter link. A page with no match is the end of
    /// the novel, not an error.
    pub next_link: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            title: "h1".to_string(),
            content: "div.chapter-content".to_string(),
            next_link: "a.next".to_string(),
        }
    }
}

impl Selectors {
    /// Compile all three selectors up front so a typo fails the run before any
    /// page is fetched, instead of surfacing as a bogus parse failure mid-walk.
    pub(crate) fn compile(&self) -> Result<CompiledSelectors, ExtractError> {
        Ok(CompiledSelectors {
            title: parse_selector(&self.title)?,
            content: parse_selector(&self.content)?,
            next_link: parse_selector(&self.next_link)?,
            source: self.clone(),
        })
    }
}

fn parse_selector(sel: &str) -> Result<Selector, ExtractError> {
    Selector::parse(sel).map_err(|e| ExtractError::InvalidSelector {
        selector: sel.to_string(),
        reason: e.to_string(),
    })
}

/// Pre-parsed selectors plus the original strings for error messages.
#[derive(Debug, Clone)]
pub(crate) struct CompiledSelectors {
    title: Selector,
    content: Selector,
    next_link: Selector,
    source: Selectors,
}

/// One page's extracted fields. `next_url` is the raw href, resolved against
/// the page URL by the walker.
#[derive(Debug, Clone)]
pub(crate) struct ExtractedPage {
    pub title: String,
    pub body_text: String,
    pub next_url: Option<String>,
}

/// Parse a chapter page. Title and content are required; a missing next link
/// just means the chain ended.
pub(crate) fn extract_page(
    html: &str,
    selectors: &CompiledSelectors,
) -> Result<ExtractedPage, ExtractError> {
    let doc = Html::parse_document(html);

    let title = doc
        .select(&selectors.title)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ExtractError::MissingTitle {
            selector: selectors.source.title.clone(),
        })?;

    let body_text = doc
        .select(&selectors.content)
        .next()
        .map(|el| {
            el.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|b| !b.is_empty())
        .ok_or_else(|| ExtractError::MissingContent {
            selector: selectors.source.content.clone(),
        })?;

    let next_url = doc
        .select(&selectors.next_link)
        .next()
        .and_then(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(String::from);

    Ok(ExtractedPage {
        title,
        body_text,
        next_url,
    })
}
