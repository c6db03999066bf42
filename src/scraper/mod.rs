//! Chapter traversal: follow next-chapter links from a starting URL.
//!
//! The walk is strictly sequential because each page's own next-link is the
//! only way to reach the page after it. One bad page halts forward progress
//! (fail-fast, not skip-and-continue) but never loses chapters already
//! persisted.

mod client;
mod error;
mod extract;

pub use client::{PoliteClient, PoliteClientBuilder};
pub use error::{ExtractError, FetchError};
pub use extract::Selectors;

use crate::model::{Chapter, TerminationReason};
use crate::store::{ChapterStore, StoreError};
use extract::CompiledSelectors;
use reqwest::Url;

/// Capability to retrieve one page's HTML by absolute URL.
///
/// Implemented by [PoliteClient] for real runs; tests substitute in-memory
/// fetchers that deterministically succeed or fail.
pub trait PageFetcher {
    fn fetch(&mut self, url: &str) -> Result<String, FetchError>;
}

/// Result of one traversal: everything collected plus why it stopped.
#[derive(Debug)]
pub struct WalkOutcome {
    /// Chapters in traversal order, all persisted to disk.
    pub chapters: Vec<Chapter>,
    pub termination: TerminationReason,
}

/// Traversal state owned by the walker for the duration of one run.
///
/// `collected` is append-only and never exceeds the requested count; once a
/// termination reason is set the walk never resumes.
#[derive(Debug)]
struct TraversalState {
    current_url: String,
    collected: Vec<Chapter>,
    remaining_budget: u32,
    termination_reason: Option<TerminationReason>,
}

impl TraversalState {
    fn new(start_url: &str, budget: u32) -> Self {
        Self {
            current_url: start_url.to_string(),
            collected: Vec::new(),
            remaining_budget: budget,
            termination_reason: None,
        }
    }

    fn terminate(&mut self, reason: TerminationReason) {
        if self.termination_reason.is_none() {
            self.termination_reason = Some(reason);
        }
    }
}

/// Drives fetch -> extract -> persist across a bounded iteration count.
pub struct ChapterWalker<'a, F: PageFetcher> {
    fetcher: &'a mut F,
    selectors: CompiledSelectors,
    store: &'a ChapterStore,
    progress: Option<&'a dyn Fn(u32, u32)>,
}

impl<'a, F: PageFetcher> ChapterWalker<'a, F> {
    /// Build a walker. Selector strings are compiled here so a typo fails the
    /// run before any page is fetched.
    pub fn new(
        fetcher: &'a mut F,
        selectors: &Selectors,
        store: &'a ChapterStore,
    ) -> Result<Self, ExtractError> {
        Ok(Self {
            fetcher,
            selectors: selectors.compile()?,
            store,
            progress: None,
        })
    }

    /// Report (current chapter number, requested count) before each fetch.
    pub fn with_progress(mut self, progress: &'a dyn Fn(u32, u32)) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Walk up to `max_chapters` pages starting at `start_url`.
    ///
    /// Fetch and parse failures halt the traversal and are reported through
    /// [WalkOutcome::termination]; everything collected before the failure is
    /// returned and stays on disk. Only storage I/O errors surface as `Err`.
    pub fn walk(&mut self, start_url: &str, max_chapters: u32) -> Result<WalkOutcome, StoreError> {
        let mut state = TraversalState::new(start_url, max_chapters);

        while state.remaining_budget > 0 && state.termination_reason.is_none() {
            let number = state.collected.len() as u32 + 1;
            if let Some(p) = self.progress {
                p(number, max_chapters);
            }
            log::info!("Fetching chapter {} from {}", number, state.current_url);

            let html = match self.fetcher.fetch(&state.current_url) {
                Ok(html) => html,
                Err(e) => {
                    log::error!("Chapter {}: {}. Halting traversal.", number, e);
                    state.terminate(TerminationReason::FetchFailed);
                    break;
                }
            };

            let page = match extract::extract_page(&html, &self.selectors) {
                Ok(page) => page,
                Err(e) => {
                    log::error!(
                        "Chapter {} at {}: {}. Halting traversal.",
                        number,
                        state.current_url,
                        e
                    );
                    state.terminate(TerminationReason::ParseFailed);
                    break;
                }
            };

            let chapter = self.store.persist(number, &page.title, &page.body_text)?;
            state.collected.push(chapter);
            state.remaining_budget -= 1;

            match page.next_url {
                None => {
                    log::info!("No next-chapter link on {}. Novel ended.", state.current_url);
                    state.terminate(TerminationReason::NoNextLink);
                }
                Some(href) => match resolve_next_url(&state.current_url, &href) {
                    Some(next) => state.current_url = next,
                    None => {
                        log::warn!(
                            "Next link {:?} on {} is not a usable URL. Ending traversal.",
                            href,
                            state.current_url
                        );
                        state.terminate(TerminationReason::NoNextLink);
                    }
                },
            }
        }

        let termination = state
            .termination_reason
            .unwrap_or(TerminationReason::ExhaustedBudget);
        log::info!(
            "Scraped {} chapter(s): {}",
            state.collected.len(),
            termination
        );
        Ok(WalkOutcome {
            chapters: state.collected,
            termination,
        })
    }
}

/// Resolve a next-chapter href, which sites emit absolute or page-relative.
fn resolve_next_url(current: &str, href: &str) -> Option<String> {
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => Url::parse(current)
            .ok()?
            .join(href)
            .ok()
            .map(|url| url.to_string()),
    }
}
