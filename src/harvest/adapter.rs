//! The per-venue pagination walk.
//!
//! A venue's reviews live in one or more [`Section`]s. Each section is walked
//! page by page until one of the [`Termination`] conditions holds:
//!
//! | Condition | Meaning |
//! |-----------|---------|
//! | `Empty` | the page carried no review fragments |
//! | `Duplicate` | the page's first review equals the previous page's first review |
//! | `NotFound` | HTTP 404 on a source where that marks the end of a section |
//! | `PageLimit` | the page ceiling was reached |
//!
//! Any other failure aborts the whole venue with a [`HarvestError`]; a failed
//! walk never reports zero reviews.

use itertools::Itertools;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::error::HarvestError;
use crate::fetch::PageSource;
use crate::models::ReviewRecord;
use crate::rate_limit::RateLimiter;
use crate::sources::{Section, Source};

/// Why a section walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Empty,
    Duplicate,
    NotFound,
    PageLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionReport {
    pub label: &'static str,
    /// Pages fetched successfully, including the one that ended the walk.
    pub pages: usize,
    pub termination: Termination,
}

/// Reviews of one venue, sections concatenated in harvest order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Harvest {
    pub reviews: Vec<ReviewRecord>,
    pub sections: Vec<SectionReport>,
}

impl Harvest {
    pub fn pages(&self) -> usize {
        self.sections.iter().map(|s| s.pages).sum()
    }
}

#[derive(Debug, Clone)]
pub struct AdapterSettings {
    /// Page ceiling per section.
    pub max_pages: usize,
    /// Pause before every page after the first of a section.
    pub page_delay: Duration,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            max_pages: 200,
            page_delay: Duration::from_millis(500),
        }
    }
}

/// Walks the review pages of one venue at a time.
pub struct SourceAdapter<'a, P> {
    pages: &'a P,
    settings: &'a AdapterSettings,
    page_limiter: Option<&'a RateLimiter>,
}

impl<'a, P> SourceAdapter<'a, P>
where
    P: PageSource,
{
    pub fn new(pages: &'a P, settings: &'a AdapterSettings) -> Self {
        Self {
            pages,
            settings,
            page_limiter: None,
        }
    }

    /// Also take a rate-limit grant before every follow-up page.
    pub fn with_page_throttle(mut self, limiter: &'a RateLimiter) -> Self {
        self.page_limiter = Some(limiter);
        self
    }

    /// Harvest every section of the venue at `locator`.
    #[instrument(level = "info", skip_all, fields(%source, %locator))]
    pub async fn harvest(&self, source: Source, locator: &str) -> Result<Harvest, HarvestError> {
        let sections = source
            .sections(locator)
            .ok_or_else(|| HarvestError::Locator {
                locator: locator.to_string(),
            })?;

        let mut harvest = Harvest::default();
        for section in &sections {
            let report = self
                .walk_section(source, section, &mut harvest.reviews)
                .await?;
            harvest.sections.push(report);
        }

        let ended = harvest
            .sections
            .iter()
            .map(|s| format!("{}:{:?}", s.label, s.termination))
            .join(",");
        info!(
            reviews = harvest.reviews.len(),
            pages = harvest.pages(),
            sections = %ended,
            "Harvested venue"
        );
        Ok(harvest)
    }

    async fn walk_section(
        &self,
        source: Source,
        section: &Section,
        reviews: &mut Vec<ReviewRecord>,
    ) -> Result<SectionReport, HarvestError> {
        let mut previous_first: Option<String> = None;
        let mut index = 0usize;
        let mut fetched = 0usize;

        let termination = loop {
            if index >= self.settings.max_pages {
                warn!(
                    section = section.label,
                    max_pages = self.settings.max_pages,
                    "Page ceiling reached; section may be incomplete"
                );
                break Termination::PageLimit;
            }
            if index > 0 {
                if let Some(limiter) = self.page_limiter {
                    limiter.acquire().await;
                }
                sleep(self.settings.page_delay).await;
            }

            let url = section.pagination.page_url(index);
            let html = match self.pages.get_page(&url).await {
                Ok(Some(html)) => html,
                Ok(None) if source.not_found_ends_section() => break Termination::NotFound,
                Ok(None) => {
                    return Err(HarvestError::UnexpectedNotFound {
                        url: url.to_string(),
                    });
                }
                Err(e) => {
                    return Err(HarvestError::Fetch {
                        url: url.to_string(),
                        source: e,
                    });
                }
            };
            fetched += 1;

            let fragments = source.extract_reviews(&html);
            let Some(first) = fragments.first() else {
                break Termination::Empty;
            };
            if previous_first.as_deref() == Some(first.text.as_str()) {
                break Termination::Duplicate;
            }
            previous_first = Some(first.text.clone());

            debug!(section = section.label, page = index + 1, count = fragments.len(), %url, "Extracted reviews");
            reviews.extend(fragments);
            index += 1;
        };

        debug!(section = section.label, pages = fetched, ?termination, "Section finished");
        Ok(SectionReport {
            label: section.label,
            pages: fetched,
            termination,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::CannedPages;

    const RAKUTEN: &str = "https://review.travel.rakuten.co.jp/hotel/voice/186671/?f_next=0";
    const JALAN: &str = "https://www.jalan.net/yad373723/kuchikomi/";

    fn rakuten_page(texts: &[&str]) -> String {
        texts
            .iter()
            .map(|t| format!(r#"<div class="commentBox"><p class="commentSentence">{t}</p><span class="time">2025年9月1日</span></div>"#))
            .collect()
    }

    fn jalan_page(texts: &[&str]) -> String {
        texts
            .iter()
            .map(|t| format!(r#"<div class="jlnpc-kuchikomiCassette"><p class="jlnpc-kuchikomiCassette__postBody">{t}</p></div>"#))
            .collect()
    }

    fn settings(max_pages: usize) -> AdapterSettings {
        AdapterSettings {
            max_pages,
            page_delay: Duration::ZERO,
        }
    }

    fn rakuten_url(offset: usize) -> String {
        format!("https://review.travel.rakuten.co.jp/hotel/voice/186671/?f_next={}", offset)
    }

    #[tokio::test]
    async fn test_duplicate_page_ends_walk() {
        let pages = CannedPages::new()
            .page(&rakuten_url(0), rakuten_page(&["a", "b"]))
            .page(&rakuten_url(20), rakuten_page(&["a", "b"]))
            .page(&rakuten_url(40), rakuten_page(&["c"]));
        let settings = settings(10);
        let adapter = SourceAdapter::new(&pages, &settings);

        let harvest = adapter.harvest(Source::Rakuten, RAKUTEN).await.unwrap();
        let texts: Vec<_> = harvest.reviews.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "b"]);
        assert_eq!(harvest.reviews[0].date.as_deref(), Some("2025-09-01"));
        assert_eq!(harvest.sections[0].termination, Termination::Duplicate);
        assert_eq!(pages.requested(), vec![rakuten_url(0), rakuten_url(20)]);
    }

    #[tokio::test]
    async fn test_empty_page_ends_walk() {
        let pages = CannedPages::new()
            .page(&rakuten_url(0), rakuten_page(&["a"]))
            .page(&rakuten_url(20), "<html><body>no reviews</body></html>");
        let settings = settings(10);
        let adapter = SourceAdapter::new(&pages, &settings);

        let harvest = adapter.harvest(Source::Rakuten, RAKUTEN).await.unwrap();
        assert_eq!(harvest.reviews.len(), 1);
        assert_eq!(harvest.sections[0].termination, Termination::Empty);
        assert_eq!(harvest.pages(), 2);
    }

    #[tokio::test]
    async fn test_jalan_walks_both_sections() {
        let pages = CannedPages::new()
            .page(JALAN, jalan_page(&["r1", "r2"]))
            .page("https://www.jalan.net/yad373723/kuchikomi/2.HTML", jalan_page(&["r3"]))
            .page("https://www.jalan.net/yad373723/kuchikomi/archive/", jalan_page(&["old1"]));
        let settings = settings(10);
        let adapter = SourceAdapter::new(&pages, &settings);

        let harvest = adapter.harvest(Source::Jalan, JALAN).await.unwrap();
        let texts: Vec<_> = harvest.reviews.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["r1", "r2", "r3", "old1"]);
        assert_eq!(harvest.sections.len(), 2);
        assert_eq!(harvest.sections[0].label, "recent");
        assert_eq!(harvest.sections[0].termination, Termination::NotFound);
        assert_eq!(harvest.sections[1].termination, Termination::NotFound);
        assert_eq!(
            pages.requested().last().map(String::as_str),
            Some("https://www.jalan.net/yad373723/kuchikomi/archive/2.HTML")
        );
    }

    #[tokio::test]
    async fn test_rakuten_not_found_is_an_error() {
        let pages = CannedPages::new().page(&rakuten_url(0), rakuten_page(&["a"]));
        let settings = settings(10);
        let adapter = SourceAdapter::new(&pages, &settings);

        let err = adapter.harvest(Source::Rakuten, RAKUTEN).await.unwrap_err();
        assert!(matches!(err, HarvestError::UnexpectedNotFound { ref url } if url == &rakuten_url(20)));
    }

    #[tokio::test]
    async fn test_transport_error_is_not_zero_reviews() {
        let pages = CannedPages::new()
            .page(JALAN, jalan_page(&["r1"]))
            .failing("2.HTML");
        let settings = settings(10);
        let adapter = SourceAdapter::new(&pages, &settings);

        let err = adapter.harvest(Source::Jalan, JALAN).await.unwrap_err();
        assert!(matches!(err, HarvestError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_page_limit_bounds_endless_source() {
        let mut pages = CannedPages::new();
        for page in 0..10 {
            pages = pages.page(&rakuten_url(page * 20), rakuten_page(&[format!("review {}", page).as_str()]));
        }
        let settings = settings(3);
        let adapter = SourceAdapter::new(&pages, &settings);

        let harvest = adapter.harvest(Source::Rakuten, RAKUTEN).await.unwrap();
        assert_eq!(harvest.reviews.len(), 3);
        assert_eq!(harvest.sections[0].termination, Termination::PageLimit);
        assert_eq!(pages.requested().len(), 3);
    }

    #[tokio::test]
    async fn test_unusable_locator() {
        let pages = CannedPages::new();
        let settings = settings(10);
        let adapter = SourceAdapter::new(&pages, &settings);

        let err = adapter
            .harvest(Source::Jalan, "https://www.jalan.net/theme/pet/")
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Locator { .. }));
        assert!(pages.requested().is_empty());
    }

    #[tokio::test]
    async fn test_page_throttle_spaces_follow_up_pages() {
        let pages = CannedPages::new()
            .page(&rakuten_url(0), rakuten_page(&["a"]))
            .page(&rakuten_url(20), rakuten_page(&["b"]))
            .page(&rakuten_url(40), "");
        let settings = settings(10);
        let limiter = RateLimiter::with_interval(Duration::from_millis(30));
        let t0 = tokio::time::Instant::now();
        limiter.acquire().await;
        let adapter = SourceAdapter::new(&pages, &settings).with_page_throttle(&limiter);

        let harvest = adapter.harvest(Source::Rakuten, RAKUTEN).await.unwrap();
        assert_eq!(harvest.reviews.len(), 2);
        assert!(t0.elapsed() >= Duration::from_millis(60));
    }
}
