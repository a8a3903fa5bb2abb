//! Build a catalog by walking search-result listings.
//!
//! Starting from each seed URL, listing pages are requested in order until a
//! page is empty, a page adds no venue that was not already seen, or the page
//! ceiling is reached. Listings tend to repeat their last page forever
//! instead of answering 404, hence the "no new venues" stop.

use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::fetch::PageSource;
use crate::sources::{ListingItem, Source};

#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    /// Listing pages to request per seed at most.
    pub max_pages: usize,
    /// Pause between two listing pages of one seed.
    pub page_delay: Duration,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            max_pages: 50,
            page_delay: Duration::from_millis(500),
        }
    }
}

/// Venues listed under `seeds`, de-duplicated by unique id, in discovery order.
#[instrument(level = "info", skip_all, fields(%source, seeds = seeds.len()))]
pub async fn discover<P: PageSource>(
    pages: &P,
    source: Source,
    seeds: &[Url],
    settings: &DiscoverySettings,
) -> Vec<ListingItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut found: Vec<ListingItem> = Vec::new();

    for seed in seeds {
        for index in 0..settings.max_pages {
            if index > 0 {
                sleep(settings.page_delay).await;
            }
            let url = source.listing_page_url(seed, index);

            let html = match pages.get_page(&url).await {
                Ok(Some(html)) => html,
                Ok(None) => {
                    debug!(%url, "Listing page not found; seed exhausted");
                    break;
                }
                Err(e) => {
                    error!(%seed, %url, error = %e, "Listing page failed; skipping rest of seed");
                    break;
                }
            };

            let items = source.parse_listing(&html, &url);
            if items.is_empty() {
                debug!(%url, page = index + 1, "Empty listing page");
                break;
            }

            let before = found.len();
            for item in items {
                let Some(unique_id) = source.unique_id(&item.locator) else {
                    continue;
                };
                if seen.insert(unique_id) {
                    found.push(item);
                }
            }
            let added = found.len() - before;
            debug!(%url, page = index + 1, added, "Parsed listing page");

            if added == 0 && index > 0 {
                debug!(%url, "Listing page repeats known venues; seed exhausted");
                break;
            }
            if index + 1 == settings.max_pages {
                warn!(%seed, max_pages = settings.max_pages, "Listing page ceiling reached");
            }
        }
    }

    info!(venues = found.len(), "Discovery finished");
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::CannedPages;

    fn rakuten_page(ids: &[u32]) -> String {
        ids.iter()
            .map(|id| {
                format!(
                    r#"<li class="htl-list-card"><h2 class="hotel-list__title-text"><a href="https://travel.rakuten.co.jp/HOTEL/{id}/{id}.html">宿{id}</a></h2></li>"#
                )
            })
            .collect()
    }

    fn settings() -> DiscoverySettings {
        DiscoverySettings {
            max_pages: 10,
            page_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_stops_when_page_repeats() {
        let seed = Url::parse("https://search.example/list?area=nasu").unwrap();
        let pages = CannedPages::new()
            .page("https://search.example/list?area=nasu&f_page=1", rakuten_page(&[1, 2]))
            .page("https://search.example/list?area=nasu&f_page=2", rakuten_page(&[2, 3]))
            .page("https://search.example/list?area=nasu&f_page=3", rakuten_page(&[3]))
            .page("https://search.example/list?area=nasu&f_page=4", rakuten_page(&[4]));

        let items = discover(&pages, Source::Rakuten, &[seed], &settings()).await;
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["宿1", "宿2", "宿3"]);
        assert_eq!(pages.requested().len(), 3);
    }

    #[tokio::test]
    async fn test_stops_on_empty_page_and_skips_failing_seed() {
        let good = Url::parse("https://search.example/good").unwrap();
        let broken = Url::parse("https://search.example/broken").unwrap();
        let pages = CannedPages::new()
            .page("https://search.example/good?f_page=1", rakuten_page(&[7]))
            .page("https://search.example/good?f_page=2", "<html></html>")
            .failing("broken");

        let items = discover(&pages, Source::Rakuten, &[broken, good], &settings()).await;
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].locator,
            "https://review.travel.rakuten.co.jp/hotel/voice/7/?f_next=0"
        );
    }

    #[tokio::test]
    async fn test_respects_page_ceiling() {
        let seed = Url::parse("https://search.example/list").unwrap();
        let pages = CannedPages::new()
            .page("https://search.example/list?f_page=1", rakuten_page(&[1]))
            .page("https://search.example/list?f_page=2", rakuten_page(&[2]))
            .page("https://search.example/list?f_page=3", rakuten_page(&[3]));
        let settings = DiscoverySettings {
            max_pages: 2,
            page_delay: Duration::ZERO,
        };

        let items = discover(&pages, Source::Rakuten, &[seed], &settings).await;
        assert_eq!(items.len(), 2);
    }
}
