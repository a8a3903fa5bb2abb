//! Rakuten Travel review pages and search listings.
//!
//! Reviews for a hotel live under
//! `https://review.travel.rakuten.co.jp/hotel/voice/{id}/` and are paged with
//! an `f_next` offset that advances by [`REVIEWS_PER_PAGE`]. Search listings
//! page with `f_page`, starting at 1.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use super::{
    ListingItem, Pagination, Section, cut_before_first, element_text, extract_cassettes, with_query_param,
};
use crate::models::ReviewRecord;

/// Number of reviews on one review page; the `f_next` step.
pub const REVIEWS_PER_PAGE: usize = 20;

static REVIEW_BOX: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".commentBox").expect("valid selector"));
static REVIEW_TEXT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".commentSentence").expect("valid selector"));
static REVIEW_DATE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".commentDate, .time").expect("valid selector"));
static LISTING_CARD: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li.htl-list-card").expect("valid selector"));
static LISTING_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2.hotel-list__title-text a[href]").expect("valid selector"));

/// The hotel id: the first all-digit path segment.
///
/// Works for review pages (`/hotel/voice/186671/`) as well as detail pages
/// (`/HOTEL/186671/186671.html`).
pub fn hotel_id(locator: &str) -> Option<String> {
    let url = Url::parse(locator).ok()?;
    url.path_segments()?
        .find(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

/// Canonical review-page locator for a hotel id.
pub fn review_locator(id: &str) -> String {
    format!("https://review.travel.rakuten.co.jp/hotel/voice/{}/?f_next=0", id)
}

pub fn sections(locator: &str) -> Option<Vec<Section>> {
    let base = Url::parse(locator).ok()?;
    hotel_id(locator)?;
    Some(vec![Section {
        label: "reviews",
        pagination: Pagination::Offset {
            base,
            param: "f_next",
            step: REVIEWS_PER_PAGE,
        },
    }])
}

pub fn extract_reviews(html: &str) -> Vec<ReviewRecord> {
    extract_cassettes(html, &REVIEW_BOX, &REVIEW_TEXT, &REVIEW_DATE)
}

pub fn listing_page_url(seed: &Url, index: usize) -> Url {
    with_query_param(seed, "f_page", &(index + 1).to_string())
}

/// Venues on a search-result page; links are resolved against `page_url`.
pub fn parse_listing(html: &str, page_url: &Url) -> Vec<ListingItem> {
    let document = Html::parse_document(html);
    document
        .select(&LISTING_CARD)
        .filter_map(|card| {
            let link = card.select(&LISTING_LINK).next()?;
            let detail = page_url.join(link.value().attr("href")?).ok()?;
            let id = hotel_id(detail.as_str())?;
            let name = element_text(link);
            if name.is_empty() {
                return None;
            }
            Some(ListingItem {
                name,
                locator: review_locator(&id),
            })
        })
        .collect()
}

const TITLE_SUFFIXES: &[&str] = &["の詳細", "の口コミ", "の宿泊予約"];

/// Hotel name from a page title.
///
/// Detail pages read `【楽天トラベル】{name}の詳細・宿泊予約`; review pages put
/// the bracketed site tag last.
pub fn name_from_title(title: &str) -> Option<String> {
    let body = match title.split_once('】') {
        Some((_, rest)) if !rest.trim().is_empty() => rest,
        _ => title.split('【').next()?,
    };
    cut_before_first(body, TITLE_SUFFIXES)
}
