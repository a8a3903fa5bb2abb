//! Jalan review pages and search listings.
//!
//! A hotel's reviews are split into two sections: reviews from the last
//! year at `/yad{id}/kuchikomi/` and older ones at
//! `/yad{id}/kuchikomi/archive/`. Both page with a `{n}.HTML` path suffix
//! from page 2 on, and both answer 404 past their last page.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use super::{
    ListingItem, Pagination, Section, cut_before_first, element_text, extract_cassettes, with_query_param,
};
use crate::models::ReviewRecord;

/// Number of venues on one search-result page; the `idx` step.
pub const LISTING_PAGE_SIZE: usize = 30;

static YAD_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/yad(\d+)").expect("valid regex"));
static YAD_NO: Lazy<Regex> = Lazy::new(|| Regex::new(r"yadNo=(\d+)").expect("valid regex"));

static REVIEW_CASSETTE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".jlnpc-kuchikomiCassette").expect("valid selector"));
static REVIEW_TEXT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p.jlnpc-kuchikomiCassette__postBody").expect("valid selector"));
static REVIEW_DATE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".jlnpc-kuchikomiCassette__postDate, .jlnpc-kuchikomiCassette__lodgeDate")
        .expect("valid selector")
});
static LISTING_ITEM: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(".p-yadoCassette.p-searchResultItem.js-searchResultItem").expect("valid selector")
});
static LISTING_MAP_BUTTON: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a.p-searchResultItem__mapButton").expect("valid selector"));
static LISTING_NAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2.p-searchResultItem__facilityName").expect("valid selector"));
static LISTING_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href*=\"/yad\"]").expect("valid selector"));

/// The `yad` number from the path, or from a `yadNo` query parameter.
pub fn hotel_id(locator: &str) -> Option<String> {
    let url = Url::parse(locator).ok()?;
    if let Some(caps) = YAD_PATH.captures(url.path()) {
        return Some(caps[1].to_string());
    }
    url.query_pairs()
        .find(|(key, value)| key == "yadNo" && !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()))
        .map(|(_, value)| value.into_owned())
}

/// Canonical review-page locator for a hotel id.
pub fn review_locator(id: &str) -> String {
    format!("https://www.jalan.net/yad{}/kuchikomi/", id)
}

/// Recent and archived sections, whichever of the two the locator names.
///
/// Query parameters on the locator are carried over to both sections.
pub fn sections(locator: &str) -> Option<Vec<Section>> {
    let url = Url::parse(locator).ok()?;
    let id = hotel_id(locator)?;

    let mut recent = url.clone();
    recent.set_path(&format!("/yad{}/kuchikomi/", id));
    let mut archived = url;
    archived.set_path(&format!("/yad{}/kuchikomi/archive/", id));

    Some(vec![
        Section {
            label: "recent",
            pagination: Pagination::PathSegment { base: recent },
        },
        Section {
            label: "archived",
            pagination: Pagination::PathSegment { base: archived },
        },
    ])
}

pub fn extract_reviews(html: &str) -> Vec<ReviewRecord> {
    extract_cassettes(html, &REVIEW_CASSETTE, &REVIEW_TEXT, &REVIEW_DATE)
}

pub fn listing_page_url(seed: &Url, index: usize) -> Url {
    with_query_param(seed, "idx", &(index * LISTING_PAGE_SIZE).to_string())
}

/// Venues on a search-result page.
///
/// The id comes from the map button's `onclick` handler, falling back to
/// any link into a `/yad{id}/` page.
pub fn parse_listing(html: &str, page_url: &Url) -> Vec<ListingItem> {
    let document = Html::parse_document(html);
    document
        .select(&LISTING_ITEM)
        .filter_map(|item| {
            let from_map = item
                .select(&LISTING_MAP_BUTTON)
                .next()
                .and_then(|button| button.value().attr("onclick"))
                .and_then(|onclick| YAD_NO.captures(onclick))
                .map(|caps| caps[1].to_string());
            let id = from_map.or_else(|| {
                item.select(&LISTING_LINK)
                    .filter_map(|link| link.value().attr("href"))
                    .filter_map(|href| page_url.join(href).ok())
                    .find_map(|url| hotel_id(url.as_str()))
            })?;

            let name = item.select(&LISTING_NAME).next().map(element_text)?;
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

const TITLE_MARKERS: &[&str] = &["のクチコミ", "クチコミ", "の宿泊予約", "宿泊予約", "【", " - ", "｜", "|"];

/// Hotel name from a page title such as
/// `ホテルエピナール那須 クチコミ・感想・情報【じゃらんnet】`.
pub fn name_from_title(title: &str) -> Option<String> {
    cut_before_first(title, TITLE_MARKERS)
}
