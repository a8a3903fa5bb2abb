//! Review sources and their page layouts.
//!
//! Each source module knows three things about its site:
//!
//! 1. **Locators**: how to pull the numeric hotel id out of a review-page URL
//!    and how to rebuild the canonical review URL from that id
//! 2. **Pagination**: which sections a venue's reviews are split into and how
//!    the URL of page `n` of a section is formed
//! 3. **Extraction**: which HTML elements hold review text, post dates and,
//!    on search-result listings, venue names
//!
//! # Supported Sources
//!
//! | Source | Module | Review pagination | Sections | 404 |
//! |--------|--------|-------------------|----------|-----|
//! | Rakuten Travel | [`rakuten`] | `f_next` offset, step 20 | one | error |
//! | Jalan | [`jalan`] | `/{n}.HTML` path suffix | recent, archived | end of section |
//!
//! Rakuten is the preferred source when naming a venue listed on both.

pub mod jalan;
pub mod rakuten;

use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::ReviewRecord;

/// One of the fixed set of review platforms.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Rakuten,
    Jalan,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Source::Rakuten => "rakuten",
            Source::Jalan => "jalan",
        }
    }

    /// Naming priority when one venue is listed on several sources; lower wins.
    pub fn priority(self) -> u8 {
        match self {
            Source::Rakuten => 0,
            Source::Jalan => 1,
        }
    }

    /// The source-internal hotel id embedded in a locator.
    pub fn internal_id(self, locator: &str) -> Option<String> {
        match self {
            Source::Rakuten => rakuten::hotel_id(locator),
            Source::Jalan => jalan::hotel_id(locator),
        }
    }

    /// Source-qualified id used as the store key, e.g. `rakuten_186671`.
    pub fn unique_id(self, locator: &str) -> Option<String> {
        self.internal_id(locator)
            .map(|id| format!("{}_{}", self.as_str(), id))
    }

    /// The paginated review sections of the venue at `locator`, in harvest order.
    pub fn sections(self, locator: &str) -> Option<Vec<Section>> {
        match self {
            Source::Rakuten => rakuten::sections(locator),
            Source::Jalan => jalan::sections(locator),
        }
    }

    /// Whether a 404 marks the end of a section rather than a failure.
    pub fn not_found_ends_section(self) -> bool {
        match self {
            Source::Rakuten => false,
            Source::Jalan => true,
        }
    }

    /// Review fragments on one review page, in page order.
    pub fn extract_reviews(self, html: &str) -> Vec<ReviewRecord> {
        match self {
            Source::Rakuten => rakuten::extract_reviews(html),
            Source::Jalan => jalan::extract_reviews(html),
        }
    }

    /// URL of the `index`-th (0-based) page of a search-result listing.
    pub fn listing_page_url(self, seed: &Url, index: usize) -> Url {
        match self {
            Source::Rakuten => rakuten::listing_page_url(seed, index),
            Source::Jalan => jalan::listing_page_url(seed, index),
        }
    }

    /// Venues on one search-result listing page.
    pub fn parse_listing(self, html: &str, page_url: &Url) -> Vec<ListingItem> {
        match self {
            Source::Rakuten => rakuten::parse_listing(html, page_url),
            Source::Jalan => jalan::parse_listing(html, page_url),
        }
    }

    /// The venue name embedded in a page `<title>`.
    pub fn name_from_title(self, title: &str) -> Option<String> {
        match self {
            Source::Rakuten => rakuten::name_from_title(title),
            Source::Jalan => jalan::name_from_title(title),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A venue found on a search-result listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    pub name: String,
    /// Canonical review-page URL for the venue.
    pub locator: String,
}

/// An independently paginated run of review pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub label: &'static str,
    pub pagination: Pagination,
}

/// How the URL of page `n` of a section is formed.
#[derive(Debug, Clone, PartialEq)]
pub enum Pagination {
    /// A numeric offset query parameter, `step` reviews per page.
    Offset {
        base: Url,
        param: &'static str,
        step: usize,
    },
    /// Page 1 is `base`; page `n > 1` appends `{n}.HTML` to the base path.
    PathSegment { base: Url },
}

impl Pagination {
    /// URL of the `index`-th (0-based) page.
    pub fn page_url(&self, index: usize) -> Url {
        match self {
            Pagination::Offset { base, param, step } => {
                with_query_param(base, param, &(index * step).to_string())
            }
            Pagination::PathSegment { base } => {
                if index == 0 {
                    return base.clone();
                }
                let mut url = base.clone();
                let dir = base.path().trim_end_matches('/');
                url.set_path(&format!("{}/{}.HTML", dir, index + 1));
                url
            }
        }
    }
}

/// Replace (or add) a single query parameter, keeping the others in order.
pub fn with_query_param(url: &Url, key: &str, value: &str) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut updated = url.clone();
    updated
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);
    updated
}

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));

/// The trimmed text of the page's `<title>`, if it has a non-empty one.
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title = document.select(&TITLE).next().map(element_text)?;
    (!title.is_empty()).then_some(title)
}

/// The part of `text` before the earliest of `markers`, trimmed.
///
/// Text without any marker is returned whole. Empty results are `None`.
pub(crate) fn cut_before_first(text: &str, markers: &[&str]) -> Option<String> {
    let end = markers
        .iter()
        .filter_map(|marker| text.find(marker))
        .min()
        .unwrap_or(text.len());
    let name = text[..end].trim();
    (!name.is_empty()).then(|| name.to_string())
}

static REVIEW_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4})\s*[年/.\-]\s*(\d{1,2})\s*[月/.\-]\s*(\d{1,2})").expect("valid date regex")
});

/// Normalize a post date as printed on a page to `YYYY-MM-DD`.
///
/// Accepts `2024年5月3日`, `2024/05/03`, `2024.5.3` and `2024-05-03`,
/// optionally surrounded by other text such as `投稿日：`.
pub fn parse_review_date(raw: &str) -> Option<String> {
    let caps = REVIEW_DATE.captures(raw)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day).map(|date| date.format("%Y-%m-%d").to_string())
}

/// Text content of an element with runs of whitespace collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pull review fragments out of a page of review "cassettes".
///
/// Each `container` contributes one review whose text comes from `text` and
/// whose date comes from `date`. Pages without containers fall back to bare
/// `text` elements, which yields undated reviews.
pub(crate) fn extract_cassettes(
    html: &str,
    container: &Selector,
    text: &Selector,
    date: &Selector,
) -> Vec<ReviewRecord> {
    let document = Html::parse_document(html);

    let mut reviews: Vec<ReviewRecord> = document
        .select(container)
        .filter_map(|cassette| {
            let body = cassette.select(text).next().map(element_text)?;
            if body.is_empty() {
                return None;
            }
            let posted = cassette
                .select(date)
                .next()
                .and_then(|el| parse_review_date(&element_text(el)));
            Some(ReviewRecord::new(posted, body))
        })
        .collect();

    if reviews.is_empty() {
        reviews = document
            .select(text)
            .map(element_text)
            .filter(|body| !body.is_empty())
            .map(|body| ReviewRecord::new(None, body))
            .collect();
    }
    reviews
}
