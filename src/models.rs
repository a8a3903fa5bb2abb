//! Data models for harvested reviews and the records kept in the store.
//!
//! This module defines the core data structures shared by the harvest and
//! scoring stages:
//! - [`ReviewRecord`]: one review as extracted from a source page
//! - [`StoredReview`]: the persisted shape of a review, including legacy forms
//! - [`SourceRecord`]: everything known about one venue on one source
//!
//! Field names follow the JSON layout of the persisted store
//! (`hotel_name`, `url`, `last_updated`).

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::sources::Source;

/// A single review as harvested from a source page.
///
/// The `date` key must be present when reading, though it may be `null`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ReviewRecord {
    /// Post date as `YYYY-MM-DD`, when the page showed one.
    #[serde(deserialize_with = "present_date")]
    pub date: Option<String>,
    /// The review body with whitespace collapsed.
    pub text: String,
}

impl ReviewRecord {
    pub fn new(date: Option<String>, text: impl Into<String>) -> Self {
        Self {
            date,
            text: text.into(),
        }
    }

    /// The post date, if present and parseable.
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
    }
}

// A plain `Option` field would also accept a missing key.
fn present_date<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)
}

/// A review as it appears in the persisted store.
///
/// Older harvests stored bare strings, or objects without a `date` key.
/// Those still load and are saved back unchanged, but they are not scored
/// and the scheduler treats them as a reason to harvest the venue again.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum StoredReview {
    Structured(ReviewRecord),
    Legacy(String),
    /// Any other shape, kept verbatim.
    Other(serde_json::Value),
}

impl StoredReview {
    /// Everything except a dated structured review is a legacy shape.
    pub fn is_legacy_shape(&self) -> bool {
        match self {
            StoredReview::Structured(review) => review.date.is_none(),
            StoredReview::Legacy(_) | StoredReview::Other(_) => true,
        }
    }

    /// The review in scoring form; only structured reviews are scored.
    pub fn scorable(&self) -> Option<&ReviewRecord> {
        match self {
            StoredReview::Structured(review) => Some(review),
            StoredReview::Legacy(_) | StoredReview::Other(_) => None,
        }
    }
}

impl From<ReviewRecord> for StoredReview {
    fn from(review: ReviewRecord) -> Self {
        StoredReview::Structured(review)
    }
}

/// Everything known about one venue on one source.
///
/// Created on the first successful harvest and replaced wholesale by every
/// later one; review lists are never merged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SourceRecord {
    /// Source-qualified id, e.g. `jalan_373723`. Mirrors the store key.
    #[serde(default)]
    pub unique_id: String,
    /// Venue name as listed on the source.
    pub hotel_name: String,
    /// Review-page locator the reviews were harvested from.
    #[serde(default)]
    pub url: String,
    pub source: Source,
    #[serde(default)]
    pub reviews: Vec<StoredReview>,
    /// RFC 3339 timestamp of the last successful harvest.
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl SourceRecord {
    /// The scorable reviews of this record, in stored order.
    pub fn review_records(&self) -> impl Iterator<Item = ReviewRecord> + '_ {
        self.reviews.iter().filter_map(StoredReview::scorable).cloned()
    }
}
