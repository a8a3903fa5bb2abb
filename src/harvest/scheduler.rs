//! Differential refresh: decide which catalog venues need harvesting.
//!
//! A venue is harvested again when any of the following holds:
//!
//! | Reason | Trigger |
//! |--------|---------|
//! | `Missing` | no store entry under its unique id |
//! | `MalformedRecord` | the entry exists but is not a readable record |
//! | `LegacyReviews` | a review is a bare string or has no date |
//! | `MissingTimestamp` | `last_updated` is absent or unparseable |
//! | `Expired` | `last_updated` is older than the freshness window |
//!
//! Every matching reason is reported, not only the first.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use std::fmt;
use tracing::{debug, info, instrument};

use crate::catalog::CatalogEntry;
use crate::outputs::store::{ReviewStore, StoreEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    Missing,
    MalformedRecord,
    LegacyReviews,
    MissingTimestamp,
    Expired,
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StaleReason::Missing => "missing",
            StaleReason::MalformedRecord => "malformed-record",
            StaleReason::LegacyReviews => "legacy-reviews",
            StaleReason::MissingTimestamp => "missing-timestamp",
            StaleReason::Expired => "expired",
        };
        f.write_str(label)
    }
}

/// A catalog venue selected for harvesting, with every reason it was picked.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledHarvest<'a> {
    pub entry: &'a CatalogEntry,
    pub reasons: Vec<StaleReason>,
}

/// Parse a stored `last_updated` value.
///
/// RFC 3339 is preferred; naive ISO-8601 timestamps written by older
/// harvesters are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Why the entry stored for a venue is stale; empty when it is fresh.
pub fn stale_reasons(
    entry: Option<&StoreEntry>,
    now: DateTime<Utc>,
    freshness: Duration,
) -> Vec<StaleReason> {
    let record = match entry {
        None => return vec![StaleReason::Missing],
        Some(StoreEntry::Malformed(_)) => return vec![StaleReason::MalformedRecord],
        Some(StoreEntry::Record(record)) => record,
    };

    let mut reasons = Vec::new();
    if record.reviews.iter().any(|r| r.is_legacy_shape()) {
        reasons.push(StaleReason::LegacyReviews);
    }
    match record.last_updated.as_deref().and_then(parse_timestamp) {
        None => reasons.push(StaleReason::MissingTimestamp),
        Some(updated) if now - updated > freshness => reasons.push(StaleReason::Expired),
        Some(_) => {}
    }
    reasons
}

/// Select the catalog venues to harvest, in catalog order.
#[instrument(level = "info", skip_all, fields(catalog = catalog.len(), freshness_days = freshness.num_days()))]
pub fn schedule<'a>(
    catalog: &'a [CatalogEntry],
    store: &ReviewStore,
    now: DateTime<Utc>,
    freshness: Duration,
) -> Vec<ScheduledHarvest<'a>> {
    let scheduled: Vec<ScheduledHarvest<'a>> = catalog
        .iter()
        .filter_map(|entry| {
            let reasons = stale_reasons(store.get(&entry.unique_id), now, freshness);
            if reasons.is_empty() {
                debug!(unique_id = %entry.unique_id, "Fresh; skipping");
                return None;
            }
            debug!(
                unique_id = %entry.unique_id,
                reasons = %reasons.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
                "Scheduled"
            );
            Some(ScheduledHarvest { entry, reasons })
        })
        .collect();

    info!(
        scheduled = scheduled.len(),
        fresh = catalog.len() - scheduled.len(),
        "Planned harvest"
    );
    scheduled
}
