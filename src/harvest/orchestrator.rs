//! Bounded-concurrency execution of a harvest plan.
//!
//! Jobs run `concurrency` at a time. Each job first takes a grant from the
//! shared [`RateLimiter`], then walks the venue with the [`SourceAdapter`].
//! A failing or panicking job is recorded and the batch carries on.

use chrono::{DateTime, SecondsFormat, Utc};
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, instrument, warn};

use super::adapter::{Harvest, SourceAdapter};
use crate::catalog::CatalogEntry;
use crate::error::HarvestError;
use crate::fetch::PageSource;
use crate::models::{SourceRecord, StoredReview};
use crate::outputs::store::ReviewStore;
use crate::rate_limit::RateLimiter;

/// Result of one venue's job.
#[derive(Debug)]
pub struct JobOutcome {
    pub entry: CatalogEntry,
    pub result: Result<Harvest, HarvestError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub unique_id: String,
    pub name: String,
    pub error: String,
}

/// Counters for one harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestSummary {
    pub attempted: usize,
    /// Jobs that produced at least one review.
    pub succeeded: usize,
    /// Jobs that finished without error but found no reviews.
    pub empty: usize,
    pub failed: usize,
    pub failures: Vec<JobFailure>,
}

pub struct Orchestrator<'a, P> {
    adapter: SourceAdapter<'a, P>,
    limiter: &'a RateLimiter,
    concurrency: usize,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<'a, P> Orchestrator<'a, P>
where
    P: PageSource,
{
    pub fn new(adapter: SourceAdapter<'a, P>, limiter: &'a RateLimiter, concurrency: usize) -> Self {
        Self {
            adapter,
            limiter,
            concurrency: concurrency.max(1),
        }
    }

    /// Run every job; outcomes arrive in completion order.
    #[instrument(level = "info", skip_all, fields(jobs = entries.len(), concurrency = self.concurrency))]
    pub async fn run(&self, entries: Vec<CatalogEntry>) -> Vec<JobOutcome> {
        let total = entries.len();
        info!(
            interval_ms = self.limiter.interval().as_millis(),
            "Starting harvest jobs"
        );

        stream::iter(entries.into_iter().enumerate())
            .map(|(i, entry)| async move {
                self.limiter.acquire().await;
                info!(index = i, total, unique_id = %entry.unique_id, name = %entry.name, "Harvesting venue");

                let job = self.adapter.harvest(entry.source, &entry.locator);
                let result = match AssertUnwindSafe(job).catch_unwind().await {
                    Ok(result) => result,
                    Err(payload) => Err(HarvestError::Panicked(panic_message(payload))),
                };
                if let Err(e) = &result {
                    error!(unique_id = %entry.unique_id, error = %e, "Harvest job failed");
                }
                JobOutcome { entry, result }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }
}

/// Fold job outcomes into the store and count them.
///
/// Only jobs with at least one review replace the stored record. Empty
/// harvests leave any existing record as it was.
pub fn apply_outcomes(
    outcomes: Vec<JobOutcome>,
    store: &mut ReviewStore,
    harvested_at: DateTime<Utc>,
) -> HarvestSummary {
    let timestamp = harvested_at.to_rfc3339_opts(SecondsFormat::Secs, false);
    let mut summary = HarvestSummary {
        attempted: outcomes.len(),
        ..HarvestSummary::default()
    };

    for JobOutcome { entry, result } in outcomes {
        match result {
            Ok(harvest) if harvest.reviews.is_empty() => {
                warn!(unique_id = %entry.unique_id, name = %entry.name, "No reviews found; keeping stored record");
                summary.empty += 1;
            }
            Ok(harvest) => {
                summary.succeeded += 1;
                store.upsert(SourceRecord {
                    unique_id: entry.unique_id,
                    hotel_name: entry.name,
                    url: entry.locator,
                    source: entry.source,
                    reviews: harvest.reviews.into_iter().map(StoredReview::from).collect(),
                    last_updated: Some(timestamp.clone()),
                });
            }
            Err(e) => {
                summary.failed += 1;
                summary.failures.push(JobFailure {
                    unique_id: entry.unique_id,
                    name: entry.name,
                    error: e.to_string(),
                });
            }
        }
    }
    summary
}
