//! JSON score report.
//!
//! One entry per resolved venue, keyed by its representative name:
//!
//! ```text
//! {
//!   "ペンション ありの塔": {
//!     "all_time":      { "score": 41.2, "total_reviews": 87, ... },
//!     "last_365_days": { "score": 48.0, "total_reviews": 12, ... },
//!     "sources": ["rakuten", "jalan"]
//!   }
//! }
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::config::CategorySet;
use crate::error::PersistError;
use crate::outputs::store::ReviewStore;
use crate::resolve::group_records;
use crate::scoring::{DateWindow, ScoreResult, score_reviews};
use crate::sources::Source;
use crate::utils::write_atomic;

/// Days covered by the recent-score window.
pub const RECENT_WINDOW_DAYS: u64 = 365;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueReport {
    pub all_time: ScoreResult,
    pub last_365_days: ScoreResult,
    pub sources: Vec<Source>,
}

pub type ScoreReport = BTreeMap<String, VenueReport>;

/// Resolve the store into venues and score each one.
///
/// `today` anchors the recent window, which starts `365` days earlier.
#[instrument(level = "info", skip_all, fields(records = store.len(), %today))]
pub fn build_report(store: &ReviewStore, categories: &CategorySet, today: NaiveDate) -> ScoreReport {
    let window = DateWindow::last_days(today, RECENT_WINDOW_DAYS);
    let groups = group_records(store.records());
    info!(venues = groups.len(), "Resolved venues");

    let mut report = ScoreReport::new();
    for group in &groups {
        let reviews = group.reviews();
        let all_time = score_reviews(&reviews, categories, None);
        let last_365_days = score_reviews(&reviews, categories, Some(&window));
        let sources = group.sources();

        debug!(
            name = %group.representative_name,
            all_time = all_time.score,
            recent = last_365_days.score,
            reviews = all_time.total_reviews,
            hits = ?all_time.category_hits,
            sources = %sources.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(","),
            "Scored venue"
        );

        let entry = VenueReport {
            all_time,
            last_365_days,
            sources,
        };
        if report.insert(group.representative_name.clone(), entry).is_some() {
            warn!(name = %group.representative_name, "Two venues share a display name; the later one wins");
        }
    }
    report
}

/// Write the report as pretty-printed JSON, replacing the file atomically.
#[instrument(level = "info", skip_all, fields(path = %path.display(), venues = report.len()))]
pub async fn write_report(report: &ScoreReport, path: &Path) -> Result<(), PersistError> {
    let json = serde_json::to_string_pretty(report)?;
    write_atomic(path, json.as_bytes())
        .await
        .map_err(|source| PersistError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    info!("Wrote score report");
    Ok(())
}
