//! Catalog quality check.
//!
//! Fetches every catalog venue's page, reads the venue name from its
//! `<title>` and compares it with the catalog name. Rows whose names are
//! similar enough go to a verified catalog; every other row gets a line in
//! an error log:
//!
//! ```text
//! [MISMATCH] Score: 0.31, CSV Name: ペンション ありの塔, Web Name: ホテル花, URL: https://...
//! [FETCH FAILED] URL: https://..., Error: page not found
//! [PARSE FAILED] URL: https://..., Error: page has no <title>
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};
use url::Url;

use super::CatalogEntry;
use crate::error::CatalogError;
use crate::fetch::PageSource;
use crate::sources::{ListingItem, page_title};
use crate::utils::write_atomic;

#[derive(Debug, Clone)]
pub struct VerifySettings {
    /// Lowest similarity, from 0 to 1, that counts as the same venue.
    pub threshold: f64,
    /// Pause between two venue requests.
    pub request_delay: Duration,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            request_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass { web_name: String, similarity: f64 },
    Mismatch { web_name: String, similarity: f64 },
    FetchFailed(String),
    ParseFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub entry: CatalogEntry,
    pub verdict: Verdict,
}

impl Verification {
    pub fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Pass { .. })
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let url = &self.entry.locator;
        match &self.verdict {
            Verdict::Pass { similarity, .. } => {
                write!(f, "[PASS] Score: {:.2}, CSV Name: {}, URL: {}", similarity, self.entry.name, url)
            }
            Verdict::Mismatch {
                web_name,
                similarity,
            } => write!(
                f,
                "[MISMATCH] Score: {:.2}, CSV Name: {}, Web Name: {}, URL: {}",
                similarity, self.entry.name, web_name, url
            ),
            Verdict::FetchFailed(error) => write!(f, "[FETCH FAILED] URL: {}, Error: {}", url, error),
            Verdict::ParseFailed(error) => write!(f, "[PARSE FAILED] URL: {}, Error: {}", url, error),
        }
    }
}

/// Similarity of two names from 0 (nothing shared) to 1 (identical).
pub fn name_similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a.trim(), b.trim())
}

async fn verify_entry<P: PageSource>(pages: &P, entry: &CatalogEntry, threshold: f64) -> Verdict {
    let url = match Url::parse(&entry.locator) {
        Ok(url) => url,
        Err(e) => return Verdict::FetchFailed(format!("invalid URL: {}", e)),
    };
    let html = match pages.get_page(&url).await {
        Ok(Some(html)) => html,
        Ok(None) => return Verdict::FetchFailed("page not found".to_string()),
        Err(e) => return Verdict::FetchFailed(e.to_string()),
    };

    let Some(title) = page_title(&html) else {
        return Verdict::ParseFailed("page has no <title>".to_string());
    };
    let Some(web_name) = entry.source.name_from_title(&title) else {
        return Verdict::ParseFailed(format!("unexpected title format: '{}'", title));
    };

    let similarity = name_similarity(&entry.name, &web_name);
    if similarity >= threshold {
        Verdict::Pass {
            web_name,
            similarity,
        }
    } else {
        Verdict::Mismatch {
            web_name,
            similarity,
        }
    }
}

/// Check every entry, one request at a time, in catalog order.
#[instrument(level = "info", skip_all, fields(entries = entries.len(), threshold = settings.threshold))]
pub async fn verify_catalog<P: PageSource>(
    pages: &P,
    entries: &[CatalogEntry],
    settings: &VerifySettings,
) -> Vec<Verification> {
    let total = entries.len();
    let mut results = Vec::with_capacity(total);

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 && !settings.request_delay.is_zero() {
            sleep(settings.request_delay).await;
        }
        let verdict = verify_entry(pages, entry, settings.threshold).await;
        let result = Verification {
            entry: entry.clone(),
            verdict,
        };
        if result.passed() {
            info!(index = i + 1, total, unique_id = %entry.unique_id, "{}", result);
        } else {
            warn!(index = i + 1, total, unique_id = %entry.unique_id, "{}", result);
        }
        results.push(result);
    }

    let passed = results.iter().filter(|r| r.passed()).count();
    info!(passed, failed = total - passed, "Verification complete");
    results
}

/// Catalog rows for the venues that passed.
pub fn verified_items(results: &[Verification]) -> Vec<ListingItem> {
    results
        .iter()
        .filter(|r| r.passed())
        .map(|r| ListingItem {
            name: r.entry.name.clone(),
            locator: r.entry.locator.clone(),
        })
        .collect()
}

/// Write one line per failed venue. An all-pass run leaves an empty log.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_error_log(path: &Path, results: &[Verification]) -> Result<(), CatalogError> {
    let log: String = results
        .iter()
        .filter(|r| !r.passed())
        .map(|r| format!("{}\n", r))
        .collect();
    write_atomic(path, log.as_bytes())
        .await
        .map_err(|source| CatalogError::Write {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::CannedPages;
    use crate::sources::Source;

    fn rakuten(id: u32, name: &str) -> CatalogEntry {
        CatalogEntry {
            unique_id: format!("rakuten_{}", id),
            name: name.to_string(),
            locator: format!("https://review.travel.rakuten.co.jp/hotel/voice/{}/?f_next=0", id),
            source: Source::Rakuten,
        }
    }

    fn titled(title: &str) -> String {
        format!("<html><head><title>{}</title></head><body></body></html>", title)
    }

    fn settings() -> VerifySettings {
        VerifySettings {
            request_delay: Duration::ZERO,
            ..VerifySettings::default()
        }
    }

    #[test]
    fn test_name_similarity() {
        assert_eq!(name_similarity("ペンション ありの塔", "ペンション ありの塔 "), 1.0);
        assert!((name_similarity("ペンション ありの塔", "ペンションありの塔") - 0.9).abs() < 1e-9);
        assert!(name_similarity("ペンション ありの塔", "ホテル全然違う名前") < 0.6);
    }

    #[tokio::test]
    async fn test_verify_catalog_sorts_rows() {
        let entries = vec![
            rakuten(1, "ペンション ありの塔"),
            rakuten(2, "ペンション ありの塔"),
            rakuten(3, "宿3"),
            rakuten(4, "宿4"),
            rakuten(5, "宿5"),
            rakuten(6, "宿6"),
        ];
        let pages = CannedPages::new()
            .page(&entries[0].locator, titled("【楽天トラベル】ペンションありの塔の詳細・宿泊予約"))
            .page(&entries[1].locator, titled("【楽天トラベル】ホテル全然違う名前の詳細"))
            .page(&entries[3].locator, "<html><body>no title</body></html>")
            .page(&entries[4].locator, titled("【楽天トラベル】"))
            .failing("/voice/6/");

        let results = verify_catalog(&pages, &entries, &settings()).await;
        assert_eq!(results.len(), 6);

        assert!(matches!(&results[0].verdict, Verdict::Pass { web_name, .. } if web_name == "ペンションありの塔"));
        assert!(matches!(&results[1].verdict, Verdict::Mismatch { web_name, .. } if web_name == "ホテル全然違う名前"));
        assert_eq!(results[2].verdict, Verdict::FetchFailed("page not found".into()));
        assert_eq!(results[3].verdict, Verdict::ParseFailed("page has no <title>".into()));
        assert!(matches!(&results[4].verdict, Verdict::ParseFailed(e) if e.contains("unexpected title format")));
        assert!(matches!(&results[5].verdict, Verdict::FetchFailed(e) if e.contains("connection reset")));

        let verified = verified_items(&results);
        assert_eq!(verified.len(), 1);
        assert_eq!(verified[0].name, "ペンション ありの塔");
    }

    #[tokio::test]
    async fn test_threshold_is_inclusive() {
        let entries = vec![rakuten(1, "ペンション ありの塔")];
        let pages = CannedPages::new().page(
            &entries[0].locator,
            titled("【楽天トラベル】ペンションありの塔の詳細"),
        );
        let strict = VerifySettings {
            threshold: 0.95,
            ..settings()
        };

        let results = verify_catalog(&pages, &entries, &strict).await;
        assert!(!results[0].passed());

        let exact = VerifySettings {
            threshold: name_similarity("ペンション ありの塔", "ペンションありの塔"),
            ..settings()
        };
        let results = verify_catalog(&pages, &entries, &exact).await;
        assert!(results[0].passed());
    }

    #[tokio::test]
    async fn test_write_error_log() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("verification_errors.log");
        let results = vec![
            Verification {
                entry: rakuten(1, "宿1"),
                verdict: Verdict::Pass {
                    web_name: "宿1".into(),
                    similarity: 1.0,
                },
            },
            Verification {
                entry: rakuten(2, "宿2"),
                verdict: Verdict::Mismatch {
                    web_name: "花".into(),
                    similarity: 0.25,
                },
            },
            Verification {
                entry: rakuten(3, "宿3"),
                verdict: Verdict::FetchFailed("page not found".into()),
            },
        ];

        write_error_log(&path, &results).await.unwrap();

        let log = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(
            lines,
            vec![
                "[MISMATCH] Score: 0.25, CSV Name: 宿2, Web Name: 花, URL: https://review.travel.rakuten.co.jp/hotel/voice/2/?f_next=0",
                "[FETCH FAILED] URL: https://review.travel.rakuten.co.jp/hotel/voice/3/?f_next=0, Error: page not found",
            ]
        );
    }
}
