//! The persisted review store.
//!
//! A single JSON object keyed by unique id:
//!
//! ```text
//! {
//!   "jalan_373723": {
//!     "hotel_name": "ホテルエピナール那須",
//!     "url": "https://www.jalan.net/yad373723/kuchikomi/",
//!     "source": "jalan",
//!     "reviews": [{"date": "2025-09-15", "text": "..."}],
//!     "last_updated": "2025-10-01T09:12:44+00:00"
//!   }
//! }
//! ```
//!
//! Entries keep the order they have in the file, and new venues are appended,
//! so the file reads in harvest order. Entries that cannot be read as a
//! [`SourceRecord`] are kept verbatim so a save never destroys data this
//! version does not understand.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::error::PersistError;
use crate::models::SourceRecord;
use crate::utils::write_atomic;

/// One value in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoreEntry {
    Record(SourceRecord),
    /// A value with the wrong shape, preserved as-is.
    Malformed(serde_json::Value),
}

impl StoreEntry {
    pub fn as_record(&self) -> Option<&SourceRecord> {
        match self {
            StoreEntry::Record(record) => Some(record),
            StoreEntry::Malformed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewStore {
    entries: IndexMap<String, StoreEntry>,
}

impl ReviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store at `path`. A missing file is an empty store.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, PersistError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No store yet; starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(PersistError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let store = Self::from_json_str(&content).map_err(|source| PersistError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(
            entries = store.len(),
            malformed = store.malformed_count(),
            "Loaded review store"
        );
        Ok(store)
    }

    /// Parse store JSON. Anything other than a JSON object is an error.
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        let raw: IndexMap<String, StoreEntry> = serde_json::from_str(content)?;
        let entries = raw
            .into_iter()
            .map(|(key, entry)| {
                let entry = match entry {
                    StoreEntry::Record(mut record) => {
                        if !record.unique_id.is_empty() && record.unique_id != key {
                            warn!(key = %key, unique_id = %record.unique_id, "Record id disagrees with its key; using the key");
                        }
                        record.unique_id = key.clone();
                        StoreEntry::Record(record)
                    }
                    malformed => {
                        warn!(key = %key, "Store entry has an unexpected shape; it will be re-harvested");
                        malformed
                    }
                };
                (key, entry)
            })
            .collect();
        Ok(Self { entries })
    }

    /// Write the store as pretty-printed JSON, replacing the file atomically.
    #[instrument(level = "info", skip_all, fields(path = %path.display(), entries = self.entries.len()))]
    pub async fn save(&self, path: &Path) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        write_atomic(path, json.as_bytes())
            .await
            .map_err(|source| PersistError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Saved review store");
        Ok(())
    }

    pub fn get(&self, unique_id: &str) -> Option<&StoreEntry> {
        self.entries.get(unique_id)
    }

    /// Insert or wholesale replace the record under its unique id.
    ///
    /// A replaced record keeps its position; a new one goes last.
    pub fn upsert(&mut self, record: SourceRecord) {
        self.entries
            .insert(record.unique_id.clone(), StoreEntry::Record(record));
    }

    /// Valid records in store order.
    pub fn records(&self) -> impl Iterator<Item = &SourceRecord> {
        self.entries.values().filter_map(StoreEntry::as_record)
    }

    pub fn malformed_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| matches!(entry, StoreEntry::Malformed(_)))
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReviewRecord, StoredReview};
    use crate::sources::Source;

    const STORE: &str = r#"{
        "jalan_373723": {
            "hotel_name": "ホテルエピナール那須",
            "url": "https://www.jalan.net/yad373723/kuchikomi/",
            "source": "jalan",
            "reviews": ["legacy text", {"date": "2025-09-15", "text": "おやつもたくさん"}],
            "last_updated": "2025-10-01T00:00:00"
        },
        "rakuten_1": {"hotel_name": "no source field"},
        "rakuten_2": [1, 2, 3]
    }"#;

    #[test]
    fn test_parses_records_and_keeps_malformed() {
        let store = ReviewStore::from_json_str(STORE).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.malformed_count(), 2);

        let record = store.get("jalan_373723").and_then(StoreEntry::as_record).unwrap();
        assert_eq!(record.unique_id, "jalan_373723");
        assert_eq!(record.reviews.len(), 2);
        assert!(record.reviews[0].is_legacy_shape());
        assert_eq!(store.records().count(), 1);
    }

    #[test]
    fn test_keeps_file_order() {
        let mut store = ReviewStore::from_json_str(
            r#"{
                "jalan_9": {"hotel_name": "ペンション ぽち", "source": "jalan"},
                "jalan_10": {"hotel_name": "ぽち", "source": "jalan"}
            }"#,
        )
        .unwrap();
        store.upsert(SourceRecord {
            unique_id: "jalan_1".into(),
            hotel_name: "新しい宿".into(),
            url: String::new(),
            source: Source::Jalan,
            reviews: Vec::new(),
            last_updated: None,
        });
        store.upsert(SourceRecord {
            unique_id: "jalan_9".into(),
            hotel_name: "ペンション ぽち".into(),
            url: String::new(),
            source: Source::Jalan,
            reviews: Vec::new(),
            last_updated: Some("2025-10-01T00:00:00+00:00".into()),
        });

        let ids: Vec<&str> = store.records().map(|r| r.unique_id.as_str()).collect();
        assert_eq!(ids, vec!["jalan_9", "jalan_10", "jalan_1"]);
    }

    #[tokio::test]
    async fn test_save_keeps_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store.json");
        let store = ReviewStore::from_json_str(
            r#"{"rakuten_9": {"hotel_name": "a", "source": "rakuten"},
                "jalan_10": {"hotel_name": "b", "source": "jalan"}}"#,
        )
        .unwrap();

        store.save(&path).await.unwrap();
        let saved = std::fs::read_to_string(&path).unwrap();
        let first = saved.find("rakuten_9").unwrap();
        let second = saved.find("jalan_10").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_rejects_non_object() {
        assert!(ReviewStore::from_json_str("[1, 2]").is_err());
        assert!(ReviewStore::from_json_str("not json").is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ReviewStore::load(&tmp.path().join("missing.json")).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_store_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(&path, "\"just a string\"").unwrap();

        let err = ReviewStore::load(&path).await.unwrap_err();
        assert!(matches!(err, PersistError::Parse { .. }));
    }

    #[tokio::test]
    async fn test_save_preserves_malformed_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data").join("store.json");

        let mut store = ReviewStore::from_json_str(STORE).unwrap();
        store.upsert(SourceRecord {
            unique_id: "rakuten_186671".into(),
            hotel_name: "ペンション ありの塔".into(),
            url: "https://review.travel.rakuten.co.jp/hotel/voice/186671/?f_next=0".into(),
            source: Source::Rakuten,
            reviews: vec![StoredReview::from(ReviewRecord::new(
                Some("2025-10-01".into()),
                "ドッグランが広い",
            ))],
            last_updated: Some("2025-10-02T00:00:00+00:00".into()),
        });
        store.save(&path).await.unwrap();

        let reloaded = ReviewStore::load(&path).await.unwrap();
        assert_eq!(reloaded, store);
        assert_eq!(reloaded.malformed_count(), 2);
        assert_eq!(reloaded.records().count(), 2);
    }
}
