//! Venue catalogs: which venues to harvest on which source.
//!
//! One CSV per source with a `hotel_name,url` header. Files written by Excel
//! often start with a UTF-8 byte order mark, which is tolerated.
//!
//! Catalogs can be written by hand or built from search-result listings
//! with [`discovery`], and checked against the live pages with [`verify`].

pub mod discovery;
pub mod verify;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument, warn};

use crate::error::CatalogError;
use crate::sources::{ListingItem, Source};
use crate::utils::write_atomic;

/// A venue to harvest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub unique_id: String,
    pub name: String,
    /// Review-page URL the harvest starts from.
    pub locator: String,
    pub source: Source,
}

/// One CSV row as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub hotel_name: String,
    pub url: String,
}

/// Turn rows into entries, skipping rows without a recognizable hotel id
/// and collapsing rows with the same unique id (first row wins).
pub fn entries_from_rows(rows: Vec<CatalogRow>, source: Source) -> Vec<CatalogEntry> {
    rows.into_iter()
        .filter_map(|row| match source.unique_id(&row.url) {
            Some(unique_id) => Some(CatalogEntry {
                unique_id,
                name: row.hotel_name,
                locator: row.url,
                source,
            }),
            None => {
                warn!(%source, url = %row.url, hotel_name = %row.hotel_name, "No hotel id in catalog URL; skipping row");
                None
            }
        })
        .unique_by(|entry| entry.unique_id.clone())
        .collect()
}

pub fn parse_rows(content: &str) -> Result<Vec<CatalogRow>, csv::Error> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
        .deserialize()
        .collect()
}

/// Load the catalog CSV for `source`.
#[instrument(level = "info", skip_all, fields(path = %path.display(), %source))]
pub async fn load_catalog(path: &Path, source: Source) -> Result<Vec<CatalogEntry>, CatalogError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CatalogError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
    let rows = parse_rows(&content).map_err(|e| CatalogError::Csv {
        path: path.to_path_buf(),
        source: e,
    })?;

    let row_count = rows.len();
    let entries = entries_from_rows(rows, source);
    info!(rows = row_count, venues = entries.len(), "Loaded catalog");
    Ok(entries)
}

/// Write venues as a catalog CSV, replacing the file atomically.
///
/// The header row is written even when `items` is empty.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = items.len()))]
pub async fn write_catalog(path: &Path, items: &[ListingItem]) -> Result<(), CatalogError> {
    let csv_error = |e: csv::Error| CatalogError::Csv {
        path: path.to_path_buf(),
        source: e,
    };

    let mut writer = csv::Writer::from_writer(Vec::new());
    if items.is_empty() {
        writer.write_record(["hotel_name", "url"]).map_err(csv_error)?;
    }
    for item in items {
        writer
            .serialize(CatalogRow {
                hotel_name: item.name.clone(),
                url: item.locator.clone(),
            })
            .map_err(csv_error)?;
    }
    let bytes = writer.into_inner().map_err(|e| CatalogError::Write {
        path: path.to_path_buf(),
        source: e.into_error(),
    })?;

    write_atomic(path, &bytes)
        .await
        .map_err(|e| CatalogError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;
    info!("Wrote catalog");
    Ok(())
}
