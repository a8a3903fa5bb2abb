//! Command-line interface definitions for Review Harvest.
//!
//! This module defines the CLI subcommands and options using the `clap` crate.
//! Every tuning knob can be provided via a command-line flag or an
//! environment variable.

use clap::{Args, Parser, Subcommand};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use url::Url;

use crate::sources::Source;

/// Command-line arguments for the Review Harvest application.
///
/// # Examples
///
/// ```sh
/// # Build a catalog from a Jalan search listing
/// review_harvest catalog --source jalan --search-url 'https://www.jalan.net/...' -o catalogs/jalan.csv
///
/// # Refresh stale venues, then score everything
/// review_harvest run --rakuten-catalog catalogs/rakuten.csv --jalan-catalog catalogs/jalan.csv \
///     -c config/categories.yml -o data/scores.json
///
/// # Only show what would be harvested
/// review_harvest harvest --jalan-catalog catalogs/jalan.csv --dry-run
///
/// # Check catalog names against the live pages
/// review_harvest verify --source rakuten -i catalogs/rakuten.csv -o catalogs/rakuten.verified.csv
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a venue catalog CSV from search-result listings
    Catalog(CatalogArgs),

    /// Check catalog names against the venues' page titles
    Verify(VerifyArgs),

    /// Harvest reviews for new and stale venues into the store
    Harvest {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        harvest: HarvestArgs,
    },

    /// Score every venue in the store and write the report
    Score {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        report: ReportArgs,
    },

    /// Harvest, then score
    Run {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        harvest: HarvestArgs,
        #[command(flatten)]
        report: ReportArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Path of the JSON review store
    #[arg(short, long, env = "HARVEST_STORE", default_value = "data/reviews.json")]
    pub store: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct HarvestArgs {
    /// Catalog CSV of Rakuten Travel venues
    #[arg(long, env = "HARVEST_RAKUTEN_CATALOG")]
    pub rakuten_catalog: Option<PathBuf>,

    /// Catalog CSV of Jalan venues
    #[arg(long, env = "HARVEST_JALAN_CATALOG")]
    pub jalan_catalog: Option<PathBuf>,

    /// Venues harvested at the same time
    #[arg(long, env = "HARVEST_CONCURRENCY", default_value = "4")]
    pub concurrency: NonZeroUsize,

    /// Shared request rate across all concurrent jobs
    #[arg(long, env = "HARVEST_RPS", default_value = "2.0", value_parser = parse_rate)]
    pub requests_per_second: f64,

    /// Stored venues older than this many days are harvested again
    #[arg(long, env = "HARVEST_REFRESH_DAYS", default_value = "30")]
    pub refresh_days: u32,

    /// Page ceiling per review section
    #[arg(long, env = "HARVEST_MAX_PAGES", default_value = "200")]
    pub max_pages: NonZeroUsize,

    /// Pause between two pages of one section, in milliseconds
    #[arg(long, env = "HARVEST_PAGE_DELAY_MS", default_value = "500")]
    pub page_delay_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, env = "HARVEST_TIMEOUT_SECS", default_value = "20")]
    pub timeout_secs: u64,

    /// Retries for transient request failures
    #[arg(long, env = "HARVEST_RETRIES", default_value = "3")]
    pub retries: usize,

    /// Take a rate-limit grant before every page, not only once per venue
    #[arg(long, env = "HARVEST_THROTTLE_PAGES")]
    pub throttle_pages: bool,

    /// Print the harvest plan and exit without fetching anything
    #[arg(long)]
    pub dry_run: bool,
}

impl HarvestArgs {
    /// Configured catalogs paired with their source.
    pub fn catalogs(&self) -> Vec<(Source, PathBuf)> {
        [
            (Source::Rakuten, self.rakuten_catalog.as_ref()),
            (Source::Jalan, self.jalan_catalog.as_ref()),
        ]
        .into_iter()
        .filter_map(|(source, path)| path.map(|p| (source, p.clone())))
        .collect()
    }
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    /// YAML file with keyword categories and weights
    #[arg(short, long, env = "HARVEST_CATEGORIES", default_value = "config/categories.yml")]
    pub categories: PathBuf,

    /// Path of the JSON score report
    #[arg(short, long, env = "HARVEST_REPORT", default_value = "data/scores.json")]
    pub output: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct CatalogArgs {
    /// Source whose listings are walked
    #[arg(long, value_enum)]
    pub source: Source,

    /// Search-result URL to start from; repeat for several areas
    #[arg(long = "search-url", required = true)]
    pub search_urls: Vec<Url>,

    /// Catalog CSV to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// Listing pages to request per search URL at most
    #[arg(long, env = "HARVEST_LISTING_MAX_PAGES", default_value = "50")]
    pub max_pages: NonZeroUsize,

    /// Pause between two listing pages, in milliseconds
    #[arg(long, env = "HARVEST_PAGE_DELAY_MS", default_value = "500")]
    pub page_delay_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, env = "HARVEST_TIMEOUT_SECS", default_value = "20")]
    pub timeout_secs: u64,

    /// Retries for transient request failures
    #[arg(long, env = "HARVEST_RETRIES", default_value = "3")]
    pub retries: usize,
}

#[derive(Args, Debug, Clone)]
pub struct VerifyArgs {
    /// Source the catalog belongs to
    #[arg(long, value_enum)]
    pub source: Source,

    /// Catalog CSV to check
    #[arg(short = 'i', long)]
    pub catalog: PathBuf,

    /// Catalog CSV receiving the rows that pass
    #[arg(short, long)]
    pub output: PathBuf,

    /// One line per row that failed
    #[arg(long, default_value = "verification_errors.log")]
    pub error_log: PathBuf,

    /// Lowest name similarity, from 0 to 1, that passes
    #[arg(long, env = "HARVEST_VERIFY_THRESHOLD", default_value = "0.6", value_parser = parse_threshold)]
    pub threshold: f64,

    /// Pause between two venue requests, in milliseconds
    #[arg(long, env = "HARVEST_PAGE_DELAY_MS", default_value = "500")]
    pub page_delay_ms: u64,

    /// Per-request timeout, in seconds
    #[arg(long, env = "HARVEST_TIMEOUT_SECS", default_value = "15")]
    pub timeout_secs: u64,

    /// Retries for transient request failures
    #[arg(long, env = "HARVEST_RETRIES", default_value = "3")]
    pub retries: usize,
}

fn parse_threshold(raw: &str) -> Result<f64, String> {
    let threshold: f64 = raw
        .parse()
        .map_err(|_| format!("`{}` is not a number", raw))?;
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err("threshold must be between 0 and 1".to_string())
    }
}

/// Slowest accepted request rate: one request every ~17 minutes.
const MIN_RATE: f64 = 0.001;
const MAX_RATE: f64 = 1000.0;

fn parse_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw
        .parse()
        .map_err(|_| format!("`{}` is not a number", raw))?;
    if (MIN_RATE..=MAX_RATE).contains(&rate) {
        Ok(rate)
    } else {
        Err(format!(
            "requests per second must be between {} and {}",
            MIN_RATE, MAX_RATE
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_harvest_defaults() {
        let cli = Cli::parse_from([
            "review_harvest",
            "harvest",
            "--jalan-catalog",
            "catalogs/jalan.csv",
        ]);

        let Command::Harvest { store, harvest } = cli.command else {
            panic!("expected harvest subcommand");
        };
        assert_eq!(store.store, PathBuf::from("data/reviews.json"));
        assert_eq!(harvest.concurrency.get(), 4);
        assert_eq!(harvest.requests_per_second, 2.0);
        assert_eq!(harvest.refresh_days, 30);
        assert_eq!(harvest.max_pages.get(), 200);
        assert!(!harvest.throttle_pages);
        assert_eq!(
            harvest.catalogs(),
            vec![(Source::Jalan, PathBuf::from("catalogs/jalan.csv"))]
        );
    }

    #[test]
    fn test_run_short_flags() {
        let cli = Cli::parse_from([
            "review_harvest",
            "run",
            "-s",
            "/tmp/store.json",
            "-c",
            "/tmp/categories.yml",
            "-o",
            "/tmp/scores.json",
            "--rakuten-catalog",
            "r.csv",
            "--concurrency",
            "8",
            "--throttle-pages",
        ]);

        let Command::Run { store, harvest, report } = cli.command else {
            panic!("expected run subcommand");
        };
        assert_eq!(store.store, PathBuf::from("/tmp/store.json"));
        assert_eq!(report.categories, PathBuf::from("/tmp/categories.yml"));
        assert_eq!(report.output, PathBuf::from("/tmp/scores.json"));
        assert_eq!(harvest.concurrency.get(), 8);
        assert!(harvest.throttle_pages);
    }

    #[test]
    fn test_rejects_bad_rate_and_zero_concurrency() {
        assert!(Cli::try_parse_from(["review_harvest", "harvest", "--requests-per-second", "0"]).is_err());
        assert!(Cli::try_parse_from(["review_harvest", "harvest", "--requests-per-second", "fast"]).is_err());
        assert!(Cli::try_parse_from(["review_harvest", "harvest", "--requests-per-second", "1e-30"]).is_err());
        assert!(Cli::try_parse_from(["review_harvest", "harvest", "--requests-per-second", "NaN"]).is_err());
        assert!(Cli::try_parse_from(["review_harvest", "harvest", "--requests-per-second", "inf"]).is_err());
        assert!(Cli::try_parse_from(["review_harvest", "harvest", "--concurrency", "0"]).is_err());
    }

    #[test]
    fn test_verify_args() {
        let cli = Cli::parse_from([
            "review_harvest",
            "verify",
            "--source",
            "rakuten",
            "-i",
            "catalogs/rakuten.csv",
            "-o",
            "catalogs/rakuten.verified.csv",
        ]);

        let Command::Verify(args) = cli.command else {
            panic!("expected verify subcommand");
        };
        assert_eq!(args.source, Source::Rakuten);
        assert_eq!(args.catalog, PathBuf::from("catalogs/rakuten.csv"));
        assert_eq!(args.error_log, PathBuf::from("verification_errors.log"));
        assert_eq!(args.threshold, 0.6);

        let too_high = Cli::try_parse_from([
            "review_harvest", "verify", "--source", "jalan", "-i", "a.csv", "-o", "b.csv", "--threshold", "1.5",
        ]);
        assert!(too_high.is_err());
    }

    #[test]
    fn test_catalog_args() {
        let cli = Cli::parse_from([
            "review_harvest",
            "catalog",
            "--source",
            "jalan",
            "--search-url",
            "https://www.jalan.net/theme/pet/tochigi/",
            "--search-url",
            "https://www.jalan.net/theme/pet/gunma/",
            "-o",
            "jalan.csv",
        ]);

        let Command::Catalog(args) = cli.command else {
            panic!("expected catalog subcommand");
        };
        assert_eq!(args.source, Source::Jalan);
        assert_eq!(args.search_urls.len(), 2);
        assert_eq!(args.max_pages.get(), 50);
    }
}
