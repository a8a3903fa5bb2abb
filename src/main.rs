//! # Review Harvest
//!
//! Harvests guest reviews of pet-friendly hotels from Rakuten Travel and
//! Jalan, reconciles the different names the two sites use for the same
//! venue, and scores every venue from weighted keyword categories over all
//! time and over the last 365 days.
//!
//! ## Features
//!
//! - Builds venue catalogs from search-result listings
//! - Checks catalog names against the venues' page titles
//! - Re-harvests only venues whose stored reviews are missing, legacy-shaped
//!   or older than the refresh window
//! - Walks paginated review sections with duplicate-page and 404 detection
//! - Shares one request rate limit across all concurrent harvest jobs
//! - Scores venues across sources after name normalization
//!
//! ## Usage
//!
//! ```sh
//! review_harvest catalog --source rakuten --search-url '<listing url>' -o catalogs/rakuten.csv
//! review_harvest run --rakuten-catalog catalogs/rakuten.csv --jalan-catalog catalogs/jalan.csv
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Catalog**: list venues per source (`catalog` subcommand or a hand-written CSV),
//!    optionally checked with the `verify` subcommand
//! 2. **Schedule**: compare the catalog against the store and pick stale venues
//! 3. **Harvest**: walk each picked venue's review pages (parallel, rate limited)
//! 4. **Store**: replace harvested records in the JSON store
//! 5. **Score**: group records by normalized name and write the score report

use chrono::{Duration as ChronoDuration, Local, Utc};
use clap::Parser;
use itertools::Itertools;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod catalog;
mod cli;
mod config;
mod error;
mod fetch;
mod harvest;
mod models;
mod outputs;
mod rate_limit;
mod resolve;
mod scoring;
mod sources;
mod utils;

use catalog::discovery::{DiscoverySettings, discover};
use catalog::verify::{VerifySettings, verified_items, verify_catalog, write_error_log};
use catalog::{CatalogEntry, load_catalog, write_catalog};
use cli::{CatalogArgs, Cli, Command, HarvestArgs, ReportArgs, StoreArgs, VerifyArgs};
use config::CategorySet;
use fetch::{HttpFetcher, RetryFetch};
use harvest::adapter::{AdapterSettings, SourceAdapter};
use harvest::orchestrator::{Orchestrator, apply_outcomes};
use harvest::scheduler::schedule;
use outputs::report::{build_report, write_report};
use outputs::store::ReviewStore;
use rate_limit::RateLimiter;
use utils::{ensure_writable_dir, parent_dir, truncate_for_log};

/// Base delay before the first retry of a transient failure.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("review_harvest starting up");

    let args = Cli::parse();
    debug!(?args.command, "Parsed CLI arguments");

    match args.command {
        Command::Catalog(catalog_args) => run_catalog(catalog_args).await?,
        Command::Verify(verify_args) => run_verify(verify_args).await?,
        Command::Harvest { store, harvest } => run_harvest(&store, &harvest).await?,
        Command::Score { store, report } => {
            let categories = CategorySet::load(&report.categories).await?;
            run_score(&store, &report, &categories).await?;
        }
        Command::Run {
            store,
            harvest,
            report,
        } => {
            // Load categories first so a broken config aborts before any fetching.
            let categories = CategorySet::load(&report.categories).await?;
            run_harvest(&store, &harvest).await?;
            run_score(&store, &report, &categories).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

fn build_fetcher(timeout_secs: u64, retries: usize) -> Result<RetryFetch<HttpFetcher>, Box<dyn Error>> {
    let http = HttpFetcher::new(Duration::from_secs(timeout_secs))?;
    Ok(RetryFetch::new(http, retries, RETRY_BASE_DELAY))
}

/// Walk search listings and write the catalog CSV.
#[instrument(level = "info", skip_all, fields(source = %args.source, output = %args.output.display()))]
async fn run_catalog(args: CatalogArgs) -> Result<(), Box<dyn Error>> {
    ensure_writable_dir(&parent_dir(&args.output)).await?;

    let pages = build_fetcher(args.timeout_secs, args.retries)?;
    let settings = DiscoverySettings {
        max_pages: args.max_pages.get(),
        page_delay: Duration::from_millis(args.page_delay_ms),
    };

    let items = discover(&pages, args.source, &args.search_urls, &settings).await;
    if items.is_empty() {
        warn!("No venues found; catalog not written");
        return Ok(());
    }
    write_catalog(&args.output, &items).await?;
    Ok(())
}

/// Check a catalog against the live pages; write passing rows and an error log.
#[instrument(level = "info", skip_all, fields(source = %args.source, catalog = %args.catalog.display()))]
async fn run_verify(args: VerifyArgs) -> Result<(), Box<dyn Error>> {
    let entries = load_catalog(&args.catalog, args.source).await?;
    ensure_writable_dir(&parent_dir(&args.output)).await?;
    ensure_writable_dir(&parent_dir(&args.error_log)).await?;

    let pages = build_fetcher(args.timeout_secs, args.retries)?;
    let settings = VerifySettings {
        threshold: args.threshold,
        request_delay: Duration::from_millis(args.page_delay_ms),
    };

    let results = verify_catalog(&pages, &entries, &settings).await;
    let verified = verified_items(&results);
    write_catalog(&args.output, &verified).await?;
    write_error_log(&args.error_log, &results).await?;

    info!(
        passed = verified.len(),
        failed = results.len() - verified.len(),
        verified = %args.output.display(),
        errors = %args.error_log.display(),
        "Catalog verified"
    );
    Ok(())
}

/// Load the configured catalogs, harvest stale venues and save the store.
#[instrument(level = "info", skip_all, fields(store = %store_args.store.display()))]
async fn run_harvest(store_args: &StoreArgs, args: &HarvestArgs) -> Result<(), Box<dyn Error>> {
    let catalogs = args.catalogs();
    if catalogs.is_empty() {
        error!("No catalog given; pass --rakuten-catalog and/or --jalan-catalog");
        return Err("no catalog configured".into());
    }

    let mut catalog: Vec<CatalogEntry> = Vec::new();
    for (source, path) in &catalogs {
        catalog.extend(load_catalog(path, *source).await?);
    }
    let catalog: Vec<CatalogEntry> = catalog
        .into_iter()
        .unique_by(|entry| entry.unique_id.clone())
        .collect();

    // An unreadable store aborts here, before anything could overwrite it.
    let mut store = ReviewStore::load(&store_args.store).await?;

    let freshness = ChronoDuration::days(i64::from(args.refresh_days));
    let plan = schedule(&catalog, &store, Utc::now(), freshness);

    if args.dry_run {
        for item in &plan {
            info!(
                unique_id = %item.entry.unique_id,
                name = %item.entry.name,
                reasons = %item.reasons.iter().join(","),
                "Would harvest"
            );
        }
        info!(scheduled = plan.len(), "Dry run; nothing fetched");
        return Ok(());
    }
    if plan.is_empty() {
        info!("Every venue is fresh; nothing to harvest");
        return Ok(());
    }

    if let Err(e) = ensure_writable_dir(&parent_dir(&store_args.store)).await {
        error!(
            path = %store_args.store.display(),
            error = %e,
            "Store directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let jobs: Vec<CatalogEntry> = plan.into_iter().map(|item| item.entry.clone()).collect();

    let pages = build_fetcher(args.timeout_secs, args.retries)?;
    let limiter = RateLimiter::new(args.requests_per_second);
    let settings = AdapterSettings {
        max_pages: args.max_pages.get(),
        page_delay: Duration::from_millis(args.page_delay_ms),
    };
    let mut adapter = SourceAdapter::new(&pages, &settings);
    if args.throttle_pages {
        adapter = adapter.with_page_throttle(&limiter);
    }
    let orchestrator = Orchestrator::new(adapter, &limiter, args.concurrency.get());

    let outcomes = orchestrator.run(jobs).await;
    let summary = apply_outcomes(outcomes, &mut store, Utc::now());

    for failure in &summary.failures {
        warn!(
            unique_id = %failure.unique_id,
            name = %failure.name,
            error = %truncate_for_log(&failure.error, 300),
            "Venue not harvested"
        );
    }
    info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        empty = summary.empty,
        failed = summary.failed,
        "Harvest summary"
    );

    store.save(&store_args.store).await?;
    Ok(())
}

/// Score every stored venue and write the report.
#[instrument(level = "info", skip_all, fields(store = %store_args.store.display(), output = %args.output.display()))]
async fn run_score(
    store_args: &StoreArgs,
    args: &ReportArgs,
    categories: &CategorySet,
) -> Result<(), Box<dyn Error>> {
    ensure_writable_dir(&parent_dir(&args.output)).await?;

    let store = ReviewStore::load(&store_args.store).await?;
    if store.is_empty() {
        warn!("Store is empty; run a harvest first");
    }
    if store.malformed_count() > 0 {
        warn!(
            malformed = store.malformed_count(),
            "Malformed store entries are left out of scoring"
        );
    }

    let report = build_report(&store, categories, Local::now().date_naive());
    write_report(&report, &args.output).await?;
    info!(venues = report.len(), "Scoring complete");
    Ok(())
}
