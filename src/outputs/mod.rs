//! Persisted outputs: the review store and the score report.
//!
//! # Submodules
//!
//! - [`store`]: the JSON review store keyed by unique id, read and rewritten by every harvest
//! - [`report`]: the per-venue score report produced from the store
//!
//! # Output Structure
//!
//! ```text
//! data/
//! ├── reviews.json   # ReviewStore
//! └── scores.json    # ScoreReport
//! ```

pub mod report;
pub mod store;
