//! Review harvesting: plan, walk and record.
//!
//! # Submodules
//!
//! - [`scheduler`]: picks the catalog venues whose stored data is missing or stale
//! - [`adapter`]: walks one venue's paginated review sections
//! - [`orchestrator`]: runs adapter jobs concurrently under the shared rate limit
//!   and folds their outcomes into the store

pub mod adapter;
pub mod orchestrator;
pub mod scheduler;
