//! SILO ingestion core
//!
//! Idempotent pipeline that turns a tree of time-stamped sensor log files
//! into a deduplicated long-format dataset in an embedded SQLite store.
//!
//! Pipeline stages:
//! 1. Discovery: walk the target tree (zip archives included), extract
//!    metadata from the filename grammar
//! 2. Grouping: cluster files into sets sharing a name prefix
//! 3. Filtering: keep only the sets that still need work for some
//!    configured event window
//! 4. Transform: reshape each wide-format log into long-format records
//! 5. Load + mark: set-difference insert into `sensor_data`, then record
//!    the processed period, both in one transaction per file-set

pub mod config;
pub mod discovery;
pub mod filtering;
pub mod grouping;
pub mod metadata;
pub mod pipeline;
pub mod query;
pub mod store;
pub mod transform;

pub use config::{EventInfo, IngestConfig};
pub use metadata::FileMetadata;
pub use pipeline::{IngestPipeline, RunStats};
