//! CLI command implementations

pub mod query;
pub mod run;
