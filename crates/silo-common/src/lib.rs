//! SILO Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, utilities, and error handling for the SILO workspace.
//!
//! # Overview
//!
//! This crate provides common functionality used across all SILO members:
//!
//! - **Error Handling**: Custom error types and result types
//! - **Logging**: tracing-based logging configuration
//! - **Intervals**: the half-open time-range type used by the ingestion core

pub mod error;
pub mod interval;
pub mod logging;

// Re-export commonly used types
pub use error::{Result, SiloError};
pub use interval::TimeRange;
