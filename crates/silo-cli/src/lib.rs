//! SILO CLI library
//!
//! Command implementations for the `silo` binary.

pub mod commands;
