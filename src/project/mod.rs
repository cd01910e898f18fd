//! JSON project files.

/// Project schema, validation and session construction.
pub mod config;
