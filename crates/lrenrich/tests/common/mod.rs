//! Shared test utilities for lrenrich integration tests.
//!
//! This module provides:
//! - `TestHarness` for an isolated catalog with its preview folders
//! - Builders for configurations, catalogs and canned analyzers

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
