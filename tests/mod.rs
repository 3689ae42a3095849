//! Integration tests for What's Next
//!
//! Tests are organized by component:
//! - tmdb_test: TMDB catalog client tests
//! - backend_test: Hosted backend client and remote store tests
//! - store_test: User store on device storage
//! - calendar_test: Release calendar built from the watchlist
//! - backup_test: Backup export/import
//! - cli_test: Argument parsing, JSON output and command handlers

// Note: Each test file is a separate integration test crate
// Tests are run individually by cargo, not via mod.rs
