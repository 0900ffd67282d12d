//! Integration tests for the podfbv bridge
//!
//! Each test runs the full supervisor (five role threads, reset protocol)
//! against virtual devices.
//!
//! Test categories:
//! - Translation: FBV → POD rules and POD → FBV state sync, end to end
//! - Lifecycle: reconnect, backoff, stop requests, fatal errors, teardown
//!
//! Run with:
//! ```bash
//! cargo test -p podfbv --test integration_tests
//! ```

mod helpers;
mod integration;

// Re-run individual test modules
pub use integration::*;
