pub mod catalog;
pub mod cli;
pub mod config;
pub mod data;
pub mod defaults;
pub mod device;
pub mod experiment;
pub mod load;
pub mod logging;
pub mod pause;
pub mod reporting;
pub mod stats;
pub mod timer;

// Test helpers module - made public for use in unit tests, integration tests, and benchmarks
// This is conditionally compiled to avoid including test code in release builds
#[doc(hidden)]
#[cfg(any(test, doctest, feature = "test-helpers"))]
pub mod test_helpers;
