//! Centralized default values for cold-start configuration.
//!
//! These are the fallbacks used when neither the command line nor a
//! configuration file provides a value.

use std::time::Duration;

// ============================================================================
// Run Defaults
// ============================================================================

/// Default number of rounds per target app and load tier.
pub const DEFAULT_ROUNDS: u16 = 10;

/// Default report file. The extension selects the report format.
pub const DEFAULT_OUTPUT: &str = "cold_start_results.xlsx";

/// Default wait between launching two background apps while preloading.
pub const DEFAULT_INTER_LAUNCH_DELAY: Duration = Duration::from_secs(3);

// ============================================================================
// Device Defaults
// ============================================================================

/// Default adb executable, resolved through `PATH`.
pub const DEFAULT_ADB: &str = "adb";

/// Default number of file-system cache drops while clearing the device.
///
/// A single drop has been observed to not reliably take effect, so the drop is
/// repeated with a settle time in between.
pub const DEFAULT_CACHE_DROP_ATTEMPTS: u32 = 3;

/// Default wait before each cache drop.
pub const DEFAULT_CACHE_DROP_SETTLE: Duration = Duration::from_secs(2);

/// Upper bound for the "go home" key event. All other device commands block
/// without a timeout.
pub const DEFAULT_HOME_TIMEOUT: Duration = Duration::from_secs(10);

/// Packages that are force-stopped in addition to the catalog.
pub const DEFAULT_EXTRA_FORCE_STOP: &[&str] = &["com.android.chrome"];

// ============================================================================
// Load Defaults
// ============================================================================

/// Number of moderate-footprint apps picked at random for the light tier.
pub const DEFAULT_LIGHT_COUNT: usize = 5;

/// Number of large-footprint apps added on top of the moderate catalog for the
/// heavy tier.
pub const DEFAULT_HEAVY_EXTRA_COUNT: usize = 2;

/// Wait after returning to the home screen once the load is in place.
pub const DEFAULT_HOME_SETTLE: Duration = Duration::from_secs(1);

// ============================================================================
// Measurement Defaults
// ============================================================================

/// File that receives the output of `am start -W` for the app under test.
pub const DEFAULT_CAPTURE_FILE: &str = "temp_startup_time.log";
