use std::time::Duration;

/// Activity manager invocation that waits for the launch to complete and
/// reports `ThisTime`, `TotalTime` and `WaitTime`.
pub const AM_START_WAIT: &[&str] = &["shell", "am", "start", "-W"];

pub const AM_FORCE_STOP: &[&str] = &["shell", "am", "force-stop"];

pub const KEYEVENT_HOME: &[&str] = &["shell", "input", "keyevent", "KEYCODE_HOME"];

/// Requires a rooted device. Flushes dirty pages first so the drop frees the
/// page cache, dentries and inodes.
pub const DROP_CACHES: &[&str] = &["shell", "su -c 'sync && echo 3 > /proc/sys/vm/drop_caches'"];

pub const GET_STATE: &[&str] = &["get-state"];

/// State reported by `adb get-state` for a connected, authorized device
pub const DEVICE_READY_STATE: &str = "device";

/// Interval for polling a command that runs under a timeout
pub const POLL_INTERVAL: Duration = Duration::from_millis(50);
