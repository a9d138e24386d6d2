use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use defer::defer;
use log::{debug, info, warn};

use crate::{
    catalog::AppDescriptor,
    device::{CaptureMode, DeviceGateway},
};

/// Line prefix under which `am start -W` reports the launch duration in ms.
pub const TOTAL_TIME_PREFIX: &str = "TotalTime";

/// Extracts the `TotalTime` of an `am start -W` report.
///
/// Only the first line starting with `TotalTime` is considered. A missing
/// line, a value that is not an integer and a zero value all yield `None`.
pub fn parse_total_time(report: &str) -> Option<u64> {
    let line = report
        .lines()
        .find(|line| line.starts_with(TOTAL_TIME_PREFIX))?;
    let value = line.split(':').nth(1)?.trim();
    match value.parse::<u64>() {
        Ok(0) => None,
        Ok(ms) => Some(ms),
        Err(e) => {
            debug!("unparsable {TOTAL_TIME_PREFIX} '{value}': {e}");
            None
        }
    }
}

/// Result of a single measured launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedLaunch {
    /// Reported startup time, `None` when the device did not report one
    pub latency_ms: Option<u64>,
    /// Whether the launch command itself failed
    pub launch_failed: bool,
}

/// Launches an app and reads back the startup time it reports.
#[derive(Debug, Clone)]
pub struct StartupTimer {
    capture_path: PathBuf,
}

impl StartupTimer {
    pub fn new(capture_path: impl Into<PathBuf>) -> Self {
        StartupTimer {
            capture_path: capture_path.into(),
        }
    }

    pub fn capture_path(&self) -> &Path {
        &self.capture_path
    }

    /// Launches `target` with its output captured and parses the reported
    /// startup time. The capture file does not outlive the call.
    pub fn measure<G>(&self, gateway: &mut G, target: &AppDescriptor) -> TimedLaunch
    where
        G: DeviceGateway + ?Sized,
    {
        remove_capture(&self.capture_path);
        defer!(remove_capture(&self.capture_path));

        // A failed launch may still have written a usable report.
        let launch_failed = gateway
            .launch(&target.component(), CaptureMode::AppendTo(&self.capture_path))
            .is_err();

        let report = match fs::read_to_string(&self.capture_path) {
            Ok(report) => report,
            Err(e) => {
                warn!(
                    "Could not read launch report {}: {e}",
                    self.capture_path.display()
                );
                return TimedLaunch {
                    latency_ms: None,
                    launch_failed,
                };
            }
        };

        TimedLaunch {
            latency_ms: parse_total_time(&report),
            launch_failed,
        }
    }
}

/// Outcome of [`StartupTimer::measure_repeatedly`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepeatedLaunches {
    /// Reported startup times of the repetitions that reported one
    pub latencies: Vec<u64>,
    /// Failed force-stops and launches
    pub gateway_failures: usize,
}

impl StartupTimer {
    /// Measures `target` `repetitions` times. The target is force-stopped
    /// before every launch so that each launch is a cold start.
    pub fn measure_repeatedly<G>(
        &self,
        gateway: &mut G,
        target: &AppDescriptor,
        repetitions: u16,
    ) -> RepeatedLaunches
    where
        G: DeviceGateway + ?Sized,
    {
        let mut result = RepeatedLaunches::default();
        for repetition in 1..=repetitions {
            if gateway.force_stop(&target.package).is_err() {
                result.gateway_failures += 1;
            }
            let launch = self.measure(gateway, target);
            if launch.launch_failed {
                result.gateway_failures += 1;
            }
            match launch.latency_ms {
                Some(ms) => {
                    info!("{repetition}/{repetitions} {}: {ms} ms", target.name());
                    result.latencies.push(ms);
                }
                None => warn!(
                    "{repetition}/{repetitions} {}: no startup time reported",
                    target.name()
                ),
            }
        }
        result
    }
}

fn remove_capture(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {e}", path.display()),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_helpers::{capture_path, GatewayCall, StubGateway};

    fn booking() -> AppDescriptor {
        AppDescriptor::from_component("com.booking/com.booking.startup.HomeActivity")
            .unwrap()
            .with_name("Booking")
    }

    #[test]
    fn parses_total_time() {
        assert_eq!(parse_total_time("TotalTime: 542"), Some(542));
        assert_eq!(parse_total_time("TotalTime:542\n"), Some(542));
        assert_eq!(
            parse_total_time("Status: ok\nThisTime: 500\nTotalTime: 542\nWaitTime: 560\n"),
            Some(542)
        );
    }

    #[test]
    fn unparsable_total_time_is_missing() {
        assert_eq!(parse_total_time("TotalTime:abc"), None);
        assert_eq!(parse_total_time("TotalTime: -5"), None);
        assert_eq!(parse_total_time("TotalTime"), None);
        assert_eq!(parse_total_time("TotalTime: 0"), None);
    }

    #[test]
    fn missing_total_time_line() {
        assert_eq!(parse_total_time(""), None);
        assert_eq!(
            parse_total_time("Status: ok\nWaitTime: 560\nComplete\n"),
            None
        );
        // Only lines starting with the prefix count.
        assert_eq!(parse_total_time("  TotalTime: 542"), None);
    }

    #[test]
    fn first_total_time_line_wins() {
        assert_eq!(parse_total_time("TotalTime: 100\nTotalTime: 200\n"), Some(100));
        assert_eq!(parse_total_time("TotalTime: x\nTotalTime: 200\n"), None);
    }

    #[test]
    fn measure_reads_and_removes_capture() {
        let (_dir, path) = capture_path();
        let app = booking();
        let mut gateway = StubGateway::default().reporting(&app.component(), 123);
        let timer = StartupTimer::new(&path);

        assert_eq!(
            timer.measure(&mut gateway, &app),
            TimedLaunch {
                latency_ms: Some(123),
                launch_failed: false
            }
        );
        assert!(!path.exists());
    }

    #[test]
    fn measure_ignores_stale_capture() {
        let (_dir, path) = capture_path();
        fs::write(&path, "TotalTime: 999\n").unwrap();
        let app = booking();
        let mut gateway = StubGateway::default().reporting(&app.component(), 321);
        let timer = StartupTimer::new(&path);

        assert_eq!(
            timer.measure(&mut gateway, &app),
            TimedLaunch {
                latency_ms: Some(321),
                launch_failed: false
            }
        );
        assert!(!path.exists());
    }

    #[test]
    fn measure_without_report_is_missing() {
        let (_dir, path) = capture_path();
        let app = booking();
        let mut gateway =
            StubGateway::default().with_report(&app.component(), "Error: Activity not started\n");
        let timer = StartupTimer::new(&path);

        assert_eq!(
            timer.measure(&mut gateway, &app),
            TimedLaunch {
                latency_ms: None,
                launch_failed: false
            }
        );
        assert!(!path.exists());
    }

    #[test]
    fn measure_after_failed_launch() {
        let (_dir, path) = capture_path();
        let app = booking();
        let mut gateway = StubGateway::default().failing_on(&app.component());
        let timer = StartupTimer::new(&path);

        assert_eq!(
            timer.measure(&mut gateway, &app),
            TimedLaunch {
                latency_ms: None,
                launch_failed: true
            }
        );
        assert!(!path.exists());
    }

    #[test]
    fn repeated_launches_stop_target_first() {
        let (_dir, path) = capture_path();
        let app = booking();
        let mut gateway = StubGateway::default().reporting(&app.component(), 210);
        let timer = StartupTimer::new(&path);

        let result = timer.measure_repeatedly(&mut gateway, &app, 2);

        assert_eq!(result.latencies, vec![210, 210]);
        assert_eq!(result.gateway_failures, 0);
        let stop = GatewayCall::ForceStop("com.booking".to_string());
        let launch = GatewayCall::Launch {
            component: app.component(),
            captured: true,
        };
        assert_eq!(
            gateway.calls,
            vec![stop.clone(), launch.clone(), stop, launch]
        );
    }

    #[test]
    fn repeated_launches_count_failed_force_stops() {
        let (_dir, path) = capture_path();
        let app = booking();
        let mut gateway = StubGateway::default()
            .reporting(&app.component(), 330)
            .failing_on("com.booking");
        let timer = StartupTimer::new(&path);

        let result = timer.measure_repeatedly(&mut gateway, &app, 3);

        // A failed force-stop does not keep the launch from being measured.
        assert_eq!(result.latencies, vec![330, 330, 330]);
        assert_eq!(result.gateway_failures, 3);
    }
}
