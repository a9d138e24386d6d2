//! Centralized test helpers for cold-start
//!
//! Deterministic stand-ins for the device, the clock and the random app
//! selection, so that experiment runs can be verified without a device.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
    time::Duration,
};

use tempfile::{tempdir, TempDir};

use crate::{
    device::{CaptureMode, DeviceError, DeviceGateway},
    load::Selector,
    pause::Pause,
};

/// A device command as observed by [`StubGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Launch { component: String, captured: bool },
    ForceStop(String),
    GoHome,
    DropCache,
}

/// Key under which [`StubGateway::failing_on`] fails the home key event.
pub const FAIL_GO_HOME: &str = "<home>";

/// Key under which [`StubGateway::failing_on`] fails cache drops.
pub const FAIL_DROP_CACHE: &str = "<drop-cache>";

/// Records every device command and answers captured launches with canned
/// `am start -W` output.
#[derive(Debug, Default)]
pub struct StubGateway {
    pub calls: Vec<GatewayCall>,
    reports: HashMap<String, String>,
    failing: HashSet<String>,
}

impl StubGateway {
    /// Captured launches of `component` report `total_time_ms`.
    #[must_use]
    pub fn reporting(self, component: &str, total_time_ms: u64) -> Self {
        self.with_report(component, &am_start_report(component, total_time_ms))
    }

    /// Captured launches of `component` produce `report` verbatim.
    #[must_use]
    pub fn with_report(mut self, component: &str, report: &str) -> Self {
        self.reports.insert(component.to_owned(), report.to_owned());
        self
    }

    /// Commands addressing `target` fail. `target` is a component for launches,
    /// a package for force-stops, or one of [`FAIL_GO_HOME`] and
    /// [`FAIL_DROP_CACHE`].
    #[must_use]
    pub fn failing_on(mut self, target: &str) -> Self {
        self.failing.insert(target.to_owned());
        self
    }

    pub fn count(&self, call: &GatewayCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    fn outcome(&self, target: &str, command: &str) -> Result<(), DeviceError> {
        if self.failing.contains(target) {
            Err(DeviceError::ExecError {
                command: command.to_owned(),
                status: Some(1),
                stderr: "stubbed failure".to_owned(),
            })
        } else {
            Ok(())
        }
    }
}

impl DeviceGateway for StubGateway {
    fn launch(&mut self, component: &str, capture: CaptureMode<'_>) -> Result<(), DeviceError> {
        self.calls.push(GatewayCall::Launch {
            component: component.to_owned(),
            captured: matches!(capture, CaptureMode::AppendTo(_)),
        });
        self.outcome(component, "am start -W")?;
        if let (CaptureMode::AppendTo(path), Some(report)) = (capture, self.reports.get(component))
        {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(report.as_bytes())?;
        }
        Ok(())
    }

    fn force_stop(&mut self, package: &str) -> Result<(), DeviceError> {
        self.calls.push(GatewayCall::ForceStop(package.to_owned()));
        self.outcome(package, "am force-stop")
    }

    fn go_home(&mut self) -> Result<(), DeviceError> {
        self.calls.push(GatewayCall::GoHome);
        self.outcome(FAIL_GO_HOME, "input keyevent KEYCODE_HOME")
    }

    fn drop_cache(&mut self) -> Result<(), DeviceError> {
        self.calls.push(GatewayCall::DropCache);
        self.outcome(FAIL_DROP_CACHE, "drop_caches")
    }
}

/// Output of `am start -W` for a completed cold start.
pub fn am_start_report(component: &str, total_time_ms: u64) -> String {
    format!(
        "Starting: Intent {{ act=android.intent.action.MAIN cat=[android.intent.category.LAUNCHER] cmp={component} }}\n\
         Status: ok\n\
         LaunchState: COLD\n\
         Activity: {component}\n\
         TotalTime: {total_time_ms}\n\
         WaitTime: {}\n\
         Complete\n",
        total_time_ms + 7
    )
}

/// Records requested waits instead of sleeping.
#[derive(Debug, Default)]
pub struct RecordingPause {
    pub pauses: Vec<Duration>,
}

impl Pause for RecordingPause {
    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

/// Hands out pre-arranged picks. Once the script is exhausted, the first
/// indices are picked.
#[derive(Debug, Default)]
pub struct ScriptedSelector {
    script: VecDeque<Vec<usize>>,
}

impl ScriptedSelector {
    pub fn new(script: Vec<Vec<usize>>) -> Self {
        ScriptedSelector {
            script: script.into(),
        }
    }
}

impl Selector for ScriptedSelector {
    fn sample(&mut self, len: usize, amount: usize) -> Vec<usize> {
        self.script
            .pop_front()
            .unwrap_or_else(|| (0..amount.min(len)).collect())
    }
}

/// Temporary directory together with a capture file path inside it.
pub fn capture_path() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("capture.log");
    (dir, path)
}
