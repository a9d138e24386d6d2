use std::{
    fs::OpenOptions,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use log::{debug, warn};

use super::device_definitions::{
    AM_FORCE_STOP, AM_START_WAIT, DEVICE_READY_STATE, DROP_CACHES, GET_STATE, KEYEVENT_HOME,
};
use super::device_lowlevel::{
    capture_adb_output, run_adb_command, run_adb_command_with_timeout, AdbTarget,
};
use super::device_types::{CaptureMode, DeviceError};

/// Device control operations the experiment relies on.
///
/// Implementations report failures through the returned error and are
/// expected to log them. Callers treat every failure as non-fatal.
pub trait DeviceGateway {
    /// Starts an activity given as `package/activity` and waits until the
    /// launch completed.
    fn launch(&mut self, component: &str, capture: CaptureMode<'_>) -> Result<(), DeviceError>;

    fn force_stop(&mut self, package: &str) -> Result<(), DeviceError>;

    /// Sends the HOME key event.
    fn go_home(&mut self) -> Result<(), DeviceError>;

    /// Syncs and drops the page cache, dentries and inodes.
    fn drop_cache(&mut self) -> Result<(), DeviceError>;
}

impl<G: DeviceGateway + ?Sized> DeviceGateway for &mut G {
    fn launch(&mut self, component: &str, capture: CaptureMode<'_>) -> Result<(), DeviceError> {
        (**self).launch(component, capture)
    }

    fn force_stop(&mut self, package: &str) -> Result<(), DeviceError> {
        (**self).force_stop(package)
    }

    fn go_home(&mut self) -> Result<(), DeviceError> {
        (**self).go_home()
    }

    fn drop_cache(&mut self) -> Result<(), DeviceError> {
        (**self).drop_cache()
    }
}

/// Drives a device through the adb executable.
#[derive(Debug, Clone)]
pub struct AdbGateway {
    adb: PathBuf,
    serial: Option<String>,
    home_timeout: Duration,
}

impl AdbGateway {
    pub fn new(adb: impl Into<PathBuf>, serial: Option<String>, home_timeout: Duration) -> Self {
        AdbGateway {
            adb: adb.into(),
            serial,
            home_timeout,
        }
    }

    fn target(&self) -> AdbTarget<'_> {
        AdbTarget {
            adb: &self.adb,
            serial: self.serial.as_deref(),
        }
    }

    /// Verifies that adb can be executed and the device is online.
    pub fn check_device(&self) -> Result<(), DeviceError> {
        let output = capture_adb_output(&self.target(), GET_STATE)?;
        let state = output.stdout.trim();
        if state == DEVICE_READY_STATE {
            debug!("device state: {state}");
            Ok(())
        } else {
            Err(DeviceError::NotReady {
                state: if state.is_empty() {
                    output.stderr.trim().to_owned()
                } else {
                    state.to_owned()
                },
            })
        }
    }

    fn logged<T>(&self, what: &str, result: Result<T, DeviceError>) -> Result<T, DeviceError> {
        if let Err(e) = &result {
            warn!("{what} failed: {e}");
        }
        result
    }
}

fn capture_stdio(capture: CaptureMode<'_>) -> Result<Stdio, DeviceError> {
    Ok(match capture {
        CaptureMode::Discard => Stdio::null(),
        CaptureMode::Inherit => Stdio::inherit(),
        CaptureMode::AppendTo(path) => Stdio::from(open_append(path)?),
    })
}

fn open_append(path: &Path) -> std::io::Result<std::fs::File> {
    OpenOptions::new().create(true).append(true).open(path)
}

impl DeviceGateway for AdbGateway {
    fn launch(&mut self, component: &str, capture: CaptureMode<'_>) -> Result<(), DeviceError> {
        let args: Vec<&str> = AM_START_WAIT.iter().copied().chain([component]).collect();
        let result = capture_stdio(capture)
            .and_then(|stdout| run_adb_command(&self.target(), &args, stdout))
            .map(|_| ());
        self.logged(&format!("Launching {component}"), result)
    }

    fn force_stop(&mut self, package: &str) -> Result<(), DeviceError> {
        let args: Vec<&str> = AM_FORCE_STOP.iter().copied().chain([package]).collect();
        let result = capture_adb_output(&self.target(), &args).map(|_| ());
        self.logged(&format!("Force-stopping {package}"), result)
    }

    fn go_home(&mut self) -> Result<(), DeviceError> {
        let result = run_adb_command_with_timeout(&self.target(), KEYEVENT_HOME, self.home_timeout);
        self.logged("Returning to the home screen", result)
    }

    fn drop_cache(&mut self) -> Result<(), DeviceError> {
        let result = capture_adb_output(&self.target(), DROP_CACHES).map(|_| ());
        self.logged("Dropping the file-system cache", result)
    }
}
