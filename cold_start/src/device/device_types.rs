use std::{io, path::Path, time::Duration};

#[derive(Debug)]
pub(super) struct AdbOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("adb failed to execute '{command}' (exit status {status:?}).\n\nstderr:\n{stderr}")]
    ExecError {
        command: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("adb did not finish '{command}' within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Device is not ready, adb reports state '{state}'")]
    NotReady { state: String },

    #[error("Failed to execute adb")]
    IoError(#[from] io::Error),
}

/// Where the standard output of a launch goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode<'a> {
    Discard,
    AppendTo(&'a Path),
    Inherit,
}
