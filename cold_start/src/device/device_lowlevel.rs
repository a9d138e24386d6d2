use super::{
    device_definitions::POLL_INTERVAL,
    device_types::{AdbOutput, DeviceError},
};

use std::{
    io::{self, Read},
    path::Path,
    process::{self, Child, Stdio},
    thread,
    time::{Duration, Instant},
};

use itertools::Itertools;
use log::{debug, trace};

/// Location of the adb executable and the device it addresses.
#[derive(Debug, Clone)]
pub(super) struct AdbTarget<'a> {
    pub adb: &'a Path,
    pub serial: Option<&'a str>,
}

impl AdbTarget<'_> {
    fn full_args<'b>(&'b self, args: &[&'b str]) -> Vec<&'b str> {
        match self.serial {
            Some(serial) => ["-s", serial].into_iter().chain(args.iter().copied()).collect(),
            None => args.to_vec(),
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.adb.display(), self.full_args(args).iter().join(" "))
    }
}

pub(super) fn spawn_adb_command(
    target: &AdbTarget,
    args: &[&str],
    stdout: Stdio,
) -> Result<Child, io::Error> {
    let all_args = target.full_args(args);
    debug!("execute: {}", target.describe(args));
    process::Command::new(target.adb)
        .env("LANG", "C.UTF-8")
        .env("LC_ALL", "C.UTF-8")
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(Stdio::piped())
        .args(all_args)
        .spawn()
}

pub(super) fn capture_adb_output(
    target: &AdbTarget,
    args: &[&str],
) -> Result<AdbOutput, DeviceError> {
    run_adb_command(target, args, Stdio::piped())
}

/// Runs adb to completion. Standard output is only captured when `stdout` is
/// piped.
pub(super) fn run_adb_command(
    target: &AdbTarget,
    args: &[&str],
    stdout: Stdio,
) -> Result<AdbOutput, DeviceError> {
    let child = spawn_adb_command(target, args, stdout)?;
    let output = child.wait_with_output()?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    trace!("stdout: {stdout}");

    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    trace!("stderr: {stderr}");

    if output.status.success() {
        trace!("exec succeeded");
        Ok(AdbOutput { stdout, stderr })
    } else {
        trace!("exec failed");
        Err(DeviceError::ExecError {
            command: target.describe(args),
            status: output.status.code(),
            stderr,
        })
    }
}

/// Runs adb with a deadline. The child is killed once the deadline passes.
pub(super) fn run_adb_command_with_timeout(
    target: &AdbTarget,
    args: &[&str],
    timeout: Duration,
) -> Result<(), DeviceError> {
    let mut child = spawn_adb_command(target, args, Stdio::null())?;
    let deadline = Instant::now() + timeout;

    loop {
        if let Some(status) = child.try_wait()? {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                pipe.read_to_string(&mut stderr)?;
            }
            trace!("stderr: {stderr}");
            return if status.success() {
                Ok(())
            } else {
                Err(DeviceError::ExecError {
                    command: target.describe(args),
                    status: status.code(),
                    stderr,
                })
            };
        }

        if Instant::now() >= deadline {
            debug!("timeout after {timeout:?}, killing adb");
            // The child may have exited in the meantime.
            let _ = child.kill();
            let _ = child.wait();
            return Err(DeviceError::Timeout {
                command: target.describe(args),
                timeout,
            });
        }

        thread::sleep(POLL_INTERVAL);
    }
}
