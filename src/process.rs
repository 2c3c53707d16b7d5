//src/process.rs

use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Runs `cmd` to completion and returns its stdout.
///
/// The child is killed once `timeout` elapses. `key` names the input that
/// triggered the call (a taxid, a file) and ends up in every error.
pub fn run_with_timeout(cmd: &mut Command, key: &str, timeout: Duration) -> Result<String> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    log::debug!("Running {:?} for {key}", cmd);

    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain both pipes on their own threads so a chatty child cannot block
    let stdout_handle = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = String::new();
            out.read_to_string(&mut buf).map(|_| buf)
        })
    });
    let stderr_handle = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut buf = String::new();
            err.read_to_string(&mut buf).map(|_| buf)
        })
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if start.elapsed() > timeout {
                    log::debug!("Killing {program} for {key} after {} seconds", timeout.as_secs());
                    child.kill().ok();
                    let _ = child.wait();
                    return Err(timed_out(program, key, timeout));
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };

    // Readers get what is left of `timeout`; a grandchild may hold the pipes open
    let join = |handle: Option<thread::JoinHandle<std::io::Result<String>>>| -> Result<String> {
        let Some(handle) = handle else {
            return Ok(String::new());
        };
        while !handle.is_finished() {
            if start.elapsed() > timeout {
                return Err(timed_out(program.clone(), key, timeout));
            }
            thread::sleep(POLL_INTERVAL);
        }
        match handle.join() {
            Ok(res) => Ok(res?),
            Err(_) => Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("reading the output of {program} for {key} panicked"),
            ))),
        }
    };
    let stdout = join(stdout_handle)?;
    let stderr = join(stderr_handle)?;

    if !status.success() {
        return Err(Error::LookupNonZeroExit {
            program,
            key: key.to_string(),
            status: status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }
    if !stderr.trim().is_empty() {
        log::debug!("{program} stderr: {}", stderr.trim());
    }
    Ok(stdout)
}

fn timed_out(program: String, key: &str, timeout: Duration) -> Error {
    Error::LookupTimeout {
        program,
        key: key.to_string(),
        seconds: timeout.as_secs(),
    }
}
