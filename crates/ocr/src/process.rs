//! Deadline-bounded external tools (`pdftoppm`, `tesseract`).

use std::fs::File;
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub(crate) enum RunError {
    #[error("failed to launch: {0}")]
    Launch(io::Error),
    #[error("IO error while waiting: {0}")]
    Io(#[from] io::Error),
    #[error("killed at deadline")]
    DeadlineExceeded,
}

pub(crate) struct Finished {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Run `cmd` to completion, or kill and reap it once `deadline` passes.
///
/// stdout and stderr are redirected to files in `work_dir`, so the child can
/// never stall on a full pipe while it is being polled.
pub(crate) fn run_until(
    mut cmd: Command,
    work_dir: &Path,
    deadline: Instant,
) -> Result<Finished, RunError> {
    if Instant::now() >= deadline {
        return Err(RunError::DeadlineExceeded);
    }

    let stdout_path = work_dir.join("stdout.log");
    let stderr_path = work_dir.join("stderr.log");
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(File::create(&stdout_path)?)
        .stderr(File::create(&stderr_path)?)
        .spawn()
        .map_err(RunError::Launch)?;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        let now = Instant::now();
        if now >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            tracing::debug!(pid = child.id(), "Killed external tool at deadline");
            return Err(RunError::DeadlineExceeded);
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    };

    Ok(Finished {
        status,
        stdout: std::fs::read(&stdout_path)?,
        stderr: std::fs::read(&stderr_path)?,
    })
}

/// Write an executable `sh` script standing in for an external tool.
#[cfg(all(test, unix))]
pub(crate) fn fake_tool(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
