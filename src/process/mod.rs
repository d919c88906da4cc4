//! External process management.
//!
//! The launcher never implements the database or the notebook server; it
//! spawns them, probes them until they answer, and stops them again.

pub mod retry;
pub mod supervisor;

use async_trait::async_trait;
use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::{PlayError, PlayResult, ResultExt};

pub use retry::{retry, RetryPolicy};
pub use supervisor::Supervisor;

/// A long-running external program the launcher starts and stops
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Service: Send {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Spawn the program and wait until it is ready to serve
    async fn start(&mut self) -> PlayResult<()>;

    /// Stop the program; calling it on a stopped service is a no-op
    async fn stop(&mut self) -> PlayResult<()>;

    fn pid(&self) -> Option<u32>;
}

/// How long a child gets to exit after SIGTERM before it is killed
pub const STOP_GRACE: Duration = Duration::from_secs(10);

/// A spawned child whose stdout and stderr are appended to a log file
pub struct ChildProcess {
    program: String,
    child: Option<Child>,
    log_path: PathBuf,
    stop_grace: Duration,
}

impl ChildProcess {
    /// Spawn `program` with `args` in `cwd`, appending all output to `log_path`
    pub fn spawn<I, S>(program: &Path, args: I, cwd: &Path, log_path: &Path) -> PlayResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent).with_path_context(parent)?;
        }

        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)
            .with_path_context(log_path)?;
        let err_file = log_file.try_clone()?;

        let program_name = program.display().to_string();
        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(err_file))
            .kill_on_drop(true)
            .spawn()
            .with_program_context(&program_name)?;

        info!(
            program = %program_name,
            pid = child.id().unwrap_or_default(),
            log = %log_path.display(),
            "Spawned process"
        );

        Ok(Self {
            program: program_name,
            child: Some(child),
            log_path: log_path.to_path_buf(),
            stop_grace: STOP_GRACE,
        })
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(|c| c.id())
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Returns the exit status if the child has already exited
    pub fn exit_status(&mut self) -> PlayResult<Option<std::process::ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => Ok(child.try_wait()?),
            None => Ok(None),
        }
    }

    /// Ask the child to exit, kill it if it is still running after the grace
    /// period, and reap it. Idempotent.
    pub async fn terminate(&mut self) -> PlayResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        if let Some(status) = child.try_wait()? {
            debug!(program = %self.program, %status, "Process already exited");
            return Ok(());
        }

        if request_stop(&child, &self.program) {
            match tokio::time::timeout(self.stop_grace, child.wait()).await {
                Ok(status) => {
                    let status = status?;
                    info!(program = %self.program, %status, "Process stopped");
                    return Ok(());
                }
                Err(_) => warn!(
                    program = %self.program,
                    grace_secs = self.stop_grace.as_secs_f64(),
                    "Process still running after SIGTERM, killing it"
                ),
            }
        }

        if let Err(e) = child.start_kill() {
            warn!(program = %self.program, "Failed to signal process: {}", e);
        }
        let status = child.wait().await?;
        info!(program = %self.program, %status, "Process stopped");
        Ok(())
    }
}

/// Send SIGTERM to the child. Returns false when no signal was delivered.
#[cfg(unix)]
fn request_stop(child: &Child, program: &str) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    // SAFETY: the child has not been reaped, so the pid still names it
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        warn!(program, "Failed to send SIGTERM: {}", std::io::Error::last_os_error());
    }
    rc == 0
}

#[cfg(not(unix))]
fn request_stop(_child: &Child, _program: &str) -> bool {
    false
}

/// Run a short-lived command to completion, failing on a non-zero exit
pub async fn run_to_completion<I, S>(program: &Path, args: I, cwd: Option<&Path>) -> PlayResult<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let program_name = program.display().to_string();
    let mut command = Command::new(program);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    debug!(program = %program_name, "Running command");
    let status = command
        .status()
        .await
        .with_program_context(&program_name)?;

    if !status.success() {
        return Err(PlayError::process(
            format!("exited with {}", status),
            Some(program_name),
        ));
    }
    Ok(())
}
