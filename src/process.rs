#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Running a short-lived external program with an optional deadline.

use std::{
    ffi::{OsStr, OsString},
    process::{ExitStatus, Stdio},
    time::Duration,
};

use anyhow::Context;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::{Child, Command},
    task::JoinHandle,
    time::timeout,
};

/// Owns a running child and sends it a kill signal if it is still owned
/// when dropped.
///
/// Cancelling the wait (for instance when the deadline fires) drops this,
/// so a formatter that hangs is never left behind.
struct KillOnDrop(Option<Child>);

impl KillOnDrop {
    /// The child, as long as it has not been released.
    fn child(&mut self) -> anyhow::Result<&mut Child> {
        self.0.as_mut().context("child process was already released")
    }

    /// Gives up ownership once the child has exited on its own.
    fn release(mut self) {
        self.0.take();
    }
}

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        if let Some(child) = &mut self.0 {
            let _ = child.start_kill();
        }
    }
}

/// Exit status and output of a program that ran to completion.
#[derive(Debug)]
pub struct Captured {
    /// How the program exited.
    pub status: ExitStatus,
    /// Everything written to stdout.
    pub stdout: Vec<u8>,
    /// Everything written to stderr.
    pub stderr: Vec<u8>,
}

/// Ways running a subprocess can fail.
#[derive(thiserror::Error, Debug)]
pub enum RunError {
    /// The program could not be started.
    #[error("could not start the process: {0}")]
    Spawn(#[source] std::io::Error),
    /// The program did not exit before the deadline and was killed.
    #[error("process did not finish within {0:?}")]
    TimedOut(Duration),
    /// Waiting on the program or reading its output failed.
    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

/// Reads `pipe` to the end on its own task so neither pipe can fill up
/// while the other is being read.
fn drain<R>(pipe: R, label: &'static str) -> JoinHandle<anyhow::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut pipe = pipe;
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)
            .await
            .with_context(|| format!("failed to read {label}"))?;
        Ok(buf)
    })
}

/// Runs `program` with `args`, stdin closed, collecting stdout and stderr.
///
/// With a `deadline`, the process is killed once it elapses and
/// [`RunError::TimedOut`] is returned.
pub async fn run_collect(
    program: impl AsRef<OsStr>,
    args: &[OsString],
    deadline: Option<Duration>,
) -> Result<Captured, RunError> {
    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(RunError::Spawn)?;
    let mut owned = KillOnDrop(Some(child));

    let stdout = drain(owned.child()?.stdout.take().context("stdout was not piped")?, "stdout");
    let stderr = drain(owned.child()?.stderr.take().context("stderr was not piped")?, "stderr");

    let finished = async move {
        let mut owned = owned;
        let status = owned
            .child()?
            .wait()
            .await
            .context("failed to wait on process")?;
        owned.release();
        Ok::<_, anyhow::Error>(Captured {
            status,
            stdout: stdout.await.context("stdout reader panicked")??,
            stderr: stderr.await.context("stderr reader panicked")??,
        })
    };

    match deadline {
        Some(limit) => match timeout(limit, finished).await {
            Ok(captured) => Ok(captured?),
            Err(_) => Err(RunError::TimedOut(limit)),
        },
        None => Ok(finished.await?),
    }
}
