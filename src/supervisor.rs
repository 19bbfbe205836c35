//! Child process supervision.
//!
//! Wires the redirect plan onto a child command, runs it, and parks on a
//! single multiplexed wait for whichever comes first: child exit, the
//! configured deadline, or an interrupt. The deadline and the interrupt
//! both terminate the child gracefully before force-killing it.

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, EXIT_INTERRUPTED, EXIT_SIGNAL_BASE, EXIT_TIMED_OUT};
use crate::redirect::{RedirectPlan, StreamBindings};
use crate::shutdown::ShutdownToken;

/// How long a child gets between SIGTERM and SIGKILL.
const TERM_GRACE: Duration = Duration::from_secs(1);

/// One supervised invocation: the program to run and the plumbing around it.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub argv: Vec<String>,
    pub plan: RedirectPlan,
    pub timeout: Option<Duration>,
}

/// Terminal state of a supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Normal termination with the child's own code.
    Exited(i32),
    /// Killed by a signal the supervisor did not send.
    Signaled(i32),
    /// The deadline fired and the child was terminated.
    TimedOut,
    /// An interrupt arrived and the child was terminated.
    Interrupted,
}

impl Outcome {
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Exited(code) => code,
            Outcome::Signaled(signal) => EXIT_SIGNAL_BASE + signal,
            Outcome::TimedOut => EXIT_TIMED_OUT,
            Outcome::Interrupted => EXIT_INTERRUPTED,
        }
    }
}

/// Run one invocation to completion.
pub async fn run(config: ProcessConfig, shutdown: ShutdownToken) -> Result<Outcome> {
    // The deadline covers the whole invocation and is armed before any
    // transport work begins.
    let deadline = config.timeout.map(|timeout| Instant::now() + timeout);

    debug!(plan = ?config.plan, "resolving endpoints");
    let bindings = tokio::select! {
        resolved = StreamBindings::establish(&config.plan) => resolved?,
        _ = shutdown.cancelled() => {
            info!("interrupted before the child started");
            return Ok(Outcome::Interrupted);
        }
    };

    let mut command = Command::new(&config.argv[0]);
    command.args(&config.argv[1..]);
    bindings.apply(&mut command);

    let mut child = command.spawn().map_err(|source| Error::Launch {
        program: config.argv[0].clone(),
        source,
    })?;
    info!(program = %config.argv[0], pid = child.id(), "child running");

    let outcome = wait_for_exit(&mut child, deadline, &shutdown).await?;
    info!(?outcome, "child finished");
    Ok(outcome)
}

/// One wait point for exit, deadline and interrupt.
async fn wait_for_exit(
    child: &mut Child,
    deadline: Option<Instant>,
    shutdown: &ShutdownToken,
) -> Result<Outcome> {
    let deadline_expired = async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        status = child.wait() => Ok(status_outcome(status?)),
        _ = deadline_expired => {
            warn!("deadline expired, terminating child");
            terminate(child).await?;
            Ok(Outcome::TimedOut)
        }
        _ = shutdown.cancelled() => {
            info!("interrupt, terminating child");
            terminate(child).await?;
            Ok(Outcome::Interrupted)
        }
    }
}

fn status_outcome(status: ExitStatus) -> Outcome {
    match (status.code(), status.signal()) {
        (Some(code), _) => Outcome::Exited(code),
        (None, Some(signal)) => Outcome::Signaled(signal),
        // A child neither exits nor dies to a signal only on non-unix
        // targets; report it as a plain failure.
        (None, None) => Outcome::Exited(1),
    }
}

/// SIGTERM first, SIGKILL if the child outlives the grace period.
async fn terminate(child: &mut Child) -> Result<()> {
    let Some(pid) = child.id() else {
        return Ok(()); // already reaped
    };
    // SAFETY: sending a signal to a pid we own has no memory-safety
    // concerns; a stale pid at worst returns ESRCH.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
    if tokio::time::timeout(TERM_GRACE, child.wait()).await.is_err() {
        warn!(pid, "child survived SIGTERM, sending SIGKILL");
        child.kill().await?;
    }
    Ok(())
}
