//! Stream redirection planning and wiring.
//!
//! A [`RedirectPlan`] says which endpoints feed which standard streams; a
//! [`StreamBindings`] is the concrete set of descriptors laid over them,
//! applied to the child command as one unit before it starts. The parent's
//! own streams are never touched.

use std::os::fd::OwnedFd;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use crate::endpoint::{EndpointSpec, ParseError};
use crate::error::Result;
use crate::transport::Connection;

/// Which endpoints feed the child's standard streams.
///
/// `combined` is set when input and output were given as the same text,
/// meaning one accepted connection serves both directions instead of two
/// listeners racing for the same port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectPlan {
    pub input: Option<EndpointSpec>,
    pub output: Option<EndpointSpec>,
    pub combined: bool,
}

impl RedirectPlan {
    /// Build a plan from the raw command-line endpoint strings. `both`
    /// stands in for an identical input/output pair.
    pub fn from_args(
        input: Option<&str>,
        output: Option<&str>,
        both: Option<&str>,
    ) -> Result<RedirectPlan, ParseError> {
        let (input, output) = match both {
            Some(spec) => (Some(spec), Some(spec)),
            None => (input, output),
        };
        let combined = matches!((input, output), (Some(i), Some(o)) if i == o);
        Ok(RedirectPlan {
            input: input.map(str::parse).transpose()?,
            output: output.map(str::parse).transpose()?,
            combined,
        })
    }

    pub fn has_endpoints(&self) -> bool {
        self.input.is_some() || self.output.is_some()
    }
}

/// Concrete descriptors for the child's standard streams. `None` leaves the
/// corresponding stream on the invoking terminal.
pub struct StreamBindings {
    stdin: Option<OwnedFd>,
    stdout: Option<OwnedFd>,
    stderr: Option<OwnedFd>,
}

impl StreamBindings {
    /// Establish every connection the plan calls for and lay the resulting
    /// descriptors over the standard streams. Listeners opened along the way
    /// are already closed by the time this returns; the descriptors held
    /// here are the only remaining handles on the connections.
    pub async fn establish(plan: &RedirectPlan) -> Result<StreamBindings> {
        if let (true, Some(spec)) = (plan.combined, plan.input.as_ref()) {
            let fd = Connection::establish(spec).await?.into_blocking_fd()?;
            let stdout = fd.try_clone()?;
            let stderr = fd.try_clone()?;
            debug!("one connection bound to stdin, stdout and stderr");
            return Ok(StreamBindings {
                stdin: Some(fd),
                stdout: Some(stdout),
                stderr: Some(stderr),
            });
        }

        let stdin = match &plan.input {
            Some(spec) => Some(Connection::establish(spec).await?.into_blocking_fd()?),
            None => None,
        };
        let (stdout, stderr) = match &plan.output {
            Some(spec) => {
                let fd = Connection::establish(spec).await?.into_blocking_fd()?;
                // stderr rides on the same connection as stdout.
                let stderr = fd.try_clone()?;
                (Some(fd), Some(stderr))
            }
            None => (None, None),
        };
        Ok(StreamBindings {
            stdin,
            stdout,
            stderr,
        })
    }

    /// Apply the bindings to a not-yet-spawned command.
    pub fn apply(self, command: &mut Command) {
        if let Some(fd) = self.stdin {
            command.stdin(Stdio::from(fd));
        }
        if let Some(fd) = self.stdout {
            command.stdout(Stdio::from(fd));
        }
        if let Some(fd) = self.stderr {
            command.stderr(Stdio::from(fd));
        }
    }
}
