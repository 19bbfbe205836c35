//! Interactive duplex relay ("chat mode").
//!
//! With no program to run, the invocation becomes a bidirectional byte
//! relay between the local terminal and the configured remote: remote bytes
//! are echoed to local output, local input is written to the remote. The
//! loop parks on readiness of its two sources and never spins.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::info;

use crate::error::{Error, Result};
use crate::redirect::RedirectPlan;
use crate::shutdown::ShutdownToken;
use crate::transport::Connection;

/// Largest datagram a relay buffer has to hold.
const MAX_DATAGRAM: usize = 65535;

/// Why the relay stopped. Every cause is a clean exit.
#[derive(Debug, Clone, Copy)]
enum Stop {
    PeerClosed,
    LocalEof,
    Interrupted,
    DeadlineExpired,
}

/// Establish the plan's connections and relay between them and the local
/// terminal until either side closes.
pub async fn run(
    plan: &RedirectPlan,
    timeout: Option<Duration>,
    shutdown: ShutdownToken,
) -> Result<()> {
    let deadline = timeout.map(|timeout| Instant::now() + timeout);

    let (remote, remote_out) = tokio::select! {
        established = establish_pair(plan) => established?,
        _ = shutdown.cancelled() => {
            info!("interrupted before the session started");
            return Ok(());
        }
    };

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let stop = relay(
        &remote,
        remote_out.as_ref(),
        &mut stdin,
        &mut stdout,
        deadline,
        &shutdown,
    )
    .await?;
    info!(?stop, "session over");
    Ok(())
}

/// Connections for the session: the one read from, plus a distinct write
/// side when separate input and output endpoints were given.
async fn establish_pair(plan: &RedirectPlan) -> Result<(Connection, Option<Connection>)> {
    match (&plan.input, &plan.output) {
        (Some(input), Some(output)) if !plan.combined => {
            let read = Connection::establish(input).await?;
            let write = Connection::establish(output).await?;
            Ok((read, Some(write)))
        }
        (Some(spec), _) | (None, Some(spec)) => Ok((Connection::establish(spec).await?, None)),
        (None, None) => Err(Error::Usage(
            "an endpoint is required for an interactive session".into(),
        )),
    }
}

async fn relay<L, O>(
    remote: &Connection,
    remote_out: Option<&Connection>,
    local_in: &mut L,
    local_out: &mut O,
    deadline: Option<Instant>,
    shutdown: &ShutdownToken,
) -> Result<Stop>
where
    L: AsyncRead + Unpin,
    O: AsyncWrite + Unpin,
{
    remote.connect_peer().await?;
    if let Some(out) = remote_out {
        out.connect_peer().await?;
    }
    let write_side = remote_out.unwrap_or(remote);

    let mut remote_buf = vec![0u8; MAX_DATAGRAM];
    let mut local_buf = vec![0u8; MAX_DATAGRAM];

    let deadline_expired = async move {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline_expired);

    let stop = loop {
        tokio::select! {
            ready = remote.readable() => {
                ready?;
                match remote.try_recv(&mut remote_buf) {
                    Ok(0) => break Stop::PeerClosed,
                    Ok(n) => {
                        local_out.write_all(&remote_buf[..n]).await?;
                        local_out.flush().await?;
                    }
                    // Spurious wakeup; park again.
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                    Err(e) => return Err(e.into()),
                }
            }
            read = local_in.read(&mut local_buf) => {
                match read? {
                    0 => break Stop::LocalEof,
                    n => write_side.send(&local_buf[..n]).await?,
                }
            }
            _ = shutdown.cancelled() => break Stop::Interrupted,
            _ = &mut deadline_expired => break Stop::DeadlineExpired,
        }
    };
    // Dropping the connections closes them on every path.
    Ok(stop)
}
