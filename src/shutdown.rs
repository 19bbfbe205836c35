//! Interrupt handling.
//!
//! A [`ShutdownToken`] is the cancellation context threaded through every
//! blocking phase of an invocation. [`signal_bridge`] installs the one task
//! that turns Ctrl-C into a fired token; nothing else mutates it.

use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// A token plus the sender that fires it. Used by the signal bridge and
    /// by tests that need to interrupt on cue.
    pub fn pair() -> (watch::Sender<bool>, ShutdownToken) {
        let (tx, rx) = watch::channel(false);
        (tx, ShutdownToken { rx })
    }

    /// Resolves once an interrupt has been requested. If the bridge went
    /// away without firing, no interrupt can arrive anymore and this pends
    /// forever.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Spawn the signal-to-token bridge: the returned token fires on Ctrl-C.
pub fn signal_bridge() -> ShutdownToken {
    let (tx, token) = ShutdownToken::pair();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received");
                let _ = tx.send(true);
            }
            Err(e) => warn!("unable to listen for interrupts: {e}"),
        }
    });
    token
}
