use std::sync::Arc;

use tokio::sync::watch;

use crate::error::Result;

/// Uniform lifecycle of every server
#[async_trait::async_trait]
pub trait Service: Send {
    /// Handle that stops [`Service::run`] from outside
    fn close_handle(&self) -> CloseHandle;

    /// Serve until closed or until the transport fails
    async fn run(self) -> Result<()>
    where
        Self: Sized;
}

/// Cloneable trigger that closes a server's socket
///
/// Closing is sticky: a server that starts running after the handle was
/// closed returns immediately.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CloseHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CloseHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn close(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    pub(crate) fn signal(&self) -> CloseSignal {
        CloseSignal {
            rx: self.tx.subscribe(),
        }
    }
}

pub(crate) struct CloseSignal {
    rx: watch::Receiver<bool>,
}

impl CloseSignal {
    /// Resolves once the handle is closed. Cancel safe.
    pub(crate) async fn closed(&mut self) {
        // The sender lives in the handle the server holds, so an error
        // only happens while tearing down
        let _ = self.rx.wait_for(|closed| *closed).await;
    }
}
