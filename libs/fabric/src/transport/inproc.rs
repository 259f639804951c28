//! In-process transport
//!
//! Endpoints live in a process-wide namespace keyed by name. Binding a name
//! registers a listener; connecting creates an in-memory duplex pipe and hands
//! one end to the listener. A name must be bound before it can be connected.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tokio::io::DuplexStream;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::transport::{FramedTransport, TransportListener};

/// Buffer size of each direction of an in-process pipe
const PIPE_CAPACITY: usize = 256 * 1024;

type Namespace = HashMap<String, mpsc::UnboundedSender<DuplexStream>>;

static NAMESPACE: Lazy<Mutex<Namespace>> = Lazy::new(|| Mutex::new(HashMap::new()));

/// Connect to a bound in-process name
pub fn connect(name: &str) -> Result<FramedTransport> {
    let namespace = NAMESPACE.lock();
    let listener = namespace
        .get(name)
        .ok_or_else(|| Error::EndpointNotFound(format!("inproc://{name}")))?;

    let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
    listener
        .send(remote)
        .map_err(|_| Error::EndpointNotFound(format!("inproc://{name}")))?;

    Ok(FramedTransport::new(local))
}

/// Listener bound to an in-process name
///
/// The name is released when the listener is closed or dropped.
pub struct InprocListener {
    name: String,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<DuplexStream>>,
    registered: mpsc::UnboundedSender<DuplexStream>,
}

impl InprocListener {
    pub fn bind(name: &str) -> Result<Self> {
        let mut namespace = NAMESPACE.lock();
        if let Some(existing) = namespace.get(name) {
            if !existing.is_closed() {
                return Err(Error::AddressInUse(format!("inproc://{name}")));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        namespace.insert(name.to_string(), tx.clone());

        Ok(Self {
            name: name.to_string(),
            incoming: tokio::sync::Mutex::new(rx),
            registered: tx,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Accept an incoming connection
    pub async fn accept(&self) -> Result<FramedTransport> {
        let stream = self
            .incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or(Error::Closed)?;
        Ok(FramedTransport::new(stream))
    }

    /// Release the name
    pub async fn close(&mut self) -> Result<()> {
        self.unregister();
        Ok(())
    }

    fn unregister(&self) {
        let mut namespace = NAMESPACE.lock();
        // Only remove the entry if it still belongs to this listener
        if namespace
            .get(&self.name)
            .is_some_and(|tx| tx.same_channel(&self.registered))
        {
            namespace.remove(&self.name);
        }
    }
}

impl Drop for InprocListener {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[async_trait::async_trait]
impl TransportListener for InprocListener {
    type Transport = FramedTransport;

    async fn accept(&self) -> Result<Self::Transport> {
        InprocListener::accept(self).await
    }

    async fn close(&mut self) -> Result<()> {
        InprocListener::close(self).await
    }
}
