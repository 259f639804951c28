use std::sync::Arc;

use constellation_core::Broadcast;
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::channel::Channel;
use crate::codec::JsonCodec;
use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::socket::DEFAULT_HIGH_WATER_MARK;
use crate::transport::{FrameWriter, Listener, TransportListener};

/// Bound socket that fans broadcasts out to every connected subscriber
///
/// Each subscriber has its own bounded backlog; one that falls further
/// behind than the high-water mark skips the broadcasts it missed.
pub struct PublisherSocket {
    endpoint: Endpoint,
    sender: broadcast::Sender<Arc<Vec<u8>>>,
    acceptor: JoinHandle<()>,
}

impl PublisherSocket {
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        let (listener, endpoint) = Listener::bind(endpoint).await?;
        let (sender, _) = broadcast::channel(DEFAULT_HIGH_WATER_MARK);
        let acceptor = tokio::spawn(accept_loop(listener, sender.clone()));

        debug!(%endpoint, "publisher socket bound");

        Ok(Self {
            endpoint,
            sender,
            acceptor,
        })
    }

    pub fn local_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Number of subscribers currently attached
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish to every subscriber, returning how many were attached
    pub fn publish(&self, broadcast: &Broadcast) -> Result<usize> {
        let bytes = broadcast.to_bytes()?;
        // No subscribers is not an error for a publisher
        Ok(self.sender.send(Arc::new(bytes)).unwrap_or(0))
    }
}

impl Drop for PublisherSocket {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn accept_loop(listener: Listener, sender: broadcast::Sender<Arc<Vec<u8>>>) {
    let mut writers = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok(transport) => {
                        let (_, writer) = transport.into_split();
                        writers.spawn(write_loop(writer, sender.subscribe()));
                    }
                    Err(error) => {
                        warn!(%error, "accept failed, stopping publisher socket");
                        break;
                    }
                }
            }
            Some(_) = writers.join_next(), if !writers.is_empty() => {}
        }
    }
}

async fn write_loop(mut writer: FrameWriter, mut broadcasts: broadcast::Receiver<Arc<Vec<u8>>>) {
    loop {
        match broadcasts.recv().await {
            Ok(bytes) => {
                if writer.send(&[bytes.as_ref().clone()]).await.is_err() {
                    debug!("subscriber went away");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "subscriber lagging, skipped broadcasts");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Connected socket receiving the broadcasts whose topic starts with a prefix
pub struct SubscriberSocket {
    channel: Channel<JsonCodec>,
    prefix: String,
}

impl SubscriberSocket {
    /// Connect and subscribe; an empty prefix receives everything
    pub async fn connect(endpoint: &Endpoint, prefix: impl Into<String>) -> Result<Self> {
        let channel = Channel::connect(endpoint, JsonCodec).await?;
        Ok(Self {
            channel,
            prefix: prefix.into(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Wait for the next matching broadcast
    pub async fn receive(&mut self) -> Result<Broadcast> {
        loop {
            let broadcast: Broadcast = self.channel.receive().await?;
            if broadcast.matches(&self.prefix) {
                broadcast.validate()?;
                return Ok(broadcast);
            }
        }
    }

    pub async fn close(self) -> Result<()> {
        self.channel.close().await
    }
}
