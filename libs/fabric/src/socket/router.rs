use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::socket::DEFAULT_HIGH_WATER_MARK;
use crate::transport::{FrameReader, FrameWriter, Listener, Multipart, TransportListener};

enum Event {
    Connected(Vec<u8>, FrameWriter),
    Message(Multipart),
    Disconnected(Vec<u8>),
}

/// Bound socket that tags every inbound message with its peer's identity
///
/// Received messages are `[identity, frames..]`. Sending `[identity,
/// frames..]` delivers `frames..` to that peer; messages for peers that have
/// gone away are dropped.
///
/// Inbound messages from all peers share one queue bounded by the high-water
/// mark. When it is full, connection readers stop reading and senders block
/// on transport flow control.
pub struct RouterSocket {
    endpoint: Endpoint,
    events: mpsc::Receiver<Event>,
    peers: HashMap<Vec<u8>, FrameWriter>,
    acceptor: JoinHandle<()>,
}

impl RouterSocket {
    /// Bind with the default high-water mark
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        Self::bind_with_capacity(endpoint, DEFAULT_HIGH_WATER_MARK).await
    }

    pub async fn bind_with_capacity(endpoint: &Endpoint, high_water_mark: usize) -> Result<Self> {
        let (listener, endpoint) = Listener::bind(endpoint).await?;
        let (tx, events) = mpsc::channel(high_water_mark.max(1));
        let acceptor = tokio::spawn(accept_loop(listener, endpoint.clone(), tx));

        debug!(%endpoint, "router socket bound");

        Ok(Self {
            endpoint,
            events,
            peers: HashMap::new(),
            acceptor,
        })
    }

    /// The endpoint actually bound
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Number of currently connected peers known to the socket
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Receive the next message, prefixed with the sender's identity
    ///
    /// Cancel safe.
    pub async fn recv(&mut self) -> Result<Multipart> {
        loop {
            match self.events.recv().await.ok_or(Error::Closed)? {
                Event::Connected(identity, writer) => {
                    self.peers.insert(identity, writer);
                }
                Event::Disconnected(identity) => {
                    self.peers.remove(&identity);
                }
                Event::Message(message) => return Ok(message),
            }
        }
    }

    /// Send `[identity, frames..]` to the peer named by the first frame
    pub async fn send(&mut self, message: Multipart) -> Result<()> {
        let mut frames = message.into_iter();
        let identity = frames
            .next()
            .ok_or_else(|| Error::InvalidFrame("router message has no identity".to_string()))?;
        let body: Multipart = frames.collect();

        let Some(writer) = self.peers.get_mut(&identity) else {
            debug!(endpoint = %self.endpoint, "dropping message for unknown peer");
            return Ok(());
        };

        if let Err(error) = writer.send(&body).await {
            warn!(endpoint = %self.endpoint, %error, "dropping peer after failed send");
            self.peers.remove(&identity);
        }
        Ok(())
    }

    /// Stop accepting, disconnect every peer and release the endpoint
    pub async fn close(mut self) -> Result<()> {
        self.acceptor.abort();
        // The listener is only released once the aborted task is dropped
        let _ = (&mut self.acceptor).await;
        for (_, mut writer) in self.peers.drain() {
            // Peers that already hung up are fine
            let _ = writer.close().await;
        }
        Ok(())
    }
}

impl Drop for RouterSocket {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn accept_loop(listener: Listener, endpoint: Endpoint, events: mpsc::Sender<Event>) {
    // Dropping the set when this task is aborted stops every reader
    let mut readers = JoinSet::new();
    let mut next_id: u32 = 0;

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let transport = match accepted {
                    Ok(transport) => transport,
                    Err(error) => {
                        warn!(%endpoint, %error, "accept failed, stopping router socket");
                        break;
                    }
                };

                next_id = next_id.wrapping_add(1);
                let mut identity = vec![0u8];
                identity.extend_from_slice(&next_id.to_be_bytes());

                let (reader, writer) = transport.into_split();
                if events.send(Event::Connected(identity.clone(), writer)).await.is_err() {
                    break;
                }
                readers.spawn(read_loop(reader, identity, events.clone()));
            }
            // Reap finished readers so the set does not grow forever
            Some(_) = readers.join_next(), if !readers.is_empty() => {}
        }
    }
}

async fn read_loop(mut reader: FrameReader, identity: Vec<u8>, events: mpsc::Sender<Event>) {
    loop {
        match reader.receive().await {
            Ok(message) => {
                let mut tagged = Vec::with_capacity(message.len() + 1);
                tagged.push(identity.clone());
                tagged.extend(message);
                if events.send(Event::Message(tagged)).await.is_err() {
                    return;
                }
            }
            Err(Error::ConnectionClosed) => break,
            Err(error) => {
                warn!(%error, "peer connection failed");
                break;
            }
        }
    }
    let _ = events.send(Event::Disconnected(identity)).await;
}
