use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::socket::DEFAULT_HIGH_WATER_MARK;
use crate::transport::{self, FrameReader, FrameWriter, Multipart};

/// Connected socket that sends and receives raw multipart messages
///
/// Incoming messages are read by a background task into a queue bounded by
/// the high-water mark, so [`DealerSocket::recv`] is cancel safe and can sit
/// in a `select!` next to other sources.
pub struct DealerSocket {
    endpoint: Endpoint,
    writer: FrameWriter,
    inbound: mpsc::Receiver<Multipart>,
    reader: JoinHandle<()>,
}

impl DealerSocket {
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        Self::connect_with_capacity(endpoint, DEFAULT_HIGH_WATER_MARK).await
    }

    pub async fn connect_with_capacity(endpoint: &Endpoint, high_water_mark: usize) -> Result<Self> {
        let (reader, writer) = transport::connect(endpoint).await?.into_split();
        let (tx, inbound) = mpsc::channel(high_water_mark.max(1));
        let reader = tokio::spawn(read_loop(reader, endpoint.clone(), tx));

        debug!(%endpoint, "dealer socket connected");

        Ok(Self {
            endpoint: endpoint.clone(),
            writer,
            inbound,
            reader,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub async fn send(&mut self, message: &[Vec<u8>]) -> Result<()> {
        self.writer.send(message).await
    }

    /// Wait for the next message
    ///
    /// Returns [`Error::ConnectionClosed`] once the peer has gone away and
    /// every queued message has been received.
    pub async fn recv(&mut self) -> Result<Multipart> {
        self.inbound.recv().await.ok_or(Error::ConnectionClosed)
    }

    /// Take a message that has already arrived, if any
    pub fn try_recv(&mut self) -> Option<Multipart> {
        self.inbound.try_recv().ok()
    }

    pub async fn close(mut self) -> Result<()> {
        self.reader.abort();
        self.writer.close().await
    }
}

impl Drop for DealerSocket {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(mut reader: FrameReader, endpoint: Endpoint, inbound: mpsc::Sender<Multipart>) {
    loop {
        match reader.receive().await {
            Ok(message) => {
                if inbound.send(message).await.is_err() {
                    break;
                }
            }
            Err(Error::ConnectionClosed) => {
                debug!(%endpoint, "dealer connection closed by peer");
                break;
            }
            Err(error) => {
                warn!(%endpoint, %error, "dealer connection failed");
                break;
            }
        }
    }
}
