use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::Codec;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::transport::{self, Transport};

/// Typed connection carrying one encoded value per single-part message
///
/// Subscribers read broadcasts through a JSON channel; it also serves for
/// ad hoc peers that exchange plain serde values.
pub struct Channel<C> {
    transport: Box<dyn Transport>,
    codec: C,
}

impl<C: Codec> Channel<C> {
    /// Wrap an accepted or already connected transport
    pub fn from_transport(transport: impl Transport + 'static, codec: C) -> Self {
        Self {
            transport: Box::new(transport),
            codec,
        }
    }

    /// Open a channel to an endpoint of either transport
    pub async fn connect(endpoint: &Endpoint, codec: C) -> Result<Self> {
        let transport = transport::connect(endpoint).await?;
        Ok(Self::from_transport(transport, codec))
    }

    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let bytes = self.codec.encode(message)?;
        self.transport.send(&[bytes]).await
    }

    /// Receive and decode the next value; multipart messages are rejected
    pub async fn receive<T: DeserializeOwned>(&mut self) -> Result<T> {
        let parts = self.transport.receive().await?;
        let [bytes] = parts.as_slice() else {
            return Err(Error::InvalidFrame(format!(
                "Expected a single part, got {}",
                parts.len()
            )));
        };
        self.codec.decode(bytes)
    }

    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }
}
