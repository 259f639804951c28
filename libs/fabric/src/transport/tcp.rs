use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::transport::{FramedTransport, TransportListener};

/// Bound `tcp://` endpoint handing out framed connections
pub struct TcpTransportListener {
    listener: TcpListener,
    endpoint: Endpoint,
}

impl TcpTransportListener {
    /// Bind a `tcp://` endpoint; port 0 picks a free port
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        let (Endpoint::Tcp { host, .. }, Some(addr)) = (endpoint, endpoint.bind_addr()) else {
            return Err(Error::InvalidEndpoint(endpoint.to_string()));
        };

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| Error::Bind {
                endpoint: endpoint.to_string(),
                source,
            })?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            listener,
            endpoint: Endpoint::tcp(host.clone(), port),
        })
    }

    /// The endpoint actually bound, with the resolved port
    pub fn local_endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }

    /// Accept a connection along with the peer's address
    pub async fn accept(&self) -> Result<(FramedTransport, SocketAddr)> {
        let (stream, peer) = self.listener.accept().await?;
        stream.set_nodelay(true)?;
        Ok((FramedTransport::new(stream), peer))
    }

    /// The socket itself is released on drop
    pub async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
impl TransportListener for TcpTransportListener {
    type Transport = FramedTransport;

    async fn accept(&self) -> Result<Self::Transport> {
        let (transport, _) = TcpTransportListener::accept(self).await?;
        Ok(transport)
    }

    async fn close(&mut self) -> Result<()> {
        TcpTransportListener::close(self).await
    }
}

/// Settings for outgoing TCP connections
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Applied to every send on the connection
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Applied to every receive on the connection
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    pub async fn connect(&self, endpoint: &Endpoint) -> Result<FramedTransport> {
        let addr = endpoint
            .connect_addr()
            .ok_or_else(|| Error::InvalidEndpoint(endpoint.to_string()))?;

        let stream = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, TcpStream::connect(&addr))
                .await
                .map_err(|_| Error::Custom(format!("Connect to {endpoint} timed out")))??,
            None => TcpStream::connect(&addr).await?,
        };
        stream.set_nodelay(true)?;

        Ok(FramedTransport::new(stream)
            .with_send_timeout(self.send_timeout)
            .with_receive_timeout(self.receive_timeout))
    }
}
