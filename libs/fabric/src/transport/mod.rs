use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

pub mod frame;
pub mod inproc;
pub mod tcp;

pub use self::frame::{read_message, write_message, Multipart};
pub use self::inproc::InprocListener;
pub use self::tcp::{TcpConnector, TcpTransportListener};

/// Transport trait for sending and receiving multipart messages
///
/// Each transport instance represents a single connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send one message over the transport
    async fn send(&mut self, message: &[Vec<u8>]) -> Result<()>;

    /// Receive one message from the transport
    async fn receive(&mut self) -> Result<Multipart>;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;
}

/// Listener trait for accepting incoming transports
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync {
    type Transport: Transport;

    /// Accept an incoming connection
    async fn accept(&self) -> Result<Self::Transport>;

    /// Stop accepting connections
    async fn close(&mut self) -> Result<()>;
}

/// Byte stream a framed transport can run over
pub trait Stream: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}

impl<T> Stream for T where T: AsyncRead + AsyncWrite + Send + Sync + Unpin + 'static {}

/// Multipart framing over any byte stream
pub struct FramedTransport {
    stream: Box<dyn Stream>,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
}

impl FramedTransport {
    pub fn new(stream: impl Stream) -> Self {
        Self {
            stream: Box::new(stream),
            send_timeout: None,
            receive_timeout: None,
        }
    }

    pub fn with_send_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Split into halves that can be driven from different tasks
    ///
    /// Timeouts are dropped; the halves are meant for owners that
    /// manage their own deadlines.
    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        let (read, write) = tokio::io::split(self.stream);
        (FrameReader { inner: read }, FrameWriter { inner: write })
    }
}

#[async_trait::async_trait]
impl Transport for FramedTransport {
    async fn send(&mut self, message: &[Vec<u8>]) -> Result<()> {
        let send_op = write_message(&mut self.stream, message);

        if let Some(timeout) = self.send_timeout {
            tokio::time::timeout(timeout, send_op)
                .await
                .map_err(|_| Error::Custom("Send timeout exceeded".to_string()))?
        } else {
            send_op.await
        }
    }

    async fn receive(&mut self) -> Result<Multipart> {
        let receive_op = read_message(&mut self.stream);

        if let Some(timeout) = self.receive_timeout {
            tokio::time::timeout(timeout, receive_op)
                .await
                .map_err(|_| Error::Custom("Receive timeout exceeded".to_string()))?
        } else {
            receive_op.await
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Receiving half of a [`FramedTransport`]
pub struct FrameReader {
    inner: ReadHalf<Box<dyn Stream>>,
}

impl FrameReader {
    pub async fn receive(&mut self) -> Result<Multipart> {
        read_message(&mut self.inner).await
    }
}

/// Sending half of a [`FramedTransport`]
pub struct FrameWriter {
    inner: WriteHalf<Box<dyn Stream>>,
}

impl FrameWriter {
    pub async fn send(&mut self, message: &[Vec<u8>]) -> Result<()> {
        write_message(&mut self.inner, message).await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Open a connection to an endpoint of either transport
pub async fn connect(endpoint: &Endpoint) -> Result<FramedTransport> {
    match endpoint {
        Endpoint::Inproc { name } => inproc::connect(name),
        Endpoint::Tcp { .. } => TcpConnector::new().connect(endpoint).await,
    }
}

/// A bound listener of either transport
pub enum Listener {
    Tcp(TcpTransportListener),
    Inproc(InprocListener),
}

impl Listener {
    /// Bind to an endpoint
    ///
    /// Returns the listener and the endpoint it actually bound, which differs
    /// from the requested one when a TCP port of 0 was asked for.
    pub async fn bind(endpoint: &Endpoint) -> Result<(Self, Endpoint)> {
        match endpoint {
            Endpoint::Inproc { name } => {
                let listener = InprocListener::bind(name)?;
                Ok((Self::Inproc(listener), endpoint.clone()))
            }
            Endpoint::Tcp { .. } => {
                let listener = TcpTransportListener::bind(endpoint).await?;
                let bound = listener.local_endpoint().clone();
                Ok((Self::Tcp(listener), bound))
            }
        }
    }
}

#[async_trait::async_trait]
impl TransportListener for Listener {
    type Transport = FramedTransport;

    async fn accept(&self) -> Result<Self::Transport> {
        match self {
            Self::Tcp(listener) => TransportListener::accept(listener).await,
            Self::Inproc(listener) => listener.accept().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Tcp(listener) => listener.close().await,
            Self::Inproc(listener) => listener.close().await,
        }
    }
}
