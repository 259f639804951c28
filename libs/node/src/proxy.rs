use constellation_core::Reply;
use constellation_fabric::{DealerSocket, Endpoint, Envelope, Multipart, RouterSocket};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::lifecycle::{CloseHandle, Service};
use crate::serve;
use crate::trace::Stamp;

/// Forwards every request to one destination, recording itself in the trace
///
/// Proxies chain: the destination may itself be a proxy, so requests can
/// cross a pipeline of any depth and come back along the same path.
pub struct Proxy {
    name: String,
    frontend: RouterSocket,
    destination: DealerSocket,
    stamp: Stamp,
    close: CloseHandle,
}

impl Proxy {
    pub async fn bind(config: ServiceConfig, destination: &Endpoint) -> Result<Self> {
        config.validate()?;
        let frontend = RouterSocket::bind(&config.endpoint).await?;
        let destination = DealerSocket::connect(destination).await?;
        let stamp = config.stamp(frontend.local_endpoint());

        info!(
            service = %config.name,
            endpoint = %frontend.local_endpoint(),
            destination = %destination.endpoint(),
            "proxy bound"
        );

        Ok(Self {
            name: config.name,
            frontend,
            destination,
            stamp,
            close: CloseHandle::new(),
        })
    }

    pub fn local_endpoint(&self) -> &Endpoint {
        self.frontend.local_endpoint()
    }

    async fn on_request(&mut self, message: Multipart) -> Result<()> {
        let (envelope, body) = Envelope::split(message);

        let mut request = match serve::parse_body(&body) {
            Ok(request) => request,
            Err(message) => {
                debug!(proxy = %self.name, %message, "rejecting request");
                let reply = serve::encode_reply(Reply::fail(message));
                self.frontend.send(envelope.wrap([reply])).await?;
                return Ok(());
            }
        };

        request.ensure_uuid();
        self.stamp.request(&mut request);
        let payload = request.to_bytes()?;
        self.destination.send(&envelope.wrap([payload])).await?;
        Ok(())
    }

    async fn on_reply(&mut self, message: Multipart) -> Result<()> {
        let (envelope, mut body) = Envelope::split(message);

        if let [payload] = body.as_mut_slice() {
            match Reply::from_bytes(payload) {
                Ok(mut reply) => {
                    self.stamp.reply(&mut reply);
                    *payload = serve::encode_reply(reply);
                }
                Err(error) => {
                    warn!(proxy = %self.name, %error, "forwarding unreadable reply as is");
                }
            }
        }

        self.frontend.send(envelope.wrap(body)).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Service for Proxy {
    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    async fn run(mut self) -> Result<()> {
        let mut closed = self.close.signal();

        let result = loop {
            tokio::select! {
                _ = closed.closed() => break Ok(()),
                message = self.frontend.recv() => {
                    let outcome = match message {
                        Ok(message) => self.on_request(message).await,
                        Err(error) => Err(error.into()),
                    };
                    if let Err(error) = outcome {
                        break Err(error);
                    }
                }
                message = self.destination.recv() => {
                    let outcome = match message {
                        Ok(message) => self.on_reply(message).await,
                        Err(error) => Err(error.into()),
                    };
                    if let Err(error) = outcome {
                        break Err(error);
                    }
                }
            }
        };

        debug!(proxy = %self.name, "proxy closing");
        self.destination.close().await?;
        self.frontend.close().await?;
        result
    }
}
