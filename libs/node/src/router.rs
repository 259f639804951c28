use std::collections::HashMap;

use constellation_core::Reply;
use constellation_fabric::{DealerSocket, Endpoint, Envelope, Multipart, RouterSocket};
use futures_util::future::{select_all, BoxFuture, FutureExt};
use tracing::{debug, info, warn};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::lifecycle::{CloseHandle, Service};
use crate::serve;
use crate::trace::Stamp;

/// Broker that forwards each request to the service named by its tag
///
/// Callers send `[tag, request]` after their delimiter (see
/// [`constellation_fabric::ClientSocket::call_through_router`]). Replies
/// coming back from a service are passed to the caller untouched.
pub struct Router {
    name: String,
    frontend: RouterSocket,
    dealers: HashMap<String, DealerSocket>,
    stamp: Stamp,
    close: CloseHandle,
}

impl Router {
    pub async fn bind(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let frontend = RouterSocket::bind(&config.endpoint).await?;
        let stamp = config.stamp(frontend.local_endpoint());

        info!(service = %config.name, endpoint = %frontend.local_endpoint(), "router bound");

        Ok(Self {
            name: config.name,
            frontend,
            dealers: HashMap::new(),
            stamp,
            close: CloseHandle::new(),
        })
    }

    pub fn local_endpoint(&self) -> &Endpoint {
        self.frontend.local_endpoint()
    }

    /// Connect a dealer to the service reachable at `endpoint`
    pub async fn register_dealer(&mut self, tag: impl Into<String>, endpoint: &Endpoint) -> Result<()> {
        let tag = tag.into();
        if self.dealers.contains_key(&tag) {
            return Err(Error::DuplicateDealer(tag));
        }

        let dealer = DealerSocket::connect(endpoint).await?;
        debug!(router = %self.name, %tag, %endpoint, "dealer registered");
        self.dealers.insert(tag, dealer);
        Ok(())
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.dealers.keys().map(String::as_str)
    }

    /// `message` is `[client.., "", tag, payload, ..]`; trailing frames are dropped
    async fn on_frontend(&mut self, message: Multipart) -> Result<()> {
        let (envelope, body) = Envelope::split(message);

        let forward = match body.as_slice() {
            [tag, payload, ..] => {
                let tag = String::from_utf8_lossy(tag).into_owned();
                match self.dealers.get_mut(&tag) {
                    Some(dealer) => match serve::parse_body(std::slice::from_ref(payload)) {
                        Ok(mut request) => {
                            request.ensure_uuid();
                            self.stamp.request(&mut request);
                            Ok((dealer, request.to_bytes()))
                        }
                        Err(message) => Err(format!("{message} for service {tag}")),
                    },
                    None => Err(format!("no dealer registered for service: {tag}")),
                }
            }
            _ => Err(format!(
                "malformed request: expected service tag and payload, got {} frame(s)",
                body.len()
            )),
        };

        match forward {
            Ok((dealer, Ok(bytes))) => {
                dealer.send(&envelope.wrap([bytes])).await?;
            }
            Ok((_, Err(error))) => {
                let reply = serve::encode_reply(Reply::fail(format!("malformed request: {error}")));
                self.frontend.send(envelope.wrap([reply])).await?;
            }
            Err(message) => {
                debug!(router = %self.name, %message, "rejecting request");
                let reply = serve::encode_reply(Reply::fail(message));
                self.frontend.send(envelope.wrap([reply])).await?;
            }
        }
        Ok(())
    }

    /// Forward a reply and everything else the same dealer already holds
    async fn on_dealer(&mut self, tag: &str, message: Multipart) -> Result<()> {
        self.frontend.send(message).await?;

        while let Some(message) = self.dealers.get_mut(tag).and_then(DealerSocket::try_recv) {
            self.frontend.send(message).await?;
        }
        Ok(())
    }
}

/// Next message from any dealer, with the tag it came in on
fn next_reply(dealers: &mut HashMap<String, DealerSocket>) -> BoxFuture<'_, (String, Result<Multipart>)> {
    if dealers.is_empty() {
        return std::future::pending().boxed();
    }

    let pending = dealers.iter_mut().map(|(tag, dealer)| {
        async move { (tag.clone(), dealer.recv().await.map_err(Error::from)) }.boxed()
    });
    select_all(pending).map(|(output, _, _)| output).boxed()
}

#[async_trait::async_trait]
impl Service for Router {
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
                        Ok(message) => self.on_frontend(message).await,
                        Err(error) => Err(error.into()),
                    };
                    if let Err(error) = outcome {
                        break Err(error);
                    }
                }
                (tag, message) = next_reply(&mut self.dealers) => {
                    let outcome = match message {
                        Ok(message) => self.on_dealer(&tag, message).await,
                        Err(error) => {
                            warn!(router = %self.name, %tag, %error, "dealer failed");
                            Err(error)
                        }
                    };
                    if let Err(error) = outcome {
                        break Err(error);
                    }
                }
            }
        };

        debug!(router = %self.name, "router closing");
        for (_, dealer) in self.dealers.drain() {
            dealer.close().await?;
        }
        self.frontend.close().await?;
        result
    }
}
