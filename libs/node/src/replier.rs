use constellation_fabric::{Endpoint, Envelope, RouterSocket};
use tracing::{debug, info};

use crate::config::{ExtensionConfig, ServiceConfig};
use crate::error::Result;
use crate::extension::{self, Extension};
use crate::lifecycle::{CloseHandle, Service};
use crate::registry::{CommandRegistry, Dispatcher};
use crate::serve;
use crate::trace::Stamp;

/// Server that answers one request at a time, in arrival order
///
/// A handler that waits on an extension holds up every caller behind it;
/// use [`crate::AsyncReplier`] when handlers must overlap.
pub struct Replier {
    name: String,
    socket: RouterSocket,
    dispatcher: Dispatcher,
    extensions: Vec<Extension>,
    stamp: Stamp,
    close: CloseHandle,
}

impl Replier {
    /// Bind the service endpoint and seal the registry
    ///
    /// Fails when the endpoint cannot be bound or a route requires an
    /// extension that is not configured.
    pub async fn bind(
        config: ServiceConfig,
        registry: CommandRegistry,
        extensions: Vec<ExtensionConfig>,
    ) -> Result<Self> {
        Self::bind_with_handle(config, registry, extensions, CloseHandle::new()).await
    }

    pub(crate) async fn bind_with_handle(
        config: ServiceConfig,
        mut registry: CommandRegistry,
        extensions: Vec<ExtensionConfig>,
        close: CloseHandle,
    ) -> Result<Self> {
        config.validate()?;
        let dispatcher = registry.resolve(&extension::names(&extensions))?;
        let socket = RouterSocket::bind(&config.endpoint).await?;
        let stamp = config.stamp(socket.local_endpoint());

        info!(
            service = %config.name,
            endpoint = %socket.local_endpoint(),
            routes = registry.len(),
            "replier bound"
        );

        Ok(Self {
            name: config.name,
            socket,
            dispatcher,
            extensions: extension::from_configs(&extensions),
            stamp,
            close,
        })
    }

    pub fn local_endpoint(&self) -> &Endpoint {
        self.socket.local_endpoint()
    }
}

#[async_trait::async_trait]
impl Service for Replier {
    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    async fn run(mut self) -> Result<()> {
        let mut closed = self.close.signal();

        loop {
            let message = tokio::select! {
                _ = closed.closed() => break,
                message = self.socket.recv() => message?,
            };

            let (envelope, body) = Envelope::split(message);
            let reply =
                serve::answer(&body, &self.dispatcher, &mut self.extensions, &self.stamp).await;
            self.socket.send(envelope.wrap([reply])).await?;
        }

        debug!(service = %self.name, "replier closing");
        for extension in &mut self.extensions {
            extension.close().await?;
        }
        self.socket.close().await?;
        Ok(())
    }
}
