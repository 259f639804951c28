use constellation_core::{Parameters, Request};
use constellation_fabric::ClientSocket;

use crate::config::ExtensionConfig;
use crate::error::{Error, Result};

/// A named client to another service, owned by one server or worker
pub struct Extension {
    name: String,
    client: ClientSocket,
}

impl Extension {
    pub fn new(name: impl Into<String>, client: ClientSocket) -> Self {
        Self {
            name: name.into(),
            client,
        }
    }

    /// Build the extension's client; it connects on first use
    pub fn from_config(config: &ExtensionConfig) -> Self {
        Self::new(
            config.name.clone(),
            ClientSocket::from_config(config.endpoint.clone(), &config.client),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&mut self) -> &mut ClientSocket {
        &mut self.client
    }

    pub async fn close(&mut self) -> Result<()> {
        Ok(self.client.close().await?)
    }
}

/// Build one extension per config, keeping their order
pub(crate) fn from_configs(configs: &[ExtensionConfig]) -> Vec<Extension> {
    configs.iter().map(Extension::from_config).collect()
}

pub(crate) fn names(configs: &[ExtensionConfig]) -> Vec<String> {
    configs.iter().map(|config| config.name.clone()).collect()
}

/// The extensions a route declared, handed to its handler for one call
pub struct Extensions<'a> {
    slots: Vec<&'a mut Extension>,
}

impl<'a> Extensions<'a> {
    pub(crate) fn new(slots: Vec<&'a mut Extension>) -> Self {
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Names in the order the server's extensions were configured
    pub fn names(&self) -> Vec<&str> {
        self.slots.iter().map(|extension| extension.name()).collect()
    }

    pub fn get(&mut self, name: &str) -> Option<&mut ClientSocket> {
        self.slots
            .iter_mut()
            .find(|extension| extension.name == name)
            .map(|extension| extension.client())
    }

    /// Call the named extension and return its reply parameters
    pub async fn call(&mut self, name: &str, request: &Request) -> Result<Parameters> {
        let client = self
            .get(name)
            .ok_or_else(|| Error::ExtensionUnavailable(name.to_string()))?;
        Ok(client.call(request).await?)
    }
}
