//! Configuration consumed by the servers
//!
//! Loading these from files or flags is up to the embedding process; every
//! struct deserializes with serde and carries documented defaults.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use constellation_fabric::{ClientConfig, Endpoint, TransportKind};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::trace::Stamp;

pub const DEFAULT_CATEGORY: &str = "service";
pub const DEFAULT_HIGH_WATER_MARK: usize = constellation_fabric::socket::DEFAULT_HIGH_WATER_MARK;

/// Identity and address of one server instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub endpoint: Endpoint,
    /// Controller category recorded in trace hops
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

fn default_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            name: name.into(),
            endpoint,
            category: default_category(),
            instance_id: default_instance_id(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = instance_id.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::Config("service name is empty".to_string()));
        }
        if self.instance_id.is_empty() {
            return Err(Error::Config(format!("service '{}' has no instance id", self.name)));
        }
        Ok(())
    }

    /// Hop stamp for a server bound at `bound`
    pub(crate) fn stamp(&self, bound: &Endpoint) -> Stamp {
        Stamp::new(bound.to_string(), self.category.clone(), self.instance_id.clone())
    }
}

/// A capability dependency handlers may call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionConfig {
    pub name: String,
    pub endpoint: Endpoint,
    #[serde(default)]
    pub client: ClientConfig,
}

impl ExtensionConfig {
    pub fn new(name: impl Into<String>, endpoint: Endpoint) -> Self {
        Self {
            name: name.into(),
            endpoint,
            client: ClientConfig::default(),
        }
    }

    pub fn with_client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Look the extension's endpoint up by service name
    pub fn resolve(
        name: impl Into<String>,
        resolver: &impl AddressResolver,
        transport: TransportKind,
    ) -> Result<Self> {
        let name = name.into();
        let endpoint = resolver.resolve(&name, transport)?;
        Ok(Self::new(name, endpoint))
    }
}

/// Sizing of an asynchronous replier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of workers, one per available core when unset
    pub workers: Option<usize>,
    /// Bound on requests queued in the frontend socket
    pub high_water_mark: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: None,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|workers| *workers > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(NonZeroUsize::get)
                    .unwrap_or(1)
            })
    }
}

/// Resolves a service name to the endpoint it is reachable at
pub trait AddressResolver {
    fn resolve(&self, service: &str, transport: TransportKind) -> Result<Endpoint>;
}

/// Resolver backed by a fixed table
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<(String, TransportKind), Endpoint>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint; its transport is taken from the endpoint itself
    pub fn insert(&mut self, service: impl Into<String>, endpoint: Endpoint) -> &mut Self {
        self.entries
            .insert((service.into(), endpoint.transport()), endpoint);
        self
    }
}

impl AddressResolver for StaticResolver {
    fn resolve(&self, service: &str, transport: TransportKind) -> Result<Endpoint> {
        self.entries
            .get(&(service.to_string(), transport))
            .cloned()
            .ok_or_else(|| Error::UnknownService {
                service: service.to_string(),
                transport: transport.to_string(),
            })
    }
}
