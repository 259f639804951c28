//! Constellation Node - Servers that answer requests
//!
//! Commands are registered on a [`CommandRegistry`] and served by one of:
//!
//! - [`Replier`]: one request at a time, strictly in arrival order
//! - [`AsyncReplier`]: a pool of workers fed through a ready queue
//! - [`Router`]: forwards tagged requests to the services it has dealers for
//! - [`Proxy`]: forwards everything to a single destination
//!
//! Every server records a hop in the trace of the requests it handles and
//! runs until its [`CloseHandle`] is closed.
//!
//! # Example
//!
//! ```no_run
//! use constellation_core::{Parameters, Reply};
//! use constellation_fabric::Endpoint;
//! use constellation_node::{handler_fn, CommandRegistry, Replier, Route, Service, ServiceConfig};
//!
//! # async fn example() -> Result<(), constellation_node::Error> {
//! let mut registry = CommandRegistry::new();
//! registry.register(Route::new(
//!     "ping",
//!     handler_fn(|_| Reply::ok(Parameters::new()).with_parameter("pong", true)),
//! ))?;
//!
//! let config = ServiceConfig::new("pinger", Endpoint::tcp("*", 5555));
//! let replier = Replier::bind(config, registry, Vec::new()).await?;
//! replier.run().await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extension;
pub mod lifecycle;
pub mod management;
pub mod proxy;
pub mod registry;
pub mod replier;
pub mod router;
pub mod telemetry;
pub mod trace;
pub mod worker_pool;

mod serve;

// Re-exports for convenience
pub use config::{
    AddressResolver, ExtensionConfig, ServiceConfig, StaticResolver, WorkerPoolConfig,
};
pub use error::{Error, Result};
pub use extension::{Extension, Extensions};
pub use lifecycle::{CloseHandle, Service};
pub use proxy::Proxy;
pub use registry::{handler_fn, CommandRegistry, Dispatcher, Handler, Route, WILDCARD};
pub use replier::Replier;
pub use router::Router;
pub use telemetry::{LogFormat, TelemetryConfig};
pub use trace::Stamp;
pub use worker_pool::AsyncReplier;
