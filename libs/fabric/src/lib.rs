//! Constellation Fabric - Low-level transport and socket layer
//!
//! Provides multipart framing over TCP and in-process transports, the
//! router/dealer socket pair brokers are built from, topic broadcasts, and
//! the resilient [`ClientSocket`] services use to call each other.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use constellation_core::Request;
//! use constellation_fabric::{ClientSocket, Endpoint};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint: Endpoint = "tcp://localhost:5555".parse()?;
//! let mut client = ClientSocket::new(endpoint, Duration::from_secs(5), 3);
//!
//! let parameters = client.call(&Request::new("ping")).await?;
//! println!("{parameters:?}");
//!
//! // Or go through a router to a named service
//! let parameters = client
//!     .call_through_router("ledger", &Request::new("balance"))
//!     .await?;
//! println!("{parameters:?}");
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod client;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod request;
pub mod socket;
pub mod transport;

// Re-exports for convenience
pub use channel::Channel;
pub use client::{ClientConfig, ClientSocket};
pub use endpoint::{Endpoint, TransportKind};
pub use error::{Error, Result};
pub use socket::{DealerSocket, Envelope, PublisherSocket, RouterSocket, SubscriberSocket};
pub use transport::Multipart;
