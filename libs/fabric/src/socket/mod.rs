//! Message-oriented sockets built on the framed transports
//!
//! - [`RouterSocket`]: bound, identity-prefixes inbound messages and routes
//!   outbound ones by identity
//! - [`DealerSocket`]: connected, plain multipart send/receive
//! - [`PublisherSocket`] / [`SubscriberSocket`]: topic broadcasts

pub mod dealer;
pub mod envelope;
pub mod publish;
pub mod router;

pub use self::dealer::DealerSocket;
pub use self::envelope::Envelope;
pub use self::publish::{PublisherSocket, SubscriberSocket};
pub use self::router::RouterSocket;

/// Default bound on messages queued inside a socket
pub const DEFAULT_HIGH_WATER_MARK: usize = 1000;
