//! Constellation Core - Message model shared by every service
//!
//! Defines the request, reply and broadcast envelopes exchanged between
//! services, together with the hop trace each server appends to them.
//! Everything serializes to JSON with the field names used on the wire.
//!
//! # Example
//!
//! ```
//! use constellation_core::{Reply, Request};
//!
//! let request = Request::new("ping").with_parameter("count", 1);
//! let bytes = request.to_bytes().unwrap();
//! assert_eq!(Request::from_bytes(&bytes).unwrap(), request);
//!
//! let reply = Reply::fail("no such account");
//! assert!(!reply.is_ok());
//! ```

use serde::{Deserialize, Deserializer};

pub mod broadcast;
pub mod error;
pub mod hop;
pub mod reply;
pub mod request;

// Re-exports for convenience
pub use broadcast::Broadcast;
pub use error::{Error, Result};
pub use hop::Hop;
pub use reply::{Reply, Status};
pub use request::Request;

/// Command parameters, an unordered map of arbitrary JSON values
pub type Parameters = serde_json::Map<String, serde_json::Value>;

// Some peers encode an empty trace as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
