use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub mod json;

pub use self::json::JsonCodec;

/// Turns typed values into single frame payloads and back
///
/// [`Channel`](crate::Channel) is generic over this so ad hoc peers can pick
/// their encoding. Requests, replies and broadcasts always travel as JSON.
pub trait Codec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    fn decode<T: DeserializeOwned>(&self, frame: &[u8]) -> Result<T>;
}
