use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::Codec;
use crate::error::{Error, Result};

/// JSON codec, the self-describing encoding used on the wire
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Codec(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, frame: &[u8]) -> Result<T> {
        serde_json::from_slice(frame).map_err(|e| Error::Codec(e.to_string()))
    }
}
