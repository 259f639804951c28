use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::hop::Hop;
use crate::Parameters;

/// A command invocation travelling from a caller to a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Assigned by the first server that sees the request
    #[serde(default)]
    pub uuid: String,
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub trace: Vec<Hop>,
    pub command: String,
    pub parameters: Parameters,
    /// Attached from transport metadata, never put on the wire
    #[serde(skip)]
    pub public_key: Option<String>,
}

impl Request {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            uuid: String::new(),
            trace: Vec::new(),
            command: command.into(),
            parameters: Parameters::new(),
            public_key: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }

    /// Assign a fresh uuid when none is set yet
    ///
    /// Returns true if a uuid was assigned.
    pub fn ensure_uuid(&mut self) -> bool {
        if !self.uuid.is_empty() {
            return false;
        }
        self.uuid = uuid::Uuid::new_v4().to_string();
        true
    }

    pub fn push_hop(&mut self, hop: Hop) {
        self.trace.push(hop);
    }

    pub fn validate(&self) -> Result<()> {
        if self.command.is_empty() {
            return Err(Error::MissingCommand);
        }
        Ok(())
    }

    /// Validate and serialize to the JSON wire form
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse and validate the JSON wire form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let request: Self = serde_json::from_slice(bytes)?;
        request.validate()?;
        Ok(request)
    }
}
