use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::hop::Hop;
use crate::Parameters;

/// Outcome of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "fail")]
    Fail,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::Fail => write!(f, "fail"),
        }
    }
}

/// The answer to a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub uuid: String,
    #[serde(default, deserialize_with = "crate::null_as_default")]
    pub trace: Vec<Hop>,
    pub status: Status,
    #[serde(default)]
    pub message: String,
    pub parameters: Parameters,
}

impl Reply {
    pub fn ok(parameters: Parameters) -> Self {
        Self {
            uuid: String::new(),
            trace: Vec::new(),
            status: Status::Ok,
            message: String::new(),
            parameters,
        }
    }

    /// A failed reply with empty parameters
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            uuid: String::new(),
            trace: Vec::new(),
            status: Status::Fail,
            message: message.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Parameters on success, the failure message otherwise
    pub fn into_result(self) -> std::result::Result<Parameters, String> {
        match self.status {
            Status::Ok => Ok(self.parameters),
            Status::Fail => Err(self.message),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.status == Status::Fail && self.message.is_empty() {
            return Err(Error::MissingFailureMessage);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let reply: Self = serde_json::from_slice(bytes)?;
        reply.validate()?;
        Ok(reply)
    }
}
