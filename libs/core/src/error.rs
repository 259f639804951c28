use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Request has no command")]
    MissingCommand,

    #[error("Failed reply has no message")]
    MissingFailureMessage,

    #[error("{0}")]
    Custom(String),
}

impl Error {
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
