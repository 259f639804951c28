use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Fabric(#[from] constellation_fabric::Error),

    #[error("Message error: {0}")]
    Message(#[from] constellation_core::Error),

    #[error("Command already registered: {0}")]
    DuplicateRoute(String),

    #[error("Registry is sealed, cannot register: {0}")]
    RegistrySealed(String),

    #[error("Command '{command}' requires extension '{extension}' which is not configured")]
    MissingExtension { command: String, extension: String },

    #[error("Extension '{0}' is not available to this handler")]
    ExtensionUnavailable(String),

    #[error("Dealer already registered for service: {0}")]
    DuplicateDealer(String),

    #[error("Unknown service '{service}' on {transport}")]
    UnknownService { service: String, transport: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, Error>;
