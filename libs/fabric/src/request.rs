use constellation_core::{Parameters, Request};

use crate::client::{ClientConfig, ClientSocket};
use crate::endpoint::Endpoint;
use crate::error::Result;

/// Perform a one-off request/reply
///
/// Opens a client socket, calls, and closes it again. The call keeps the
/// retry semantics of [`ClientSocket::call`].
pub async fn request(endpoint: &Endpoint, request: &Request, config: &ClientConfig) -> Result<Parameters> {
    let mut client = ClientSocket::from_config(endpoint.clone(), config);
    let result = client.call(request).await;
    client.close().await?;
    result
}

/// Perform a one-off request/reply through a router
pub async fn request_through_router(
    endpoint: &Endpoint,
    service: &str,
    request: &Request,
    config: &ClientConfig,
) -> Result<Parameters> {
    let mut client = ClientSocket::from_config(endpoint.clone(), config);
    let result = client.call_through_router(service, request).await;
    client.close().await?;
    result
}
