//! Management endpoint
//!
//! Every process can expose a small replier that answers `heartbeat` and
//! shuts the process's servers down on `close`.

use constellation_core::{Parameters, Reply};
use tracing::info;

use crate::config::ServiceConfig;
use crate::error::Result;
use crate::lifecycle::CloseHandle;
use crate::registry::{handler_fn, CommandRegistry, Route};
use crate::replier::Replier;

pub const CLOSE_COMMAND: &str = "close";
pub const HEARTBEAT_COMMAND: &str = "heartbeat";

/// Bind a management replier that closes `targets`, and then itself, on
/// `close`
pub async fn bind(config: ServiceConfig, targets: Vec<CloseHandle>) -> Result<Replier> {
    let own = CloseHandle::new();
    let service = config.name.clone();

    let mut registry = CommandRegistry::new();
    registry.register(Route::new(HEARTBEAT_COMMAND, {
        let service = service.clone();
        handler_fn(move |_| Reply::ok(Parameters::new()).with_parameter("service", service.clone()))
    }))?;
    registry.register(Route::new(CLOSE_COMMAND, {
        let own = own.clone();
        handler_fn(move |_| {
            info!(%service, targets = targets.len(), "close requested");
            for target in &targets {
                target.close();
            }
            own.close();
            Reply::ok(Parameters::new())
        })
    }))?;

    Replier::bind_with_handle(config, registry, Vec::new(), own).await
}
