//! Command routing
//!
//! A [`CommandRegistry`] collects [`Route`]s while a server is being built.
//! Resolving it against the server's extension list seals it and yields a
//! [`Dispatcher`], which the serving loops use to find the handler for each
//! request.

use std::collections::HashMap;
use std::sync::Arc;

use constellation_core::{Reply, Request};
use tracing::{debug_span, Instrument};

use crate::error::{Error, Result};
use crate::extension::{Extension, Extensions};

/// Route that answers every command without its own route
pub const WILDCARD: &str = "*";

/// Handles one command
///
/// Failures are expressed as a FAIL reply, never as a panic.
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request, extensions: Extensions<'_>) -> Reply;
}

/// Adapter for plain synchronous closures
pub struct FnHandler<F>(F);

#[async_trait::async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(Request) -> Reply + Send + Sync,
{
    async fn handle(&self, request: Request, _extensions: Extensions<'_>) -> Reply {
        (self.0)(request)
    }
}

pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(Request) -> Reply + Send + Sync,
{
    FnHandler(f)
}

/// A command name bound to its handler and the extensions it needs
pub struct Route {
    command: String,
    handler: Arc<dyn Handler>,
    requires: Vec<String>,
}

impl Route {
    pub fn new(command: impl Into<String>, handler: impl Handler + 'static) -> Self {
        Self {
            command: command.into(),
            handler: Arc::new(handler),
            requires: Vec::new(),
        }
    }

    /// Route for any command without an exact match
    pub fn wildcard(handler: impl Handler + 'static) -> Self {
        Self::new(WILDCARD, handler)
    }

    /// Declare an extension the handler calls
    pub fn requires(mut self, extension: impl Into<String>) -> Self {
        self.requires.push(extension.into());
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[derive(Default)]
pub struct CommandRegistry {
    routes: HashMap<String, Route>,
    sealed: bool,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, route: Route) -> Result<()> {
        if self.sealed {
            return Err(Error::RegistrySealed(route.command));
        }
        if self.routes.contains_key(&route.command) {
            return Err(Error::DuplicateRoute(route.command));
        }
        self.routes.insert(route.command.clone(), route);
        Ok(())
    }

    /// Builder form of [`CommandRegistry::register`]
    pub fn with(mut self, route: Route) -> Result<Self> {
        self.register(route)?;
        Ok(self)
    }

    /// Refuse further registrations
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Seal the registry and map every route's extensions to positions in
    /// `extension_names`
    ///
    /// Fails when a route requires an extension that is not in the list.
    pub fn resolve(&mut self, extension_names: &[String]) -> Result<Dispatcher> {
        self.seal();

        let mut routes = HashMap::with_capacity(self.routes.len());
        for (command, route) in &self.routes {
            let mut slots = Vec::with_capacity(route.requires.len());
            for required in &route.requires {
                let index = extension_names
                    .iter()
                    .position(|name| name == required)
                    .ok_or_else(|| Error::MissingExtension {
                        command: command.clone(),
                        extension: required.clone(),
                    })?;
                slots.push(index);
            }
            slots.sort_unstable();
            slots.dedup();

            routes.insert(
                command.clone(),
                ResolvedRoute {
                    handler: route.handler.clone(),
                    slots,
                },
            );
        }

        Ok(Dispatcher {
            routes: Arc::new(routes),
        })
    }
}

struct ResolvedRoute {
    handler: Arc<dyn Handler>,
    /// Ascending positions in the server's extension list
    slots: Vec<usize>,
}

/// Sealed, shareable view of a registry
#[derive(Clone)]
pub struct Dispatcher {
    routes: Arc<HashMap<String, ResolvedRoute>>,
}

impl Dispatcher {
    pub fn contains(&self, command: &str) -> bool {
        self.routes.contains_key(command)
    }

    /// Run the handler for the request's command
    ///
    /// `extensions` must be the list the dispatcher was resolved against. The
    /// handler only sees the extensions its route declared.
    pub async fn dispatch(&self, request: Request, extensions: &mut [Extension]) -> Reply {
        let Some(route) = self
            .routes
            .get(&request.command)
            .or_else(|| self.routes.get(WILDCARD))
        else {
            return Reply::fail(format!("handler not found for command: {}", request.command));
        };

        let subset = extensions
            .iter_mut()
            .enumerate()
            .filter(|(index, _)| route.slots.binary_search(index).is_ok())
            .map(|(_, extension)| extension)
            .collect();

        let span = debug_span!("dispatch", command = %request.command, uuid = %request.uuid);
        route
            .handler
            .handle(request, Extensions::new(subset))
            .instrument(span)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use constellation_core::Parameters;

    fn echo(request: Request) -> Reply {
        Reply::ok(request.parameters)
    }

    #[test]
    fn duplicate_and_sealed_registrations_fail() {
        let mut registry = CommandRegistry::new();
        registry.register(Route::new("echo", handler_fn(echo))).unwrap();

        assert!(matches!(
            registry.register(Route::new("echo", handler_fn(echo))),
            Err(Error::DuplicateRoute(command)) if command == "echo"
        ));

        registry.seal();
        assert!(registry.is_sealed());
        assert!(matches!(
            registry.register(Route::new("other", handler_fn(echo))),
            Err(Error::RegistrySealed(_))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolve_reports_missing_extensions() {
        let mut registry = CommandRegistry::new()
            .with(Route::new("pay", handler_fn(echo)).requires("wallet"))
            .unwrap();

        let error = registry.resolve(&["ledger".to_string()]).err().unwrap();
        match error {
            Error::MissingExtension { command, extension } => {
                assert_eq!(command, "pay");
                assert_eq!(extension, "wallet");
            }
            e => panic!("Expected MissingExtension, got {:?}", e),
        }
        assert!(registry.is_sealed());
    }

    #[tokio::test]
    async fn unknown_command_names_itself() {
        let dispatcher = CommandRegistry::new()
            .with(Route::new("echo", handler_fn(echo)))
            .unwrap()
            .resolve(&[])
            .unwrap();

        let reply = dispatcher.dispatch(Request::new("nope"), &mut []).await;
        assert!(!reply.is_ok());
        assert_eq!(reply.message, "handler not found for command: nope");
    }

    #[tokio::test]
    async fn exact_route_wins_over_wildcard() {
        let dispatcher = CommandRegistry::new()
            .with(Route::new("echo", handler_fn(echo)))
            .unwrap()
            .with(Route::wildcard(handler_fn(|request: Request| {
                Reply::ok(Parameters::new()).with_parameter("fallback", request.command)
            })))
            .unwrap()
            .resolve(&[])
            .unwrap();

        assert!(dispatcher.contains("echo"));
        assert!(dispatcher.contains(WILDCARD));
        assert!(!dispatcher.contains("other"));

        let reply = dispatcher
            .dispatch(Request::new("echo").with_parameter("x", 1), &mut [])
            .await;
        assert_eq!(reply.parameters["x"], 1);

        let reply = dispatcher.dispatch(Request::new("other"), &mut []).await;
        assert_eq!(reply.parameters["fallback"], "other");
    }
}
