use constellation_core::{Reply, Request};
use tracing::{debug, warn};

use crate::extension::Extension;
use crate::registry::Dispatcher;
use crate::trace::Stamp;

/// Turn one request body into the bytes of its reply
///
/// `body` is what is left of a message after its routing envelope; a single
/// frame holding the request is expected. Anything unparseable is answered
/// with a FAIL reply and no handler runs.
pub(crate) async fn answer(
    body: &[Vec<u8>],
    dispatcher: &Dispatcher,
    extensions: &mut [Extension],
    stamp: &Stamp,
) -> Vec<u8> {
    let mut request = match parse_body(body) {
        Ok(request) => request,
        Err(message) => {
            debug!(source = stamp.source(), %message, "rejecting malformed request");
            return encode_reply(Reply::fail(message));
        }
    };

    request.ensure_uuid();
    stamp.request(&mut request);
    let uuid = request.uuid.clone();
    let trace = request.trace.clone();

    let mut reply = dispatcher.dispatch(request, extensions).await;
    reply.uuid = uuid;
    reply.trace = trace;
    stamp.reply(&mut reply);

    encode_reply(reply)
}

pub(crate) fn parse_body(body: &[Vec<u8>]) -> Result<Request, String> {
    match body {
        [payload] => Request::from_bytes(payload).map_err(|e| format!("malformed request: {e}")),
        _ => Err(format!(
            "malformed request: expected 1 frame, got {}",
            body.len()
        )),
    }
}

/// Serialize a reply, replacing one that cannot be sent with a FAIL
pub(crate) fn encode_reply(reply: Reply) -> Vec<u8> {
    let uuid = reply.uuid.clone();
    let trace = reply.trace.clone();
    match reply.to_bytes() {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(%error, "handler produced an invalid reply");
            let mut fallback = Reply::fail(format!("invalid reply: {error}"));
            fallback.uuid = uuid;
            fallback.trace = trace;
            // A FAIL with a message and plain JSON fields always serializes
            fallback.to_bytes().unwrap_or_default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{handler_fn, CommandRegistry, Route};
    use constellation_core::Parameters;

    fn dispatcher() -> Dispatcher {
        CommandRegistry::new()
            .with(Route::new(
                "ping",
                handler_fn(|_| Reply::ok(Parameters::new()).with_parameter("pong", true)),
            ))
            .unwrap()
            .with(Route::new("broken", handler_fn(|_| Reply::fail(""))))
            .unwrap()
            .resolve(&[])
            .unwrap()
    }

    fn stamp() -> Stamp {
        Stamp::new("inproc://serve", "service", "instance")
    }

    #[tokio::test]
    async fn reply_carries_uuid_and_completed_hop() {
        let body = vec![Request::new("ping").to_bytes().unwrap()];
        let bytes = answer(&body, &dispatcher(), &mut [], &stamp()).await;
        let reply = Reply::from_bytes(&bytes).unwrap();

        assert!(reply.is_ok());
        assert_eq!(reply.parameters["pong"], true);
        assert!(!reply.uuid.is_empty());
        assert_eq!(reply.trace.len(), 1);
        assert!(reply.trace[0].is_complete());
        assert_eq!(reply.trace[0].source, "inproc://serve");
    }

    #[tokio::test]
    async fn existing_uuid_is_kept() {
        let mut request = Request::new("ping");
        request.uuid = "fixed".to_string();
        let bytes = answer(&[request.to_bytes().unwrap()], &dispatcher(), &mut [], &stamp()).await;
        assert_eq!(Reply::from_bytes(&bytes).unwrap().uuid, "fixed");
    }

    #[tokio::test]
    async fn malformed_bodies_fail_without_dispatch() {
        for body in [vec![b"not json".to_vec()], vec![], vec![Vec::new(), Vec::new()]] {
            let bytes = answer(&body, &dispatcher(), &mut [], &stamp()).await;
            let reply = Reply::from_bytes(&bytes).unwrap();
            assert!(!reply.is_ok());
            assert!(reply.message.starts_with("malformed request"));
            assert!(reply.trace.is_empty());
        }
    }

    #[tokio::test]
    async fn invalid_handler_reply_becomes_fail() {
        let body = vec![Request::new("broken").to_bytes().unwrap()];
        let bytes = answer(&body, &dispatcher(), &mut [], &stamp()).await;
        let reply = Reply::from_bytes(&bytes).unwrap();
        assert!(!reply.is_ok());
        assert!(reply.message.starts_with("invalid reply"));
    }
}
