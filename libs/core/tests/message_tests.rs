use constellation_core::{Broadcast, Error, Hop, Parameters, Reply, Request, Status};
use serde_json::{json, Value};

fn sample_request() -> Request {
    let mut request = Request::new("transfer")
        .with_parameter("amount", 12)
        .with_parameter("memo", "rent")
        .with_parameter("tags", json!(["a", "b"]));
    request.uuid = "3f1c".to_string();
    request.push_hop(Hop::new("tcp://localhost:4000", "transfer", "gateway", "gw-1"));
    request
}

#[test]
fn request_roundtrip() {
    let request = sample_request();
    let bytes = request.to_bytes().unwrap();
    assert_eq!(Request::from_bytes(&bytes).unwrap(), request);
}

#[test]
fn reply_and_broadcast_roundtrip() {
    let reply = Reply::ok(Parameters::new()).with_parameter("balance", 40);
    let bytes = reply.to_bytes().unwrap();
    assert_eq!(Reply::from_bytes(&bytes).unwrap(), reply);

    let broadcast = Broadcast::new("accounts.updated", Reply::fail("frozen"));
    let bytes = broadcast.to_bytes().unwrap();
    assert_eq!(Broadcast::from_bytes(&bytes).unwrap(), broadcast);
}

#[test]
fn wire_field_names_are_exact() {
    let value: Value = serde_json::from_slice(&sample_request().to_bytes().unwrap()).unwrap();
    let object = value.as_object().unwrap();
    for field in ["uuid", "trace", "command", "parameters"] {
        assert!(object.contains_key(field), "missing {field}");
    }

    let hop = value["trace"][0].as_object().unwrap();
    for field in ["source", "requestTime", "replyTime", "command", "serviceId", "serverId"] {
        assert!(hop.contains_key(field), "missing hop field {field}");
    }

    let reply: Value = serde_json::from_slice(&Reply::fail("boom").to_bytes().unwrap()).unwrap();
    assert_eq!(reply["status"], "fail");
    let reply: Value =
        serde_json::from_slice(&Reply::ok(Parameters::new()).to_bytes().unwrap()).unwrap();
    assert_eq!(reply["status"], "OK");
}

#[test]
fn empty_command_fails_serialization() {
    let request = Request::new("");
    assert!(matches!(request.to_bytes(), Err(Error::MissingCommand)));
}

#[test]
fn failed_reply_without_message_fails_serialization() {
    let reply = Reply::fail("");
    assert!(matches!(reply.to_bytes(), Err(Error::MissingFailureMessage)));
}

#[test]
fn request_without_command_is_rejected() {
    let bytes = br#"{"uuid":"","trace":[],"parameters":{}}"#;
    assert!(Request::from_bytes(bytes).is_err());

    let bytes = br#"{"command":"","parameters":{}}"#;
    assert!(matches!(Request::from_bytes(bytes), Err(Error::MissingCommand)));
}

#[test]
fn null_or_missing_parameters_are_rejected() {
    assert!(Request::from_bytes(br#"{"command":"ping","parameters":null}"#).is_err());
    assert!(Request::from_bytes(br#"{"command":"ping"}"#).is_err());
    assert!(Reply::from_bytes(br#"{"status":"OK","parameters":null}"#).is_err());
}

#[test]
fn reply_status_must_be_known() {
    assert!(Reply::from_bytes(br#"{"parameters":{}}"#).is_err());
    assert!(Reply::from_bytes(br#"{"status":"maybe","parameters":{}}"#).is_err());
    assert!(Reply::from_bytes(br#"{"status":"fail","parameters":{}}"#).is_err());

    let reply = Reply::from_bytes(br#"{"status":"fail","message":"nope","parameters":{}}"#).unwrap();
    assert_eq!(reply.status, Status::Fail);
}

#[test]
fn unknown_fields_and_null_trace_are_accepted() {
    let bytes = br#"{"command":"ping","parameters":{},"trace":null,"priority":"high"}"#;
    let request = Request::from_bytes(bytes).unwrap();
    assert_eq!(request.command, "ping");
    assert!(request.trace.is_empty());
    assert!(request.uuid.is_empty());
}

#[test]
fn public_key_stays_off_the_wire() {
    let request = Request::new("ping").with_public_key("ed25519:abcd");
    let value: Value = serde_json::from_slice(&request.to_bytes().unwrap()).unwrap();
    assert!(value.get("public_key").is_none());
    assert!(value.get("publicKey").is_none());

    let parsed = Request::from_bytes(&request.to_bytes().unwrap()).unwrap();
    assert_eq!(parsed.public_key, None);
}

#[test]
fn uuid_is_assigned_once() {
    let mut request = Request::new("ping");
    assert!(request.ensure_uuid());
    let assigned = request.uuid.clone();
    assert!(!request.ensure_uuid());
    assert_eq!(request.uuid, assigned);
}

#[test]
fn reply_into_result() {
    let parameters = Reply::ok(Parameters::new())
        .with_parameter("pong", true)
        .into_result()
        .unwrap();
    assert_eq!(parameters["pong"], json!(true));

    assert_eq!(Reply::fail("denied").into_result().unwrap_err(), "denied");
}

#[test]
fn broadcast_topic_prefix() {
    let broadcast = Broadcast::new("blocks.new", Reply::ok(Parameters::new()));
    assert!(broadcast.matches("blocks."));
    assert!(broadcast.matches(""));
    assert!(!broadcast.matches("accounts"));

    // An empty topic is allowed and reaches every subscriber
    let everyone = Broadcast::new("", Reply::ok(Parameters::new()));
    assert!(everyone.matches(""));
    let bytes = everyone.to_bytes().unwrap();
    assert_eq!(Broadcast::from_bytes(&bytes).unwrap(), everyone);

    assert!(Broadcast::new("blocks.new", Reply::fail("")).to_bytes().is_err());
}
