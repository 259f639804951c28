use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use constellation_core::{Parameters, Reply, Request};
use constellation_fabric::{ClientSocket, DealerSocket, Endpoint};
use constellation_node::{
    handler_fn, CommandRegistry, Error, Replier, Route, Router, Service, ServiceConfig,
};

/// Replier that answers every command with its own name and counts calls
async fn spawn_service(name: &str) -> (Endpoint, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let service = name.to_string();

    let registry = CommandRegistry::new()
        .with(Route::wildcard(handler_fn(move |request| {
            counter.fetch_add(1, Ordering::SeqCst);
            Reply::ok(Parameters::new())
                .with_parameter("service", service.clone())
                .with_parameter("hops", request.trace.len())
        })))
        .unwrap();

    let config = ServiceConfig::new(name, Endpoint::inproc(name));
    let replier = Replier::bind(config, registry, Vec::new()).await.unwrap();
    let endpoint = replier.local_endpoint().clone();
    tokio::spawn(replier.run());
    (endpoint, calls)
}

#[tokio::test]
async fn tags_reach_only_their_service() {
    let (a, a_calls) = spawn_service("router-tests-a").await;
    let (b, b_calls) = spawn_service("router-tests-b").await;

    let name = "router-tests-fanout";
    let mut router = Router::bind(ServiceConfig::new(name, Endpoint::inproc(name)))
        .await
        .unwrap();
    router.register_dealer("A", &a).await.unwrap();
    router.register_dealer("B", &b).await.unwrap();
    let endpoint = router.local_endpoint().clone();
    tokio::spawn(router.run());

    let mut client = ClientSocket::new(endpoint, Duration::from_secs(2), 1);

    let parameters = client
        .call_through_router("A", &Request::new("balance"))
        .await
        .unwrap();
    assert_eq!(parameters["service"], "router-tests-a");
    // The router's hop travels with the request
    assert_eq!(parameters["hops"], 2);
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 0);

    let parameters = client
        .call_through_router("B", &Request::new("balance"))
        .await
        .unwrap();
    assert_eq!(parameters["service"], "router-tests-b");
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);

    match client.call_through_router("C", &Request::new("balance")).await {
        Err(constellation_fabric::Error::Remote { command, message }) => {
            assert_eq!(command, "balance");
            assert!(message.contains('C'), "message should name the tag: {message}");
        }
        other => panic!("Expected Remote, got {:?}", other),
    }
    assert_eq!(a_calls.load(Ordering::SeqCst) + b_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn untagged_requests_are_rejected() {
    let (a, a_calls) = spawn_service("router-tests-untagged-a").await;

    let name = "router-tests-untagged";
    let mut router = Router::bind(ServiceConfig::new(name, Endpoint::inproc(name)))
        .await
        .unwrap();
    router.register_dealer("A", &a).await.unwrap();
    let endpoint = router.local_endpoint().clone();
    tokio::spawn(router.run());

    let mut dealer = DealerSocket::connect(&endpoint).await.unwrap();
    dealer
        .send(&[Vec::new(), Request::new("balance").to_bytes().unwrap()])
        .await
        .unwrap();

    let message = dealer.recv().await.unwrap();
    let reply = Reply::from_bytes(&message[1]).unwrap();
    assert!(!reply.is_ok());
    assert!(reply.message.starts_with("malformed request"));
    assert_eq!(a_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn trailing_frames_after_the_payload_are_ignored() {
    let (a, a_calls) = spawn_service("router-tests-trailing-a").await;

    let name = "router-tests-trailing";
    let mut router = Router::bind(ServiceConfig::new(name, Endpoint::inproc(name)))
        .await
        .unwrap();
    router.register_dealer("A", &a).await.unwrap();
    let endpoint = router.local_endpoint().clone();
    tokio::spawn(router.run());

    let mut dealer = DealerSocket::connect(&endpoint).await.unwrap();
    dealer
        .send(&[
            Vec::new(),
            b"A".to_vec(),
            Request::new("balance").to_bytes().unwrap(),
            b"extra".to_vec(),
        ])
        .await
        .unwrap();

    let message = tokio::time::timeout(Duration::from_secs(2), dealer.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.len(), 2);
    let reply = Reply::from_bytes(&message[1]).unwrap();
    assert!(reply.is_ok(), "unexpected failure: {}", reply.message);
    assert_eq!(reply.parameters["service"], "router-tests-trailing-a");
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn duplicate_and_unreachable_dealers_fail_registration() {
    let (a, _) = spawn_service("router-tests-dup-a").await;

    let name = "router-tests-dup";
    let mut router = Router::bind(ServiceConfig::new(name, Endpoint::inproc(name)))
        .await
        .unwrap();
    router.register_dealer("A", &a).await.unwrap();

    assert!(matches!(
        router.register_dealer("A", &a).await,
        Err(Error::DuplicateDealer(tag)) if tag == "A"
    ));
    assert!(matches!(
        router
            .register_dealer("B", &Endpoint::inproc("router-tests-nowhere"))
            .await,
        Err(Error::Fabric(_))
    ));
    assert_eq!(router.tags().collect::<Vec<_>>(), vec!["A"]);
}
