use constellation_core::{Broadcast, Parameters, Reply};
use constellation_fabric::{
    DealerSocket, Endpoint, Envelope, PublisherSocket, RouterSocket, SubscriberSocket,
};
use std::time::Duration;

fn frames(parts: &[&str]) -> Vec<Vec<u8>> {
    parts.iter().map(|p| p.as_bytes().to_vec()).collect()
}

#[tokio::test]
async fn router_prefixes_identity_and_routes_back() {
    let endpoint = Endpoint::inproc("socket-tests-router");
    let mut router = RouterSocket::bind(&endpoint).await.unwrap();
    let mut dealer = DealerSocket::connect(&endpoint).await.unwrap();

    dealer.send(&frames(&["", "hello"])).await.unwrap();

    let message = router.recv().await.unwrap();
    assert_eq!(message.len(), 3);
    assert!(message[1].is_empty());
    assert_eq!(message[2], b"hello");

    let (envelope, body) = Envelope::split(message);
    assert_eq!(body, frames(&["hello"]));
    router.send(envelope.wrap([b"world".to_vec()])).await.unwrap();

    let reply = dealer.recv().await.unwrap();
    assert_eq!(reply, frames(&["", "world"]));
}

#[tokio::test]
async fn full_router_queue_holds_senders_back() {
    let endpoint = Endpoint::inproc("socket-tests-high-water-mark");
    let mut router = RouterSocket::bind_with_capacity(&endpoint, 1).await.unwrap();
    let mut dealer = DealerSocket::connect(&endpoint).await.unwrap();

    let sender = tokio::spawn(async move {
        for i in 0..20 {
            dealer.send(&frames(&["", i.to_string().as_str()])).await.unwrap();
        }
        dealer
    });

    // Nobody reads for a while; the queue stays full
    tokio::time::sleep(Duration::from_millis(50)).await;

    for i in 0..20 {
        let message = tokio::time::timeout(Duration::from_secs(2), router.recv())
            .await
            .unwrap()
            .unwrap();
        let (_, body) = Envelope::split(message);
        assert_eq!(body, frames(&[i.to_string().as_str()]));
    }
    sender.await.unwrap();
}

#[tokio::test]
async fn router_keeps_peers_apart() {
    let endpoint = Endpoint::tcp("127.0.0.1", 0);
    let mut router = RouterSocket::bind(&endpoint).await.unwrap();
    let endpoint = router.local_endpoint().clone();

    let mut first = DealerSocket::connect(&endpoint).await.unwrap();
    let mut second = DealerSocket::connect(&endpoint).await.unwrap();

    first.send(&frames(&["", "from first"])).await.unwrap();
    second.send(&frames(&["", "from second"])).await.unwrap();

    // Answer each peer with what it said
    for _ in 0..2 {
        let message = router.recv().await.unwrap();
        let (envelope, body) = Envelope::split(message);
        router.send(envelope.wrap(body)).await.unwrap();
    }

    assert_eq!(first.recv().await.unwrap(), frames(&["", "from first"]));
    assert_eq!(second.recv().await.unwrap(), frames(&["", "from second"]));
    assert_eq!(router.peer_count(), 2);
}

#[tokio::test]
async fn router_drops_messages_for_unknown_peers() {
    let endpoint = Endpoint::inproc("socket-tests-unknown-peer");
    let mut router = RouterSocket::bind(&endpoint).await.unwrap();

    router
        .send(frames(&["nobody", "", "lost"]))
        .await
        .unwrap();
    assert!(router.send(Vec::new()).await.is_err());
}

#[tokio::test]
async fn router_forgets_disconnected_peers() {
    let endpoint = Endpoint::inproc("socket-tests-disconnect");
    let mut router = RouterSocket::bind(&endpoint).await.unwrap();

    let mut dealer = DealerSocket::connect(&endpoint).await.unwrap();
    dealer.send(&frames(&["", "bye"])).await.unwrap();
    router.recv().await.unwrap();
    assert_eq!(router.peer_count(), 1);
    dealer.close().await.unwrap();

    // A second peer's message is only seen after the disconnect event
    let mut other = DealerSocket::connect(&endpoint).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    other.send(&frames(&["", "hi"])).await.unwrap();
    router.recv().await.unwrap();
    assert_eq!(router.peer_count(), 1);
}

#[tokio::test]
async fn dealer_try_recv_drains_queued_messages() {
    let endpoint = Endpoint::inproc("socket-tests-drain");
    let mut router = RouterSocket::bind(&endpoint).await.unwrap();
    let mut dealer = DealerSocket::connect(&endpoint).await.unwrap();

    dealer.send(&frames(&["", "ping"])).await.unwrap();
    let (envelope, _) = Envelope::split(router.recv().await.unwrap());
    for reply in ["one", "two", "three"] {
        router.send(envelope.wrap([reply.as_bytes().to_vec()])).await.unwrap();
    }

    let first = dealer.recv().await.unwrap();
    assert_eq!(first, frames(&["", "one"]));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let mut rest = Vec::new();
    while let Some(message) = dealer.try_recv() {
        rest.push(message);
    }
    assert_eq!(rest, vec![frames(&["", "two"]), frames(&["", "three"])]);
    assert!(dealer.try_recv().is_none());
}

#[tokio::test]
async fn subscriber_filters_on_topic_prefix() {
    let endpoint = Endpoint::inproc("socket-tests-pubsub");
    let publisher = PublisherSocket::bind(&endpoint).await.unwrap();
    let mut subscriber = SubscriberSocket::connect(&endpoint, "blocks.").await.unwrap();
    assert_eq!(subscriber.prefix(), "blocks.");

    // Wait for the publisher to attach the subscriber
    for _ in 0..100 {
        if publisher.subscriber_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(publisher.subscriber_count(), 1);

    let ignored = Broadcast::new("accounts.updated", Reply::ok(Parameters::new()));
    let wanted = Broadcast::new(
        "blocks.new",
        Reply::ok(Parameters::new()).with_parameter("height", 7),
    );
    publisher.publish(&ignored).unwrap();
    publisher.publish(&wanted).unwrap();

    let received = tokio::time::timeout(Duration::from_secs(2), subscriber.receive())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, wanted);
}

#[tokio::test]
async fn publishing_without_subscribers_is_fine() {
    let endpoint = Endpoint::inproc("socket-tests-lonely-publisher");
    let publisher = PublisherSocket::bind(&endpoint).await.unwrap();
    let broadcast = Broadcast::new("anything", Reply::ok(Parameters::new()));
    assert_eq!(publisher.publish(&broadcast).unwrap(), 0);
}
