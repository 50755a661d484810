use super::{Hub, HubHandle, PublishMessage, Subscription};
use crate::client::Client;
use crate::notify::{ChannelNotifier, Event, Notifier, NoopNotifier};
use crate::utils::Error;
use bytes::Bytes;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

fn new_hub() -> (Hub, HubHandle) {
    Hub::new(Arc::new(NoopNotifier), 16)
}

fn recording_hub() -> (Hub, HubHandle, Arc<Mutex<Vec<Event>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let sink = calls.clone();
    let notifier: Arc<dyn Notifier> = Arc::new(move |event: Event| sink.lock().unwrap().push(event));
    let (hub, handle) = Hub::new(notifier, 16);
    (hub, handle, calls)
}

fn register(hub: &mut Hub, id: &str) -> (Client, mpsc::Receiver<Bytes>) {
    let (client, rx) = Client::new(id, 256);
    hub.do_register(client.clone());
    assert!(hub.clients.contains_key(&client.key()));
    (client, rx)
}

fn subscribe(hub: &mut Hub, client: &Client, topic: &str) {
    hub.do_subscribe(Subscription::new(client.key(), topic));

    let subscribers = hub.topics.get(topic).expect("topic should exist");
    assert!(subscribers.contains(&client.key()));
    assert!(hub.clients[&client.key()].topics().contains(topic));
}

#[test]
fn test_hub_new() {
    let (hub, _handle) = new_hub();
    assert!(hub.clients.is_empty());
    assert!(hub.topics.is_empty());
    assert!(hub.ids.is_empty());
}

#[test]
fn test_register_is_idempotent() {
    let (mut hub, _handle) = new_hub();
    let (client, _rx) = register(&mut hub, "FAKEUSER|ID");

    hub.do_register(client.clone());

    assert_eq!(hub.clients.len(), 1);
    assert_eq!(hub.ids["FAKEUSER|ID"].len(), 1);
}

#[test]
fn test_reregister_keeps_subscriptions() {
    let (mut hub, _handle) = new_hub();
    let (client, _rx) = register(&mut hub, "u");
    subscribe(&mut hub, &client, "news");

    // the stale copy has no topics recorded
    hub.do_register(client.clone());

    assert!(hub.clients[&client.key()].topics().contains("news"));
}

#[test]
fn test_same_id_registers_two_entries() {
    let (mut hub, _handle) = new_hub();
    let (first, _rx1) = register(&mut hub, "shared");
    let (second, _rx2) = register(&mut hub, "shared");

    assert_eq!(hub.clients.len(), 2);
    assert_eq!(hub.get_client("shared").unwrap().key(), first.key());

    hub.do_unregister(first.key());
    assert_eq!(hub.get_client("shared").unwrap().key(), second.key());
}

#[test]
fn test_unregister_cleans_up() {
    let (mut hub, _handle) = new_hub();
    let (client, mut rx) = register(&mut hub, "FAKEUSER|ID");
    subscribe(&mut hub, &client, "FAKETOPIC");

    hub.do_unregister(client.key());

    assert!(hub.topics.is_empty());
    assert!(hub.clients.is_empty());
    assert!(hub.ids.is_empty());
    assert!(client.is_closed());

    // hub dropped its sender; only the test's clone keeps the queue open
    drop(client);
    assert_eq!(rx.try_recv(), Err(mpsc::error::TryRecvError::Disconnected));
}

#[test]
fn test_unregister_keeps_shared_topics() {
    let (mut hub, _handle) = new_hub();
    let (a, _rx_a) = register(&mut hub, "a");
    let (b, _rx_b) = register(&mut hub, "b");
    subscribe(&mut hub, &a, "news");
    subscribe(&mut hub, &b, "news");
    subscribe(&mut hub, &a, "sports");

    hub.do_unregister(a.key());

    assert!(!hub.topics.contains_key("sports"));
    let news = hub.topics.get("news").unwrap();
    assert_eq!(news.len(), 1);
    assert!(news.contains(&b.key()));
}

#[test]
fn test_unregister_unknown_client_is_silent() {
    let (mut hub, _handle, calls) = recording_hub();
    let (client, _rx) = Client::new("ghost", 4);

    hub.do_unregister(client.key());

    assert!(calls.lock().unwrap().is_empty());
    assert!(!client.is_closed());
}

#[test]
fn test_duplicate_unregister_notifies_once() {
    let (mut hub, _handle, calls) = recording_hub();
    let (client, _rx) = register(&mut hub, "u");

    hub.do_unregister(client.key());
    hub.do_unregister(client.key());

    assert_eq!(*calls.lock().unwrap(), [Event::Register, Event::Unregister]);
}

#[test]
fn test_subscribe_twice_keeps_set_semantics() {
    let (mut hub, _handle) = new_hub();
    let (client, _rx) = register(&mut hub, "u");

    subscribe(&mut hub, &client, "news");
    subscribe(&mut hub, &client, "news");

    assert_eq!(hub.topics["news"].len(), 1);
    assert_eq!(hub.clients[&client.key()].topics().len(), 1);
}

#[test]
fn test_subscribe_unregistered_client_is_ignored() {
    let (mut hub, _handle, calls) = recording_hub();
    let (client, _rx) = Client::new("stranger", 4);

    hub.do_subscribe(Subscription::new(client.key(), "news"));

    assert!(hub.topics.is_empty());
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn test_delete_topic_client_leaves_empty_topic() {
    let (mut hub, _handle) = new_hub();
    let (client, _rx) = register(&mut hub, "FAKEUSER|ID");
    subscribe(&mut hub, &client, "FAKETOPIC");

    hub.delete_topic_client(client.key());

    let subscribers = hub.topics.get("FAKETOPIC").expect("topic should remain");
    assert!(!subscribers.contains(&client.key()));
    assert!(hub.clients[&client.key()].topics().contains("FAKETOPIC"));
}

#[test]
fn test_handle_empty_topics_prunes_only_empty() {
    let (mut hub, _handle) = new_hub();
    let (a, _rx_a) = register(&mut hub, "a");
    let (b, _rx_b) = register(&mut hub, "b");
    subscribe(&mut hub, &a, "solo");
    subscribe(&mut hub, &a, "shared");
    subscribe(&mut hub, &b, "shared");

    hub.delete_topic_client(a.key());
    assert_eq!(hub.topics.len(), 2);

    hub.handle_empty_topics(a.key());

    assert!(!hub.topics.contains_key("solo"));
    assert!(hub.topics.contains_key("shared"));
}

#[test]
fn test_emit_to_missing_topic_is_noop() {
    let (mut hub, _handle, calls) = recording_hub();

    hub.do_emit(PublishMessage::new("faketopic", Bytes::new()));

    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn test_emit_delivers_exactly_once() {
    let (mut hub, _handle) = new_hub();
    let (client, mut rx) = register(&mut hub, "FAKEUSER|ID");
    subscribe(&mut hub, &client, "FAKETOPIC");

    hub.do_emit(PublishMessage::new("FAKETOPIC", "payload"));

    assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"payload"));
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_emit_only_reaches_subscribers() {
    let (mut hub, _handle) = new_hub();
    let (a, mut rx_a) = register(&mut hub, "U1");
    let (_b, mut rx_b) = register(&mut hub, "U2");
    subscribe(&mut hub, &a, "news");

    hub.do_emit(PublishMessage::new("news", "hello"));

    assert_eq!(rx_a.try_recv().unwrap(), Bytes::from_static(b"hello"));
    assert!(rx_b.try_recv().is_err());
}

#[test]
fn test_full_queue_drops_for_that_client_only() {
    let (mut hub, _handle) = new_hub();
    let (slow, mut slow_rx) = Client::new("slow", 1);
    hub.do_register(slow.clone());
    let (fast, mut fast_rx) = register(&mut hub, "fast");
    subscribe(&mut hub, &slow, "news");
    subscribe(&mut hub, &fast, "news");

    hub.do_emit(PublishMessage::new("news", "first"));
    hub.do_emit(PublishMessage::new("news", "second"));

    assert_eq!(slow_rx.try_recv().unwrap(), Bytes::from_static(b"first"));
    assert!(slow_rx.try_recv().is_err());
    assert_eq!(fast_rx.try_recv().unwrap(), Bytes::from_static(b"first"));
    assert_eq!(fast_rx.try_recv().unwrap(), Bytes::from_static(b"second"));
}

#[test]
fn test_get_client() {
    let (mut hub, _handle) = new_hub();
    let (client, _rx) = register(&mut hub, "FAKEUSER|ID");

    assert!(hub.get_client("nobody").is_none());
    let found = hub.get_client("FAKEUSER|ID").expect("client should be found");
    assert_eq!(found.key(), client.key());
    assert_eq!(found.id, client.id);
}

#[test]
fn test_register_subscribe_unregister_scenario() {
    let (mut hub, _handle) = new_hub();
    let (a, _rx) = register(&mut hub, "U1");
    subscribe(&mut hub, &a, "news");

    hub.do_unregister(a.key());

    assert!(!hub.topics.contains_key("news"));
    assert!(!hub.clients.contains_key(&a.key()));
}

#[tokio::test]
async fn test_publish_reaches_emit_channel() {
    let (mut hub, handle) = new_hub();
    let msg = PublishMessage::new("FAKETOPIC", "payload");

    let publisher = tokio::spawn({
        let handle = handle.clone();
        let msg = msg.clone();
        async move { handle.publish(msg).await }
    });

    let got = hub.emit_rx.recv().await.unwrap();
    publisher.await.unwrap().unwrap();
    assert_eq!(got, msg);
}

#[tokio::test]
async fn test_try_publish_reports_full_and_closed() {
    let (hub, handle) = Hub::new(Arc::new(NoopNotifier), 1);

    handle.try_publish(PublishMessage::new("t", "one")).unwrap();
    assert!(matches!(
        handle.try_publish(PublishMessage::new("t", "two")),
        Err(Error::HubFull)
    ));

    drop(hub);
    assert!(handle.is_closed());
    assert!(matches!(
        handle.publish(PublishMessage::new("t", "three")).await,
        Err(Error::HubClosed)
    ));
}

#[tokio::test]
async fn test_run_notifies_in_order() {
    let (notifier, mut events) = ChannelNotifier::new();
    let (hub, handle) = Hub::new(Arc::new(notifier), 1);
    let loop_task = tokio::spawn(hub.run());

    let (client, mut rx) = Client::new("FAKEUSER|IDWEOW", 256);
    let key = client.key();

    handle.register(client).await.unwrap();
    assert_eq!(events.recv().await, Some(Event::Register));

    handle.subscribe(Subscription::new(key, "topic")).await.unwrap();
    assert_eq!(events.recv().await, Some(Event::Subscribe));

    handle.publish(PublishMessage::new("topic", "hi")).await.unwrap();
    assert_eq!(events.recv().await, Some(Event::Publish));
    assert_eq!(rx.recv().await, Some(Bytes::from_static(b"hi")));

    handle.unregister(key).await.unwrap();
    assert_eq!(events.recv().await, Some(Event::Unregister));

    // the hub released the only sender
    assert_eq!(rx.recv().await, None);

    handle.shutdown();
    loop_task.await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_remaining_clients() {
    let (notifier, mut events) = ChannelNotifier::new();
    let (hub, handle) = Hub::new(Arc::new(notifier), 8);
    let loop_task = tokio::spawn(hub.run());

    let (client, mut rx) = Client::new("u", 8);
    let client_handle = client.handle(handle.clone());
    handle.register(client).await.unwrap();
    assert_eq!(events.recv().await, Some(Event::Register));

    handle.shutdown();
    loop_task.await.unwrap();

    assert_eq!(events.recv().await, Some(Event::Unregister));
    assert!(client_handle.is_closed());
    assert_eq!(rx.recv().await, None);
    assert!(matches!(
        client_handle.subscribe("late").await,
        Err(Error::HubClosed)
    ));
}

#[tokio::test]
async fn test_run_stops_when_handles_dropped() {
    let (hub, handle) = new_hub();
    let loop_task = tokio::spawn(hub.run());

    drop(handle);

    loop_task.await.unwrap();
}

async fn drain_events(events: &mut mpsc::UnboundedReceiver<Event>, count: usize) -> Vec<Event> {
    let mut seen = Vec::with_capacity(count);
    for _ in 0..count {
        seen.push(events.recv().await.expect("notifier dropped"));
    }
    seen
}

#[tokio::test]
async fn test_subscribe_queued_behind_register_is_applied() {
    for _ in 0..200 {
        let (notifier, mut events) = ChannelNotifier::new();
        let (hub, handle) = Hub::new(Arc::new(notifier), 16);

        let (client, mut rx) = Client::new("U1", 8);
        let key = client.key();
        handle.register(client).await.unwrap();
        handle.subscribe(Subscription::new(key, "news")).await.unwrap();
        handle.publish(PublishMessage::new("news", "hello")).await.unwrap();

        let loop_task = tokio::spawn(hub.run());

        assert_eq!(
            drain_events(&mut events, 3).await,
            vec![Event::Register, Event::Subscribe, Event::Publish]
        );
        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"hello")));

        handle.shutdown();
        loop_task.await.unwrap();
    }
}

#[tokio::test]
async fn test_unregister_queued_behind_register_releases_client() {
    for _ in 0..200 {
        let (notifier, mut events) = ChannelNotifier::new();
        let (hub, handle) = Hub::new(Arc::new(notifier), 16);

        let (client, mut rx) = Client::new("U1", 8);
        let client_handle = client.handle(handle.clone());
        handle.register(client).await.unwrap();
        assert!(client_handle.unregister().await.unwrap());

        let loop_task = tokio::spawn(hub.run());

        assert_eq!(
            drain_events(&mut events, 2).await,
            vec![Event::Register, Event::Unregister]
        );
        assert_eq!(rx.recv().await, None);
        assert!(client_handle.is_closed());

        handle.shutdown();
        loop_task.await.unwrap();
    }
}

#[tokio::test]
async fn test_back_to_back_lifecycle_keeps_order() {
    let (notifier, mut events) = ChannelNotifier::new();
    let (hub, handle) = Hub::new(Arc::new(notifier), 16);
    let loop_task = tokio::spawn(hub.run());

    for _ in 0..200 {
        let (client, mut rx) = Client::new("FAKEUSER|IDWEOW", 8);
        let key = client.key();

        handle.register(client).await.unwrap();
        handle.subscribe(Subscription::new(key, "topic")).await.unwrap();
        handle.publish(PublishMessage::new("topic", "hi")).await.unwrap();
        handle.unregister(key).await.unwrap();

        assert_eq!(
            drain_events(&mut events, 4).await,
            vec![
                Event::Register,
                Event::Subscribe,
                Event::Publish,
                Event::Unregister
            ]
        );
        assert_eq!(rx.recv().await, Some(Bytes::from_static(b"hi")));
        assert_eq!(rx.recv().await, None);
    }

    handle.shutdown();
    loop_task.await.unwrap();
}
