use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;

use super::{Hub, HubHandle, Payload, Registration};
use crate::config::{HubSettings, Settings};
use crate::utils::error::RelayError;

fn start_hub(outbound_capacity: usize) -> (HubHandle, JoinHandle<()>) {
    let settings = HubSettings {
        outbound_capacity,
        ..Settings::default().hub
    };
    let (hub, handle) = Hub::new(&settings);
    let task = tokio::spawn(hub.run());
    (handle, task)
}

async fn next(registration: &mut Registration) -> Option<Payload> {
    timeout(Duration::from_secs(1), registration.outbound.recv())
        .await
        .expect("timed out waiting for outbound payload")
}

#[tokio::test]
async fn test_register_assigns_unique_ids() {
    let (hub, _task) = start_hub(16);
    let a = hub.register().await.unwrap();
    let b = hub.register().await.unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(hub.members().await.unwrap(), vec![a.id, b.id]);
}

#[tokio::test]
async fn test_broadcast_reaches_every_member_including_sender() {
    let (hub, _task) = start_hub(16);
    let mut a = hub.register().await.unwrap();
    let mut b = hub.register().await.unwrap();
    let mut c = hub.register().await.unwrap();

    // a is the sender; it gets its own message back
    hub.broadcast("hello".into()).await.unwrap();

    for session in [&mut a, &mut b, &mut c] {
        assert_eq!(next(session).await, Some(Payload::from("hello")));
        assert!(session.outbound.try_recv().is_err());
    }
}

#[tokio::test]
async fn test_per_recipient_order_matches_broadcast_order() {
    let (hub, _task) = start_hub(64);
    let mut sessions = Vec::new();
    for _ in 0..4 {
        sessions.push(hub.register().await.unwrap());
    }

    // several concurrent publishers interleave arbitrarily
    let mut publishers = Vec::new();
    for publisher in 0..3 {
        let hub = hub.clone();
        publishers.push(tokio::spawn(async move {
            for n in 0..10 {
                hub.broadcast(Payload::from(format!("{publisher}-{n}").as_str()))
                    .await
                    .unwrap();
            }
        }));
    }
    for publisher in publishers {
        publisher.await.unwrap();
    }

    let mut sequences = Vec::new();
    for session in &mut sessions {
        let mut received = Vec::new();
        for _ in 0..30 {
            received.push(next(session).await.expect("queue closed early"));
        }
        assert!(session.outbound.try_recv().is_err(), "payload delivered twice");
        sequences.push(received);
    }

    for sequence in &sequences[1..] {
        assert_eq!(sequence, &sequences[0]);
    }

    // each publisher's own messages keep their order
    for publisher in 0..3 {
        let prefix = format!("{publisher}-");
        let own: Vec<_> = sequences[0]
            .iter()
            .filter(|p| matches!(p, Payload::Text(t) if t.starts_with(&prefix)))
            .cloned()
            .collect();
        let expected: Vec<_> = (0..10)
            .map(|n| Payload::from(format!("{publisher}-{n}").as_str()))
            .collect();
        assert_eq!(own, expected);
    }
}

#[tokio::test]
async fn test_deregister_twice_is_a_noop() {
    let (hub, _task) = start_hub(16);
    let a = hub.register().await.unwrap();
    let mut b = hub.register().await.unwrap();

    hub.deregister(a.id);
    hub.deregister(a.id);
    hub.deregister(9999);

    assert_eq!(hub.members().await.unwrap(), vec![b.id]);

    hub.broadcast("still here".into()).await.unwrap();
    assert_eq!(next(&mut b).await, Some(Payload::from("still here")));
}

#[tokio::test]
async fn test_removed_session_gets_no_later_payloads() {
    let (hub, _task) = start_hub(16);
    let mut a = hub.register().await.unwrap();
    let mut b = hub.register().await.unwrap();

    hub.deregister(a.id);
    hub.broadcast("after".into()).await.unwrap();

    assert_eq!(next(&mut b).await, Some(Payload::from("after")));
    // a's queue is closed without ever seeing the payload
    assert_eq!(next(&mut a).await, None);
    assert_eq!(hub.members().await.unwrap(), vec![b.id]);
}

#[tokio::test]
async fn test_plain_removal_is_not_an_eviction() {
    let (hub, _task) = start_hub(16);
    let mut a = hub.register().await.unwrap();

    hub.deregister(a.id);
    assert!(hub.members().await.unwrap().is_empty());

    let signal = timeout(Duration::from_secs(1), &mut a.evicted)
        .await
        .expect("eviction sender should be dropped on removal");
    assert!(signal.is_err());
}

#[tokio::test]
async fn test_only_remaining_members_receive_after_disconnect() {
    let (hub, _task) = start_hub(16);
    let a = hub.register().await.unwrap();
    let mut b = hub.register().await.unwrap();

    // a's session ends and its receiver goes away with it
    hub.deregister(a.id);
    drop(a);

    hub.broadcast("one".into()).await.unwrap();
    hub.broadcast("two".into()).await.unwrap();

    assert_eq!(next(&mut b).await, Some(Payload::from("one")));
    assert_eq!(next(&mut b).await, Some(Payload::from("two")));
    assert_eq!(hub.members().await.unwrap(), vec![b.id]);
}

#[tokio::test]
async fn test_closed_outbound_queue_is_pruned_on_fan_out() {
    let (hub, _task) = start_hub(16);
    let a = hub.register().await.unwrap();
    let mut b = hub.register().await.unwrap();

    // pump died without deregistering
    drop(a);
    hub.broadcast("x".into()).await.unwrap();
    assert_eq!(next(&mut b).await, Some(Payload::from("x")));

    assert_eq!(hub.members().await.unwrap(), vec![b.id]);
}

#[tokio::test]
async fn test_slow_consumer_is_evicted_without_stalling_others() {
    let (hub, _task) = start_hub(2);
    let mut slow = hub.register().await.unwrap();
    let mut fast = hub.register().await.unwrap();

    for n in 0..5 {
        let payload = Payload::from(format!("msg-{n}").as_str());
        hub.broadcast(payload.clone()).await.unwrap();
        assert_eq!(next(&mut fast).await, Some(payload));
    }

    assert_eq!(hub.members().await.unwrap(), vec![fast.id]);

    let signal = timeout(Duration::from_secs(1), &mut slow.evicted)
        .await
        .expect("eviction signal should fire");
    assert!(signal.is_ok(), "slow client should be told it was evicted");

    // the queue itself still holds what fit, then closes
    assert_eq!(next(&mut slow).await, Some(Payload::from("msg-0")));
    assert_eq!(next(&mut slow).await, Some(Payload::from("msg-1")));
    assert_eq!(next(&mut slow).await, None);
}

#[tokio::test]
async fn test_binary_payloads_are_relayed_verbatim() {
    let (hub, _task) = start_hub(16);
    let mut a = hub.register().await.unwrap();

    hub.broadcast(Payload::from(vec![0u8, 159, 146, 150]))
        .await
        .unwrap();
    assert_eq!(
        next(&mut a).await,
        Some(Payload::from(vec![0u8, 159, 146, 150]))
    );
}

#[tokio::test]
async fn test_hub_stops_when_every_handle_is_dropped() {
    let (hub, task) = start_hub(16);
    let observer = hub.clone();
    drop(hub);
    drop(observer);

    timeout(Duration::from_secs(1), task)
        .await
        .expect("hub did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_register_fails_once_hub_is_gone() {
    let settings = Settings::default().hub;
    let (hub, handle) = Hub::new(&settings);
    drop(hub);

    let result = handle.register().await;
    assert!(matches!(result, Err(RelayError::HubUnavailable)));
    assert!(matches!(
        handle.broadcast("x".into()).await,
        Err(RelayError::HubUnavailable)
    ));
    // deregistering against a stopped hub is silently ignored
    handle.deregister(1);
}
