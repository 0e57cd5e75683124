//! Session-level tests for the client state machine.
//!
//! These verify:
//! - Reconnection stops at the attempt ceiling and reports failure once
//! - Subscriptions are released when their guards are dropped
//! - A failed session recovers only through a fresh initialize

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use cutroom_client::{Client, ClientAction, ClientEvent, EventKind};
use cutroom_core::connection::{ConnectionConfig, ConnectionState};
use cutroom_proto::{InboundEvent, JobId, Message};

fn count_opens(actions: &[ClientAction]) -> usize {
    actions.iter().filter(|a| matches!(a, ClientAction::OpenTransport { .. })).count()
}

/// INVARIANT: After five failed automatic attempts no sixth attempt is made,
/// and subscribers see exactly one terminal error.
#[test]
fn reconnect_ceiling() {
    let config = ConnectionConfig::default();
    let delay = config.reconnect_delay;
    let mut client: Client<Instant> = Client::new("me", config);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let _on_error = client.on(EventKind::Error, move |event| {
        if let InboundEvent::Error(err) = event {
            sink.lock().unwrap().push(err.message.clone());
        }
    });

    client.handle(ClientEvent::Initialize { token: "t".into() }).unwrap();
    let actions = client.handle(ClientEvent::JoinRoom { job_id: JobId::new("job") }).unwrap();
    assert_eq!(count_opens(&actions), 1);

    let mut now = Instant::now();
    let mut opens = 0;
    let mut failed = 0;

    // Initial attempt fails, then every scheduled attempt fails too.
    let mut actions = client
        .handle(ClientEvent::TransportFailed { now, reason: "refused".into() })
        .unwrap();
    for _ in 0..20 {
        failed += actions.iter().filter(|a| matches!(a, ClientAction::Failed { .. })).count();

        now += delay;
        let tick = client.handle(ClientEvent::Tick { now }).unwrap();
        let opened = count_opens(&tick);
        opens += opened;

        actions = if opened > 0 {
            client.handle(ClientEvent::TransportFailed { now, reason: "refused".into() }).unwrap()
        } else {
            tick
        };
    }

    assert_eq!(opens, 5, "automatic attempts");
    assert_eq!(failed, 1, "terminal failure actions");
    assert_eq!(client.state(), ConnectionState::Failed);
    assert_eq!(*errors.lock().unwrap(), vec!["refused".to_owned()]);
    assert!(client.next_deadline().is_none());
}

#[test]
fn failed_session_recovers_after_initialize() {
    let mut client: Client<Instant> = Client::new(
        "me",
        ConnectionConfig { max_reconnect_attempts: 0, reconnect_delay: Duration::from_millis(1) },
    );
    client.handle(ClientEvent::Initialize { token: "t".into() }).unwrap();
    client.handle(ClientEvent::Connect).unwrap();
    let actions = client
        .handle(ClientEvent::TransportFailed { now: Instant::now(), reason: "down".into() })
        .unwrap();
    assert!(matches!(actions.as_slice(), [ClientAction::Failed { .. }]));

    assert!(client.handle(ClientEvent::Connect).is_err());

    client.handle(ClientEvent::Initialize { token: "t2".into() }).unwrap();
    let actions = client.handle(ClientEvent::Connect).unwrap();
    assert_eq!(actions, vec![ClientAction::OpenTransport { token: "t2".into() }]);
}

/// INVARIANT: Repeated subscribe/teardown cycles never accumulate handlers.
#[test]
fn unsubscribe_releases_handlers() {
    let client: Client<Instant> = Client::new("me", ConnectionConfig::default());
    let delivered = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let guards: Vec<_> = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let delivered = Arc::clone(&delivered);
                client.on(kind, move |_| {
                    delivered.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        assert_eq!(client.bus().subscriber_count(), EventKind::ALL.len());
        drop(guards);
    }

    assert_eq!(client.bus().subscriber_count(), 0);
    let called = client.bus().dispatch(&InboundEvent::NewMessage(Message::text("1", "u", "x")));
    assert_eq!(called, 0);
    assert_eq!(delivered.load(Ordering::SeqCst), 0);
}

#[test]
fn off_is_explicit_unsubscribe() {
    let client: Client<Instant> = Client::new("me", ConnectionConfig::default());
    let sub = client.on(EventKind::UserTyping, |_| {});
    assert_eq!(client.bus().subscriber_count_for(EventKind::UserTyping), 1);

    client.off(sub);

    assert_eq!(client.bus().subscriber_count_for(EventKind::UserTyping), 0);
}
