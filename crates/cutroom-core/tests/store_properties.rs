//! Property-based tests for the message store and typing tracker.
//!
//! These verify invariants under arbitrary operation sequences:
//! - Appends are idempotent by id
//! - Display order is call order, whatever the timestamps say
//! - A tombstone's content is never restored
//! - At most one typing entry per user

use std::{
    collections::HashSet,
    time::{Duration, Instant},
};

use cutroom_core::{
    proto::{Message, MessageId, Reaction, UserId},
    store::{DELETED_PLACEHOLDER, MessageStore},
    typing::TypingTracker,
};
use proptest::prelude::*;

fn message(id: u8, timestamp: u64) -> Message {
    let mut message = Message::text(id.to_string(), "sender", &format!("body {id}"));
    message.timestamp = timestamp;
    message
}

#[derive(Debug, Clone)]
enum StoreOp {
    Append(u8, u64),
    Delete(u8),
    React(u8, u32),
}

fn store_op() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        4 => (0u8..20, any::<u64>()).prop_map(|(id, ts)| StoreOp::Append(id, ts)),
        1 => (0u8..20).prop_map(StoreOp::Delete),
        1 => (0u8..20, 1u32..10).prop_map(|(id, n)| StoreOp::React(id, n)),
    ]
}

/// INVARIANT: Appending an id that is already present leaves the size alone.
#[test]
fn duplicate_append_grows_by_one() {
    let mut store = MessageStore::new();
    store.initialize_from_snapshot(vec![message(1, 0), message(2, 0)]);
    let before = store.len();

    store.append_incoming(message(9, 0));
    store.append_incoming(message(9, 0));

    assert_eq!(store.len(), before + 1);
}

proptest! {
    /// INVARIANT: Display order equals first-arrival order of each id.
    #[test]
    fn prop_order_is_arrival_order(
        appends in prop::collection::vec((0u8..30, any::<u64>()), 0..60)
    ) {
        let mut store = MessageStore::new();
        let mut expected = Vec::new();
        let mut seen = HashSet::new();

        for (id, ts) in appends {
            let fresh = seen.insert(id);
            prop_assert_eq!(store.append_incoming(message(id, ts)), fresh);
            if fresh {
                expected.push(id.to_string());
            }
        }

        let actual: Vec<String> = store.ids().map(|id| id.as_str().to_owned()).collect();
        prop_assert_eq!(actual, expected);
    }

    /// INVARIANT: Ids are unique and tombstones keep the placeholder.
    #[test]
    fn prop_store_invariants_hold(ops in prop::collection::vec(store_op(), 0..80)) {
        let mut store = MessageStore::new();
        let mut deleted = HashSet::new();

        for op in ops {
            match op {
                StoreOp::Append(id, ts) => {
                    store.append_incoming(message(id, ts));
                },
                StoreOp::Delete(id) => {
                    if store.mark_deleted(&MessageId::from(u64::from(id))) {
                        deleted.insert(id.to_string());
                    }
                },
                StoreOp::React(id, count) => {
                    store.apply_reaction(
                        &MessageId::from(u64::from(id)),
                        "🔥",
                        vec![Reaction::new("🔥", count)],
                    );
                },
            }

            let unique: HashSet<&MessageId> = store.ids().collect();
            prop_assert_eq!(unique.len(), store.len());

            for message in store.messages() {
                if deleted.contains(message.id.as_str()) {
                    prop_assert!(message.is_deleted);
                    prop_assert_eq!(message.content.as_str(), DELETED_PLACEHOLDER);
                    prop_assert!(message.attachments.is_empty());
                }
            }
        }
    }

    /// INVARIANT: Reactions after a delete never bring the content back.
    #[test]
    fn prop_tombstone_is_final(counts in prop::collection::vec(1u32..100, 1..20)) {
        let mut store = MessageStore::new();
        store.append_incoming(message(1, 0));
        let id = MessageId::new("1");
        store.mark_deleted(&id);

        for count in counts {
            store.apply_reaction(&id, "👍", vec![Reaction::new("👍", count)]);
            store.append_incoming(message(1, 0));
            let current = store.get(&id);
            prop_assert!(current.is_some_and(|m| m.content == DELETED_PLACEHOLDER));
        }
    }

    /// INVARIANT: A user appears in the typing set at most once.
    #[test]
    fn prop_typing_set_unique(
        events in prop::collection::vec((0u8..4, any::<bool>(), 0u64..10_000), 0..100)
    ) {
        let t0 = Instant::now();
        let mut tracker = TypingTracker::new(Duration::from_millis(4000));
        let mut elapsed = 0;

        for (user, is_typing, step) in events {
            elapsed += step;
            let now = t0 + Duration::from_millis(elapsed);
            tracker.expire(now);
            tracker.apply(&UserId::from(u64::from(user)), &format!("User {user}"), is_typing, now);

            let unique: HashSet<&UserId> = tracker.entries().iter().map(|e| &e.user_id).collect();
            prop_assert_eq!(unique.len(), tracker.len());
        }
    }
}
