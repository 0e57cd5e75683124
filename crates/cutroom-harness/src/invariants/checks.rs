//! Standard invariant checks.
//!
//! These invariants capture behavioral properties that must always hold.
//! They verify WHAT must be true, not specific test scenarios.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, PoisonError},
};

use cutroom_core::store::DELETED_PLACEHOLDER;
use cutroom_proto::{JobId, MessageId, UserId};

use super::{Invariant, InvariantResult, SystemSnapshot, Violation};

/// A message id appears at most once in a store.
///
/// Duplicate delivery, snapshot/live overlap and our own echoes must all
/// collapse onto one entry.
pub struct UniqueMessageIds;

impl Invariant for UniqueMessageIds {
    fn name(&self) -> &'static str {
        "unique_message_ids"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let mut seen = HashSet::new();
            for message in &client.messages {
                if !seen.insert(&message.id) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("{}: duplicate message {}", client.user_id, message.id),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Deleted messages show the placeholder and nothing else.
pub struct TombstoneShape;

impl Invariant for TombstoneShape {
    fn name(&self) -> &'static str {
        "tombstone_shape"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            for message in client.messages.iter().filter(|m| m.is_deleted) {
                if message.content != DELETED_PLACEHOLDER || !message.attachments.is_empty() {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "{}: tombstone {} shows {:?} with {} attachments",
                            client.user_id,
                            message.id,
                            message.content,
                            message.attachments.len()
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Once a participant saw a message deleted, it never shows it live again.
///
/// Stateful: remembers every tombstone observed per participant and room
/// across checks. A message may disappear (room switch) but may not
/// reappear undeleted.
#[derive(Default)]
pub struct TombstoneFinality {
    seen: Mutex<HashMap<(UserId, JobId), HashSet<MessageId>>>,
}

impl Invariant for TombstoneFinality {
    fn name(&self) -> &'static str {
        "tombstone_finality"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);

        for client in &state.clients {
            let Some(job_id) = &client.active_job else { continue };
            let tombstones = seen.entry((client.user_id.clone(), job_id.clone())).or_default();

            for message in &client.messages {
                if message.is_deleted {
                    tombstones.insert(message.id.clone());
                } else if tombstones.contains(&message.id) {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "{}: message {} in {} came back after deletion",
                            client.user_id, message.id, job_id
                        ),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Exactly one handler per event kind while a room is active, none otherwise.
///
/// More means a previous room's handlers leaked; fewer means events are
/// being missed.
pub struct SubscriptionBalance;

impl Invariant for SubscriptionBalance {
    fn name(&self) -> &'static str {
        "subscription_balance"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let expected =
                if client.active_job.is_some() { client.subscribers_per_room } else { 0 };
            if client.subscribers != expected {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{}: {} handlers registered, expected {expected}",
                        client.user_id, client.subscribers
                    ),
                });
            }
        }
        Ok(())
    }
}

/// The typing set has no duplicates and never contains the local user.
pub struct TypingExcludesSelf;

impl Invariant for TypingExcludesSelf {
    fn name(&self) -> &'static str {
        "typing_excludes_self"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        for client in &state.clients {
            let unique: HashSet<_> = client.typing.iter().collect();
            if unique.len() != client.typing.len() {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!(
                        "{}: duplicate typing entries {:?}",
                        client.user_id, client.typing
                    ),
                });
            }
            if unique.contains(&client.user_id) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("{}: shown as typing to themselves", client.user_id),
                });
            }
        }
        Ok(())
    }
}

/// Participants with the same room loaded show the same history in the same
/// order.
///
/// Only meaningful once every frame has been delivered.
pub struct HistoryConvergence;

impl Invariant for HistoryConvergence {
    fn name(&self) -> &'static str {
        "history_convergence"
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let mut by_room: HashMap<&JobId, (&UserId, Vec<&str>)> = HashMap::new();

        for client in &state.clients {
            let Some(job_id) = &client.active_job else { continue };
            let ids = client.message_ids();
            match by_room.get(job_id) {
                Some((first, expected)) if *expected != ids => {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "room {job_id}: {first} shows {expected:?}, {} shows {ids:?}",
                            client.user_id
                        ),
                    });
                },
                Some(_) => {},
                None => {
                    by_room.insert(job_id, (&client.user_id, ids));
                },
            }
        }
        Ok(())
    }
}
