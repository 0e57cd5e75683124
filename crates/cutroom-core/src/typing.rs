//! Typing indicators.
//!
//! Two independent pieces:
//!
//! - [`TypingTracker`]: the set of remote users currently typing, keyed by
//!   user id. Entries leave on an explicit stop or when not refreshed within
//!   the expiry window, so a peer that disconnects mid-sentence does not
//!   leave a stale indicator behind.
//! - [`TypingDebouncer`]: decides when the local user's typing state should
//!   be emitted. At most one `true` per debounce window; `false` once the
//!   window elapses with no further keystrokes.
//!
//! With the default config a peer typing without pause for longer than the
//! expiry window disappears from other participants' indicators until their
//! next window. Setting [`TypingConfig::refresh`] re-announces `true` at
//! that interval while the window stays open.

use std::time::Duration;

use cutroom_proto::UserId;

use crate::env::Moment;

/// Silence after the last keystroke before "stopped typing" is emitted.
pub const DEFAULT_TYPING_DEBOUNCE: Duration = Duration::from_millis(2000);

/// Typing timing configuration.
#[derive(Debug, Clone)]
pub struct TypingConfig {
    /// Local debounce window
    pub debounce: Duration,
    /// Remote entries not refreshed within this window are dropped
    pub expiry: Duration,
    /// Re-announce `true` this often during continuous typing. Off by default.
    pub refresh: Option<Duration>,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_TYPING_DEBOUNCE,
            expiry: DEFAULT_TYPING_DEBOUNCE * 2,
            refresh: None,
        }
    }
}

impl TypingConfig {
    /// Re-announce at half the expiry window, so a continuous typer never
    /// lapses on the receiving side.
    #[must_use]
    pub fn with_keepalive(mut self) -> Self {
        self.refresh = Some(self.expiry / 2);
        self
    }
}

/// One remote user currently typing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingEntry<I> {
    /// User id, unique within the tracker
    pub user_id: UserId,
    /// Name to display
    pub display_name: String,
    refreshed_at: I,
}

/// Remote typing set for one room.
#[derive(Debug, Clone)]
pub struct TypingTracker<I> {
    /// First-typed first
    entries: Vec<TypingEntry<I>>,
    expiry: Duration,
}

impl<I: Moment> TypingTracker<I> {
    /// Create an empty tracker.
    pub fn new(expiry: Duration) -> Self {
        Self { entries: Vec::new(), expiry }
    }

    /// Apply a `userTyping` event.
    ///
    /// Returns `true` if the visible set changed.
    pub fn apply(&mut self, user_id: &UserId, name: &str, is_typing: bool, now: I) -> bool {
        let existing = self.entries.iter().position(|e| &e.user_id == user_id);

        match (existing, is_typing) {
            (Some(pos), true) => {
                let entry = &mut self.entries[pos];
                entry.refreshed_at = now;
                if entry.display_name == name {
                    false
                } else {
                    name.clone_into(&mut entry.display_name);
                    true
                }
            },
            (None, true) => {
                self.entries.push(TypingEntry {
                    user_id: user_id.clone(),
                    display_name: name.to_owned(),
                    refreshed_at: now,
                });
                true
            },
            (Some(pos), false) => {
                self.entries.remove(pos);
                true
            },
            (None, false) => false,
        }
    }

    /// Drop entries not refreshed within the expiry window.
    ///
    /// Returns the number of entries removed.
    pub fn expire(&mut self, now: I) -> usize {
        let before = self.entries.len();
        let expiry = self.expiry;
        self.entries.retain(|e| now - e.refreshed_at < expiry);
        before - self.entries.len()
    }

    /// Earliest instant at which an entry will expire.
    pub fn next_deadline(&self) -> Option<I> {
        self.entries.iter().map(|e| e.refreshed_at + self.expiry).min()
    }

    /// Remove everyone.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// True if this user is in the set.
    pub fn contains(&self, user_id: &UserId) -> bool {
        self.entries.iter().any(|e| &e.user_id == user_id)
    }

    /// Entries in the order users started typing.
    pub fn entries(&self) -> &[TypingEntry<I>] {
        &self.entries
    }

    /// Display names in the order users started typing.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.display_name.as_str()).collect()
    }

    /// Number of users typing.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nobody is typing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indicator text, e.g. "Dana is typing...". `None` if nobody is.
    pub fn label(&self) -> Option<String> {
        typing_label(&self.names())
    }
}

/// Format a typing indicator for a list of display names.
pub fn typing_label(names: &[&str]) -> Option<String> {
    match names {
        [] => None,
        [one] => Some(format!("{one} is typing...")),
        many => Some(format!("{} are typing...", many.join(", "))),
    }
}

/// Local typing emission with debounce.
#[derive(Debug, Clone)]
pub struct TypingDebouncer<I> {
    debounce: Duration,
    refresh: Option<Duration>,
    /// When "stopped typing" is due. `Some` while a `true` is outstanding.
    deadline: Option<I>,
    /// Last `true` emission of the open window.
    announced_at: Option<I>,
}

impl<I: Moment> TypingDebouncer<I> {
    /// Create an idle debouncer.
    pub fn new(debounce: Duration) -> Self {
        Self { debounce, refresh: None, deadline: None, announced_at: None }
    }

    /// Re-announce `true` every `refresh` while the window stays open.
    #[must_use]
    pub fn with_refresh(mut self, refresh: Option<Duration>) -> Self {
        self.refresh = refresh;
        self
    }

    /// Register a keystroke.
    ///
    /// Returns `Some(true)` on the first keystroke of a window, `None` while
    /// the window is already open (unless a refresh is due). Every keystroke
    /// pushes the deadline out.
    pub fn keystroke(&mut self, now: I) -> Option<bool> {
        let due = match (self.deadline, self.refresh, self.announced_at) {
            (None, ..) => true,
            (Some(_), Some(every), Some(at)) => now >= at + every,
            _ => false,
        };
        self.deadline = Some(now + self.debounce);
        if !due {
            return None;
        }
        self.announced_at = Some(now);
        Some(true)
    }

    /// Process timers. Returns `Some(false)` once the window has elapsed.
    pub fn tick(&mut self, now: I) -> Option<bool> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.announced_at = None;
                Some(false)
            },
            _ => None,
        }
    }

    /// Close the window early (message sent, room left).
    pub fn stop(&mut self) -> Option<bool> {
        self.announced_at = None;
        self.deadline.take().map(|_| false)
    }

    /// True while a `true` emission is outstanding.
    pub fn is_typing(&self) -> bool {
        self.deadline.is_some()
    }

    /// When the window closes, if open.
    pub fn next_deadline(&self) -> Option<I> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn debounced_typing_emits_once_each_way() {
        let t0 = Instant::now();
        let mut debouncer = TypingDebouncer::new(DEFAULT_TYPING_DEBOUNCE);
        let mut emitted = Vec::new();

        for at in [0, 500, 1000] {
            emitted.extend(debouncer.keystroke(t0 + ms(at)));
            emitted.extend(debouncer.tick(t0 + ms(at)));
        }
        for at in (1100..=4000).step_by(100) {
            if let Some(state) = debouncer.tick(t0 + ms(at)) {
                emitted.push(state);
                assert_eq!(at, 3000, "stop emitted at {at}ms");
            }
        }

        assert_eq!(emitted, vec![true, false]);
    }

    #[test]
    fn stop_closes_window_early() {
        let t0 = Instant::now();
        let mut debouncer = TypingDebouncer::new(DEFAULT_TYPING_DEBOUNCE);
        debouncer.keystroke(t0);

        assert_eq!(debouncer.stop(), Some(false));
        assert_eq!(debouncer.stop(), None);
        assert_eq!(debouncer.tick(t0 + ms(5000)), None);
        assert_eq!(debouncer.keystroke(t0 + ms(5001)), Some(true));
    }

    #[test]
    fn keepalive_holds_remote_indicator_during_long_typing() {
        let t0 = Instant::now();
        let config = TypingConfig::default().with_keepalive();
        let mut debouncer = TypingDebouncer::new(config.debounce).with_refresh(config.refresh);
        let mut tracker = TypingTracker::new(config.expiry);
        let dana = UserId::new("dana");
        let mut announced = Vec::new();

        for at in (0..=9000).step_by(500) {
            let now = t0 + ms(at);
            if debouncer.keystroke(now) == Some(true) {
                announced.push(at);
                tracker.apply(&dana, "Dana", true, now);
            }
            tracker.expire(now);
            assert!(tracker.contains(&dana), "indicator lapsed at {at}ms");
        }
        assert_eq!(announced, [0, 2000, 4000, 6000, 8000]);
    }

    #[test]
    fn without_keepalive_long_typing_lapses() {
        let t0 = Instant::now();
        let config = TypingConfig::default();
        let mut debouncer = TypingDebouncer::new(config.debounce).with_refresh(config.refresh);
        let mut tracker = TypingTracker::new(config.expiry);
        let dana = UserId::new("dana");

        for at in (0..=5000).step_by(500) {
            let now = t0 + ms(at);
            if debouncer.keystroke(now) == Some(true) {
                tracker.apply(&dana, "Dana", true, now);
            }
            tracker.expire(now);
        }
        assert!(!tracker.contains(&dana));
    }

    #[test]
    fn tracker_keeps_one_entry_per_user() {
        let t0 = Instant::now();
        let mut tracker = TypingTracker::new(ms(4000));
        let dana = UserId::new("dana");

        assert!(tracker.apply(&dana, "Dana", true, t0));
        assert!(!tracker.apply(&dana, "Dana", true, t0 + ms(100)));
        assert_eq!(tracker.len(), 1);

        assert!(tracker.apply(&dana, "Dana", false, t0 + ms(200)));
        assert!(tracker.is_empty());
        assert!(!tracker.apply(&dana, "Dana", false, t0 + ms(300)));
    }

    #[test]
    fn unrefreshed_entries_expire() {
        let t0 = Instant::now();
        let mut tracker = TypingTracker::new(ms(4000));
        tracker.apply(&UserId::new("a"), "A", true, t0);
        tracker.apply(&UserId::new("b"), "B", true, t0 + ms(3000));

        assert_eq!(tracker.next_deadline(), Some(t0 + ms(4000)));
        assert_eq!(tracker.expire(t0 + ms(3999)), 0);
        assert_eq!(tracker.expire(t0 + ms(4000)), 1);
        assert_eq!(tracker.names(), ["B"]);
    }

    #[test]
    fn refresh_extends_expiry() {
        let t0 = Instant::now();
        let mut tracker = TypingTracker::new(ms(4000));
        let a = UserId::new("a");
        tracker.apply(&a, "A", true, t0);
        tracker.apply(&a, "A", true, t0 + ms(3000));

        assert_eq!(tracker.expire(t0 + ms(5000)), 0);
        assert!(tracker.contains(&a));
    }

    #[test]
    fn labels_pluralize() {
        assert_eq!(typing_label(&[]), None);
        insta::assert_snapshot!(typing_label(&["Dana"]).unwrap(), @"Dana is typing...");
        insta::assert_snapshot!(
            typing_label(&["Dana", "Lee"]).unwrap(),
            @"Dana, Lee are typing..."
        );
    }
}
