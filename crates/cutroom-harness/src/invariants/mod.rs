//! Properties every participant's view must satisfy after any step.
//!
//! A [`SystemSnapshot`] captures what each [`cutroom_app::ChatApp`] shows:
//! its store, typing set, and live subscriptions. Each [`Invariant`] inspects
//! one snapshot and reports a [`Violation`] naming itself. Scenario tests and
//! the simulation driver check a registry after every delivered event, so a
//! broken property is reported at the step that broke it.
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = SystemSnapshot::single(ClientSnapshot::from_app(&app));
//! registry.check_all(&snapshot)?;
//! ```

mod checks;
mod snapshot;

pub use checks::{
    HistoryConvergence, SubscriptionBalance, TombstoneFinality, TombstoneShape,
    TypingExcludesSelf, UniqueMessageIds,
};
pub use snapshot::{ClientSnapshot, SystemSnapshot};

/// Outcome of one check.
pub type InvariantResult = Result<(), Violation>;

/// A property that did not hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Which check failed.
    pub invariant: &'static str,
    /// What the check saw, naming the client and message involved.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// A check over one snapshot of every participant.
///
/// Checks that track history across steps, such as tombstone finality, keep
/// it behind a lock, hence `Send + Sync` with `&self`.
pub trait Invariant: Send + Sync {
    /// Short name used in violation reports.
    fn name(&self) -> &'static str;

    /// Inspect `state`, failing with the first offending client found.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Ordered set of checks run together.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InvariantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.invariants.iter().map(|i| i.name()).collect();
        f.debug_struct("InvariantRegistry").field("invariants", &names).finish()
    }
}

impl InvariantRegistry {
    /// Registry with no checks.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Checks that hold after every step, even mid-delivery:
    /// - [`UniqueMessageIds`]: no id appears twice in a store
    /// - [`TombstoneShape`]: deleted messages show only the placeholder
    /// - [`TombstoneFinality`]: a deleted message never comes back
    /// - [`SubscriptionBalance`]: one handler per event kind for the active
    ///   room, none without one
    /// - [`TypingExcludesSelf`]: the typing set is unique and never shows us
    ///
    /// [`HistoryConvergence`] only holds once traffic has settled and is not
    /// included.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(UniqueMessageIds);
        registry.add(TombstoneShape);
        registry.add(TombstoneFinality::default());
        registry.add(SubscriptionBalance);
        registry.add(TypingExcludesSelf);
        registry
    }

    /// Register a check. Checks run in registration order.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every check, collecting all violations rather than stopping at the
    /// first.
    ///
    /// # Errors
    ///
    /// Every violation found, in registration order.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// [`Self::check_all`], panicking with every violation and the step
    /// `context` it happened at.
    #[allow(clippy::panic, reason = "test assertion helper")]
    pub fn assert_all(&self, state: &SystemSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Whether no checks are registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
