//! Deterministic simulation harness for Cutroom chat testing.
//!
//! In-memory implementations of the server, the REST backend, the
//! environment and the driver, for deterministic and reproducible testing
//! of the chat under reconnects, duplicate delivery and slow requests.
//!
//! # Sessions
//!
//! [`SimSession`] drives a [`cutroom_app::ChatApp`] synchronously against a
//! [`SimServer`], holding REST completions until the test releases them. Use
//! it to interleave room switches with late responses.
//!
//! [`SimDriver`] and [`SimApi`] plug the same server into the production
//! [`cutroom_app::Runtime`].
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties of every participant's view
//! after each step: unique ids, final tombstones, balanced subscriptions.
//! [`InvariantRegistry::standard()`] holds the ones valid mid-delivery.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod session;
pub mod sim_api;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    ClientSnapshot, HistoryConvergence, Invariant, InvariantRegistry, InvariantResult,
    SubscriptionBalance, SystemSnapshot, TombstoneFinality, TombstoneShape, TypingExcludesSelf,
    UniqueMessageIds, Violation,
};
pub use session::SimSession;
pub use sim_api::SimApi;
pub use sim_driver::{SimDriver, SimDriverError};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_server::{ClientId, RestCall, SharedSimServer, SimServer, create_shared_server};
