//! Cutroom chat core.
//!
//! Pure state machines for the project chat client. Nothing in this crate
//! performs I/O or reads a clock: time is passed in as `now`, and operations
//! that need the outside world return actions for the caller to execute.
//!
//! # Components
//!
//! - [`connection::Connection`]: transport lifecycle with bounded reconnect
//! - [`store::MessageStore`]: idempotent, arrival-ordered message log
//! - [`typing::TypingTracker`] / [`typing::TypingDebouncer`]: remote typing
//!   set with expiry, local typing emission with debounce
//! - [`compose::Composer`]: staged text, files and reply target
//! - [`reconcile`]: per-operation consistency policy and request errors
//! - [`env::Environment`]: time source abstraction for drivers

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod compose;
pub mod connection;
pub mod env;
pub mod error;
pub mod reconcile;
pub mod store;
pub mod typing;

pub use cutroom_proto as proto;
