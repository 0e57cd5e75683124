//! Application layer for Cutroom chat
//!
//! Pure view-model state machine and generic runtime for the project chat,
//! so the same orchestration code runs in production and in deterministic
//! simulation.
//!
//! # Components
//!
//! - [`ChatApp`]: active room, message store, typing, composer and error
//!   state; owns the [`cutroom_client::Client`]
//! - [`Driver`]: trait for platform-specific I/O
//! - [`Runtime`]: generic orchestration loop using a Driver and a
//!   [`cutroom_client::MessageApi`]

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod config;
mod driver;
mod event;
mod runtime;
mod state;

pub use action::AppAction;
pub use app::{ChatApp, REPLY_NOT_FOUND};
pub use config::ChatConfig;
pub use driver::Driver;
pub use event::AppEvent;
pub use runtime::Runtime;
pub use state::{Banner, RequestTag, RoomStatus};
