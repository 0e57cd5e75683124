//! Client
//!
//! Action-based chat client for Cutroom project rooms. Owns the connection
//! lifecycle, room membership and outbound event emission, and demultiplexes
//! inbound socket events to subscribers.
//!
//! # Architecture
//!
//! The client follows the same Sans-IO and action-based patterns as
//! [`cutroom_core`]. It receives events ([`ClientEvent`]), processes them
//! through pure state machine logic, and returns actions ([`ClientAction`])
//! for the caller to execute.
//!
//! # Components
//!
//! - [`Client`]: connection manager and room session
//! - [`EventBus`]: typed subscriptions with drop-guard unsubscription
//! - [`MessageApi`]: REST boundary (snapshot, upload, reactions, delete)
//!
//! # Optional features
//!
//! - `http`: [`http::HttpMessageApi`], a `reqwest` implementation of
//!   [`MessageApi`]
//! - `transport`: [`transport::connect`], a WebSocket transport

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod api;
mod bus;
mod client;
mod error;
mod event;

#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "transport")]
pub mod transport;

pub use api::{MessageApi, RequestResult};
pub use bus::{EventBus, EventKind, Subscription};
pub use client::Client;
pub use cutroom_core::env::Environment;
pub use error::ClientError;
pub use event::{ClientAction, ClientEvent};
