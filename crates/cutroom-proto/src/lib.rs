//! Cutroom wire protocol.
//!
//! Typed representations of everything that crosses the chat boundary: the
//! realtime socket events exchanged per job room and the JSON envelopes of the
//! REST message API.
//!
//! # Design
//!
//! - Payloads are decoded into tagged enums ([`InboundEvent`],
//!   [`OutboundEvent`]) at the transport boundary, so downstream code never
//!   inspects raw JSON.
//! - Identifiers ([`MessageId`], [`JobId`], [`UserId`]) are opaque strings.
//!   Integer identifiers on the wire are normalized to their decimal form.
//! - Unknown inbound event names are not errors; [`decode_inbound`] reports
//!   them as [`Decoded::Ignored`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod api;
mod error;
mod event;
mod ids;
mod message;

pub use error::ProtoError;
pub use event::{
    Decoded, DeletedNotice, InboundEvent, OutboundEvent, ServerError, TypingNotice,
    decode_inbound, decode_outbound, encode_outbound,
};
pub use ids::{JobId, MessageId, UserId};
pub use message::{Attachment, Message, Reaction};
