//! Application side-effects.
//!
//! This module defines the [`AppAction`] enum: instructions produced by the
//! [`crate::ChatApp`] state machine for the runtime to execute. REST actions
//! carry a [`RequestTag`] that must be echoed back on the completion event.

use cutroom_core::compose::PendingFile;
use cutroom_proto::MessageId;

use crate::RequestTag;

/// Actions produced by the ChatApp state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    /// Render the UI.
    Render,

    /// Quit the application.
    Quit,

    /// Open the socket with this bearer token.
    OpenTransport {
        /// Bearer token
        token: String,
    },

    /// Close the socket.
    CloseTransport,

    /// Write a text frame to the socket.
    SendFrame(String),

    /// `GET` the history of the tagged room.
    FetchSnapshot {
        /// Room activation
        tag: RequestTag,
    },

    /// Upload composer files.
    Upload {
        /// Room activation
        tag: RequestTag,
        /// Files in composer order
        files: Vec<PendingFile>,
    },

    /// Add a reaction.
    AddReaction {
        /// Room activation
        tag: RequestTag,
        /// Target message
        message_id: MessageId,
        /// Emoji
        emoji: String,
    },

    /// Delete a message.
    DeleteMessage {
        /// Room activation
        tag: RequestTag,
        /// Target message
        message_id: MessageId,
    },
}
