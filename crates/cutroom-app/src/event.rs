//! Application inputs.
//!
//! [`AppEvent`] covers user intents from the view, transport lifecycle
//! reported by the driver, inbound frames, timer ticks, and the completion
//! of REST calls the [`crate::ChatApp`] asked for. Completions carry the
//! [`RequestTag`] they were issued with.

use std::time::Instant;

use cutroom_client::RequestResult;
use cutroom_core::compose::PendingFile;
use cutroom_proto::{Attachment, JobId, Message, MessageId, Reaction};

use crate::RequestTag;

/// Events processed by the [`crate::ChatApp`] state machine.
#[derive(Debug, Clone)]
pub enum AppEvent<I = Instant> {
    /// Show the chat for a job. Tears down the previous room first.
    OpenRoom {
        /// Room to activate
        job_id: JobId,
        /// Bearer token for the session. Only needed for the first room, or
        /// after the session failed or was closed.
        token: Option<String>,
    },

    /// Leave the active room and close the session.
    Close,

    /// Quit the application.
    Quit,

    /// Periodic timer.
    Tick {
        /// Current time
        now: I,
    },

    /// Transport handshake completed.
    TransportOpened,

    /// Transport could not be opened, or dropped.
    TransportFailed {
        /// Time of failure
        now: I,
        /// Error description
        reason: String,
    },

    /// Raw text frame from the socket.
    FrameReceived {
        /// Frame text
        frame: String,
        /// Arrival time
        now: I,
    },

    /// Composer text changed.
    Input {
        /// Full composer text
        text: String,
        /// Time of the keystroke
        now: I,
    },

    /// File added to the composer.
    AttachFile(PendingFile),

    /// File removed from the composer by index.
    RemoveFile(usize),

    /// Reply target chosen or cleared.
    SetReplyTarget(Option<MessageId>),

    /// Send the composer contents.
    Send,

    /// Hide the last request error and server notice.
    DismissError,

    /// React to a message.
    React {
        /// Target message
        message_id: MessageId,
        /// Emoji to add
        emoji: String,
    },

    /// Delete a message.
    Delete {
        /// Target message
        message_id: MessageId,
    },

    /// History fetch completed.
    SnapshotLoaded {
        /// Activation the fetch was issued for
        tag: RequestTag,
        /// Messages, oldest first
        result: RequestResult<Vec<Message>>,
    },

    /// Attachment upload completed.
    UploadFinished {
        /// Activation the upload was issued for
        tag: RequestTag,
        /// Stored attachments, in upload order
        result: RequestResult<Vec<Attachment>>,
    },

    /// Reaction call completed.
    ReactionFinished {
        /// Activation the call was issued for
        tag: RequestTag,
        /// Target message
        message_id: MessageId,
        /// Emoji that was added
        emoji: String,
        /// Confirmed aggregate
        result: RequestResult<Vec<Reaction>>,
    },

    /// Delete call completed.
    DeleteFinished {
        /// Activation the call was issued for
        tag: RequestTag,
        /// Target message
        message_id: MessageId,
        /// Outcome
        result: RequestResult<()>,
    },
}
