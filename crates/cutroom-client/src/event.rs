//! Client events and actions.

use std::time::Duration;

use cutroom_proto::{Attachment, JobId, MessageId};

/// Events the caller feeds into the client.
///
/// The caller is responsible for:
/// - Opening the transport and reporting the outcome
/// - Receiving text frames from the network
/// - Driving time forward via ticks
/// - Forwarding application intents (join, send, typing, ...)
///
/// Generic over `I` (Instant type) to support both production and virtual
/// time.
#[derive(Debug, Clone)]
pub enum ClientEvent<I = std::time::Instant> {
    /// Configure the bearer token used for the transport handshake.
    Initialize {
        /// Bearer token
        token: String,
    },

    /// Open the transport.
    Connect,

    /// Tear down the transport and forget the token and rooms.
    Disconnect,

    /// The transport handshake completed.
    TransportOpened,

    /// The transport failed to open, or dropped mid-session.
    TransportFailed {
        /// Time of the failure
        now: I,
        /// Error description
        reason: String,
    },

    /// Text frame received from the server.
    FrameReceived(String),

    /// Time tick for timer processing.
    Tick {
        /// Current time from the environment
        now: I,
    },

    /// Subscribe this session to a job room.
    JoinRoom {
        /// Room to join
        job_id: JobId,
    },

    /// Unsubscribe this session from a job room.
    LeaveRoom {
        /// Room to leave
        job_id: JobId,
    },

    /// Emit a message. Fire-and-forget; the echo arrives as `newMessage`.
    SendMessage {
        /// Target room
        job_id: JobId,
        /// Text body
        content: String,
        /// Server-confirmed attachments
        attachments: Vec<Attachment>,
        /// Message being replied to
        reply_to: Option<MessageId>,
    },

    /// Emit the local typing state. Debounce is the caller's job.
    Typing {
        /// Target room
        job_id: JobId,
        /// Current typing state
        is_typing: bool,
    },

    /// Tell other participants a message was deleted.
    BroadcastDelete {
        /// Target room
        job_id: JobId,
        /// Deleted message
        message_id: MessageId,
    },
}

/// Actions the client produces for the caller to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Open the transport with this bearer token.
    OpenTransport {
        /// Bearer token for the handshake
        token: String,
    },

    /// Close the transport.
    CloseTransport,

    /// Send a text frame to the server.
    Send(String),

    /// Transport is up.
    Connected,

    /// Transport dropped; another attempt is scheduled.
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
        /// Delay until the attempt
        delay: Duration,
    },

    /// Manual disconnect completed.
    Disconnected,

    /// Retry budget exhausted. Terminal until a fresh `Initialize`.
    Failed {
        /// Last transport error
        reason: String,
    },
}
