//! Observable application state types.
//!
//! The view model: what the UI needs to render the connection, the active
//! room and request outcomes, without exposing the state machines behind
//! them.

use std::fmt;

use cutroom_proto::JobId;

/// Connection or configuration problem shown above the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Banner {
    /// First connection attempt in flight.
    Connecting,
    /// Transport dropped; retrying.
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
    },
    /// Retry budget exhausted. Re-open the room to try again.
    Failed {
        /// Last transport error
        reason: String,
    },
    /// Chat cannot start (missing token, ...). Never retried.
    Configuration {
        /// What is wrong
        message: String,
    },
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => f.write_str("Connecting..."),
            Self::Reconnecting { attempt } => {
                write!(f, "Connection lost. Reconnecting (attempt {attempt})...")
            },
            Self::Failed { reason } => write!(f, "Unable to connect to chat: {reason}"),
            Self::Configuration { message } => write!(f, "Chat unavailable: {message}"),
        }
    }
}

/// History loading state of the active room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    /// Snapshot fetch in flight; live events are held until it resolves.
    Loading,
    /// Snapshot applied.
    Ready,
    /// Snapshot fetch failed. Re-open the room to retry.
    LoadFailed,
}

/// Identifies the room activation a request was issued for.
///
/// Every activation gets a new generation, so a response for an earlier
/// visit to the same room is stale too.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestTag {
    /// Room the request belongs to
    pub job_id: JobId,
    /// Activation counter at issue time
    pub generation: u64,
}

impl fmt::Display for RequestTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.job_id, self.generation)
    }
}
