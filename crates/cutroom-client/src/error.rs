//! Client errors.

use cutroom_core::{connection::ConnectionState, error::ConnectionError};
use cutroom_proto::ProtoError;
use thiserror::Error;

/// Errors from [`crate::Client::handle`].
///
/// Transport failures are not errors here: they arrive as
/// [`crate::ClientEvent::TransportFailed`] and come back out as actions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Connection lifecycle misuse (missing token, double initialize, ...)
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Outbound event could not be encoded.
    #[error(transparent)]
    Proto(#[from] ProtoError),

    /// No transport is open or being opened, so the event was not sent.
    #[error("{event} not sent, transport is {state:?}")]
    Offline {
        /// Wire name of the refused event
        event: &'static str,
        /// Connection state at the time
        state: ConnectionState,
    },
}

impl ClientError {
    /// Configuration errors block room activation and are never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Connection(e) if e.is_configuration())
    }
}
