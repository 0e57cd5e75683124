//! Error types for the chat core.
//!
//! Strongly-typed errors per layer: connection lifecycle errors, compose
//! preconditions, and request errors from the REST collaborator. None of
//! these are meant to escape the UI boundary; callers translate them into
//! error state.

use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors from the connection state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// `connect` called before `initialize`.
    #[error("connection not initialized")]
    NotInitialized,

    /// `initialize` called while a credential is already configured.
    #[error("connection already initialized (state {state:?})")]
    AlreadyInitialized {
        /// State at the time of the rejected call
        state: ConnectionState,
    },

    /// No usable auth token was supplied.
    #[error("missing auth token")]
    MissingToken,

    /// Operation not valid in the current state.
    #[error("invalid state transition: cannot {operation} from {state:?}")]
    InvalidState {
        /// Current state when error occurred
        state: ConnectionState,
        /// Operation that was attempted
        operation: String,
    },
}

impl ConnectionError {
    /// Configuration errors block room activation and are never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::MissingToken | Self::AlreadyInitialized { .. } | Self::NotInitialized)
    }
}

/// Errors from the composer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeError {
    /// Neither text nor files are staged.
    #[error("nothing to send")]
    Empty,

    /// A send is already waiting on its upload.
    #[error("a send is already in progress")]
    SendInProgress,
}

/// Errors from request/response calls (snapshot, upload, reaction, delete).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// 404
    #[error("not found")]
    NotFound,

    /// 401
    #[error("unauthorized")]
    Unauthorized,

    /// 400
    #[error("bad request: {}", detail(.message))]
    BadRequest {
        /// Server-provided description
        message: Option<String>,
    },

    /// Rejected locally before any call was made.
    #[error("invalid argument: {field} must not be empty")]
    InvalidArgument {
        /// Offending argument
        field: &'static str,
    },

    /// Request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// Any other failure status.
    #[error("server error ({status}): {}", detail(.message))]
    Server {
        /// HTTP status
        status: u16,
        /// Server-provided description
        message: Option<String>,
    },
}

fn detail(message: &Option<String>) -> &str {
    message.as_deref().unwrap_or("no details")
}

impl RequestError {
    /// Map a failure status (and the server's message, if any) to a category.
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        match status {
            400 => Self::BadRequest { message },
            401 => Self::Unauthorized,
            404 => Self::NotFound,
            _ => Self::Server { status, message },
        }
    }

    /// Human-readable text for display.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound => "It looks like this no longer exists.".to_owned(),
            Self::Unauthorized => "Your session has expired. Please sign in again.".to_owned(),
            Self::BadRequest { message: Some(m) } => m.clone(),
            Self::BadRequest { message: None } => "The request was invalid.".to_owned(),
            Self::InvalidArgument { field } => format!("Please provide a {field}."),
            Self::Network(_) => "Could not reach the server. Check your connection.".to_owned(),
            Self::Server { message: Some(m), .. } => m.clone(),
            Self::Server { message: None, .. } => {
                "Something went wrong. Please try again.".to_owned()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(RequestError::from_status(404, None), RequestError::NotFound);
        assert_eq!(RequestError::from_status(401, Some("x".into())), RequestError::Unauthorized);
        assert_eq!(
            RequestError::from_status(400, Some("emoji required".into())),
            RequestError::BadRequest { message: Some("emoji required".into()) }
        );
        assert_eq!(
            RequestError::from_status(503, None),
            RequestError::Server { status: 503, message: None }
        );
    }

    #[test]
    fn generic_fallback_carries_server_message() {
        let err = RequestError::from_status(500, Some("database unavailable".into()));
        assert_eq!(err.user_message(), "database unavailable");
        insta::assert_snapshot!(err.to_string(), @"server error (500): database unavailable");
    }

    #[test]
    fn configuration_errors() {
        assert!(ConnectionError::MissingToken.is_configuration());
        assert!(
            !ConnectionError::InvalidState {
                state: ConnectionState::Failed,
                operation: "connect".into()
            }
            .is_configuration()
        );
    }
}
