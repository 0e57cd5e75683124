//! Chat configuration.

use cutroom_core::{connection::ConnectionConfig, typing::TypingConfig};
use cutroom_proto::UserId;

/// Configuration for a [`crate::ChatApp`].
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Local user; own typing echoes are ignored
    pub user_id: UserId,
    /// Reconnection policy
    pub connection: ConnectionConfig,
    /// Typing debounce and expiry
    pub typing: TypingConfig,
}

impl ChatConfig {
    /// Default timings for `user_id`.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        Self {
            user_id: user_id.into(),
            connection: ConnectionConfig::default(),
            typing: TypingConfig::default(),
        }
    }
}
