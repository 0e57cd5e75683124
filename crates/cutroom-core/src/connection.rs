//! Transport lifecycle state machine.
//!
//! Owns the lifecycle of the single persistent socket: initialize-once,
//! connect, bounded automatic reconnection, and manual disconnect. Uses the
//! action pattern: methods take time as input and return actions for the
//! driver to execute. Transport errors never surface as `Err`; they become
//! [`ConnectionAction::Failed`] once the retry budget is spent.
//!
//! # State Machine
//!
//! ```text
//! ┌───────────────┐ initialize ┌─────────────┐ connect ┌────────────┐ opened ┌───────────┐
//! │ Uninitialized │───────────>│ Initialized │────────>│ Connecting │───────>│ Connected │
//! └───────────────┘            └─────────────┘         └────────────┘        └───────────┘
//!                                    ^                       │ failed          │      ^
//!                                    │ initialize            ↓                 │      │ opened
//!                                ┌────────┐  budget    ┌──────────────┐ failed │      │
//!                                │ Failed │<───────────│ Reconnecting │<───────┘      │
//!                                └────────┘  spent     └──────────────┘───────────────┘
//!
//! disconnect (any state) ──> Disconnected ──initialize──> Initialized
//! ```

use std::time::Duration;

use crate::{env::Moment, error::ConnectionError};

/// Automatic reconnection attempts before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Fixed delay between reconnection attempts.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Actions returned by the connection state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
    /// Open the transport, authenticating with this token.
    OpenTransport {
        /// Bearer token for the handshake
        token: String,
    },

    /// Tear down the transport.
    CloseTransport,

    /// Transport is up. Pending joins and buffered frames may be flushed.
    Connected,

    /// Transport dropped; another attempt is scheduled.
    Reconnecting {
        /// 1-based attempt number
        attempt: u32,
        /// Delay until the attempt
        delay: Duration,
    },

    /// Retry budget exhausted. Emitted exactly once per failure.
    Failed {
        /// Last transport error
        reason: String,
    },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No credential configured
    Uninitialized,
    /// Credential configured, transport not opened
    Initialized,
    /// First transport attempt in flight
    Connecting,
    /// Transport established
    Connected,
    /// Waiting for, or running, an automatic retry
    Reconnecting,
    /// Manually torn down; credential cleared
    Disconnected,
    /// Retry budget exhausted; terminal until `initialize`
    Failed,
}

impl ConnectionState {
    /// True while a transport is open or being opened.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected | Self::Reconnecting)
    }
}

/// Connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Automatic reconnection attempts after a transport failure
    pub max_reconnect_attempts: u32,
    /// Delay before each reconnection attempt
    pub reconnect_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Connection state machine
///
/// Pure state machine: no I/O and no clock. Generic over `Instant` to support
/// both real time and virtual time for deterministic testing.
#[derive(Debug, Clone)]
pub struct Connection<I> {
    state: ConnectionState,
    config: ConnectionConfig,
    token: Option<String>,
    /// Automatic attempts made since the last successful open
    attempts: u32,
    /// When the next automatic attempt is due. `None` while one is in flight.
    retry_at: Option<I>,
}

impl<I: Moment> Connection<I> {
    /// Create a new connection in [`ConnectionState::Uninitialized`].
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            state: ConnectionState::Uninitialized,
            config,
            token: None,
            attempts: 0,
            retry_at: None,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True if the transport is established.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Automatic reconnection attempts made since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Configuration in use.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// When the next automatic attempt is due, if one is scheduled.
    pub fn next_deadline(&self) -> Option<I> {
        self.retry_at
    }

    /// Configure the transport credential.
    ///
    /// Accepted from `Uninitialized`, `Disconnected` and `Failed`. Any other
    /// state is rejected and the existing token is kept.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::MissingToken` if the token is blank
    /// - `ConnectionError::AlreadyInitialized` if a credential is configured
    pub fn initialize(&mut self, token: impl Into<String>) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Uninitialized
            | ConnectionState::Disconnected
            | ConnectionState::Failed => {},
            state => return Err(ConnectionError::AlreadyInitialized { state }),
        }

        let token = token.into();
        if token.trim().is_empty() {
            return Err(ConnectionError::MissingToken);
        }

        self.token = Some(token);
        self.state = ConnectionState::Initialized;
        self.attempts = 0;
        self.retry_at = None;
        Ok(())
    }

    /// Open the transport.
    ///
    /// Idempotent while a transport is open or being opened.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NotInitialized` if no credential is configured
    /// - `ConnectionError::InvalidState` from `Failed`
    pub fn connect(&mut self) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match self.state {
            ConnectionState::Uninitialized | ConnectionState::Disconnected => {
                Err(ConnectionError::NotInitialized)
            },
            ConnectionState::Failed => Err(ConnectionError::InvalidState {
                state: self.state,
                operation: "connect".to_string(),
            }),
            ConnectionState::Initialized => {
                let token = self.token.clone().ok_or(ConnectionError::NotInitialized)?;
                self.state = ConnectionState::Connecting;
                Ok(vec![ConnectionAction::OpenTransport { token }])
            },
            ConnectionState::Connecting
            | ConnectionState::Connected
            | ConnectionState::Reconnecting => Ok(vec![]),
        }
    }

    /// The driver reports the transport is open.
    pub fn transport_opened(&mut self) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                self.state = ConnectionState::Connected;
                self.attempts = 0;
                self.retry_at = None;
                vec![ConnectionAction::Connected]
            },
            ConnectionState::Connected => vec![],
            // An attempt completed after we gave up or were torn down.
            ConnectionState::Uninitialized
            | ConnectionState::Initialized
            | ConnectionState::Disconnected
            | ConnectionState::Failed => vec![ConnectionAction::CloseTransport],
        }
    }

    /// The driver reports a transport failure (connect error or drop).
    pub fn transport_failed(&mut self, now: I, reason: &str) -> Vec<ConnectionAction> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {},
            // A failure while waiting for the timer has no attempt to charge.
            ConnectionState::Reconnecting if self.retry_at.is_some() => return vec![],
            ConnectionState::Reconnecting => {},
            _ => return vec![],
        }

        if self.attempts >= self.config.max_reconnect_attempts {
            self.state = ConnectionState::Failed;
            self.retry_at = None;
            tracing::warn!(attempts = self.attempts, %reason, "reconnect budget exhausted");
            return vec![ConnectionAction::Failed { reason: reason.to_string() }];
        }

        self.attempts += 1;
        self.state = ConnectionState::Reconnecting;
        self.retry_at = Some(now + self.config.reconnect_delay);
        tracing::info!(attempt = self.attempts, %reason, "transport failed, scheduling reconnect");

        vec![ConnectionAction::Reconnecting {
            attempt: self.attempts,
            delay: self.config.reconnect_delay,
        }]
    }

    /// Process timers. Starts a scheduled reconnection attempt when due.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        if self.state != ConnectionState::Reconnecting {
            return vec![];
        }

        match (self.retry_at, &self.token) {
            (Some(at), Some(token)) if now >= at => {
                self.retry_at = None;
                vec![ConnectionAction::OpenTransport { token: token.clone() }]
            },
            _ => vec![],
        }
    }

    /// Tear down the transport and forget the credential.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        let actions =
            if self.state.is_active() { vec![ConnectionAction::CloseTransport] } else { vec![] };

        self.state = ConnectionState::Disconnected;
        self.token = None;
        self.attempts = 0;
        self.retry_at = None;
        actions
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn initialized() -> Connection<Instant> {
        let mut conn = Connection::new(ConnectionConfig::default());
        conn.initialize("token").unwrap();
        conn
    }

    #[test]
    fn connection_lifecycle() {
        let mut conn = initialized();
        assert_eq!(conn.state(), ConnectionState::Initialized);

        let actions = conn.connect().unwrap();
        assert_eq!(actions, vec![ConnectionAction::OpenTransport { token: "token".into() }]);
        assert_eq!(conn.state(), ConnectionState::Connecting);

        let actions = conn.transport_opened();
        assert_eq!(actions, vec![ConnectionAction::Connected]);
        assert!(conn.is_connected());

        let actions = conn.disconnect();
        assert_eq!(actions, vec![ConnectionAction::CloseTransport]);
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn connect_before_initialize_fails() {
        let mut conn: Connection<Instant> = Connection::new(ConnectionConfig::default());
        assert_eq!(conn.connect(), Err(ConnectionError::NotInitialized));
    }

    #[test]
    fn double_initialize_keeps_first_token() {
        let mut conn = initialized();
        let result = conn.initialize("other");
        assert!(matches!(result, Err(ConnectionError::AlreadyInitialized { .. })));

        let actions = conn.connect().unwrap();
        assert_eq!(actions, vec![ConnectionAction::OpenTransport { token: "token".into() }]);
    }

    #[test]
    fn blank_token_is_rejected() {
        let mut conn: Connection<Instant> = Connection::new(ConnectionConfig::default());
        assert_eq!(conn.initialize("  "), Err(ConnectionError::MissingToken));
        assert_eq!(conn.state(), ConnectionState::Uninitialized);
    }

    #[test]
    fn disconnect_allows_reinitialize() {
        let mut conn = initialized();
        conn.connect().unwrap();
        conn.transport_opened();
        conn.disconnect();

        assert_eq!(conn.connect(), Err(ConnectionError::NotInitialized));
        conn.initialize("fresh").unwrap();
        let actions = conn.connect().unwrap();
        assert_eq!(actions, vec![ConnectionAction::OpenTransport { token: "fresh".into() }]);
    }

    #[test]
    fn connect_is_idempotent_while_active() {
        let mut conn = initialized();
        conn.connect().unwrap();
        assert_eq!(conn.connect(), Ok(vec![]));
        conn.transport_opened();
        assert_eq!(conn.connect(), Ok(vec![]));
    }

    #[test]
    fn retry_waits_for_delay() {
        let t0 = Instant::now();
        let mut conn = initialized();
        conn.connect().unwrap();

        let actions = conn.transport_failed(t0, "refused");
        assert_eq!(actions, vec![ConnectionAction::Reconnecting {
            attempt: 1,
            delay: DEFAULT_RECONNECT_DELAY
        }]);
        assert_eq!(conn.state(), ConnectionState::Reconnecting);

        assert!(conn.tick(t0 + Duration::from_millis(4999)).is_empty());
        let actions = conn.tick(t0 + DEFAULT_RECONNECT_DELAY);
        assert_eq!(actions, vec![ConnectionAction::OpenTransport { token: "token".into() }]);

        // Attempt in flight, no duplicate open
        assert!(conn.tick(t0 + Duration::from_secs(60)).is_empty());

        assert_eq!(conn.transport_opened(), vec![ConnectionAction::Connected]);
        assert_eq!(conn.attempts(), 0);
    }

    #[test]
    fn mid_session_drop_reconnects() {
        let t0 = Instant::now();
        let mut conn = initialized();
        conn.connect().unwrap();
        conn.transport_opened();

        let actions = conn.transport_failed(t0, "reset by peer");
        assert!(matches!(actions.as_slice(), [ConnectionAction::Reconnecting { attempt: 1, .. }]));
    }

    #[test]
    fn failed_is_terminal_until_initialize() {
        let t0 = Instant::now();
        let mut conn = Connection::new(ConnectionConfig {
            max_reconnect_attempts: 0,
            reconnect_delay: Duration::from_millis(10),
        });
        conn.initialize("token").unwrap();
        conn.connect().unwrap();

        let actions = conn.transport_failed(t0, "refused");
        assert_eq!(actions, vec![ConnectionAction::Failed { reason: "refused".into() }]);
        assert_eq!(conn.state(), ConnectionState::Failed);

        assert!(matches!(conn.connect(), Err(ConnectionError::InvalidState { .. })));
        assert!(conn.transport_failed(t0, "again").is_empty());

        conn.initialize("token").unwrap();
        assert!(conn.connect().is_ok());
    }

    #[test]
    fn late_open_after_disconnect_is_closed() {
        let mut conn = initialized();
        conn.connect().unwrap();
        conn.disconnect();
        assert_eq!(conn.transport_opened(), vec![ConnectionAction::CloseTransport]);
    }
}
