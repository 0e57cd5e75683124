//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from a specific
//! socket, clock and view. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::future::Future;

use cutroom_core::env::Moment;

use crate::{AppEvent, ChatApp};

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in the terminal client and in
/// simulation.
///
/// Transport outcomes are reported as events, not errors: a handshake that
/// completes is surfaced by [`poll_event`](Driver::poll_event) as
/// [`AppEvent::TransportOpened`], a refused handshake or dropped socket as
/// [`AppEvent::TransportFailed`]. `Err` is reserved for failures the
/// runtime cannot continue after.
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Moment;

    /// Poll for the next input or transport lifecycle event.
    ///
    /// Returns `None` if no events are ready. Must not block.
    fn poll_event(
        &mut self,
    ) -> impl Future<Output = Result<Option<AppEvent<Self::Instant>>, Self::Error>> + Send;

    /// Start opening the socket with a bearer token.
    ///
    /// # Errors
    ///
    /// Returns an error only if the driver itself is unusable.
    fn open_transport(&mut self, token: &str)
    -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close the socket. No-op if it is not open.
    fn close_transport(&mut self);

    /// Write a text frame to the socket.
    ///
    /// # Errors
    ///
    /// Returns an error only if the driver itself is unusable.
    fn send_frame(&mut self, frame: String) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Next frame from the server, or `None` if none is waiting.
    fn recv_frame(&mut self) -> impl Future<Output = Option<String>> + Send;

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render(&mut self, app: &ChatApp<Self::Instant>) -> Result<(), Self::Error>;

    /// Stop the connection and clean up resources.
    fn stop(&mut self);
}
