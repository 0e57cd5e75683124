//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`ChatApp`]: view-model state machine
//! - [`Driver`]: platform-specific I/O
//! - [`MessageApi`]: REST calls, run concurrently so a slow fetch never
//!   blocks the socket or the input

use std::{sync::Arc, time::Duration};

use cutroom_client::MessageApi;
use cutroom_core::env::Environment;
use futures::{
    FutureExt, StreamExt,
    future::BoxFuture,
    stream::FuturesUnordered,
};

use crate::{AppAction, AppEvent, ChatApp, ChatConfig, Driver};

/// Sleep between idle cycles.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

type Request<I> = BoxFuture<'static, AppEvent<I>>;

/// Generic runtime that orchestrates ChatApp, Driver and MessageApi.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `A`: REST backend
/// - `E`: Environment for sleeping between cycles
pub struct Runtime<D, A, E>
where
    D: Driver,
    A: MessageApi,
    E: Environment,
{
    driver: D,
    app: ChatApp<D::Instant>,
    api: Arc<A>,
    env: E,
    /// REST calls in flight. Each resolves to its completion event.
    requests: FuturesUnordered<Request<D::Instant>>,
}

impl<D, A, E> Runtime<D, A, E>
where
    D: Driver<Instant = E::Instant>,
    A: MessageApi,
    E: Environment,
{
    /// Create a new runtime with the given driver, backend and environment.
    pub fn new(driver: D, api: A, env: E, config: ChatConfig) -> Self {
        Self {
            driver,
            app: ChatApp::new(config),
            api: Arc::new(api),
            env,
            requests: FuturesUnordered::new(),
        }
    }

    /// Run the main event loop until the app asks to quit.
    ///
    /// Each cycle:
    /// 1. Polls for an input or transport event from the driver
    /// 2. Receives a frame from the server
    /// 3. Collects finished REST calls
    /// 4. Ticks timers, then sleeps if nothing happened
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<(), D::Error> {
        self.driver.render(&self.app)?;

        loop {
            let should_quit = self.process_cycle().await?;
            if should_quit {
                break;
            }
        }

        self.driver.stop();
        Ok(())
    }

    /// Process one cycle of the event loop.
    ///
    /// Returns `true` if the application should quit.
    async fn process_cycle(&mut self) -> Result<bool, D::Error> {
        let mut idle = true;

        if let Some(event) = self.driver.poll_event().await? {
            idle = false;
            if self.dispatch(event).await? {
                return Ok(true);
            }
        }

        if let Some(frame) = self.driver.recv_frame().await {
            idle = false;
            let now = self.driver.now();
            if self.dispatch(AppEvent::FrameReceived { frame, now }).await? {
                return Ok(true);
            }
        }

        while let Some(Some(event)) = self.requests.next().now_or_never() {
            idle = false;
            if self.dispatch(event).await? {
                return Ok(true);
            }
        }

        let now = self.driver.now();
        if self.dispatch(AppEvent::Tick { now }).await? {
            return Ok(true);
        }

        if idle {
            self.env.sleep(TICK_INTERVAL).await;
        }
        Ok(false)
    }

    /// Feed one event to the app and execute what it asks for.
    ///
    /// Returns `true` if should quit.
    async fn dispatch(&mut self, event: AppEvent<D::Instant>) -> Result<bool, D::Error> {
        let actions = self.app.handle(event);

        for action in actions {
            match action {
                AppAction::Render => self.driver.render(&self.app)?,
                AppAction::Quit => return Ok(true),
                AppAction::OpenTransport { token } => self.driver.open_transport(&token).await?,
                AppAction::CloseTransport => self.driver.close_transport(),
                AppAction::SendFrame(frame) => self.driver.send_frame(frame).await?,

                // REST calls run alongside the loop
                AppAction::FetchSnapshot { tag } => {
                    let api = Arc::clone(&self.api);
                    self.requests.push(Box::pin(async move {
                        let result = api.fetch_messages(&tag.job_id).await;
                        AppEvent::SnapshotLoaded { tag, result }
                    }));
                },
                AppAction::Upload { tag, files } => {
                    let api = Arc::clone(&self.api);
                    self.requests.push(Box::pin(async move {
                        let result = api.upload(&files).await;
                        AppEvent::UploadFinished { tag, result }
                    }));
                },
                AppAction::AddReaction { tag, message_id, emoji } => {
                    let api = Arc::clone(&self.api);
                    self.requests.push(Box::pin(async move {
                        let result = api.add_reaction(&message_id, &emoji).await;
                        AppEvent::ReactionFinished { tag, message_id, emoji, result }
                    }));
                },
                AppAction::DeleteMessage { tag, message_id } => {
                    let api = Arc::clone(&self.api);
                    self.requests.push(Box::pin(async move {
                        let result = api.delete_message(&message_id).await;
                        AppEvent::DeleteFinished { tag, message_id, result }
                    }));
                },
            }
        }
        Ok(false)
    }

    /// Get a reference to the ChatApp
    pub fn app(&self) -> &ChatApp<D::Instant> {
        &self.app
    }

    /// Number of REST calls in flight.
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }
}
