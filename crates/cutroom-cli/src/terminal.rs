//! Terminal driver for the headless client.
//!
//! Implements the [`Driver`] trait for line I/O: prompt lines come from
//! stdin, the chat is printed to stdout through [`ChatView`]. The network
//! side uses the WebSocket transport from `cutroom-client`.

use std::{
    collections::VecDeque,
    io::{self, Write},
    path::Path,
    time::Instant,
};

use bytes::Bytes;
use cutroom_app::{AppEvent, ChatApp, Driver};
use cutroom_client::transport::{self, ConnectedClient};
use cutroom_core::compose::PendingFile;
use cutroom_proto::JobId;
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc::{self, error::TryRecvError},
};

use crate::{
    command::{self, Command},
    view::ChatView,
};

/// Prompt lines buffered before the reader waits.
const INPUT_CAPACITY: usize = 32;

/// Terminal driver errors.
#[derive(Debug, Error)]
pub enum TerminalError {
    /// I/O error writing to the terminal.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Terminal driver implementing the [`Driver`] trait.
///
/// Owns the socket handle between `open_transport` and `close_transport`.
/// Handshake results and socket drops are queued as lifecycle events and
/// handed to the runtime before any prompt input.
pub struct TerminalDriver {
    socket_url: String,
    /// Bearer token, passed along when a room is opened
    token: Option<String>,
    connection: Option<ConnectedClient>,
    input: mpsc::Receiver<String>,
    /// Lifecycle events and expanded prompt input, oldest first.
    pending: VecDeque<AppEvent<Instant>>,
    view: ChatView,
    out: io::Stdout,
}

impl TerminalDriver {
    /// Create a driver for `socket_url`. Starts reading stdin.
    pub fn new(socket_url: impl Into<String>, token: Option<String>) -> Self {
        let (tx, rx) = mpsc::channel(INPUT_CAPACITY);
        tokio::spawn(read_lines(tx));

        Self {
            socket_url: socket_url.into(),
            token,
            connection: None,
            input: rx,
            pending: VecDeque::new(),
            view: ChatView::new(),
            out: io::stdout(),
        }
    }

    /// Open `job_id` before reading any prompt input.
    pub fn open_on_start(&mut self, job_id: JobId) {
        let token = self.token.clone();
        self.pending.push_back(AppEvent::OpenRoom { job_id, token });
    }

    fn say(&mut self, line: &str) -> Result<(), TerminalError> {
        writeln!(self.out, "{line}")?;
        Ok(())
    }

    /// Turn a prompt line into app events.
    async fn expand(&mut self, line: &str) -> Result<(), TerminalError> {
        let now = Instant::now();
        let command = match command::parse(line) {
            None => return Ok(()),
            Some(Ok(command)) => command,
            Some(Err(e)) => return self.say(&format!("? {e}")),
        };

        match command {
            Command::Say(text) => {
                self.pending.push_back(AppEvent::Input { text, now });
                self.pending.push_back(AppEvent::Send);
            },
            Command::Room(job_id) => {
                let token = self.token.clone();
                self.pending.push_back(AppEvent::OpenRoom { job_id, token });
            },
            Command::Reply(target) => self.pending.push_back(AppEvent::SetReplyTarget(target)),
            Command::Attach(path) => match read_attachment(&path).await {
                Ok(file) => self.pending.push_back(AppEvent::AttachFile(file)),
                Err(e) => return self.say(&format!("? cannot read {}: {e}", path.display())),
            },
            Command::Detach(index) => self.pending.push_back(AppEvent::RemoveFile(index)),
            Command::React { message_id, emoji } => {
                self.pending.push_back(AppEvent::React { message_id, emoji });
            },
            Command::Delete(message_id) => {
                self.pending.push_back(AppEvent::Delete { message_id });
            },
            Command::Dismiss => self.pending.push_back(AppEvent::DismissError),
            Command::Close => self.pending.push_back(AppEvent::Close),
            Command::Quit => self.pending.push_back(AppEvent::Quit),
        }
        Ok(())
    }
}

async fn read_lines(tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if tx.send(line).await.is_err() {
                    break;
                }
            },
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            },
        }
    }
}

async fn read_attachment(path: &Path) -> io::Result<PendingFile> {
    let data = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(PendingFile::new(name, command::mime_for(path), Bytes::from(data)))
}

impl Driver for TerminalDriver {
    type Error = TerminalError;
    type Instant = Instant;

    async fn poll_event(&mut self) -> Result<Option<AppEvent<Instant>>, Self::Error> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        match self.input.try_recv() {
            Ok(line) => self.expand(&line).await?,
            Err(TryRecvError::Empty) => {},
            // stdin closed
            Err(TryRecvError::Disconnected) => self.pending.push_back(AppEvent::Quit),
        }
        Ok(self.pending.pop_front())
    }

    async fn open_transport(&mut self, token: &str) -> Result<(), Self::Error> {
        self.connection = None;
        let event = match transport::connect(&self.socket_url, token).await {
            Ok(connection) => {
                tracing::info!(url = %self.socket_url, "socket connected");
                self.connection = Some(connection);
                AppEvent::TransportOpened
            },
            Err(e) => {
                tracing::warn!(url = %self.socket_url, error = %e, "socket handshake failed");
                AppEvent::TransportFailed { now: Instant::now(), reason: e.to_string() }
            },
        };
        self.pending.push_front(event);
        Ok(())
    }

    fn close_transport(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.stop();
        }
    }

    async fn send_frame(&mut self, frame: String) -> Result<(), Self::Error> {
        let Some(connection) = &self.connection else {
            tracing::debug!("frame dropped, socket closed");
            return Ok(());
        };
        if connection.to_server.send(frame).await.is_err() {
            self.connection = None;
            self.pending.push_front(AppEvent::TransportFailed {
                now: Instant::now(),
                reason: "connection lost".into(),
            });
        }
        Ok(())
    }

    async fn recv_frame(&mut self) -> Option<String> {
        let connection = self.connection.as_mut()?;
        match connection.from_server.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.connection = None;
                self.pending.push_front(AppEvent::TransportFailed {
                    now: Instant::now(),
                    reason: "connection lost".into(),
                });
                None
            },
        }
    }

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn render(&mut self, app: &ChatApp<Instant>) -> Result<(), Self::Error> {
        let lines = self.view.update(app);
        let mut out = self.out.lock();
        for line in lines {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(())
    }

    fn stop(&mut self) {
        self.close_transport();
    }
}

impl Drop for TerminalDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
