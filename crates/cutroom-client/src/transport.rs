//! WebSocket transport for the client.
//!
//! Provides [`ConnectedClient`] which handles socket I/O for text frames.
//! This is a thin layer that only moves frames; protocol logic remains in
//! the Sans-IO [`crate::Client`]. The receive channel closing means the
//! transport dropped and should be reported as
//! [`crate::ClientEvent::TransportFailed`].

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Message,
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
    },
};

/// Frames buffered per direction before senders wait.
const CHANNEL_CAPACITY: usize = 64;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Handshake request could not be built.
    #[error("invalid request: {0}")]
    Request(String),
}

/// Handle to an open socket.
///
/// Frames are sent and received via the channels; an internal task does the
/// socket I/O.
#[derive(Debug)]
pub struct ConnectedClient {
    /// Send text frames to the server.
    pub to_server: mpsc::Sender<String>,
    /// Receive text frames from the server. Closes when the socket drops.
    pub from_server: mpsc::Receiver<String>,
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedClient {
    /// Stop the connection.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

impl Drop for ConnectedClient {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

/// Open a socket to `url`, authenticating with a bearer token.
///
/// # Errors
///
/// Returns an error if the URL is invalid or the handshake fails.
pub async fn connect(url: &str, token: &str) -> Result<ConnectedClient, TransportError> {
    let mut request =
        url.into_client_request().map_err(|e| TransportError::Request(e.to_string()))?;
    let auth = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| TransportError::Request(e.to_string()))?;
    request.headers_mut().insert(AUTHORIZATION, auth);

    let (stream, _response) =
        connect_async(request).await.map_err(|e| TransportError::Connection(e.to_string()))?;
    tracing::debug!(%url, "socket open");

    let (to_server_tx, to_server_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (from_server_tx, from_server_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);

    let handle = tokio::spawn(run_connection(stream, to_server_rx, from_server_tx));

    Ok(ConnectedClient {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

type Socket = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Bridge between the channels and the socket until either side closes.
async fn run_connection(
    stream: Socket,
    mut to_server: mpsc::Receiver<String>,
    from_server: mpsc::Sender<String>,
) {
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            outgoing = to_server.recv() => {
                let Some(frame) = outgoing else { break };
                if let Err(e) = sink.send(Message::text(frame)).await {
                    tracing::warn!(error = %e, "socket send failed");
                    break;
                }
            },
            incoming = source.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if from_server.send(text.to_string()).await.is_err() {
                            break;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "socket closed by server");
                        break;
                    },
                    Some(Ok(_)) => {},
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "socket receive failed");
                        break;
                    },
                    None => break,
                }
            },
        }
    }

    let _ = sink.close().await;
}
