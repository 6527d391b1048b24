//! The reference client's connection: TLS stream, writer task, reader
//! loop and the `Closed -> Connected -> WaitAck -> ReceiveAck` handshake
//! state machine (spec.md §4.10).
//!
//! Symmetric to `chat_server::connection`: exactly one task ever writes to
//! the socket, fed by the same double-buffered `OutboundBuffers` scatter/
//! gather queue the server uses, and the reader task is the only place
//! that advances the handshake state or publishes the last-observed
//! `Response`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chat_protocol::{drain_frames, encode_request, parse_frame, Frame, QueryKind, Request, Response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{watch, Notify};
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::TlsConnector;
use tracing::warn;

use crate::errors::ClientError;
use crate::outbound::OutboundBuffers;

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Connected,
    WaitAck,
    ReceiveAck,
    Closed,
}

/// A connected chat client. Holds no socket directly — the writer task
/// owns it — so `Client` is cheap to pass around. `Drop` marks the
/// outbound queue closed and wakes the writer task, which drains whatever
/// is left and shuts the socket down.
pub struct Client {
    buffers: Arc<OutboundBuffers>,
    wake: Arc<Notify>,
    writer_closed: Arc<AtomicBool>,
    state: Arc<Mutex<ClientState>>,
    responses: watch::Receiver<Option<Response>>,
}

impl Client {
    /// Connect to `addr`, complete the TLS handshake against `server_name`,
    /// then immediately send a `SYN` carrying `handshake_key` and move into
    /// `WaitAck`. The reader task flips `WaitAck -> ReceiveAck` on the
    /// matching `ACK`.
    pub async fn connect(
        addr: &str,
        server_name: &str,
        connector: TlsConnector,
        handshake_key: &str,
    ) -> Result<Self, ClientError> {
        let tcp = TcpStream::connect(addr).await?;
        let name = ServerName::try_from(server_name.to_owned())
            .map_err(|_| ClientError::InvalidServerName(server_name.to_owned()))?;
        let stream = connector.connect(name, tcp).await?;

        let (mut read_half, mut write_half) = tokio::io::split(stream);
        let buffers = Arc::new(OutboundBuffers::new());
        let wake = Arc::new(Notify::new());
        let writer_closed = Arc::new(AtomicBool::new(false));
        let (resp_tx, resp_rx) = watch::channel(None);
        let state = Arc::new(Mutex::new(ClientState::Connected));

        let buffers_for_writer = Arc::clone(&buffers);
        let wake_for_writer = Arc::clone(&wake);
        let writer_closed_for_writer = Arc::clone(&writer_closed);
        tokio::spawn(async move {
            loop {
                let pending = buffers_for_writer.swap_buffers();
                if pending.is_empty() {
                    if writer_closed_for_writer.load(Ordering::Acquire) {
                        break;
                    }
                    wake_for_writer.notified().await;
                    continue;
                }
                if write_half.write_all(&pending).await.is_err() {
                    break;
                }
                if write_half.flush().await.is_err() {
                    break;
                }
            }
            let _ = write_half.shutdown().await;
        });

        let state_for_reader = Arc::clone(&state);
        tokio::spawn(async move {
            let mut buf = Vec::new();
            let mut chunk = [0u8; READ_CHUNK];
            loop {
                let n = match read_half.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => n,
                };
                buf.extend_from_slice(&chunk[..n]);
                for frame_json in drain_frames(&mut buf) {
                    match parse_frame(&frame_json) {
                        Ok(Frame::Response(response)) => {
                            handle_message(&state_for_reader, &resp_tx, response);
                        }
                        Ok(Frame::Request(_) | Frame::Chat(_)) => {
                            warn!("client received unexpected non-response frame");
                        }
                        Err(err) => warn!(error = %err, "malformed frame from server"),
                    }
                }
            }
            *state_for_reader.lock().unwrap() = ClientState::Closed;
        });

        let client = Client {
            buffers,
            wake,
            writer_closed,
            state,
            responses: resp_rx,
        };
        client.send_syn(handshake_key)?;
        Ok(client)
    }

    fn send_syn(&self, key: &str) -> Result<(), ClientError> {
        *self.state.lock().unwrap() = ClientState::WaitAck;
        self.write(&Request {
            kind: QueryKind::Syn,
            timestamp: now_ms(),
            timeout_ms: 0,
            body: Some(serde_json::json!({ "key": key })),
        })
    }

    pub fn state(&self) -> ClientState {
        *self.state.lock().unwrap()
    }

    /// The most recently observed `Response`, if any has arrived yet.
    pub fn last_response(&self) -> Option<Response> {
        self.responses.borrow().clone()
    }

    /// Wait for the next `Response` to arrive. Returns `None` once the
    /// connection closes and no further responses will ever arrive.
    pub async fn wait_for_response(&mut self) -> Option<Response> {
        if self.responses.changed().await.is_err() {
            return None;
        }
        self.responses.borrow().clone()
    }

    pub fn write(&self, request: &Request) -> Result<(), ClientError> {
        if self.writer_closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed);
        }
        self.buffers.push(encode_request(request).as_bytes());
        self.wake.notify_one();
        Ok(())
    }

    pub fn send_chat_message(&self, message: &str) -> Result<(), ClientError> {
        self.write(&Request {
            kind: QueryKind::ChatMessage,
            timestamp: now_ms(),
            timeout_ms: 0,
            body: Some(serde_json::json!({ "message": message })),
        })
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.writer_closed.store(true, Ordering::Release);
        self.wake.notify_one();
    }
}

fn handle_message(
    state: &Arc<Mutex<ClientState>>,
    resp_tx: &watch::Sender<Option<Response>>,
    response: Response,
) {
    {
        let mut guard = state.lock().unwrap();
        if *guard == ClientState::WaitAck && response.kind == QueryKind::Ack {
            *guard = ClientState::ReceiveAck;
        }
    }
    let _ = resp_tx.send(Some(response));
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
