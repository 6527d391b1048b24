//! Accept loop: one task per connection, driving it through
//! accept -> TLS handshake -> authenticated session -> closed.

use std::sync::Arc;
use std::time::Duration;

use chat_protocol::{drain_frames, parse_frame, Frame};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{info, warn};

use crate::connection::spawn_writer;
use crate::room_service::RoomService;
use crate::session::Session;

const READ_CHUNK: usize = 4096;

/// Run the accept loop until `shutdown_rx` reports `true`.
pub async fn run(
    listener: TcpListener,
    tls_acceptor: TlsAcceptor,
    rooms: Arc<RoomService>,
    syn_timeout_ms: u64,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("accept loop shutting down");
                    return;
                }
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer_addr)) => {
                        let tls_acceptor = tls_acceptor.clone();
                        let rooms = Arc::clone(&rooms);
                        tokio::spawn(async move {
                            handle_connection(stream, tls_acceptor, rooms, syn_timeout_ms, peer_addr).await;
                        });
                    }
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    tls_acceptor: TlsAcceptor,
    rooms: Arc<RoomService>,
    syn_timeout_ms: u64,
    peer_addr: std::net::SocketAddr,
) {
    let handshake = tokio::time::timeout(
        Duration::from_millis(syn_timeout_ms),
        tls_acceptor.accept(stream),
    )
    .await;

    let tls_stream = match handshake {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => {
            warn!(%peer_addr, error = %err, "tls handshake failed");
            return;
        }
        Err(_) => {
            warn!(%peer_addr, "tls handshake timed out");
            return;
        }
    };

    info!(%peer_addr, "connection established");

    let (mut read_half, write_half) = tokio::io::split(tls_stream);
    let handle = spawn_writer(write_half);
    let user_id = rooms.next_user_id();
    let session = Arc::new(Session::new(user_id, handle.clone(), rooms.hall()));
    session.mark_acknowledged();

    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = match read_half.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) => {
                warn!(%peer_addr, error = %err, "read error");
                break;
            }
        };
        buf.extend_from_slice(&chunk[..n]);

        for frame_json in drain_frames(&mut buf) {
            match parse_frame(&frame_json) {
                Ok(Frame::Request(request)) => session.enqueue(request),
                Ok(Frame::Response(_) | Frame::Chat(_)) => {
                    warn!(%peer_addr, "ignoring unexpected non-request frame");
                }
                Err(err) => {
                    warn!(%peer_addr, error = %err, "malformed frame");
                }
            }
        }
        session.acquire_requests(&rooms);
    }

    info!(%peer_addr, "connection closed");
    let vacated_room_id = session.current_room_id();
    session.close();
    rooms.remove_if_empty(vacated_room_id);
}
