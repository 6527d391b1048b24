//! Connection handle and writer task.
//!
//! The actual socket write happens in exactly one spawned task, which owns
//! an [`OutboundBuffers`] scatter/gather queue and wakes on a `Notify`.
//! Other components (`Session`, `Chatroom`, `RoomService`) never touch the
//! socket directly — they hold a cloneable, non-owning [`ConnectionHandle`]
//! instead, which avoids the raw back-pointer cycle a shared-socket design
//! would otherwise need.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;

use crate::outbound::OutboundBuffers;

/// A cheaply-cloneable reference to a connection's outbound queue.
///
/// Holding a `ConnectionHandle` never keeps the connection's socket or
/// reader task alive; once the writer task exits, sends silently become
/// no-ops rather than errors, which lets `Chatroom::broadcast` and friends
/// stay lock-free about cleanup and just check `is_closed`.
#[derive(Clone)]
pub struct ConnectionHandle {
    buffers: Arc<OutboundBuffers>,
    wake: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl ConnectionHandle {
    /// Queue `bytes` for writing. Returns `false` if the connection is
    /// already closed (the bytes are dropped, not buffered).
    pub fn send(&self, bytes: Vec<u8>) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.buffers.push(&bytes);
        self.wake.notify_one();
        true
    }

    /// Mark the connection closed. Safe to call more than once or
    /// concurrently from multiple tasks.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether two handles address the same underlying connection.
    pub fn same_connection(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.buffers, &other.buffers)
    }
}

/// Spawn the writer task for a connection and return the handle other
/// components use to address it.
///
/// `sink` is the write half of the (already TLS-handshaken) socket. Every
/// [`ConnectionHandle::send`] pushes into the active half of an
/// [`OutboundBuffers`] and wakes the writer task, which swaps the halves
/// and flushes whatever had accumulated in one write. The writer task runs
/// until `close` is called and the queue drains, or a write fails.
pub fn spawn_writer<W>(mut sink: W) -> ConnectionHandle
where
    W: AsyncWriteExt + Unpin + Send + 'static,
{
    let buffers = Arc::new(OutboundBuffers::new());
    let wake = Arc::new(Notify::new());
    let closed = Arc::new(AtomicBool::new(false));

    let buffers_for_task = Arc::clone(&buffers);
    let wake_for_task = Arc::clone(&wake);
    let closed_for_task = Arc::clone(&closed);

    tokio::spawn(async move {
        loop {
            let pending = buffers_for_task.swap_buffers();
            if pending.is_empty() {
                if closed_for_task.load(Ordering::Acquire) {
                    break;
                }
                wake_for_task.notified().await;
                continue;
            }
            if sink.write_all(&pending).await.is_err() {
                break;
            }
            if sink.flush().await.is_err() {
                break;
            }
        }
        closed_for_task.store(true, Ordering::Release);
        let _ = sink.shutdown().await;
    });

    ConnectionHandle {
        buffers,
        wake,
        closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn send_delivers_bytes_to_sink() {
        let (client, mut server) = duplex(1024);
        let (_read, write) = tokio::io::split(client);
        let handle = spawn_writer(write);

        assert!(handle.send(b"hello".to_vec()));

        let mut buf = [0u8; 5];
        tokio::io::AsyncReadExt::read_exact(&mut server, &mut buf)
            .await
            .unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[tokio::test]
    async fn send_after_sink_closed_reports_failure_eventually() {
        let (client, server) = duplex(1024);
        drop(server);
        let (_read, write) = tokio::io::split(client);
        let handle = spawn_writer(write);

        // first send may still succeed as it races the writer task noticing
        // the peer is gone; give the task a chance to observe the failure.
        handle.send(b"x".to_vec());
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn close_marks_handle_closed_and_suppresses_sends() {
        let (client, _server) = duplex(1024);
        let (_read, write) = tokio::io::split(client);
        let handle = spawn_writer(write);
        handle.close();
        assert!(handle.is_closed());
        assert!(!handle.send(b"dropped".to_vec()));
    }

    #[tokio::test]
    async fn same_connection_identifies_clones() {
        let (client, _server) = duplex(1024);
        let (_read, write) = tokio::io::split(client);
        let handle = spawn_writer(write);
        let clone = handle.clone();
        assert!(handle.same_connection(&clone));

        let (client2, _server2) = duplex(1024);
        let (_read2, write2) = tokio::io::split(client2);
        let other = spawn_writer(write2);
        assert!(!handle.same_connection(&other));
    }
}
