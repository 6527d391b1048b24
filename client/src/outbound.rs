//! Double-buffered outbound byte queue, symmetric to `chat_server::outbound`.
//!
//! `Client::write` pushes into the active half; the writer task swaps and
//! flushes the passive half without holding the lock during the socket
//! write.

use std::sync::Mutex;

#[derive(Default)]
pub struct OutboundBuffers {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    active: Vec<u8>,
    passive: Vec<u8>,
}

impl OutboundBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.active.extend_from_slice(bytes);
    }

    pub fn swap_buffers(&self) -> Vec<u8> {
        let mut inner = self.inner.lock().unwrap();
        std::mem::swap(&mut inner.active, &mut inner.passive);
        std::mem::take(&mut inner.passive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_swap_returns_pushed_bytes() {
        let buffers = OutboundBuffers::new();
        buffers.push(b"hello");
        buffers.push(b" world");
        assert_eq!(buffers.swap_buffers(), b"hello world");
    }

    #[test]
    fn swap_with_nothing_pushed_returns_empty() {
        let buffers = OutboundBuffers::new();
        assert!(buffers.swap_buffers().is_empty());
    }
}
