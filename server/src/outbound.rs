//! Double-buffered outbound byte queue.
//!
//! Request handlers push serialized frames into the active half while the
//! writer task drains the passive half. `swap_buffers` exchanges the two
//! under a single short-held lock so the actual socket write never happens
//! while holding it.

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

    /// Append bytes to the active half.
    pub fn push(&self, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.active.extend_from_slice(bytes);
    }

    /// Swap active and passive halves, returning what was accumulated in
    /// the (now former) active half, ready to flush to the socket. The
    /// returned buffer is empty if nothing had been pushed.
    pub fn swap_buffers(&self) -> Vec<u8> {
        let mut inner = self.inner.lock().unwrap();
        std::mem::swap(&mut inner.active, &mut inner.passive);
        std::mem::take(&mut inner.passive)
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.active.is_empty()
    }
}
