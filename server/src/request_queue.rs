//! FIFO queue of parsed requests awaiting dispatch, decoupling socket reads
//! from the dispatcher.

use std::collections::VecDeque;
use std::sync::Mutex;

use chat_protocol::Request;

#[derive(Default)]
pub struct RequestQueue {
    inner: Mutex<VecDeque<Request>>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, request: Request) {
        self.inner.lock().unwrap().push_back(request);
    }

    /// Take every request currently queued, leaving the queue empty.
    pub fn swap(&self) -> VecDeque<Request> {
        let mut inner = self.inner.lock().unwrap();
        std::mem::take(&mut *inner)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_protocol::QueryKind;

    fn req(kind: QueryKind) -> Request {
        Request {
            kind,
            timestamp: 0,
            timeout_ms: 0,
            body: None,
        }
    }

    #[test]
    fn swap_returns_in_fifo_order() {
        let queue = RequestQueue::new();
        queue.push(req(QueryKind::JoinChatroom));
        queue.push(req(QueryKind::ChatMessage));
        queue.push(req(QueryKind::LeaveChatroom));

        let drained = queue.swap();
        let kinds: Vec<_> = drained.iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                QueryKind::JoinChatroom,
                QueryKind::ChatMessage,
                QueryKind::LeaveChatroom
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn swap_on_empty_queue_returns_empty() {
        let queue = RequestQueue::new();
        assert!(queue.swap().is_empty());
    }

    #[test]
    fn pushes_after_swap_are_visible_in_next_swap() {
        let queue = RequestQueue::new();
        queue.push(req(QueryKind::Syn));
        let _ = queue.swap();
        queue.push(req(QueryKind::Ack));
        let drained = queue.swap();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].kind, QueryKind::Ack);
    }
}
