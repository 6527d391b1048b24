//! Per-connection session state machine and request dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chat_protocol::{encode_response, Request, Response};

use crate::chatroom::{Chatroom, CapacityError};
use crate::connection::ConnectionHandle;
use crate::executors;
use crate::request_queue::RequestQueue;
use crate::room_service::RoomService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    WaitSyn,
    Acknowledged,
    Closed,
}

pub struct Session {
    user_id: u64,
    username: Mutex<String>,
    handle: ConnectionHandle,
    queue: RequestQueue,
    state: Mutex<SessionState>,
    current_room: Mutex<Arc<Chatroom>>,
    dispatching: AtomicBool,
}

impl Session {
    pub fn new(user_id: u64, handle: ConnectionHandle, hall: Arc<Chatroom>) -> Self {
        Session {
            user_id,
            username: Mutex::new(String::new()),
            handle,
            queue: RequestQueue::new(),
            state: Mutex::new(SessionState::WaitSyn),
            current_room: Mutex::new(hall),
            dispatching: AtomicBool::new(false),
        }
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn username(&self) -> String {
        self.username.lock().unwrap().clone()
    }

    pub fn set_username(&self, name: String) {
        *self.username.lock().unwrap() = name;
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SessionState::Closed
    }

    /// Called once the TLS handshake completes; this is what actually
    /// authorizes `WaitSyn -> Acknowledged` (see executors::syn).
    pub fn mark_acknowledged(&self) {
        let mut state = self.state.lock().unwrap();
        if *state == SessionState::WaitSyn {
            *state = SessionState::Acknowledged;
        }
    }

    /// Idempotent: safe to call more than once or from more than one task.
    pub fn close(&self) {
        *self.state.lock().unwrap() = SessionState::Closed;
        self.handle.close();
        let current = self.current_room.lock().unwrap().clone();
        current.leave(&self.handle);
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn enqueue(&self, request: Request) {
        self.queue.push(request);
    }

    /// Move this session out of its current room and into `room`,
    /// enforcing that room's capacity.
    pub fn move_to_room(&self, room: Arc<Chatroom>) -> Result<(), CapacityError> {
        room.join(self.handle.clone())?;
        let previous = {
            let mut current = self.current_room.lock().unwrap();
            std::mem::replace(&mut *current, room)
        };
        previous.leave(&self.handle);
        Ok(())
    }

    pub fn current_room_id(&self) -> u64 {
        self.current_room.lock().unwrap().id()
    }

    pub fn broadcast_to_current_room(&self, response: &Response) {
        let room = self.current_room.lock().unwrap().clone();
        room.broadcast_except(&self.handle, response);
    }

    /// Drain the request queue and dispatch every request in FIFO order.
    /// At most one dispatcher runs per session; if more requests arrive
    /// while this call is draining, it loops rather than leaving them
    /// stranded until the next read wakes the caller again.
    pub fn acquire_requests(&self, rooms: &RoomService) {
        loop {
            if self
                .dispatching
                .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_err()
            {
                // another drain is already in flight; it will observe
                // whatever we just enqueued.
                return;
            }

            loop {
                let drained = self.queue.swap();
                if drained.is_empty() {
                    break;
                }
                for request in drained {
                    let response = executors::execute(self, rooms, request);
                    self.handle.send(encode_response(&response).into_bytes());
                }
            }

            self.dispatching.store(false, Ordering::Release);

            if self.queue.is_empty() {
                return;
            }
            // something slipped in between the last drain and releasing
            // the guard; re-acquire and keep going.
        }
    }
}
