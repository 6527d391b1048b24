//! The hall plus the registry of named chatrooms.
//!
//! Lock discipline: the registry lock is held only long enough to
//! look up/insert/remove an entry and clone the `Arc<Chatroom>` out. It is
//! never held at the same time as a `Chatroom`'s own lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::chatroom::{Chatroom, HALL_ID};

#[derive(Debug)]
pub struct RoomNotFound;

pub struct RoomService {
    hall: Arc<Chatroom>,
    rooms: Mutex<HashMap<u64, Arc<Chatroom>>>,
    next_id: AtomicU64,
    next_user_id: AtomicU64,
}

impl RoomService {
    pub fn new() -> Self {
        RoomService {
            hall: Arc::new(Chatroom::new(HALL_ID, "hall".to_owned())),
            rooms: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(HALL_ID + 1),
            next_user_id: AtomicU64::new(1),
        }
    }

    pub fn hall(&self) -> Arc<Chatroom> {
        Arc::clone(&self.hall)
    }

    /// Look up a room by id. `HALL_ID` always resolves to the hall.
    pub fn room(&self, id: u64) -> Result<Arc<Chatroom>, RoomNotFound> {
        if id == HALL_ID {
            return Ok(self.hall());
        }
        self.rooms
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RoomNotFound)
    }

    /// Create a new, empty room and register it. The creator is not
    /// auto-joined; joining is a separate request.
    pub fn create_room(&self, name: String) -> Arc<Chatroom> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let room = Arc::new(Chatroom::new(id, name));
        self.rooms.lock().unwrap().insert(id, Arc::clone(&room));
        room
    }

    /// List all non-hall rooms as `(id, name)` pairs.
    pub fn list_rooms(&self) -> Vec<(u64, String)> {
        self.rooms
            .lock()
            .unwrap()
            .values()
            .map(|room| (room.id(), room.name()))
            .collect()
    }

    /// Snapshot of every user room as `{"id":…, "name":"…", "users":…}`,
    /// the exact LIST_CHATROOM wire shape.
    pub fn chatroom_list(&self) -> Vec<serde_json::Value> {
        // Clone the Arcs out and drop the registry lock before touching any
        // individual room's own lock via `as_json` — the registry lock must
        // never be held across a room-lock acquisition.
        let rooms: Vec<Arc<Chatroom>> = self.rooms.lock().unwrap().values().cloned().collect();
        rooms.iter().map(|room| room.as_json()).collect()
    }

    /// Assign the next process-unique user id. Owned by `RoomService`
    /// rather than a bare process-wide static, per the "no mutable
    /// statics" design note.
    pub fn next_user_id(&self) -> u64 {
        self.next_user_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Remove `id` from the registry if it is empty. The hall is never
    /// removable. Called after a leave to satisfy the invariant that an
    /// empty non-hall room is destroyed before `leave_chatroom` returns.
    pub fn remove_if_empty(&self, id: u64) {
        if id == HALL_ID {
            return;
        }
        // Extract the Arc and release the registry lock before calling
        // `member_count`, which takes the room's own lock.
        let room = self.rooms.lock().unwrap().get(&id).cloned();
        let Some(room) = room else {
            return;
        };
        if room.member_count() == 0 {
            self.rooms.lock().unwrap().remove(&id);
        }
    }

    /// Close the hall and every registered room, clearing the registry.
    /// Called on server shutdown (spec.md §4.9: "Shutdown closes the
    /// acceptor and invokes `RoomService.close()`").
    pub fn close(&self) {
        self.hall.close();
        let rooms = std::mem::take(&mut *self.rooms.lock().unwrap());
        for room in rooms.values() {
            room.close();
        }
    }
}

impl Default for RoomService {
    fn default() -> Self {
        Self::new()
    }
}
