//! A named room and its member list.

use std::sync::Mutex;

use chat_protocol::{encode_response, Response};

use crate::connection::ConnectionHandle;

/// Maximum number of members a single chatroom may hold.
pub const MAX_MEMBERS: usize = 256;

/// Room id reserved for the hall (the implicit room every session starts
/// in and returns to after leaving an explicit room). Never removable.
pub const HALL_ID: u64 = 0;

#[derive(Debug)]
pub struct CapacityError;

pub struct Chatroom {
    id: u64,
    name: Mutex<String>,
    members: Mutex<Vec<ConnectionHandle>>,
}

impl Chatroom {
    pub fn new(id: u64, name: String) -> Self {
        Chatroom {
            id,
            name: Mutex::new(name),
            members: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> String {
        self.name.lock().unwrap().clone()
    }

    /// Replace this room's name in place.
    pub fn rename(&self, name: String) {
        *self.name.lock().unwrap() = name;
    }

    pub fn member_count(&self) -> usize {
        self.members.lock().unwrap().len()
    }

    /// Whether `member` currently belongs to this room.
    pub fn contains(&self, member: &ConnectionHandle) -> bool {
        self.members
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.same_connection(member))
    }

    /// `{"id":…, "name":"…", "users":…}`, per the wire's LIST_CHATROOM entry
    /// shape.
    pub fn as_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "name": self.name(),
            "users": self.member_count(),
        })
    }

    /// Add `member` to the room. Rejects once [`MAX_MEMBERS`] is reached.
    pub fn join(&self, member: ConnectionHandle) -> Result<(), CapacityError> {
        let mut members = self.members.lock().unwrap();
        if members.len() >= MAX_MEMBERS {
            return Err(CapacityError);
        }
        members.push(member);
        Ok(())
    }

    /// Remove `member` from the room. A no-op if the member isn't present.
    pub fn leave(&self, member: &ConnectionHandle) {
        let mut members = self.members.lock().unwrap();
        members.retain(|m| !m.same_connection(member));
    }

    /// Send `response` to every member except `exclude`, lazily dropping
    /// any member whose connection has already closed.
    pub fn broadcast_except(&self, exclude: &ConnectionHandle, response: &Response) {
        let encoded = encode_response(response);
        let mut members = self.members.lock().unwrap();
        members.retain(|member| {
            if member.is_closed() {
                return false;
            }
            if member.same_connection(exclude) {
                return true;
            }
            member.send(encoded.clone().into_bytes())
        });
    }

    /// Close every member's connection and empty the room. Idempotent:
    /// closing an already-empty room is a no-op.
    pub fn close(&self) {
        let members = std::mem::take(&mut *self.members.lock().unwrap());
        for member in &members {
            member.close();
        }
    }
}
