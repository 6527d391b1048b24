//! One executor function per [`QueryKind`], each turning a `Request` plus
//! the session/room-service context into a `Response`.

use std::sync::Arc;

use chat_protocol::{QueryKind, Request, Response};

use crate::errors::DispatchError;
use crate::room_service::RoomService;
use crate::session::Session;

fn ok(kind: QueryKind, timestamp: i64, body: Option<serde_json::Value>) -> Response {
    Response {
        kind,
        timestamp,
        status: 200,
        error: None,
        body,
    }
}

pub fn error_response(kind: QueryKind, timestamp: i64, err: &DispatchError) -> Response {
    Response {
        kind,
        timestamp,
        status: err.status_code(),
        error: Some(err.to_string()),
        body: None,
    }
}

/// Dispatch one request, returning the response to send back to the
/// requesting session. Never performs blocking I/O.
pub fn execute(session: &Session, rooms: &RoomService, request: Request) -> Response {
    let result = match request.kind {
        QueryKind::Undefined => Err(DispatchError::BadBody("undefined query kind".to_owned())),
        QueryKind::Syn => syn(session, &request),
        QueryKind::Ack => ack(session, &request),
        QueryKind::JoinChatroom => join_chatroom(session, rooms, &request),
        QueryKind::LeaveChatroom => leave_chatroom(session, rooms, &request),
        QueryKind::CreateChatroom => create_chatroom(session, rooms, &request),
        QueryKind::ListChatroom => list_chatroom(session, rooms, &request),
        QueryKind::ChatMessage => chat_message(session, &request),
    };
    match result {
        Ok(response) => response,
        Err(err) => error_response(request.kind, request.timestamp, &err),
    }
}

/// `SYN` carries `{"key": "<opaque>"}`; the reply echoes it back as
/// `{"accept": "<same-key>"}`. The echo is not validated against anything
/// (spec.md §9, open question) — it exists for wire compatibility, not as
/// a credential check. TLS handshake completion is what actually
/// authorizes `WaitSyn -> Acknowledged` (see `acceptor::handle_connection`);
/// this executor just keeps the application-level handshake symmetric
/// with `ACK` on the wire.
fn syn(session: &Session, request: &Request) -> Result<Response, DispatchError> {
    if session.is_closed() {
        return Err(DispatchError::WrongState("session is closed".to_owned()));
    }
    let key = request
        .body
        .as_ref()
        .and_then(|body| body.get("key"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| DispatchError::BadBody("missing body.key".to_owned()))?;
    Ok(Response {
        kind: QueryKind::Ack,
        timestamp: request.timestamp,
        status: 101,
        error: None,
        body: Some(serde_json::json!({ "accept": key })),
    })
}

fn ack(session: &Session, request: &Request) -> Result<Response, DispatchError> {
    if session.is_closed() {
        return Err(DispatchError::WrongState("session is closed".to_owned()));
    }
    Ok(ok(QueryKind::Ack, request.timestamp, None))
}

fn username_from_body(request: &Request) -> Result<String, DispatchError> {
    request
        .body
        .as_ref()
        .and_then(|body| body.get("user"))
        .and_then(|user| user.get("name"))
        .and_then(|name| name.as_str())
        .map(str::to_owned)
        .ok_or_else(|| DispatchError::BadBody("missing body.user.name".to_owned()))
}

fn require_acknowledged(session: &Session) -> Result<(), DispatchError> {
    if session.state() != crate::session::SessionState::Acknowledged {
        return Err(DispatchError::WrongState(
            "session is not acknowledged".to_owned(),
        ));
    }
    Ok(())
}

fn require_in_hall(session: &Session) -> Result<(), DispatchError> {
    if session.current_room_id() != crate::chatroom::HALL_ID {
        return Err(DispatchError::MissingPrecondition(
            "session is already in a chatroom".to_owned(),
        ));
    }
    Ok(())
}

fn require_in_room(session: &Session) -> Result<(), DispatchError> {
    if session.current_room_id() == crate::chatroom::HALL_ID {
        return Err(DispatchError::MissingPrecondition(
            "session is not in a chatroom".to_owned(),
        ));
    }
    Ok(())
}

fn join_chatroom(
    session: &Session,
    rooms: &RoomService,
    request: &Request,
) -> Result<Response, DispatchError> {
    require_acknowledged(session)?;
    require_in_hall(session)?;

    let username = username_from_body(request)?;
    let room_id = request
        .body
        .as_ref()
        .and_then(|body| body.get("chatroom"))
        .and_then(|chatroom| chatroom.get("id"))
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| DispatchError::BadBody("missing body.chatroom.id".to_owned()))?;

    let room = rooms
        .room(room_id)
        .map_err(|_| DispatchError::MissingPrecondition(format!("no such chatroom: {room_id}")))?;

    session
        .move_to_room(room)
        .map_err(|_| DispatchError::MissingPrecondition("chatroom is at capacity".to_owned()))?;
    session.set_username(username);

    Ok(ok(QueryKind::JoinChatroom, request.timestamp, None))
}

fn leave_chatroom(
    session: &Session,
    rooms: &RoomService,
    request: &Request,
) -> Result<Response, DispatchError> {
    require_acknowledged(session)?;
    require_in_room(session)?;

    let vacated_room_id = session.current_room_id();
    let hall = rooms.hall();
    session
        .move_to_room(hall)
        .map_err(|_| DispatchError::Internal("hall rejected join".to_owned()))?;
    rooms.remove_if_empty(vacated_room_id);
    Ok(ok(QueryKind::LeaveChatroom, request.timestamp, None))
}

/// Creates the room and immediately joins the creator to it, per spec.md
/// §4.8's `CREATE_CHATROOM` effect ("Create room, join, set username").
fn create_chatroom(
    session: &Session,
    rooms: &RoomService,
    request: &Request,
) -> Result<Response, DispatchError> {
    require_acknowledged(session)?;
    require_in_hall(session)?;

    let username = username_from_body(request)?;
    let name = request
        .body
        .as_ref()
        .and_then(|body| body.get("chatroom"))
        .and_then(|chatroom| chatroom.get("name"))
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .ok_or_else(|| DispatchError::BadBody("missing body.chatroom.name".to_owned()))?;

    let room = rooms.create_room(name);
    session
        .move_to_room(Arc::clone(&room))
        .map_err(|_| DispatchError::Internal("freshly created room is already full".to_owned()))?;
    session.set_username(username);

    Ok(ok(
        QueryKind::CreateChatroom,
        request.timestamp,
        Some(serde_json::json!({ "chatroom": { "id": room.id() } })),
    ))
}

fn list_chatroom(session: &Session, rooms: &RoomService, request: &Request) -> Result<Response, DispatchError> {
    require_acknowledged(session)?;
    Ok(ok(
        QueryKind::ListChatroom,
        request.timestamp,
        Some(serde_json::json!({ "chatrooms": rooms.chatroom_list() })),
    ))
}

fn chat_message(session: &Session, request: &Request) -> Result<Response, DispatchError> {
    require_acknowledged(session)?;
    require_in_room(session)?;

    let message = request
        .body
        .as_ref()
        .and_then(|body| body.get("message"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| DispatchError::BadBody("missing body.message".to_owned()))?;

    let broadcast = Response {
        kind: QueryKind::ChatMessage,
        timestamp: request.timestamp,
        status: 200,
        error: None,
        body: Some(serde_json::json!({ "message": message })),
    };
    session.broadcast_to_current_room(&broadcast);

    // the sender gets a bare ack, not a copy of their own message
    Ok(ok(QueryKind::ChatMessage, request.timestamp, None))
}
