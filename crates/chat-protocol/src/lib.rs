//! Wire types and framing for the chat protocol.
//!
//! A frame is a UTF-8 JSON object followed by the literal delimiter
//! [`DELIMITER`]. Three tags exist: `request`, `response` and `chat`. The
//! `body` field on `Request`/`Response` is spliced into the serialized
//! object rather than carried as a plain derive'd field, matching the
//! handshake format this protocol was distilled from.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Literal frame delimiter. Never appears inside a valid frame's JSON body.
pub const DELIMITER: &str = "\r\n\r\n";

const PROTOCOL: &str = "chat/1.0";

const TAG_REQUEST: &str = "request";
const TAG_RESPONSE: &str = "response";
const TAG_CHAT: &str = "chat";

/// The six request/response query kinds, plus `Undefined` for the default
/// / error case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Undefined,
    Syn,
    Ack,
    LeaveChatroom,
    JoinChatroom,
    CreateChatroom,
    ListChatroom,
    ChatMessage,
}

impl QueryKind {
    pub fn to_wire_name(self) -> &'static str {
        match self {
            QueryKind::Undefined => "undefined",
            QueryKind::Syn => "syn",
            QueryKind::Ack => "ack",
            QueryKind::LeaveChatroom => "leave-chatroom",
            QueryKind::JoinChatroom => "join-chatroom",
            QueryKind::CreateChatroom => "create-chatroom",
            QueryKind::ListChatroom => "list-chatroom",
            QueryKind::ChatMessage => "chat-message",
        }
    }

    pub fn from_wire_name(name: &str) -> Result<Self, ParseError> {
        Ok(match name {
            "undefined" => QueryKind::Undefined,
            "syn" => QueryKind::Syn,
            "ack" => QueryKind::Ack,
            "leave-chatroom" => QueryKind::LeaveChatroom,
            "join-chatroom" => QueryKind::JoinChatroom,
            "create-chatroom" => QueryKind::CreateChatroom,
            "list-chatroom" => QueryKind::ListChatroom,
            "chat-message" => QueryKind::ChatMessage,
            other => return Err(ParseError::UnknownQueryKind(other.to_owned())),
        })
    }
}

/// A client→server or server→client query.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub kind: QueryKind,
    pub timestamp: i64,
    pub timeout_ms: u64,
    pub body: Option<Value>,
}

/// A reply to a [`Request`].
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub kind: QueryKind,
    pub timestamp: i64,
    pub status: i32,
    pub error: Option<String>,
    pub body: Option<Value>,
}

/// A bare chat line, independent of the request/response exchange. Kept for
/// wire compatibility; the reference client sends `CHAT_MESSAGE` requests
/// instead of emitting this frame directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub timestamp: i64,
    pub timeout_ms: u64,
    pub message: String,
}

/// Any one of the three frame kinds, as recovered by [`parse_frame`].
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Request(Request),
    Response(Response),
    Chat(Chat),
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown frame tag: {0}")]
    UnknownTag(String),
    #[error("unknown query kind: {0}")]
    UnknownQueryKind(String),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
}

fn require_str<'a>(obj: &'a Map<String, Value>, field: &'static str) -> Result<&'a str, ParseError> {
    obj.get(field)
        .and_then(Value::as_str)
        .ok_or(ParseError::MissingField(field))
}

fn require_i64(obj: &Map<String, Value>, field: &'static str) -> Result<i64, ParseError> {
    obj.get(field)
        .and_then(Value::as_i64)
        .ok_or(ParseError::MissingField(field))
}

fn require_u64(obj: &Map<String, Value>, field: &'static str) -> Result<u64, ParseError> {
    obj.get(field)
        .and_then(Value::as_u64)
        .ok_or(ParseError::MissingField(field))
}

/// Serialize a [`Request`], splicing `body` into the frame textually when
/// present, and append the frame delimiter.
pub fn encode_request(req: &Request) -> String {
    let mut obj = Map::new();
    obj.insert("protocol".to_owned(), Value::String(PROTOCOL.to_owned()));
    obj.insert("tag".to_owned(), Value::String(TAG_REQUEST.to_owned()));
    obj.insert(
        "type".to_owned(),
        Value::String(req.kind.to_wire_name().to_owned()),
    );
    obj.insert("timestamp".to_owned(), Value::from(req.timestamp));
    obj.insert("timeout".to_owned(), Value::from(req.timeout_ms));
    if let Some(body) = &req.body {
        obj.insert("body".to_owned(), body.clone());
    }
    let mut json = Value::Object(obj).to_string();
    json.push_str(DELIMITER);
    json
}

/// Serialize a [`Response`], splicing `body` into the frame textually when
/// present, and append the frame delimiter.
pub fn encode_response(resp: &Response) -> String {
    let mut obj = Map::new();
    obj.insert("protocol".to_owned(), Value::String(PROTOCOL.to_owned()));
    obj.insert("tag".to_owned(), Value::String(TAG_RESPONSE.to_owned()));
    obj.insert(
        "type".to_owned(),
        Value::String(resp.kind.to_wire_name().to_owned()),
    );
    obj.insert("timestamp".to_owned(), Value::from(resp.timestamp));
    obj.insert("status".to_owned(), Value::from(resp.status));
    if let Some(err) = &resp.error {
        obj.insert("error".to_owned(), Value::String(err.clone()));
    }
    if let Some(body) = &resp.body {
        obj.insert("body".to_owned(), body.clone());
    }
    let mut json = Value::Object(obj).to_string();
    json.push_str(DELIMITER);
    json
}

/// Serialize a [`Chat`] frame and append the frame delimiter.
pub fn encode_chat(chat: &Chat) -> String {
    let mut obj = Map::new();
    obj.insert("protocol".to_owned(), Value::String(PROTOCOL.to_owned()));
    obj.insert("tag".to_owned(), Value::String(TAG_CHAT.to_owned()));
    obj.insert("timestamp".to_owned(), Value::from(chat.timestamp));
    obj.insert("timeout".to_owned(), Value::from(chat.timeout_ms));
    obj.insert("message".to_owned(), Value::String(chat.message.clone()));
    let mut json = Value::Object(obj).to_string();
    json.push_str(DELIMITER);
    json
}

/// Parse one frame's JSON body (the caller has already stripped the
/// trailing [`DELIMITER`]), dispatching on the `tag` field.
pub fn parse_frame(json: &str) -> Result<Frame, ParseError> {
    let value: Value = serde_json::from_str(json)?;
    let obj = value
        .as_object()
        .ok_or_else(|| ParseError::UnknownTag("<non-object frame>".to_owned()))?;
    let tag = require_str(obj, "tag")?;
    match tag {
        TAG_REQUEST => {
            let kind = QueryKind::from_wire_name(require_str(obj, "type")?)?;
            Ok(Frame::Request(Request {
                kind,
                timestamp: require_i64(obj, "timestamp")?,
                timeout_ms: require_u64(obj, "timeout")?,
                body: obj.get("body").cloned(),
            }))
        }
        TAG_RESPONSE => {
            let kind = QueryKind::from_wire_name(require_str(obj, "type")?)?;
            Ok(Frame::Response(Response {
                kind,
                timestamp: require_i64(obj, "timestamp")?,
                status: obj
                    .get("status")
                    .and_then(Value::as_i64)
                    .ok_or(ParseError::MissingField("status"))? as i32,
                error: obj.get("error").and_then(Value::as_str).map(str::to_owned),
                body: obj.get("body").cloned(),
            }))
        }
        TAG_CHAT => Ok(Frame::Chat(Chat {
            timestamp: require_i64(obj, "timestamp")?,
            timeout_ms: require_u64(obj, "timeout")?,
            message: require_str(obj, "message")?.to_owned(),
        })),
        other => Err(ParseError::UnknownTag(other.to_owned())),
    }
}

/// Split a byte stream accumulator on [`DELIMITER`], returning complete
/// frames (delimiter stripped) and leaving any trailing partial frame in
/// `buf` for the next read.
pub fn drain_frames(buf: &mut Vec<u8>) -> VecDeque<String> {
    let mut frames = VecDeque::new();
    loop {
        let Some(pos) = find_delimiter(buf) else {
            break;
        };
        let rest = buf.split_off(pos + DELIMITER.len());
        let mut frame_bytes = std::mem::replace(buf, rest);
        frame_bytes.truncate(pos);
        if let Ok(text) = String::from_utf8(frame_bytes) {
            frames.push_back(text);
        }
    }
    frames
}

fn find_delimiter(buf: &[u8]) -> Option<usize> {
    let needle = DELIMITER.as_bytes();
    buf.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_request() -> Request {
        Request {
            kind: QueryKind::JoinChatroom,
            timestamp: 1_700_000_000,
            timeout_ms: 128,
            body: Some(serde_json::json!({ "name": "general" })),
        }
    }

    fn sample_response() -> Response {
        Response {
            kind: QueryKind::ChatMessage,
            timestamp: 1_700_000_001,
            status: 200,
            error: None,
            body: Some(serde_json::json!({ "message": "hi" })),
        }
    }

    #[test]
    fn query_kind_round_trips_through_wire_names() {
        let all = [
            QueryKind::Undefined,
            QueryKind::Syn,
            QueryKind::Ack,
            QueryKind::LeaveChatroom,
            QueryKind::JoinChatroom,
            QueryKind::CreateChatroom,
            QueryKind::ListChatroom,
            QueryKind::ChatMessage,
        ];
        for kind in all {
            let wire = kind.to_wire_name();
            assert_eq!(QueryKind::from_wire_name(wire).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_query_kind_is_rejected() {
        assert!(matches!(
            QueryKind::from_wire_name("not-a-real-kind"),
            Err(ParseError::UnknownQueryKind(_))
        ));
    }

    #[test]
    fn request_round_trips_with_body() {
        let req = sample_request();
        let encoded = encode_request(&req);
        assert!(encoded.ends_with(DELIMITER));
        let json = &encoded[..encoded.len() - DELIMITER.len()];
        match parse_frame(json).unwrap() {
            Frame::Request(parsed) => assert_eq!(parsed, req),
            other => panic!("expected Request, got {other:?}"),
        }
    }

    #[test]
    fn response_round_trips_with_error_and_no_body() {
        let resp = Response {
            kind: QueryKind::JoinChatroom,
            timestamp: 42,
            status: 400,
            error: Some("room does not exist".to_owned()),
            body: None,
        };
        let encoded = encode_response(&resp);
        let json = &encoded[..encoded.len() - DELIMITER.len()];
        match parse_frame(json).unwrap() {
            Frame::Response(parsed) => assert_eq!(parsed, resp),
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn chat_round_trips() {
        let chat = Chat {
            timestamp: 7,
            timeout_ms: 0,
            message: "hello room".to_owned(),
        };
        let encoded = encode_chat(&chat);
        let json = &encoded[..encoded.len() - DELIMITER.len()];
        match parse_frame(json).unwrap() {
            Frame::Chat(parsed) => assert_eq!(parsed, chat),
            other => panic!("expected Chat, got {other:?}"),
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let err = parse_frame(r#"{"tag":"bogus"}"#).unwrap_err();
        assert!(matches!(err, ParseError::UnknownTag(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = parse_frame("{not json").unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn drain_frames_splits_multiple_frames_and_keeps_partial_tail() {
        let resp = sample_response();
        let mut buf = encode_response(&resp).into_bytes();
        buf.extend(encode_request(&sample_request()).into_bytes());
        buf.extend_from_slice(b"{\"tag\":\"chat\""); // partial trailing frame

        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 2);
        assert!(matches!(parse_frame(&frames[0]).unwrap(), Frame::Response(_)));
        assert!(matches!(parse_frame(&frames[1]).unwrap(), Frame::Request(_)));
        assert_eq!(buf, b"{\"tag\":\"chat\"".to_vec());
    }
}
