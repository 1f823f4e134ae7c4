use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorCode, ErrorShape};

/// `message_type` on direct/group messages. Free-form in the wire format but
/// defaults to `"text"` when the client omits it (§6.1).
pub type MessageKind = String;

/// Frames a client may send (§6.1). Tagged on `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    #[serde(rename = "message.send")]
    MessageSend {
        #[serde(default)]
        recipient_id: Option<Uuid>,
        content: String,
        #[serde(default)]
        message_type: Option<MessageKind>,
    },
    #[serde(rename = "message.group.send")]
    MessageGroupSend {
        #[serde(default)]
        group_id: Option<Uuid>,
        content: String,
        #[serde(default)]
        message_type: Option<MessageKind>,
    },
    #[serde(rename = "message.read")]
    MessageRead {
        #[serde(default)]
        message_id: Option<Uuid>,
    },
    #[serde(rename = "typing")]
    Typing {
        #[serde(default)]
        recipient_id: Option<Uuid>,
        #[serde(default)]
        group_id: Option<Uuid>,
        #[serde(default = "default_is_typing")]
        is_typing: bool,
    },
    #[serde(rename = "ping")]
    Ping,
}

fn default_is_typing() -> bool {
    true
}

/// One pointer resolved off an offline queue, embedded in `messages.offline`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineMessage {
    pub message_id: Uuid,
    pub kind: OfflineMessageKind,
    pub sender_id: Uuid,
    pub group_id: Option<Uuid>,
    pub content: String,
    pub message_type: MessageKind,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfflineMessageKind {
    Direct,
    Group,
}

/// Frames the server may send (§6.1). Tagged on `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    #[serde(rename = "message.new")]
    MessageNew {
        message_id: Uuid,
        sender_id: Uuid,
        sender_username: String,
        content: String,
        message_type: MessageKind,
        created_at: String,
    },
    #[serde(rename = "message.group.new")]
    MessageGroupNew {
        message_id: Uuid,
        group_id: Uuid,
        sender_id: Uuid,
        content: String,
        message_type: MessageKind,
        created_at: String,
    },
    #[serde(rename = "messages.offline")]
    MessagesOffline {
        messages: Vec<OfflineMessage>,
        count: usize,
    },
    #[serde(rename = "message.ack")]
    MessageAck {
        message_id: Uuid,
        delivered: bool,
        queued: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delivered_count: Option<usize>,
        timestamp: String,
    },
    #[serde(rename = "message.read.receipt")]
    MessageReadReceipt {
        message_id: Uuid,
        reader_id: Uuid,
        read_at: String,
    },
    #[serde(rename = "typing")]
    Typing {
        user_id: Uuid,
        is_typing: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recipient_id: Option<Uuid>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_id: Option<Uuid>,
    },
    #[serde(rename = "pong")]
    Pong,
    #[serde(rename = "error")]
    Error { code: ErrorCode, message: String },
}

/// Decode one inbound frame (§4.2, §6.1, §7). Distinguishes a malformed
/// payload (`INVALID_JSON`) from a well-formed frame of an unrecognized
/// `type` (`UNKNOWN_TYPE`) by reading the discriminator before committing
/// to a variant, since `#[serde(tag = "type")]` alone conflates the two.
pub fn decode(raw: &str) -> Result<ClientFrame, ErrorShape> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ErrorShape::new(ErrorCode::InvalidJson, e.to_string()))?;
    let Some(type_str) = value.get("type").and_then(|v| v.as_str()) else {
        return Err(ErrorShape::new(ErrorCode::InvalidJson, "missing \"type\" field"));
    };
    match type_str {
        "message.send" | "message.group.send" | "message.read" | "typing" | "ping" => {
            serde_json::from_value(value)
                .map_err(|e| ErrorShape::new(ErrorCode::InvalidJson, e.to_string()))
        },
        other => Err(ErrorShape::new(
            ErrorCode::UnknownType,
            format!("unknown frame type: {other}"),
        )),
    }
}

impl ServerFrame {
    /// Serialize to the JSON text sent over the socket.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"type":"error","code":"INTERNAL_ERROR","message":"encode failure"}"#.to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frame_tag_matches_wire_vocabulary() {
        let raw = r#"{"type":"message.send","recipient_id":"00000000-0000-0000-0000-000000000001","content":"hi"}"#;
        let frame: ClientFrame = serde_json::from_str(raw).unwrap();
        match frame {
            ClientFrame::MessageSend {
                content,
                message_type,
                ..
            } => {
                assert_eq!(content, "hi");
                assert!(message_type.is_none());
            },
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn typing_defaults_is_typing_true() {
        let raw = r#"{"type":"typing","recipient_id":"00000000-0000-0000-0000-000000000001"}"#;
        let frame: ClientFrame = serde_json::from_str(raw).unwrap();
        match frame {
            ClientFrame::Typing { is_typing, .. } => assert!(is_typing),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn decode_rejects_malformed_json() {
        let err = decode("not json").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidJson);
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let err = decode(r#"{"type":"message.delete"}"#).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownType);
    }

    #[test]
    fn decode_accepts_ping() {
        let frame = decode(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Ping));
    }

    #[test]
    fn server_frame_ack_round_trips() {
        let frame = ServerFrame::MessageAck {
            message_id: Uuid::nil(),
            delivered: true,
            queued: false,
            delivered_count: Some(1),
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
        };
        let json = frame.to_json();
        assert!(json.contains("\"type\":\"message.ack\""));
        assert!(json.contains("\"delivered_count\":1"));
    }
}
