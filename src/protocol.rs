//! JSON wire protocol for room synchronization.
//!
//! Every frame is one [`Envelope`]:
//!
//! ```text
//! { "type": "join" | "leave" | "chat_message" | "drawing_action"
//!         | "presence_update" | "room_snapshot",
//!   "roomId": "...", "participantId": "...", "payload": { ... } }
//! ```
//!
//! The envelope always carries `roomId` and `participantId` explicitly —
//! the codec never infers them from connection context, so one decoder
//! works regardless of how the transport is multiplexed.
//!
//! Decoding is strict: an unrecognized `type` tag is a
//! [`ProtocolError::UnknownType`] that callers log and discard. It never
//! tears down the connection and never touches room state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{ChatMessage, DrawingStroke, Participant, Room};

/// The closed set of envelope kinds this protocol understands.
pub const EVENT_KINDS: [&str; 6] = [
    "join",
    "leave",
    "chat_message",
    "drawing_action",
    "presence_update",
    "room_snapshot",
];

/// Join handshake payload. Sent by a client on every (re)connect; the
/// room authority answers with a `room_snapshot`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub display_name: String,
}

/// Leave payload, stamped with the moment the participant left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeavePayload {
    pub left_at: DateTime<Utc>,
}

/// Presence roster entry update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresencePayload {
    pub participant: Participant,
}

/// Full authoritative copy of room state, sent on join/reconnect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room: Room,
    pub messages: Vec<ChatMessage>,
    pub strokes: Vec<DrawingStroke>,
    pub participants: Vec<Participant>,
    /// Sequence number of the last applied canvas clear.
    #[serde(default)]
    pub clear_seq: u64,
}

/// Drawing sub-actions, externally tagged so the wire shape stays stable
/// as drawing features grow: `{"draw": {...}}`, `{"clear": {...}}`,
/// `{"tool_change": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawingAction {
    /// A finished stroke to append to the replay log.
    Draw(DrawingStroke),
    /// Truncate the stroke log. Strokes with `seq <= seq` are stale.
    Clear { seq: u64 },
    /// Informational only — tool selection is local UI state, not
    /// shared state.
    ToolChange { tool: String },
}

/// Kind-specific payload, adjacently tagged to produce the
/// `{"type": ..., "payload": ...}` envelope shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventPayload {
    Join(JoinPayload),
    Leave(LeavePayload),
    ChatMessage(ChatMessage),
    DrawingAction(DrawingAction),
    PresenceUpdate(PresencePayload),
    RoomSnapshot(RoomSnapshot),
}

/// One wire frame: event payload plus explicit room/participant routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub room_id: String,
    pub participant_id: String,
    #[serde(flatten)]
    pub event: EventPayload,
}

impl Envelope {
    /// Join handshake for the local participant.
    pub fn join(room_id: impl Into<String>, participant: &Participant) -> Self {
        Self {
            room_id: room_id.into(),
            participant_id: participant.id.clone(),
            event: EventPayload::Join(JoinPayload {
                display_name: participant.display_name.clone(),
            }),
        }
    }

    /// Clean leave notice.
    pub fn leave(room_id: impl Into<String>, participant_id: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            participant_id: participant_id.into(),
            event: EventPayload::Leave(LeavePayload { left_at: Utc::now() }),
        }
    }

    /// Wrap a chat message; routing fields are derived from the message.
    pub fn chat(message: ChatMessage) -> Self {
        Self {
            room_id: message.room_id.clone(),
            participant_id: message.author_id.clone(),
            event: EventPayload::ChatMessage(message),
        }
    }

    /// Wrap a finished stroke.
    pub fn draw(room_id: impl Into<String>, stroke: DrawingStroke) -> Self {
        Self {
            room_id: room_id.into(),
            participant_id: stroke.author_id.clone(),
            event: EventPayload::DrawingAction(DrawingAction::Draw(stroke)),
        }
    }

    /// Canvas clear at the given sequence number.
    pub fn clear(
        room_id: impl Into<String>,
        participant_id: impl Into<String>,
        seq: u64,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            participant_id: participant_id.into(),
            event: EventPayload::DrawingAction(DrawingAction::Clear { seq }),
        }
    }

    /// Presence roster update.
    pub fn presence(room_id: impl Into<String>, participant: Participant) -> Self {
        Self {
            room_id: room_id.into(),
            participant_id: participant.id.clone(),
            event: EventPayload::PresenceUpdate(PresencePayload { participant }),
        }
    }

    /// Authoritative snapshot (produced by the room authority).
    pub fn snapshot(
        participant_id: impl Into<String>,
        snapshot: RoomSnapshot,
    ) -> Self {
        Self {
            room_id: snapshot.room.id.clone(),
            participant_id: participant_id.into(),
            event: EventPayload::RoomSnapshot(snapshot),
        }
    }

    /// Serialize to a JSON text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Deserialize from a JSON text frame, strictly.
    ///
    /// The `type` tag is checked against the closed kind set before the
    /// payload is parsed, so an unknown kind is reported as
    /// [`ProtocolError::UnknownType`] rather than a generic shape error.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(ProtocolError::MissingType)?;
        if !EVENT_KINDS.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_string()));
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Check an outbound envelope before any socket I/O is attempted.
    ///
    /// Rejections here surface as `EncodingError` to the sender; nothing
    /// invalid ever reaches the transport.
    pub fn validate(&self) -> Result<(), String> {
        if self.room_id.is_empty() {
            return Err("empty room id".into());
        }
        if self.participant_id.is_empty() {
            return Err("empty participant id".into());
        }
        match &self.event {
            EventPayload::ChatMessage(msg) => {
                if msg.id.is_empty() {
                    return Err("chat message with empty id".into());
                }
                if msg.content.is_empty() {
                    return Err("chat message with empty content".into());
                }
            }
            EventPayload::DrawingAction(DrawingAction::Draw(stroke)) => {
                if stroke.points.is_empty() {
                    return Err("stroke with zero points".into());
                }
                if stroke.id.is_empty() {
                    return Err("stroke with empty id".into());
                }
            }
            EventPayload::Join(join) => {
                if join.display_name.is_empty() {
                    return Err("join with empty display name".into());
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// The envelope's kind tag, as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self.event {
            EventPayload::Join(_) => "join",
            EventPayload::Leave(_) => "leave",
            EventPayload::ChatMessage(_) => "chat_message",
            EventPayload::DrawingAction(_) => "drawing_action",
            EventPayload::PresenceUpdate(_) => "presence_update",
            EventPayload::RoomSnapshot(_) => "room_snapshot",
        }
    }
}

/// Protocol errors. Dropped events are logged by callers; none of these
/// is fatal to the connection.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown event type `{0}`")]
    UnknownType(String),
    #[error("envelope has no `type` tag")]
    MissingType,
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActiveStroke, StrokePoint};

    fn sample_stroke() -> DrawingStroke {
        let mut active = ActiveStroke::begin("alice", "#112233", 2.0);
        active.push(StrokePoint::new(0.0, 0.0));
        active.push(StrokePoint::new(10.0, 10.0));
        active.finish().unwrap()
    }

    #[test]
    fn test_envelope_wire_shape() {
        let msg = ChatMessage::text("alice", "room-1", "hi");
        let env = Envelope::chat(msg);
        let json: serde_json::Value = serde_json::from_str(&env.encode().unwrap()).unwrap();

        assert_eq!(json.get("type").unwrap(), "chat_message");
        assert_eq!(json.get("roomId").unwrap(), "room-1");
        assert_eq!(json.get("participantId").unwrap(), "alice");
        assert_eq!(json["payload"]["content"], "hi");
    }

    #[test]
    fn test_drawing_action_externally_tagged() {
        let env = Envelope::draw("room-1", sample_stroke());
        let json: serde_json::Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert!(json["payload"].get("draw").is_some());

        let env = Envelope::clear("room-1", "alice", 7);
        let json: serde_json::Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(json["payload"]["clear"]["seq"], 7);
    }

    #[test]
    fn test_chat_roundtrip() {
        let env = Envelope::chat(ChatMessage::text("alice", "room-1", "hello there"));
        let decoded = Envelope::decode(&env.encode().unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn test_join_roundtrip() {
        let alice = Participant::new("Alice");
        let env = Envelope::join("room-1", &alice);
        let decoded = Envelope::decode(&env.encode().unwrap()).unwrap();
        assert_eq!(decoded, env);
        assert_eq!(decoded.participant_id, alice.id);
        match decoded.event {
            EventPayload::Join(join) => assert_eq!(join.display_name, "Alice"),
            other => panic!("expected join, got {other:?}"),
        }
    }

    #[test]
    fn test_leave_roundtrip() {
        let env = Envelope::leave("room-1", "alice");
        let decoded = Envelope::decode(&env.encode().unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let snapshot = RoomSnapshot {
            room: Room::new("room-1", "Lounge"),
            messages: vec![ChatMessage::text("alice", "room-1", "hi")],
            strokes: vec![sample_stroke()],
            participants: vec![Participant::new("Alice"), Participant::new("Bob")],
            clear_seq: 3,
        };
        let env = Envelope::snapshot("alice", snapshot.clone());
        let decoded = Envelope::decode(&env.encode().unwrap()).unwrap();
        match decoded.event {
            EventPayload::RoomSnapshot(s) => assert_eq!(s, snapshot),
            other => panic!("expected snapshot, got {other:?}"),
        }
    }

    #[test]
    fn test_presence_roundtrip() {
        let mut bob = Participant::new("Bob");
        bob.online = false;
        bob.last_seen = Some(Utc::now());
        let env = Envelope::presence("room-1", bob.clone());
        let decoded = Envelope::decode(&env.encode().unwrap()).unwrap();
        match decoded.event {
            EventPayload::PresenceUpdate(p) => assert_eq!(p.participant, bob),
            other => panic!("expected presence, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = r#"{"type":"telepathy","roomId":"r","participantId":"p","payload":{}}"#;
        match Envelope::decode(raw) {
            Err(ProtocolError::UnknownType(kind)) => assert_eq!(kind, "telepathy"),
            other => panic!("expected UnknownType, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_type_rejected() {
        let raw = r#"{"roomId":"r","participantId":"p","payload":{}}"#;
        assert!(matches!(
            Envelope::decode(raw),
            Err(ProtocolError::MissingType)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            Envelope::decode("{not json"),
            Err(ProtocolError::Malformed(_))
        ));
        // Known type but payload of the wrong shape.
        let raw = r#"{"type":"chat_message","roomId":"r","participantId":"p","payload":{"bogus":1}}"#;
        assert!(matches!(
            Envelope::decode(raw),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_routing() {
        let mut env = Envelope::chat(ChatMessage::text("alice", "room-1", "hi"));
        env.room_id.clear();
        assert!(env.validate().is_err());

        let mut env = Envelope::chat(ChatMessage::text("alice", "room-1", "hi"));
        env.participant_id.clear();
        assert!(env.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_stroke() {
        let mut stroke = sample_stroke();
        stroke.points.clear();
        let env = Envelope {
            room_id: "room-1".into(),
            participant_id: "alice".into(),
            event: EventPayload::DrawingAction(DrawingAction::Draw(stroke)),
        };
        assert!(env.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_well_formed() {
        assert!(Envelope::chat(ChatMessage::text("a", "r", "hi"))
            .validate()
            .is_ok());
        assert!(Envelope::draw("r", sample_stroke()).validate().is_ok());
        assert!(Envelope::clear("r", "a", 1).validate().is_ok());
        assert!(Envelope::leave("r", "a").validate().is_ok());
    }

    #[test]
    fn test_kind_tags_match_wire() {
        let alice = Participant::new("Alice");
        let env = Envelope::join("r", &alice);
        assert_eq!(env.kind(), "join");
        let json: serde_json::Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(json.get("type").unwrap(), env.kind());
        assert!(EVENT_KINDS.contains(&env.kind()));
    }

    #[test]
    fn test_tool_change_is_decodable() {
        let raw = r#"{"type":"drawing_action","roomId":"r","participantId":"p",
                      "payload":{"tool_change":{"tool":"eraser"}}}"#;
        let env = Envelope::decode(raw).unwrap();
        match env.event {
            EventPayload::DrawingAction(DrawingAction::ToolChange { tool }) => {
                assert_eq!(tool, "eraser")
            }
            other => panic!("expected tool_change, got {other:?}"),
        }
    }
}
