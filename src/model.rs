//! Shared data model for a collaborative room.
//!
//! Everything here crosses the wire as JSON, so the serde field names
//! follow the protocol's camelCase convention. All types are plain data:
//! mutation rules live in [`crate::store`] and [`crate::presence`].
//!
//! Immutability contract:
//! - A [`Participant`]'s identity is fixed for the session; only
//!   `online` / `last_seen` change, and only via the presence tracker.
//! - A [`ChatMessage`] is append-only — never edited or deleted.
//! - A [`DrawingStroke`] is mutable only while it is the local
//!   [`ActiveStroke`]; once finished it is frozen into the stroke log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A room member as seen by every client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Opaque identity, assigned once per session.
    pub id: String,
    pub display_name: String,
    pub online: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl Participant {
    /// Create an online participant with a fresh session id.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            display_name: display_name.into(),
            online: true,
            last_seen: None,
        }
    }

    /// Create with an explicit id (snapshot deserialization, tests).
    pub fn with_id(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            online: true,
            last_seen: None,
        }
    }
}

/// A room: one chat stream, one drawing surface, one roster.
///
/// Immutable once joined; a participant belongs to exactly one room
/// at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
}

impl Room {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Chat message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    File,
    System,
}

/// Descriptor produced by the out-of-band file upload collaborator.
///
/// The engine never performs the upload itself — it only wraps the
/// resulting descriptor into a `file` chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub url: String,
    pub size_bytes: u64,
    pub mime_type: String,
}

/// A single chat message. Append-only once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    pub room_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_ref: Option<FileRef>,
}

impl ChatMessage {
    /// Create a plain text message.
    pub fn text(
        author_id: impl Into<String>,
        room_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author_id: author_id.into(),
            content: content.into(),
            kind: MessageKind::Text,
            created_at: Utc::now(),
            room_id: room_id.into(),
            file_ref: None,
        }
    }

    /// Create a file message from an upload descriptor.
    ///
    /// `content` carries the display name of the file.
    pub fn file(
        author_id: impl Into<String>,
        room_id: impl Into<String>,
        content: impl Into<String>,
        file_ref: FileRef,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author_id: author_id.into(),
            content: content.into(),
            kind: MessageKind::File,
            created_at: Utc::now(),
            room_id: room_id.into(),
            file_ref: Some(file_ref),
        }
    }

    /// Create a system notice (join/leave banners and the like).
    pub fn system(room_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author_id: String::new(),
            content: content.into(),
            kind: MessageKind::System,
            created_at: Utc::now(),
            room_id: room_id.into(),
            file_ref: None,
        }
    }
}

/// One sampled point of a stroke, in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokePoint {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f32>,
}

impl StrokePoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            pressure: None,
        }
    }
}

/// A finished drawing stroke in the replay log.
///
/// `seq` is the server-assigned monotonic sequence number used by the
/// stale-after-clear rule; strokes that never crossed the server
/// default to 0 and are ordered by arrival.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawingStroke {
    pub id: String,
    pub points: Vec<StrokePoint>,
    /// `#rrggbb` hex color.
    pub color: String,
    pub width_px: f32,
    pub author_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub seq: u64,
}

/// The one mutable stroke: the stroke currently being produced locally.
///
/// Points append in place between pointer-down and pointer-up; `finish`
/// freezes it into an immutable [`DrawingStroke`]. A stroke with zero
/// points is never persisted — `finish` returns `None` for it.
#[derive(Debug, Clone)]
pub struct ActiveStroke {
    author_id: String,
    color: String,
    width_px: f32,
    points: Vec<StrokePoint>,
}

impl ActiveStroke {
    /// Begin a stroke with the local participant's current tool settings.
    pub fn begin(author_id: impl Into<String>, color: impl Into<String>, width_px: f32) -> Self {
        Self {
            author_id: author_id.into(),
            color: color.into(),
            width_px,
            points: Vec::new(),
        }
    }

    /// Append a sampled point.
    pub fn push(&mut self, point: StrokePoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Finalize into an immutable stroke, or `None` if no points were
    /// ever sampled (empty strokes are never persisted).
    pub fn finish(self) -> Option<DrawingStroke> {
        if self.points.is_empty() {
            return None;
        }
        Some(DrawingStroke {
            id: Uuid::new_v4().to_string(),
            points: self.points,
            color: self.color,
            width_px: self.width_px,
            author_id: self.author_id,
            created_at: Utc::now(),
            seq: 0,
        })
    }
}
