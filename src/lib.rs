//! # whiteroom — Real-time room synchronization engine
//!
//! Client-side engine for collaborative rooms that mix chat, a shared
//! drawing canvas, and a live presence roster, all multiplexed over one
//! WebSocket per (participant, room).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     WebSocket       ┌───────────────┐
//! │ RoomClient   │ ◄─────────────────► │ Room authority │
//! │ (per member) │   JSON envelopes    │ (fan-out)      │
//! └──────┬───────┘                     └───────────────┘
//!        │ RoomEvent stream
//!        ▼
//! ┌──────────────┐   revision watch   ┌───────────────┐
//! │ RoomStore    │ ─────────────────► │ UI observers  │
//! │ (sole writer)│                    └───────────────┘
//! └──────┬───────┘
//!        │ stroke log
//!        ▼
//! ┌──────────────┐
//! │ Canvas       │
//! │ (replay)     │
//! └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`model`] — Shared data types (participants, messages, strokes)
//! - [`protocol`] — JSON wire protocol (`Envelope` codec)
//! - [`client`] — Connection manager with bounded-backoff reconnect
//! - [`store`] — Canonical room state, idempotent event application
//! - [`presence`] — Online/offline roster derived from room events
//! - [`replay`] — Deterministic stroke-log rasterization
//!
//! The usual wiring: create a [`RoomStore`], [`RoomClient::connect`],
//! then drain [`RoomEvent`]s into [`RoomStore::apply`] and rerender from
//! [`RoomStore::subscribe`] notifications.

pub mod client;
pub mod model;
pub mod presence;
pub mod protocol;
pub mod replay;
pub mod store;

// Re-exports for convenience
pub use client::{
    backoff_delay, ClientConfig, ConnectionStatus, RoomClient, RoomEvent, SyncError,
};
pub use model::{
    ActiveStroke, ChatMessage, DrawingStroke, FileRef, MessageKind, Participant, Room,
    StrokePoint,
};
pub use presence::PresenceTracker;
pub use protocol::{
    DrawingAction, Envelope, EventPayload, JoinPayload, LeavePayload, PresencePayload,
    ProtocolError, RoomSnapshot, EVENT_KINDS,
};
pub use replay::{parse_color, Canvas, Pixel, BACKGROUND, FALLBACK_COLOR};
pub use store::{RoomState, RoomStore};
