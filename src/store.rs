//! Canonical in-memory projection of a room.
//!
//! The store is the *only* writer of room state. Remote deliveries and
//! local optimistic actions both funnel through [`RoomStore::apply`];
//! correctness rests on serialized entry into that one call path, not
//! on locks — the store itself holds none.
//!
//! Apply rules (all idempotent under redelivery):
//! - `chat_message` / `draw`: append iff the id is unseen.
//! - `draw` with `seq <= clear_seq`: stale, discarded — a clear is a
//!   log truncation point, and nothing from before it may resurrect.
//! - `clear`: truncate the stroke log, record the truncation sequence.
//! - `join` / `leave` / `presence_update`: delegated to the
//!   [`PresenceTracker`].
//! - `room_snapshot`: wholesale replacement, used once per (re)connect
//!   to re-establish ground truth.
//!
//! Observers subscribe to a revision counter that bumps once per
//! mutating apply — one notification per event, never per field.

use tokio::sync::watch;

use std::collections::HashSet;

use crate::model::{ChatMessage, DrawingStroke, Participant, Room};
use crate::presence::PresenceTracker;
use crate::protocol::{DrawingAction, Envelope, EventPayload, RoomSnapshot};

/// Read-only copy of the room, handed to UI consumers.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    pub messages: Vec<ChatMessage>,
    pub strokes: Vec<DrawingStroke>,
    pub participants: Vec<Participant>,
    pub clear_seq: u64,
}

/// The room state store. One per room session, explicitly constructed
/// and owned — its lifecycle is the session's, not the process's.
pub struct RoomStore {
    room: Room,
    messages: Vec<ChatMessage>,
    strokes: Vec<DrawingStroke>,
    presence: PresenceTracker,
    /// Sequence number of the last applied clear; strokes at or below
    /// it are stale.
    clear_seq: u64,
    seen_messages: HashSet<String>,
    seen_strokes: HashSet<String>,
    revision: u64,
    revision_tx: watch::Sender<u64>,
}

impl RoomStore {
    /// Create an empty store for a freshly joined room.
    pub fn new(room: Room, local: Participant) -> Self {
        let (revision_tx, _) = watch::channel(0);
        Self {
            room,
            messages: Vec::new(),
            strokes: Vec::new(),
            presence: PresenceTracker::new(local),
            clear_seq: 0,
            seen_messages: HashSet::new(),
            seen_strokes: HashSet::new(),
            revision: 0,
            revision_tx,
        }
    }

    /// Subscribe to mutation notifications.
    ///
    /// The receiver observes a revision counter bumped once per
    /// mutating [`apply`](Self::apply); read the state via
    /// [`snapshot`](Self::snapshot) when it changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision_tx.subscribe()
    }

    /// Current revision (bumps once per mutation).
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply one event. Never fails: events that cannot be applied are
    /// dropped and logged, and the state stays consistent.
    pub fn apply(&mut self, envelope: &Envelope) {
        if envelope.room_id != self.room.id {
            log::warn!(
                "dropping {} for foreign room {} (ours: {})",
                envelope.kind(),
                envelope.room_id,
                self.room.id
            );
            return;
        }

        let mutated = match &envelope.event {
            EventPayload::ChatMessage(msg) => self.apply_message(msg),
            EventPayload::DrawingAction(action) => self.apply_drawing(action),
            EventPayload::Join(join) => {
                self.presence.handle_join(Participant {
                    id: envelope.participant_id.clone(),
                    display_name: join.display_name.clone(),
                    online: true,
                    last_seen: None,
                });
                true
            }
            EventPayload::Leave(leave) => {
                self.presence
                    .handle_leave(&envelope.participant_id, leave.left_at);
                true
            }
            EventPayload::PresenceUpdate(update) => {
                self.presence.upsert(update.participant.clone());
                true
            }
            EventPayload::RoomSnapshot(snapshot) => {
                self.apply_snapshot(snapshot);
                true
            }
        };

        if mutated {
            self.notify();
        }
    }

    fn apply_message(&mut self, msg: &ChatMessage) -> bool {
        if self.seen_messages.contains(&msg.id) {
            log::debug!("duplicate chat message {} ignored", msg.id);
            return false;
        }
        self.seen_messages.insert(msg.id.clone());
        // Ordered delivery within an epoch means arrival order is
        // created_at order; ties within a tick keep insertion order.
        self.messages.push(msg.clone());
        true
    }

    fn apply_drawing(&mut self, action: &DrawingAction) -> bool {
        match action {
            DrawingAction::Draw(stroke) => {
                if stroke.points.is_empty() {
                    log::warn!("dropping empty stroke {}", stroke.id);
                    return false;
                }
                if stroke.seq != 0 && stroke.seq <= self.clear_seq {
                    log::debug!(
                        "dropping stale stroke {} (seq {} <= clear {})",
                        stroke.id,
                        stroke.seq,
                        self.clear_seq
                    );
                    return false;
                }
                if self.seen_strokes.contains(&stroke.id) {
                    log::debug!("duplicate stroke {} ignored", stroke.id);
                    return false;
                }
                self.seen_strokes.insert(stroke.id.clone());
                self.strokes.push(stroke.clone());
                true
            }
            DrawingAction::Clear { seq } => {
                self.strokes.clear();
                self.seen_strokes.clear();
                self.clear_seq = self.clear_seq.max(*seq);
                true
            }
            DrawingAction::ToolChange { tool } => {
                // Tool selection is local UI state, not shared state.
                log::debug!("tool_change({tool}) is informational, no state change");
                false
            }
        }
    }

    fn apply_snapshot(&mut self, snapshot: &RoomSnapshot) {
        self.messages = snapshot.messages.clone();
        // Snapshot may interleave messages from several epochs; restore
        // the canonical order (created_at, stable on ties).
        self.messages.sort_by_key(|m| m.created_at);
        self.seen_messages = self.messages.iter().map(|m| m.id.clone()).collect();

        self.strokes = snapshot
            .strokes
            .iter()
            .filter(|s| !s.points.is_empty())
            .cloned()
            .collect();
        self.seen_strokes = self.strokes.iter().map(|s| s.id.clone()).collect();
        self.clear_seq = snapshot.clear_seq;

        self.presence.replace_all(snapshot.participants.clone());
        self.presence.mark_local_online();
    }

    /// Flip local presence offline on disconnect. The append-only logs
    /// are retained; only server-confirmed ephemera change.
    pub fn mark_disconnected(&mut self) {
        self.presence.mark_local_offline();
        self.notify();
    }

    /// Flip local presence back online once the transport reopens.
    pub fn mark_connected(&mut self) {
        self.presence.mark_local_online();
        self.notify();
    }

    fn notify(&mut self) {
        self.revision += 1;
        // Nobody listening is fine.
        let _ = self.revision_tx.send(self.revision);
    }

    /// Immutable copy of the current room state.
    pub fn snapshot(&self) -> RoomState {
        RoomState {
            room: self.room.clone(),
            messages: self.messages.clone(),
            strokes: self.strokes.clone(),
            participants: self.presence.to_vec(),
            clear_seq: self.clear_seq,
        }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn local_id(&self) -> &str {
        self.presence.local_id()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn strokes(&self) -> &[DrawingStroke] {
        &self.strokes
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }
}
