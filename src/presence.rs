//! Presence tracking — the "who's in the room" roster.
//!
//! The roster is derived purely from `join` / `leave` /
//! `presence_update` events plus the local connection status. There is
//! no heartbeat or timeout-based liveness: a remote participant only
//! changes state when the room authority says so. If the collaborator
//! never emits a leave, a vanished peer stays listed as online — a
//! documented limitation of this design, not a bug to paper over with
//! local timers.
//!
//! The one optimistic exception is the local participant: on disconnect
//! we flip our own entry offline immediately, without a round trip,
//! because we *know* we are gone.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::Participant;

/// Tracks the online/offline roster for one room session.
///
/// Invariant: the roster always contains the local participant once the
/// session exists — every mutation path re-asserts it.
#[derive(Debug)]
pub struct PresenceTracker {
    local_id: String,
    roster: HashMap<String, Participant>,
}

impl PresenceTracker {
    /// Create a tracker seeded with the local participant, online.
    pub fn new(local: Participant) -> Self {
        let local_id = local.id.clone();
        let mut roster = HashMap::new();
        roster.insert(local_id.clone(), local);
        Self { local_id, roster }
    }

    /// A participant joined: insert or replace their entry, online.
    pub fn handle_join(&mut self, mut participant: Participant) {
        participant.online = true;
        self.roster.insert(participant.id.clone(), participant);
    }

    /// A participant left: mark offline with a last-seen time.
    ///
    /// A leave for an unknown id is a no-op — entries are never created
    /// from a leave.
    pub fn handle_leave(&mut self, participant_id: &str, left_at: DateTime<Utc>) {
        if let Some(entry) = self.roster.get_mut(participant_id) {
            entry.online = false;
            entry.last_seen = Some(left_at);
        }
    }

    /// Replace or insert a roster entry wholesale (presence_update).
    pub fn upsert(&mut self, participant: Participant) {
        self.roster.insert(participant.id.clone(), participant);
    }

    /// Replace the whole roster from an authoritative snapshot.
    ///
    /// If the snapshot omitted us (it shouldn't, but the invariant is
    /// ours to keep), the local entry is re-inserted as online.
    pub fn replace_all(&mut self, participants: Vec<Participant>) {
        let local = self.roster.remove(&self.local_id);
        self.roster.clear();
        for p in participants {
            self.roster.insert(p.id.clone(), p);
        }
        if !self.roster.contains_key(&self.local_id) {
            if let Some(mut local) = local {
                local.online = true;
                self.roster.insert(self.local_id.clone(), local);
            }
        }
    }

    /// Optimistically flip the local participant offline (disconnect).
    /// Remote entries are untouched.
    pub fn mark_local_offline(&mut self) {
        if let Some(local) = self.roster.get_mut(&self.local_id) {
            local.online = false;
            local.last_seen = Some(Utc::now());
        }
    }

    /// Flip the local participant back online (reconnect).
    pub fn mark_local_online(&mut self) {
        if let Some(local) = self.roster.get_mut(&self.local_id) {
            local.online = true;
        }
    }

    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    pub fn get(&self, participant_id: &str) -> Option<&Participant> {
        self.roster.get(participant_id)
    }

    pub fn len(&self) -> usize {
        self.roster.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roster.is_empty()
    }

    /// All roster entries, unordered.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.roster.values()
    }

    /// Only the currently online participants.
    pub fn online(&self) -> Vec<&Participant> {
        self.roster.values().filter(|p| p.online).collect()
    }

    /// Owned copy of the roster, for snapshots.
    pub fn to_vec(&self) -> Vec<Participant> {
        self.roster.values().cloned().collect()
    }
}
