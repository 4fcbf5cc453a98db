//! Explicit session context passed to everything that asks "am I the
//! authority?" or "do I own this actor?".

use std::collections::BTreeMap;

use skirmish_net::ParticipantId;

/// Role of the local participant in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Holds the canonical copy of shared state.
    Authority,
    /// Holds read-only mirrors.
    Observer,
}

/// Who we are, who the authority is, and who else is connected.
///
/// Participants receive a join-order index on first sight. Indices are never
/// reused within a session.
#[derive(Debug, Clone)]
pub struct SessionContext {
    local: ParticipantId,
    authority: ParticipantId,
    participants: BTreeMap<ParticipantId, usize>,
    next_index: usize,
}

impl SessionContext {
    /// Creates a context for `local` in a session whose authority is
    /// `authority`. Both are registered, the authority first.
    pub fn new(local: ParticipantId, authority: ParticipantId) -> Self {
        let mut ctx = Self {
            local,
            authority,
            participants: BTreeMap::new(),
            next_index: 0,
        };
        ctx.add_participant(authority);
        ctx.add_participant(local);
        ctx
    }

    /// Context for the participant hosting the session.
    pub fn host(local: ParticipantId) -> Self {
        Self::new(local, local)
    }

    /// Context for a participant joining someone else's session.
    pub fn observer(local: ParticipantId, authority: ParticipantId) -> Self {
        Self::new(local, authority)
    }

    pub fn local(&self) -> ParticipantId {
        self.local
    }

    pub fn authority(&self) -> ParticipantId {
        self.authority
    }

    pub fn role(&self) -> Role {
        if self.is_authority() {
            Role::Authority
        } else {
            Role::Observer
        }
    }

    /// Whether the local participant is the authority.
    pub fn is_authority(&self) -> bool {
        self.local == self.authority
    }

    /// Whether the local participant is `owner`.
    pub fn is_owner(&self, owner: ParticipantId) -> bool {
        self.local == owner
    }

    /// Registers a participant and returns its join index. Registering a known
    /// participant returns the index it already has.
    pub fn add_participant(&mut self, id: ParticipantId) -> usize {
        if let Some(&index) = self.participants.get(&id) {
            return index;
        }
        let index = self.next_index;
        self.next_index += 1;
        self.participants.insert(id, index);
        index
    }

    /// Forgets a participant. Returns `false` if it was unknown.
    pub fn remove_participant(&mut self, id: ParticipantId) -> bool {
        self.participants.remove(&id).is_some()
    }

    /// Join index of a connected participant.
    pub fn participant_index(&self, id: ParticipantId) -> Option<usize> {
        self.participants.get(&id).copied()
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    /// Every connected participant, including the local one, in id order.
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.participants.keys().copied()
    }

    /// Every connected participant except the local one.
    pub fn others(&self) -> Vec<ParticipantId> {
        self.participants()
            .filter(|&id| id != self.local)
            .collect()
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }
}
