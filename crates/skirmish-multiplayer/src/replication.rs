//! Replicated variables: a value plus a monotonic version, a write
//! permission, and change notifications.
//!
//! The writer calls [`ReplicatedVar::set`], which bumps the version, fires
//! local observers with `(old, new)` and returns a [`VariableUpdate`] for the
//! caller to route. Every other peer feeds that update into
//! [`ReplicatedVar::apply_update`], which discards anything whose version is
//! not strictly newer than what it already holds.
//!
//! Observers are registered with [`ReplicatedVar::subscribe`] and stay active
//! until the returned [`Subscription`] or the variable itself is dropped.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde::Serialize;
use serde::de::DeserializeOwned;
use skirmish_net::{ParticipantId, VarKey, VariableUpdate};
use tracing::trace;

use crate::session::SessionContext;

// ---------------------------------------------------------------------------
// Permission / outcome / error
// ---------------------------------------------------------------------------

/// Who may call [`ReplicatedVar::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePermission {
    /// Only the session authority.
    AuthorityOnly,
    /// Only the participant owning the variable's actor.
    OwnerOnly,
}

/// Result of feeding a remote update into a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The update was newer and is now the local value.
    Applied,
    /// The update was not newer than the local version and was ignored.
    Stale,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    /// The local participant lacks the variable's write permission.
    #[error("{participant} may not write {key:?} ({permission:?})")]
    PermissionDenied {
        key: VarKey,
        participant: ParticipantId,
        permission: WritePermission,
    },

    /// An update addressed to a different variable.
    #[error("update for {got:?} applied to {expected:?}")]
    KeyMismatch { expected: VarKey, got: VarKey },

    #[error("failed to decode replicated value: {0}")]
    Decode(#[source] postcard::Error),

    #[error("failed to encode replicated value: {0}")]
    Encode(#[source] postcard::Error),
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

type Callback<T> = Box<dyn FnMut(&T, &T) + Send>;

struct ObserverSlots<T> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<T>)>,
}

impl<T> ObserverSlots<T> {
    fn notify(&mut self, old: &T, new: &T) {
        for (_, callback) in &mut self.callbacks {
            callback(old, new);
        }
    }
}

/// Scoped observer registration. Dropping it unregisters the callback.
#[must_use = "dropping a Subscription immediately revokes it"]
pub struct Subscription {
    revoke: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Unregisters the callback now.
    pub fn revoke(mut self) {
        self.run_revoke();
    }

    fn run_revoke(&mut self) {
        if let Some(revoke) = self.revoke.take() {
            revoke();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_revoke();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.revoke.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ReplicatedVar
// ---------------------------------------------------------------------------

/// A value mirrored from its writer to every other participant.
pub struct ReplicatedVar<T> {
    key: VarKey,
    value: T,
    version: u64,
    permission: WritePermission,
    owner: ParticipantId,
    observers: Arc<Mutex<ObserverSlots<T>>>,
}

impl<T> ReplicatedVar<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Creates a variable at version 0.
    pub fn new(key: VarKey, initial: T, permission: WritePermission, owner: ParticipantId) -> Self {
        Self {
            key,
            value: initial,
            version: 0,
            permission,
            owner,
            observers: Arc::new(Mutex::new(ObserverSlots {
                next_id: 0,
                callbacks: Vec::new(),
            })),
        }
    }

    pub fn key(&self) -> VarKey {
        self.key
    }

    /// Last known value: canonical on the writer, last applied elsewhere.
    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn permission(&self) -> WritePermission {
        self.permission
    }

    pub fn owner(&self) -> ParticipantId {
        self.owner
    }

    /// Whether the local participant may write this variable.
    pub fn can_write(&self, ctx: &SessionContext) -> bool {
        match self.permission {
            WritePermission::AuthorityOnly => ctx.is_authority(),
            WritePermission::OwnerOnly => ctx.is_owner(self.owner),
        }
    }

    /// Writes a new value and returns the update to send to other peers.
    ///
    /// Fails with [`ReplicationError::PermissionDenied`] and leaves the value
    /// and version untouched when the caller lacks permission.
    pub fn set(&mut self, ctx: &SessionContext, value: T) -> Result<VariableUpdate, ReplicationError> {
        if !self.can_write(ctx) {
            return Err(ReplicationError::PermissionDenied {
                key: self.key,
                participant: ctx.local(),
                permission: self.permission,
            });
        }

        let payload = postcard::to_allocvec(&value).map_err(ReplicationError::Encode)?;
        let old = std::mem::replace(&mut self.value, value);
        self.version += 1;
        self.notify(&old);

        Ok(VariableUpdate {
            key: self.key,
            version: self.version,
            payload,
        })
    }

    /// Applies an update produced by the writer.
    ///
    /// Updates whose version is not strictly greater than the local one are
    /// reported as [`ApplyOutcome::Stale`] without touching state.
    pub fn apply_update(&mut self, update: &VariableUpdate) -> Result<ApplyOutcome, ReplicationError> {
        if update.key != self.key {
            return Err(ReplicationError::KeyMismatch {
                expected: self.key,
                got: update.key,
            });
        }
        if update.version <= self.version {
            trace!(key = ?self.key, version = update.version, current = self.version, "stale update dropped");
            return Ok(ApplyOutcome::Stale);
        }

        let value: T = postcard::from_bytes(&update.payload).map_err(ReplicationError::Decode)?;
        let old = std::mem::replace(&mut self.value, value);
        self.version = update.version;
        self.notify(&old);
        Ok(ApplyOutcome::Applied)
    }

    /// Re-encodes the current value at the current version, for peers that
    /// joined after earlier writes. Peers already up to date see it as stale.
    pub fn resync_update(&self) -> Result<VariableUpdate, ReplicationError> {
        Ok(VariableUpdate {
            key: self.key,
            version: self.version,
            payload: postcard::to_allocvec(&self.value).map_err(ReplicationError::Encode)?,
        })
    }

    /// Registers a change callback invoked with `(old, new)`.
    ///
    /// Callbacks run synchronously inside `set`/`apply_update` and must not
    /// subscribe to the same variable.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&T, &T) + Send + 'static,
    {
        let id = {
            let mut slots = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
            let id = slots.next_id;
            slots.next_id += 1;
            slots.callbacks.push((id, Box::new(callback)));
            id
        };

        let weak: Weak<Mutex<ObserverSlots<T>>> = Arc::downgrade(&self.observers);
        Subscription {
            revoke: Some(Box::new(move || {
                if let Some(observers) = weak.upgrade() {
                    let mut slots = observers.lock().unwrap_or_else(PoisonError::into_inner);
                    slots.callbacks.retain(|(slot_id, _)| *slot_id != id);
                }
            })),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .len()
    }

    fn notify(&self, old: &T) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .notify(old, &self.value);
    }
}

impl<T: fmt::Debug> fmt::Debug for ReplicatedVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplicatedVar")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("version", &self.version)
            .field("permission", &self.permission)
            .field("owner", &self.owner)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ReplicationOutbox
// ---------------------------------------------------------------------------

/// Updates produced locally during one tick, waiting to be routed to every
/// other participant.
#[derive(Debug, Default)]
pub struct ReplicationOutbox {
    updates: Vec<VariableUpdate>,
}

impl ReplicationOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, update: VariableUpdate) {
        self.updates.push(update);
    }

    /// Takes every queued update in write order.
    pub fn drain(&mut self) -> Vec<VariableUpdate> {
        std::mem::take(&mut self.updates)
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

#[cfg(test)]
#[path = "replication_tests.rs"]
mod tests;
