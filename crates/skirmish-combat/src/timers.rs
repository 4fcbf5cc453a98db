//! Per-actor delay queue for deferred work: reload completion, respawn and
//! feedback expiry.
//!
//! Entries are ordered by fire time, then by insertion order, and are only
//! ever released by [`DelayQueue::drain_due`]. Dropping or clearing the queue
//! discards everything still pending.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Deferred actions an actor can have pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorTimer {
    /// Finish the reload started by the owner.
    CompleteReload,
    /// Bring a dead actor back (authority only).
    Respawn,
    /// End the short shot-feedback window on the owner.
    HitEffectExpired,
}

/// Handle returned by [`DelayQueue::schedule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Entry<K> {
    fire_at: f64,
    seq: u64,
    kind: K,
}

impl<K> PartialEq for Entry<K> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K> Eq for Entry<K> {}

impl<K> PartialOrd for Entry<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Entry<K> {
    /// Reversed so the max-heap pops the earliest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .fire_at
            .total_cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of pending timers keyed by fire time in seconds.
#[derive(Debug, Clone)]
pub struct DelayQueue<K> {
    heap: BinaryHeap<Entry<K>>,
    next_seq: u64,
}

impl<K: Copy + PartialEq> DelayQueue<K> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedules `kind` to fire at `fire_at`.
    pub fn schedule(&mut self, fire_at: f64, kind: K) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { fire_at, seq, kind });
        TimerId(seq)
    }

    /// Cancels one timer. Returns `false` if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.heap.len();
        self.heap.retain(|entry| entry.seq != id.0);
        self.heap.len() != before
    }

    /// Cancels every pending timer of `kind` and returns how many were removed.
    pub fn cancel_kind(&mut self, kind: K) -> usize {
        let before = self.heap.len();
        self.heap.retain(|entry| entry.kind != kind);
        before - self.heap.len()
    }

    /// Cancels everything.
    pub fn cancel_all(&mut self) {
        self.heap.clear();
    }

    /// Removes and returns every timer with `fire_at <= now`, earliest first.
    pub fn drain_due(&mut self, now: f64) -> Vec<(TimerId, K)> {
        let mut due = Vec::new();
        while let Some(top) = self.heap.peek() {
            if top.fire_at > now {
                break;
            }
            if let Some(entry) = self.heap.pop() {
                due.push((TimerId(entry.seq), entry.kind));
            }
        }
        due
    }

    /// Fire time of the earliest pending timer.
    pub fn next_due(&self) -> Option<f64> {
        self.heap.peek().map(|entry| entry.fire_at)
    }

    pub fn is_pending(&self, kind: K) -> bool {
        self.heap.iter().any(|entry| entry.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<K: Copy + PartialEq> Default for DelayQueue<K> {
    fn default() -> Self {
        Self::new()
    }
}
