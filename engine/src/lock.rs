//! Per-key FIFO mutex.
//!
//! [`KeyedMutex`] serializes work per logical key while letting different
//! keys proceed in parallel. Each active key owns a ticket lock: callers take
//! a ticket on arrival and run when it is served, so waiters for a key run in
//! arrival order. When the last holder or waiter of a key leaves, the key's
//! entry is dropped from the table.
//!
//! Lock order is table shard, then slot state. Tickets are only handed out
//! while the table shard is held, which is what makes idle-entry removal race
//! free.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::hash::Hash;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Tickets {
    /// Next ticket to hand out
    next: u64,
    /// Ticket currently allowed to run
    serving: u64,
}

#[derive(Debug, Default)]
struct KeySlot {
    tickets: Mutex<Tickets>,
    turn: Condvar,
}

impl KeySlot {
    fn take_ticket(&self) -> u64 {
        let mut tickets = self.tickets.lock();
        let ticket = tickets.next;
        tickets.next += 1;
        ticket
    }

    fn wait_for(&self, ticket: u64) {
        let mut tickets = self.tickets.lock();
        while tickets.serving != ticket {
            self.turn.wait(&mut tickets);
        }
    }

    fn advance(&self) {
        let mut tickets = self.tickets.lock();
        tickets.serving += 1;
        self.turn.notify_all();
    }

    fn is_idle(&self) -> bool {
        let tickets = self.tickets.lock();
        tickets.serving == tickets.next
    }
}

/// A table of FIFO mutexes indexed by key.
#[derive(Debug)]
pub struct KeyedMutex<K>
where
    K: Eq + Hash,
{
    slots: DashMap<K, Arc<KeySlot>>,
}

impl<K> Default for KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> KeyedMutex<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// Block until `key` is held by the caller.
    ///
    /// The key is released when the returned guard is dropped, including
    /// during unwinding.
    pub fn lock(&self, key: &K) -> KeyGuard<'_, K> {
        let (slot, ticket) = {
            let entry = self.slots.entry(key.clone()).or_default();
            let ticket = entry.take_ticket();
            (Arc::clone(entry.value()), ticket)
        };

        slot.wait_for(ticket);

        KeyGuard {
            owner: self,
            key: key.clone(),
            slot,
        }
    }

    /// Run `operation` while holding `key`.
    ///
    /// The key is released before the result, success or error, is handed
    /// back to the caller.
    pub fn acquire<T, F>(&self, key: &K, operation: F) -> T
    where
        F: FnOnce() -> T,
    {
        let guard = self.lock(key);
        let result = operation();
        drop(guard);
        result
    }

    /// Number of keys currently held or waited on.
    pub fn active_keys(&self) -> usize {
        self.slots.len()
    }

    fn release(&self, key: &K, slot: &KeySlot) {
        slot.advance();
        self.slots.remove_if(key, |_, slot| slot.is_idle());
    }
}

/// Holds a key of a [`KeyedMutex`] until dropped.
#[derive(Debug)]
pub struct KeyGuard<'a, K>
where
    K: Eq + Hash + Clone,
{
    owner: &'a KeyedMutex<K>,
    key: K,
    slot: Arc<KeySlot>,
}

impl<K> KeyGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K> Drop for KeyGuard<'_, K>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        self.owner.release(&self.key, &self.slot);
    }
}
