//! In-Flight Registry Module
//!
//! Coalesces concurrent reads of the same key onto one pending operation.

use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::cache::CacheKey;
use crate::error::Result;

/// Multicast handle to a pending read. Every clone resolves to the same result.
pub type InFlightHandle<T> = Shared<BoxFuture<'static, Result<T>>>;

/// Identifies one registration of a key, so a finishing operation can tell
/// whether it is still the registered one.
pub type Ticket = u64;

struct Pending<T: Clone> {
    ticket: Ticket,
    handle: InFlightHandle<T>,
}

// == In-Flight Registry ==
/// At most one pending handle per key.
///
/// A key moves `absent -> pending` on `join` and back to `absent` on
/// `complete` or eviction. Completed results are never replayed from here.
///
/// Reads that must not be shared (forced refreshes) take a detached ticket
/// instead: nobody can join them, but evictions still revoke them, so their
/// result is only cached if no invalidation touched the key meanwhile.
pub struct InFlightRegistry<T: Clone> {
    pending: HashMap<CacheKey, Pending<T>>,
    detached: HashMap<Ticket, CacheKey>,
    next_ticket: Ticket,
}

impl<T: Clone + Send + Sync + 'static> InFlightRegistry<T> {
    pub fn new() -> Self {
        Self {
            pending: HashMap::new(),
            detached: HashMap::new(),
            next_ticket: 0,
        }
    }

    fn issue_ticket(&mut self) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    // == Join ==
    /// Returns the pending handle for `key`, or starts one with `factory`.
    ///
    /// `factory` receives the ticket the new registration is filed under and
    /// is only invoked when nothing is pending for `key`.
    pub fn join<F>(&mut self, key: &CacheKey, factory: F) -> InFlightHandle<T>
    where
        F: FnOnce(Ticket) -> BoxFuture<'static, Result<T>>,
    {
        if let Some(pending) = self.pending.get(key) {
            return pending.handle.clone();
        }

        let ticket = self.issue_ticket();
        let handle = factory(ticket).shared();
        self.pending.insert(
            key.clone(),
            Pending {
                ticket,
                handle: handle.clone(),
            },
        );
        handle
    }

    /// Whether a read for `key` is pending.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.pending.contains_key(key)
    }

    // == Complete ==
    /// Removes the registration for `key` if it still carries `ticket`.
    ///
    /// Returns false when the registration was evicted or replaced in the
    /// meantime; the caller must then discard its result instead of caching it.
    pub fn complete(&mut self, key: &CacheKey, ticket: Ticket) -> bool {
        match self.pending.get(key) {
            Some(pending) if pending.ticket == ticket => {
                self.pending.remove(key);
                true
            }
            _ => false,
        }
    }

    // == Detached Reads ==
    /// Registers a read for `key` that nobody can join.
    pub fn detach(&mut self, key: &CacheKey) -> Ticket {
        let ticket = self.issue_ticket();
        self.detached.insert(ticket, key.clone());
        ticket
    }

    /// Removes a detached registration. False when an eviction revoked it.
    pub fn complete_detached(&mut self, ticket: Ticket) -> bool {
        self.detached.remove(&ticket).is_some()
    }

    // == Evict ==
    /// Forgets the pending read for `key`. Joined callers still get its result.
    ///
    /// Detached reads of `key` are revoked too; only joinable reads are counted.
    pub fn evict(&mut self, key: &CacheKey) -> bool {
        self.evict_where(|k| k == key) > 0
    }

    pub fn evict_by_prefix(&mut self, prefix: &CacheKey) -> usize {
        self.evict_where(|k| k.is_under(prefix))
    }

    /// Forgets every read whose key satisfies `covers`.
    pub fn evict_where<F>(&mut self, covers: F) -> usize
    where
        F: Fn(&CacheKey) -> bool,
    {
        self.detached.retain(|_, key| !covers(&*key));
        let before = self.pending.len();
        self.pending.retain(|key, _| !covers(key));
        before - self.pending.len()
    }

    pub fn clear(&mut self) -> usize {
        self.detached.clear();
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Pending keys in sorted order.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.pending.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for InFlightRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
