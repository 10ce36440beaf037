// Copyright 2026 vitrine Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::hash::Hash;

use equivalent::Equivalent;
use hashbrown::HashMap;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use vitrine_common::{
    code::{Key, Resource},
    scope::Scope,
    strict_assert, strict_assert_eq,
};

use crate::{
    arena::{EntryArena, EntryId},
    entry::Entry,
    list::RecencyList,
    stats::CacheStats,
};

/// Budget ceilings for the cache.
///
/// Ceilings apply to the grand totals over all entries the cache owns,
/// attached and detached alike. Exceeding a ceiling is not an error; it
/// triggers the eviction sweep, and the cache legitimately stays over budget
/// for as long as every remaining entry is held or detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Ceiling on the total entry count.
    pub max_entries: usize,
    /// Ceiling on the total accounted bytes.
    pub max_bytes: usize,
}

impl Limits {
    /// Ceilings on both the entry count and the accounted bytes.
    pub fn new(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            max_entries,
            max_bytes,
        }
    }

    /// No ceilings; nothing is ever evicted.
    pub fn unbounded() -> Self {
        Self {
            max_entries: usize::MAX,
            max_bytes: usize::MAX,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// How [`ResourceCache::find_and_lock`] acquires a hold on the entry it finds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// At most one tracked hold per acquisition cycle: finding an entry that
    /// is already held returns it without adding another hold.
    ///
    /// Two call sites that each find the same entry under this mode share a
    /// single tracked hold, and the first release makes the entry evictable
    /// again. Callers that cannot guarantee a single logical holder per
    /// cycle must use [`LockMode::Nested`].
    Single,
    /// Every find adds a hold and must be matched by its own release.
    Nested,
}

/// Opaque handle to a cache entry.
///
/// A handle stays valid for exactly as long as its entry is protected from
/// destruction: while the entry is held, or while it is detached. Using a
/// handle whose entry has been destroyed is a contract violation and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHandle {
    id: EntryId,
}

/// Budget-aware store mapping opaque content keys to expensive-to-create
/// resources.
///
/// The cache owns every entry it creates. Entries with an outstanding hold
/// are never evicted; unheld entries are reclaimed from the
/// least-recently-used end of the recency order once the configured
/// [`Limits`] are exceeded. Entries can be [detached] from accounting to
/// hand exclusive ownership to another subsystem and later [reattached].
///
/// The cache is a single-owner component: all operations take `&mut self`,
/// run to completion, and never block. Resource `Drop` implementations run
/// inside the eviction sweep and must not touch the cache.
///
/// [detached]: ResourceCache::detach
/// [reattached]: ResourceCache::reattach_and_unlock
pub struct ResourceCache<K, R>
where
    K: Key,
    R: Resource,
{
    arena: EntryArena<Entry<K, R>>,
    index: HashMap<K, EntryId>,
    list: RecencyList,

    limits: Limits,

    /// Totals over all owned entries, attached and detached.
    entries: usize,
    bytes: usize,

    /// Attached entries with no outstanding hold, i.e. eviction candidates.
    unlocked: usize,

    /// Totals over entries currently handed out of accounting.
    detached_entries: usize,
    detached_bytes: usize,

    /// True only while the eviction sweep is executing.
    purging: bool,

    stats: CacheStats,
}

impl<K, R> Default for ResourceCache<K, R>
where
    K: Key,
    R: Resource,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, R> ResourceCache<K, R>
where
    K: Key,
    R: Resource,
{
    /// Creates an unbounded cache.
    pub fn new() -> Self {
        Self::with_limits(Limits::unbounded())
    }

    /// Creates a cache with the given budget ceilings.
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            arena: EntryArena::default(),
            index: HashMap::new(),
            list: RecencyList::default(),
            limits,
            entries: 0,
            bytes: 0,
            unlocked: 0,
            detached_entries: 0,
            detached_bytes: 0,
            purging: false,
            stats: CacheStats::default(),
        }
    }

    /// Current budget ceilings.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Replaces the budget ceilings.
    ///
    /// Shrinking either ceiling immediately runs the eviction sweep. If the
    /// cache is over the new budget and everything is held, it simply stays
    /// over budget until enough entries become evictable.
    pub fn set_limits(&mut self, limits: Limits) {
        let shrunk =
            limits.max_entries < self.limits.max_entries || limits.max_bytes < self.limits.max_bytes;
        self.limits = limits;
        if shrunk {
            self.purge();
        }
    }

    /// Looks up `key` and locks the entry if present.
    ///
    /// A found entry is moved to the most-recently-used position and its
    /// hold count is updated according to `mode`.
    pub fn find_and_lock<Q>(&mut self, key: &Q, mode: LockMode) -> Option<EntryHandle>
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        let Some(&id) = self.index.get(key) else {
            self.stats.misses += 1;
            return None;
        };
        self.stats.hits += 1;

        self.list.unlink(&mut self.arena, id);
        let entry = &mut self.arena.slot_mut(id).data;
        strict_assert!(entry.is_attached());
        let newly_held = match mode {
            LockMode::Nested => {
                let newly_held = !entry.is_held();
                entry.hold();
                newly_held
            }
            LockMode::Single => {
                if entry.is_held() {
                    false
                } else {
                    entry.hold();
                    true
                }
            }
        };
        if newly_held {
            self.unlocked -= 1;
        }
        self.list.push_head(&mut self.arena, id);

        Some(EntryHandle { id })
    }

    /// Creates an entry for `key` holding `resource`, locked once.
    ///
    /// The new entry starts at the most-recently-used position. Creation can
    /// push the cache over budget, so the eviction sweep runs before the
    /// handle is returned; the new entry itself is held and cannot be
    /// reclaimed by it.
    ///
    /// # Panics
    ///
    /// Panics if an entry for `key` already exists, or if called while the
    /// eviction sweep is executing (a resource being destroyed must never
    /// request a new resource, or the sweep could recurse without bound).
    pub fn create_and_lock(&mut self, key: K, resource: R) -> EntryHandle {
        assert!(
            !self.purging,
            "create_and_lock called while the eviction sweep is running"
        );
        assert!(
            self.index.get(&key).is_none(),
            "create_and_lock for a key that is already cached: {key:?}"
        );

        let mut entry = Entry::new(key, resource);
        entry.hold();
        entry.set_in_index(true);
        entry.set_in_list(true);
        let key = entry.key().clone();
        let size = entry.size();
        tracing::trace!("[cache]: create {:?} ({} bytes)", key, size);

        let id = self.arena.insert(entry);
        self.list.push_head(&mut self.arena, id);
        let collided = self.index.insert(key, id);
        strict_assert!(collided.is_none());

        self.entries += 1;
        self.bytes += size;
        self.stats.creations += 1;

        self.purge();

        EntryHandle { id }
    }

    /// Drops one hold on an attached entry.
    ///
    /// When the last hold is dropped the entry becomes evictable, and the
    /// eviction sweep runs.
    ///
    /// # Panics
    ///
    /// Panics if the entry is not held, or not attached (a detached entry
    /// gives its hold back through
    /// [`reattach_and_unlock`](ResourceCache::reattach_and_unlock)).
    pub fn release(&mut self, handle: EntryHandle) {
        let entry = &mut self.arena.slot_mut(handle.id).data;
        assert!(
            entry.is_attached(),
            "release of an entry that is not attached: {:?}",
            entry.key()
        );
        entry.release();
        if !entry.is_held() {
            self.unlocked += 1;
        }
        self.purge();
    }

    /// Removes an entry from the index and recency order without destroying
    /// it and without changing its hold count.
    ///
    /// The entry's size moves from the attached totals into the detached
    /// totals while the grand totals stay unchanged. The caller now owns
    /// keeping the entry alive; the only ways back are
    /// [`reattach_and_unlock`](ResourceCache::reattach_and_unlock) and
    /// [`take`](ResourceCache::take).
    ///
    /// # Panics
    ///
    /// Panics if the entry is not attached.
    pub fn detach(&mut self, handle: EntryHandle) {
        let id = handle.id;
        {
            let entry = &self.arena.slot(id).data;
            assert!(
                entry.is_attached(),
                "detach of an entry that is not attached: {:?}",
                entry.key()
            );
            let removed = self.index.remove(entry.key());
            strict_assert!(removed.is_some());
        }
        self.list.unlink(&mut self.arena, id);
        let (size, was_unheld) = self.arena.slot_mut(id).data.with_mut(|entry| {
            entry.set_in_index(false);
            entry.set_in_list(false);
            entry.set_detached(true);
            tracing::trace!("[cache]: detach {:?} ({} bytes)", entry.key(), entry.size());
            (entry.size(), !entry.is_held())
        });
        if was_unheld {
            self.unlocked -= 1;
        }
        self.detached_entries += 1;
        self.detached_bytes += size;
        self.stats.detaches += 1;
    }

    /// Reverses [`detach`](ResourceCache::detach), then drops exactly one
    /// hold.
    ///
    /// The entry returns to the index and the most-recently-used position,
    /// and the detached totals shrink back. Dropping the hold may make the
    /// entry evictable and runs the eviction sweep.
    ///
    /// # Panics
    ///
    /// Panics if the entry is not detached, if it carries no hold to drop,
    /// or if another entry was cached under the same key while this one was
    /// detached.
    pub fn reattach_and_unlock(&mut self, handle: EntryHandle) {
        let id = handle.id;
        let (key, size) = self.arena.slot_mut(id).data.with_mut(|entry| {
            assert!(
                entry.is_detached(),
                "reattach of an entry that is not detached: {:?}",
                entry.key()
            );
            entry.set_detached(false);
            entry.set_in_index(true);
            entry.set_in_list(true);
            tracing::trace!("[cache]: reattach {:?} ({} bytes)", entry.key(), entry.size());
            (entry.key().clone(), entry.size())
        });
        self.list.push_head(&mut self.arena, id);
        let collided = self.index.insert(key, id);
        assert!(
            collided.is_none(),
            "reattach collided with an entry cached under the same key"
        );
        if !self.arena.slot(id).data.is_held() {
            self.unlocked += 1;
        }
        self.detached_entries -= 1;
        self.detached_bytes -= size;
        self.stats.reattaches += 1;

        self.release(handle);
    }

    /// Consumes a detached entry, handing its resource to the caller.
    ///
    /// The entry leaves the cache entirely: the grand totals and the
    /// detached totals both shrink, any holds it carried are discarded, and
    /// destroying the resource becomes the caller's responsibility. Teardown
    /// will not touch it again.
    ///
    /// # Panics
    ///
    /// Panics if the entry is not detached.
    pub fn take(&mut self, handle: EntryHandle) -> R {
        let id = handle.id;
        {
            let entry = &self.arena.slot(id).data;
            assert!(
                entry.is_detached(),
                "take of an entry that is not detached: {:?}",
                entry.key()
            );
        }
        let entry = self.arena.remove(id);
        self.entries -= 1;
        self.bytes -= entry.size();
        self.detached_entries -= 1;
        self.detached_bytes -= entry.size();
        self.stats.takes += 1;
        tracing::trace!("[cache]: take {:?} ({} bytes)", entry.key(), entry.size());
        entry.into_resource()
    }

    /// Destroys every attached entry regardless of budget and resets the
    /// accounting.
    ///
    /// # Panics
    ///
    /// Panics if any detached entry is outstanding, or if any entry is still
    /// held; either means a resource user outlived the cache teardown.
    pub fn remove_all(&mut self) {
        assert_eq!(
            self.detached_entries, 0,
            "teardown with outstanding detached entries"
        );
        tracing::debug!(
            "[cache]: remove_all: {} entries, {} bytes",
            self.entries,
            self.bytes
        );
        while let Some(id) = self.list.head() {
            {
                let entry = &self.arena.slot(id).data;
                assert!(
                    !entry.is_held(),
                    "teardown with a held entry: {:?}",
                    entry.key()
                );
                let removed = self.index.remove(entry.key());
                strict_assert!(removed.is_some());
            }
            self.list.unlink(&mut self.arena, id);
            let entry = self.arena.remove(id);
            self.entries -= 1;
            self.bytes -= entry.size();
            self.unlocked -= 1;
        }
        strict_assert!(self.index.is_empty());
        strict_assert!(self.list.is_empty());
        strict_assert!(self.arena.is_empty());
        strict_assert_eq!(self.entries, 0);
        strict_assert_eq!(self.bytes, 0);
        strict_assert_eq!(self.unlocked, 0);
        self.entries = 0;
        self.bytes = 0;
        self.unlocked = 0;
    }

    /// The eviction sweep.
    ///
    /// Walks from the least-recently-used end toward the head, destroying
    /// unheld entries until the budget is satisfied. Held entries are
    /// skipped under any budget pressure. Resource teardown runs inside the
    /// sweep, so the sweep is guarded against re-entry.
    fn purge(&mut self) {
        if self.purging {
            return;
        }
        if !self.over_budget() {
            return;
        }
        self.purging = true;
        tracing::trace!(
            "[cache]: purge: entries {}/{}, bytes {}/{}",
            self.entries,
            self.limits.max_entries,
            self.bytes,
            self.limits.max_bytes
        );

        let mut cursor = self.list.tail();
        while self.over_budget() {
            let Some(id) = cursor else {
                // Reached the head with only held entries left; the cache
                // stays over budget until holds are dropped.
                break;
            };
            let toward_head = self.list.toward_head(&self.arena, id);
            if !self.arena.slot(id).data.is_held() {
                self.evict(id);
            }
            cursor = toward_head;
        }

        self.purging = false;
    }

    fn evict(&mut self, id: EntryId) {
        {
            let entry = &self.arena.slot(id).data;
            strict_assert!(entry.is_attached());
            strict_assert!(!entry.is_held());
            let removed = self.index.remove(entry.key());
            strict_assert!(removed.is_some());
        }
        self.list.unlink(&mut self.arena, id);
        let entry = self.arena.remove(id);
        self.entries -= 1;
        self.bytes -= entry.size();
        self.unlocked -= 1;
        self.stats.evictions += 1;
        tracing::trace!("[cache]: evict {:?} ({} bytes)", entry.key(), entry.size());
        // Dropping the entry releases the resource, inside the sweep.
        drop(entry);
    }

    fn over_budget(&self) -> bool {
        self.entries > self.limits.max_entries || self.bytes > self.limits.max_bytes
    }
}

/// Accessors.
impl<K, R> ResourceCache<K, R>
where
    K: Key,
    R: Resource,
{
    /// Total entries owned by the cache, attached and detached.
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Total accounted bytes, attached and detached.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Attached entries with no outstanding hold.
    pub fn unlocked(&self) -> usize {
        self.unlocked
    }

    /// Entries currently handed out of accounting.
    pub fn detached_entries(&self) -> usize {
        self.detached_entries
    }

    /// Accounted bytes of entries currently handed out of accounting.
    pub fn detached_bytes(&self) -> usize {
        self.detached_bytes
    }

    /// Attached (indexed) entries.
    pub fn attached(&self) -> usize {
        self.index.len()
    }

    /// Whether the cache owns no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Whether the totals currently exceed either ceiling.
    pub fn is_over_budget(&self) -> bool {
        self.over_budget()
    }

    /// Whether an attached entry exists for `key`.
    ///
    /// Detached entries are not indexed and are not found.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        Q: Hash + Equivalent<K> + ?Sized,
    {
        self.index.get(key).is_some()
    }

    /// Copies out the activity counters.
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// The key of the entry behind `handle`.
    pub fn key(&self, handle: EntryHandle) -> &K {
        self.arena.slot(handle.id).data.key()
    }

    /// The resource of the entry behind `handle`.
    pub fn resource(&self, handle: EntryHandle) -> &R {
        self.arena.slot(handle.id).data.resource()
    }

    /// Mutable access to the resource of the entry behind `handle`.
    pub fn resource_mut(&mut self, handle: EntryHandle) -> &mut R {
        self.arena.slot_mut(handle.id).data.resource_mut()
    }

    /// The accounted byte size of the entry behind `handle`.
    pub fn size(&self, handle: EntryHandle) -> usize {
        self.arena.slot(handle.id).data.size()
    }

    /// The hold count of the entry behind `handle`.
    pub fn holds(&self, handle: EntryHandle) -> usize {
        self.arena.slot(handle.id).data.holds()
    }

    /// Whether the entry behind `handle` is held.
    pub fn is_held(&self, handle: EntryHandle) -> bool {
        self.arena.slot(handle.id).data.is_held()
    }

    /// Whether the entry behind `handle` is detached.
    pub fn is_detached(&self, handle: EntryHandle) -> bool {
        self.arena.slot(handle.id).data.is_detached()
    }

    /// Recomputes every bookkeeping total from scratch and cross-checks it
    /// against the maintained counters.
    ///
    /// Intended for the test suite and debug instrumentation; the operations
    /// themselves police their local invariants with strict assertions.
    ///
    /// # Panics
    ///
    /// Panics on the first violated invariant.
    pub fn validate(&self) {
        assert!(!self.purging);

        let listed = self.list.iter(&self.arena).collect_vec();
        assert_eq!(listed.len(), self.list.len());
        assert_eq!(listed.iter().duplicates().count(), 0);
        assert_eq!(self.index.len(), self.entries - self.detached_entries);
        assert_eq!(listed.len(), self.index.len());

        let mut unlocked = 0;
        let mut attached_bytes = 0;
        for &id in &listed {
            let entry = &self.arena.slot(id).data;
            assert!(entry.is_in_index());
            assert!(entry.is_in_list());
            assert!(!entry.is_detached());
            assert_eq!(self.index.get(entry.key()).copied(), Some(id));
            if !entry.is_held() {
                unlocked += 1;
            }
            attached_bytes += entry.size();
        }
        assert_eq!(unlocked, self.unlocked);
        assert_eq!(attached_bytes, self.bytes - self.detached_bytes);

        let mut detached_entries = 0;
        let mut detached_bytes = 0;
        for (_, slot) in self.arena.iter() {
            let entry = &slot.data;
            if entry.is_detached() {
                assert!(!entry.is_in_index());
                assert!(!entry.is_in_list());
                assert!(slot.prev.is_none());
                assert!(slot.next.is_none());
                detached_entries += 1;
                detached_bytes += entry.size();
            } else {
                assert!(entry.is_attached());
            }
        }
        assert_eq!(detached_entries, self.detached_entries);
        assert_eq!(detached_bytes, self.detached_bytes);
        assert!(self.detached_entries <= self.entries);
        assert!(self.detached_bytes <= self.bytes);
        assert_eq!(self.arena.len(), self.entries);
        assert_eq!(self.entries == 0, self.bytes == 0);
        assert_eq!(self.detached_entries == 0, self.detached_bytes == 0);
    }
}

impl<K, R> Drop for ResourceCache<K, R>
where
    K: Key,
    R: Resource,
{
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.remove_all();
        }
    }
}
