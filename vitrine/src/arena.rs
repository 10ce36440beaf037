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

use std::fmt::Debug;

use vitrine_common::{strict_assert, strict_assert_eq};

/// Stable address of an entry slot.
///
/// Carries a generation tag so an id that outlives its entry can be told
/// apart from the id of a later entry that recycled the same slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct EntryId {
    index: u32,
    generation: u32,
}

impl Debug for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EntryId({}v{})", self.index, self.generation)
    }
}

/// One occupied arena slot: the stored value plus its recency-list links.
///
/// Links are `None` while the value is not linked into any list.
pub(crate) struct Slot<T> {
    pub(crate) prev: Option<EntryId>,
    pub(crate) next: Option<EntryId>,
    pub(crate) data: T,
}

struct SlotCell<T> {
    generation: u32,
    slot: Option<Slot<T>>,
}

/// Slab of all values owned by the cache, addressed by [`EntryId`].
///
/// Freed slots are recycled through a free list; their generation is bumped
/// on removal so stale ids never resolve.
pub(crate) struct EntryArena<T> {
    cells: Vec<SlotCell<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> Default for EntryArena<T> {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }
}

impl<T> EntryArena<T> {
    pub(crate) fn insert(&mut self, data: T) -> EntryId {
        let index = match self.free.pop() {
            Some(index) => index as usize,
            None => {
                self.cells.push(SlotCell {
                    generation: 0,
                    slot: None,
                });
                self.cells.len() - 1
            }
        };
        let cell = &mut self.cells[index];
        strict_assert!(cell.slot.is_none());
        cell.slot = Some(Slot {
            prev: None,
            next: None,
            data,
        });
        self.len += 1;
        EntryId {
            index: index as u32,
            generation: cell.generation,
        }
    }

    /// Removes a value and returns it. The slot must be unlinked first.
    pub(crate) fn remove(&mut self, id: EntryId) -> T {
        let cell = &mut self.cells[id.index as usize];
        assert_eq!(
            cell.generation, id.generation,
            "stale entry id: {id:?} refers to a recycled slot"
        );
        let slot = cell.slot.take().expect("stale entry id: slot is vacant");
        strict_assert!(slot.prev.is_none());
        strict_assert!(slot.next.is_none());
        cell.generation = cell.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        slot.data
    }

    pub(crate) fn get(&self, id: EntryId) -> Option<&Slot<T>> {
        self.cells
            .get(id.index as usize)
            .filter(|cell| cell.generation == id.generation)
            .and_then(|cell| cell.slot.as_ref())
    }

    /// Resolves an id that is required to be live.
    pub(crate) fn slot(&self, id: EntryId) -> &Slot<T> {
        self.get(id)
            .unwrap_or_else(|| panic!("stale entry id: {id:?}"))
    }

    /// Mutable counterpart of [`EntryArena::slot`].
    pub(crate) fn slot_mut(&mut self, id: EntryId) -> &mut Slot<T> {
        let cell = self
            .cells
            .get_mut(id.index as usize)
            .filter(|cell| cell.generation == id.generation);
        match cell.and_then(|cell| cell.slot.as_mut()) {
            Some(slot) => slot,
            None => panic!("stale entry id: {id:?}"),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (EntryId, &Slot<T>)> {
        self.cells.iter().enumerate().filter_map(|(index, cell)| {
            cell.slot.as_ref().map(|slot| {
                (
                    EntryId {
                        index: index as u32,
                        generation: cell.generation,
                    },
                    slot,
                )
            })
        })
    }
}

impl<T> Drop for EntryArena<T> {
    fn drop(&mut self) {
        strict_assert_eq!(self.len, self.cells.iter().filter(|c| c.slot.is_some()).count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove_reuse() {
        let mut arena = EntryArena::default();
        let a = arena.insert("a");
        let b = arena.insert("b");
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.slot(a).data, "a");
        assert_eq!(arena.slot(b).data, "b");

        assert_eq!(arena.remove(a), "a");
        assert_eq!(arena.len(), 1);

        // The freed slot is recycled under a fresh generation.
        let c = arena.insert("c");
        assert_eq!(c.index, a.index);
        assert_ne!(c.generation, a.generation);
        assert_eq!(arena.slot(c).data, "c");
    }

    #[test]
    fn test_stale_id_does_not_resolve() {
        let mut arena = EntryArena::default();
        let a = arena.insert(1u32);
        arena.remove(a);
        let b = arena.insert(2u32);
        assert_eq!(b.index, a.index);
        assert!(arena.get(a).is_none());
        assert_eq!(arena.get(b).map(|slot| slot.data), Some(2));
    }

    #[test]
    #[should_panic(expected = "stale entry id")]
    fn test_stale_id_panics_when_required() {
        let mut arena = EntryArena::default();
        let a = arena.insert(1u32);
        arena.remove(a);
        arena.slot(a);
    }

    #[test]
    fn test_iter_skips_vacant_slots() {
        let mut arena = EntryArena::default();
        let ids: Vec<_> = (0..4).map(|i| arena.insert(i)).collect();
        arena.remove(ids[1]);
        arena.remove(ids[3]);
        let live: Vec<_> = arena.iter().map(|(_, slot)| slot.data).collect();
        assert_eq!(live, vec![0, 2]);
    }
}
