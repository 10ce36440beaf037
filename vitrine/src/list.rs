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

use vitrine_common::{strict_assert, strict_assert_eq};

use crate::arena::{EntryArena, EntryId};

/// Doubly linked recency order over arena slots, head (MRU) to tail (LRU).
///
/// The list owns no storage: `prev`/`next` ids live in the arena slots, and
/// every operation takes the arena alongside. `next` points toward the tail,
/// `prev` toward the head.
#[derive(Debug, Default)]
pub(crate) struct RecencyList {
    head: Option<EntryId>,
    tail: Option<EntryId>,
    len: usize,
}

impl RecencyList {
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn head(&self) -> Option<EntryId> {
        self.head
    }

    pub(crate) fn tail(&self) -> Option<EntryId> {
        self.tail
    }

    /// Links an unlinked slot in at the head (most-recently-used position).
    pub(crate) fn push_head<T>(&mut self, arena: &mut EntryArena<T>, id: EntryId) {
        let old_head = self.head;
        {
            let slot = arena.slot_mut(id);
            strict_assert!(slot.prev.is_none());
            strict_assert!(slot.next.is_none());
            slot.next = old_head;
        }
        match old_head {
            Some(head) => arena.slot_mut(head).prev = Some(id),
            None => {
                strict_assert!(self.tail.is_none());
                self.tail = Some(id);
            }
        }
        self.head = Some(id);
        self.len += 1;
    }

    /// Unlinks a slot from wherever it currently is in the order.
    pub(crate) fn unlink<T>(&mut self, arena: &mut EntryArena<T>, id: EntryId) {
        let (prev, next) = {
            let slot = arena.slot_mut(id);
            (slot.prev.take(), slot.next.take())
        };
        match prev {
            Some(prev) => arena.slot_mut(prev).next = next,
            None => {
                strict_assert_eq!(self.head, Some(id));
                self.head = next;
            }
        }
        match next {
            Some(next) => arena.slot_mut(next).prev = prev,
            None => {
                strict_assert_eq!(self.tail, Some(id));
                self.tail = prev;
            }
        }
        self.len -= 1;
    }

    /// The neighbor one step toward the head, used by the eviction sweep.
    pub(crate) fn toward_head<T>(&self, arena: &EntryArena<T>, id: EntryId) -> Option<EntryId> {
        arena.slot(id).prev
    }

    /// Iterates ids from head (MRU) to tail (LRU).
    pub(crate) fn iter<'a, T>(
        &'a self,
        arena: &'a EntryArena<T>,
    ) -> impl Iterator<Item = EntryId> + 'a {
        std::iter::successors(self.head, move |&id| arena.slot(id).next)
    }
}
