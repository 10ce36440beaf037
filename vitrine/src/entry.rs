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

use bitflags::bitflags;
use vitrine_common::code::{Key, Resource};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct Flags: u8 {
        const IN_INDEX = 0b001;
        const IN_LIST = 0b010;
        const DETACHED = 0b100;
    }
}

/// The cache's bookkeeping wrapper around one resource.
///
/// An entry is the unique owner of its resource; dropping the entry drops
/// the resource, which is therefore released exactly once. The byte size is
/// sampled at construction and kept stable for accounting.
pub(crate) struct Entry<K, R>
where
    K: Key,
    R: Resource,
{
    key: K,
    resource: R,
    size: usize,
    holds: usize,
    flags: Flags,
}

impl<K, R> Debug for Entry<K, R>
where
    K: Key,
    R: Resource,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("size", &self.size)
            .field("holds", &self.holds)
            .field("flags", &self.flags)
            .finish()
    }
}

impl<K, R> Entry<K, R>
where
    K: Key,
    R: Resource,
{
    pub(crate) fn new(key: K, resource: R) -> Self {
        let size = resource.size_bytes();
        Self {
            key,
            resource,
            size,
            holds: 0,
            flags: Flags::empty(),
        }
    }

    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    pub(crate) fn resource(&self) -> &R {
        &self.resource
    }

    pub(crate) fn resource_mut(&mut self) -> &mut R {
        &mut self.resource
    }

    /// Consumes the entry, handing the resource to the caller.
    pub(crate) fn into_resource(self) -> R {
        self.resource
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn holds(&self) -> usize {
        self.holds
    }

    pub(crate) fn is_held(&self) -> bool {
        self.holds > 0
    }

    pub(crate) fn hold(&mut self) {
        let old = self.holds;
        self.holds = old + 1;
        tracing::trace!("[entry]: hold {:?}: {} => {}", self.key, old, old + 1);
    }

    pub(crate) fn release(&mut self) {
        assert!(
            self.holds > 0,
            "release of an entry that is not held: {:?}",
            self.key
        );
        let old = self.holds;
        self.holds = old - 1;
        tracing::trace!("[entry]: release {:?}: {} => {}", self.key, old, old - 1);
    }

    pub(crate) fn set_in_index(&mut self, val: bool) {
        self.flags.set(Flags::IN_INDEX, val);
    }

    pub(crate) fn is_in_index(&self) -> bool {
        self.flags.contains(Flags::IN_INDEX)
    }

    pub(crate) fn set_in_list(&mut self, val: bool) {
        self.flags.set(Flags::IN_LIST, val);
    }

    pub(crate) fn is_in_list(&self) -> bool {
        self.flags.contains(Flags::IN_LIST)
    }

    pub(crate) fn set_detached(&mut self, val: bool) {
        self.flags.set(Flags::DETACHED, val);
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.flags.contains(Flags::DETACHED)
    }

    /// An entry is attached when it is both indexed and listed.
    pub(crate) fn is_attached(&self) -> bool {
        self.flags.contains(Flags::IN_INDEX | Flags::IN_LIST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{DropCounter, TestResource};

    #[test]
    fn test_hold_release() {
        let drops = DropCounter::default();
        let mut entry = Entry::new(42u64, TestResource::new(16, &drops));
        assert!(!entry.is_held());

        entry.hold();
        entry.hold();
        assert_eq!(entry.holds(), 2);
        assert!(entry.is_held());

        entry.release();
        assert!(entry.is_held());
        entry.release();
        assert!(!entry.is_held());
    }

    #[test]
    #[should_panic(expected = "release of an entry that is not held")]
    fn test_release_unheld() {
        let drops = DropCounter::default();
        let mut entry = Entry::new(42u64, TestResource::new(16, &drops));
        entry.release();
    }

    #[test]
    fn test_drop_releases_resource_once() {
        let drops = DropCounter::default();
        let entry = Entry::new(42u64, TestResource::new(16, &drops));
        assert_eq!(entry.size(), 16);
        assert_eq!(drops.count(), 0);
        drop(entry);
        assert_eq!(drops.count(), 1);
    }

    #[test]
    fn test_flags() {
        let drops = DropCounter::default();
        let mut entry = Entry::new(7u64, TestResource::new(1, &drops));
        assert!(!entry.is_attached());

        entry.set_in_index(true);
        entry.set_in_list(true);
        assert!(entry.is_attached());
        assert!(!entry.is_detached());

        entry.set_in_index(false);
        entry.set_in_list(false);
        entry.set_detached(true);
        assert!(!entry.is_attached());
        assert!(entry.is_detached());
    }
}
