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
use std::hash::Hash;

/// Key trait for the cache index.
///
/// A key is an opaque content fingerprint: compared by equality, hashed for
/// index lookup, and totally ordered. Two entries with equal keys are never
/// simultaneously indexed.
pub trait Key: Hash + Eq + Ord + Clone + Debug + 'static {}
impl<T> Key for T where T: Hash + Eq + Ord + Clone + Debug + 'static {}

/// Resource trait for cached content.
///
/// A resource is created, sized, and torn down by a resource-owning backend;
/// the cache only accounts for it and drops it exactly once when the owning
/// entry is destroyed. Release-on-drop is the destruction contract: a
/// resource that wraps an external object (a GPU buffer id, a texture) frees
/// it in its [`Drop`] implementation.
pub trait Resource: 'static {
    /// Byte size used for budget accounting.
    ///
    /// Sampled once when the resource enters the cache.
    fn size_bytes(&self) -> usize;
}

impl Resource for Vec<u8> {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

impl Resource for Box<[u8]> {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}
