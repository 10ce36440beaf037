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

use serde::{Deserialize, Serialize};

/// Activity counters, copied out by [`ResourceCache::stats`].
///
/// Counters are cumulative over the cache lifetime and are not part of the
/// budget accounting; teardown does not reset them.
///
/// [`ResourceCache::stats`]: crate::ResourceCache::stats
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups that found an indexed entry.
    pub hits: u64,
    /// Lookups that missed.
    pub misses: u64,
    /// Entries created.
    pub creations: u64,
    /// Entries destroyed by the eviction sweep.
    pub evictions: u64,
    /// Entries handed out of cache accounting.
    pub detaches: u64,
    /// Detached entries returned to cache accounting.
    pub reattaches: u64,
    /// Detached entries consumed by the caller.
    pub takes: u64,
}
