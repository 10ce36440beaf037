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

//! vitrine is a budget-aware cache for expensive GPU resources.
//!
//! The cache maps opaque content keys to resources owned by a rendering
//! backend. Held entries are never evicted; unheld entries are reclaimed in
//! least-recently-used order once the configured entry-count or byte budget
//! is exceeded. Entries can be detached from accounting to hand exclusive
//! ownership to another subsystem and later reattached or consumed.
//!
//! The cache is a single-owner, single-threaded component: the API takes
//! `&mut self` and uses no locks. Contract violations are programming errors
//! and panic.
//!
//! # Example
//!
//! ```
//! use vitrine::{Limits, LockMode, ResourceCache};
//!
//! let mut cache: ResourceCache<u64, Vec<u8>> =
//!     ResourceCache::with_limits(Limits::new(128, 64 << 20));
//!
//! let handle = cache.create_and_lock(0xfeed, vec![0u8; 4096]);
//! assert_eq!(cache.resource(handle).len(), 4096);
//! cache.release(handle);
//!
//! let handle = cache
//!     .find_and_lock(&0xfeed, LockMode::Single)
//!     .expect("still cached");
//! cache.release(handle);
//! ```

mod arena;
mod cache;
mod entry;
mod list;
mod stats;

pub mod prelude;
pub use prelude::*;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
