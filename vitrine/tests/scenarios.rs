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

use std::{cell::Cell, rc::Rc};

use rand::{rngs::SmallRng, Rng, SeedableRng};
use vitrine::{EntryHandle, Limits, LockMode, Resource, ResourceCache};

#[derive(Debug)]
struct SizedBlob {
    size: usize,
    drops: Rc<Cell<usize>>,
}

impl SizedBlob {
    fn new(size: usize, drops: &Rc<Cell<usize>>) -> Self {
        Self {
            size,
            drops: Rc::clone(drops),
        }
    }
}

impl Resource for SizedBlob {
    fn size_bytes(&self) -> usize {
        self.size
    }
}

impl Drop for SizedBlob {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

#[test]
fn test_lru_order_under_entry_budget() {
    let drops = Rc::new(Cell::new(0));
    let mut cache = ResourceCache::with_limits(Limits::new(2, usize::MAX));

    let a = cache.create_and_lock("a", SizedBlob::new(10, &drops));
    let b = cache.create_and_lock("b", SizedBlob::new(10, &drops));
    cache.release(a);
    cache.release(b);

    let c = cache.create_and_lock("c", SizedBlob::new(10, &drops));
    assert_eq!(cache.entries(), 2);
    assert!(!cache.contains("a"));
    assert!(cache.contains("b"));
    assert!(cache.contains("c"));
    assert_eq!(drops.get(), 1);

    cache.release(c);
    drop(cache);
    assert_eq!(drops.get(), 3);
}

#[test]
fn test_creation_over_budget_waits_for_release() {
    let drops = Rc::new(Cell::new(0));
    let mut cache = ResourceCache::with_limits(Limits::new(1, usize::MAX));

    let a = cache.create_and_lock("a", SizedBlob::new(10, &drops));
    let b = cache.create_and_lock("b", SizedBlob::new(10, &drops));

    // Held entries pin the cache over budget.
    assert!(cache.is_over_budget());
    assert_eq!(cache.unlocked(), 0);
    assert_eq!(drops.get(), 0);

    cache.release(a);
    assert!(!cache.contains("a"));
    assert!(cache.contains("b"));
    assert_eq!(drops.get(), 1);

    cache.release(b);
}

#[test]
fn test_detached_entry_outlives_teardown_without_double_release() {
    let drops = Rc::new(Cell::new(0));
    let mut cache = ResourceCache::with_limits(Limits::new(8, usize::MAX));

    let atlas = cache.create_and_lock("atlas", SizedBlob::new(64, &drops));
    let scratch = cache.create_and_lock("scratch", SizedBlob::new(16, &drops));
    cache.release(scratch);

    // Hand the atlas out of accounting entirely.
    cache.detach(atlas);
    assert_eq!(cache.detached_entries(), 1);
    assert_eq!(cache.entries(), 2);
    let blob = cache.take(atlas);
    assert_eq!(cache.entries(), 1);
    assert_eq!(cache.detached_entries(), 0);

    // Caller-side destruction, then teardown: every blob dropped once.
    drop(blob);
    assert_eq!(drops.get(), 1);
    cache.remove_all();
    assert_eq!(drops.get(), 2);
    cache.validate();
}

#[test]
fn test_handle_accessors() {
    let drops = Rc::new(Cell::new(0));
    let mut cache = ResourceCache::with_limits(Limits::new(8, usize::MAX));

    let handle = cache.create_and_lock("mesh", SizedBlob::new(48, &drops));
    assert_eq!(cache.key(handle), &"mesh");
    assert_eq!(cache.size(handle), 48);
    assert_eq!(cache.resource(handle).size_bytes(), 48);
    assert!(cache.is_held(handle));
    assert_eq!(cache.holds(handle), 1);
    assert!(!cache.is_detached(handle));

    cache.resource_mut(handle).size = 100;
    // Accounting keeps the size sampled at creation.
    assert_eq!(cache.size(handle), 48);
    assert_eq!(cache.bytes(), 48);

    cache.release(handle);
}

#[test_log::test]
fn test_stress_interleaving() {
    const KEYS: u64 = 32;
    const OPS: usize = 10_000;

    let drops = Rc::new(Cell::new(0));
    let mut cache: ResourceCache<u64, SizedBlob> =
        ResourceCache::with_limits(Limits::new(12, 4096));
    let mut rng = SmallRng::seed_from_u64(42);

    // Every element is one outstanding hold.
    let mut held: Vec<(u64, EntryHandle)> = vec![];
    let mut detached: Vec<(u64, EntryHandle)> = vec![];
    let mut created = 0usize;

    for i in 0..OPS {
        match rng.random_range(0..100u32) {
            // Find and hold.
            0..=34 => {
                let key = rng.random_range(0..KEYS);
                if let Some(handle) = cache.find_and_lock(&key, LockMode::Nested) {
                    held.push((key, handle));
                }
            }
            // Create, unless the key is live or parked in the detached set.
            35..=64 => {
                let key = rng.random_range(0..KEYS);
                if !cache.contains(&key) && !detached.iter().any(|(k, _)| *k == key) {
                    let size = rng.random_range(1..=256);
                    let handle = cache.create_and_lock(key, SizedBlob::new(size, &drops));
                    created += 1;
                    held.push((key, handle));
                }
            }
            // Release one hold.
            65..=89 => {
                if !held.is_empty() {
                    let pick = rng.random_range(0..held.len());
                    let (_, handle) = held.swap_remove(pick);
                    cache.release(handle);
                }
            }
            // Detach an entry we hold exactly once.
            90..=94 => {
                if !held.is_empty() {
                    let pick = rng.random_range(0..held.len());
                    let (key, handle) = held[pick];
                    if cache.holds(handle) == 1 {
                        cache.detach(handle);
                        held.swap_remove(pick);
                        detached.push((key, handle));
                    }
                }
            }
            // Bring a detached entry back, consuming its hold.
            _ => {
                if !detached.is_empty() {
                    let pick = rng.random_range(0..detached.len());
                    let (_, handle) = detached.swap_remove(pick);
                    cache.reattach_and_unlock(handle);
                }
            }
        }

        // Over budget only while nothing is evictable.
        if cache.is_over_budget() {
            assert_eq!(cache.unlocked(), 0);
        }
        if i % 64 == 0 {
            cache.validate();
        }
    }

    for (_, handle) in detached.drain(..) {
        cache.reattach_and_unlock(handle);
    }
    for (_, handle) in held.drain(..) {
        cache.release(handle);
    }
    cache.validate();
    assert!(!cache.is_over_budget());

    let stats = cache.stats();
    assert_eq!(stats.creations, created as u64);

    cache.remove_all();
    assert_eq!(drops.get(), created);
    cache.validate();
}
