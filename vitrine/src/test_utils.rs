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

//! Test utilities.

use std::{cell::Cell, rc::Rc};

use vitrine_common::code::Resource;

/// Shared tally of destroyed [`TestResource`]s.
#[derive(Debug, Default, Clone)]
pub struct DropCounter(Rc<Cell<usize>>);

impl DropCounter {
    /// How many resources tracking this counter have been dropped so far.
    pub fn count(&self) -> usize {
        self.0.get()
    }
}

/// Fixed-size resource that records its destruction.
///
/// The counter proves the release-exactly-once contract: every construction
/// must be matched by exactly one drop, no matter which path (eviction,
/// teardown, caller-side consumption) destroys the entry.
#[derive(Debug)]
pub struct TestResource {
    size: usize,
    drops: DropCounter,
}

impl TestResource {
    /// Creates a resource of `size` accounted bytes tracking `drops`.
    pub fn new(size: usize, drops: &DropCounter) -> Self {
        Self {
            size,
            drops: drops.clone(),
        }
    }
}

impl Resource for TestResource {
    fn size_bytes(&self) -> usize {
        self.size
    }
}

impl Drop for TestResource {
    fn drop(&mut self) {
        self.drops.0.set(self.drops.0.get() + 1);
    }
}
