// Copyright 2025 John Brosnihan
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
//! World configuration
//!
//! A [`WorldConfig`] fixes the entity capacity of a world and may pre-size
//! individual component pools. Pools not listed here are bounded by the
//! world capacity.

use crate::ecs::Component;
use std::any::TypeId;
use std::collections::HashMap;

/// Largest capacity a world accepts, matching the 31-bit id range
pub const DEFAULT_MAX_CAPACITY: usize = i32::MAX as usize;

/// Configuration consumed by [`World::with_config`](crate::ecs::World::with_config)
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Maximum number of simultaneously live entities
    pub max_capacity: usize,
    /// Per-type pool capacities, applied when the pool is created
    pub component_capacities: HashMap<TypeId, usize>,
    /// Emit a `trace!` event for every published message
    pub log_events: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        WorldConfig {
            max_capacity: DEFAULT_MAX_CAPACITY,
            component_capacities: HashMap::new(),
            log_events: false,
        }
    }
}

impl WorldConfig {
    /// Create a configuration with a fixed entity capacity
    pub fn new(max_capacity: usize) -> Self {
        WorldConfig {
            max_capacity: max_capacity.min(DEFAULT_MAX_CAPACITY),
            ..Self::default()
        }
    }

    /// Bound the pool of `T` below the world capacity
    pub fn with_component_capacity<T: Component>(mut self, max_capacity: usize) -> Self {
        self.component_capacities
            .insert(TypeId::of::<T>(), max_capacity);
        self
    }

    /// Enable logging of every published message
    pub fn with_event_logging(mut self) -> Self {
        self.log_events = true;
        self
    }

    /// Capacity configured for `type_id`, bounded by the world capacity
    pub(crate) fn component_capacity(&self, type_id: TypeId) -> usize {
        self.component_capacities
            .get(&type_id)
            .copied()
            .unwrap_or(self.max_capacity)
            .min(self.max_capacity)
    }
}
