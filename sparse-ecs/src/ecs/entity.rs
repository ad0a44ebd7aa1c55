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
//! Entity identifiers and handles
//!
//! An [`Entity`] is a plain `(WorldId, EntityId)` pair. It owns no storage:
//! every operation on it is routed through the [`World`](crate::ecs::World)
//! that issued it. Identifiers are reused after disposal; the world tears
//! down every reference to a disposed id before handing it out again, so no
//! generation counter is carried.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a world
///
/// Zero is never issued, which keeps `Entity::default()` invalid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WorldId(u16);

impl WorldId {
    /// Create a WorldId from its raw value
    pub const fn new(id: u16) -> Self {
        WorldId(id)
    }

    /// Get the raw value
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "World({})", self.0)
    }
}

/// Index of an entity inside its world
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityId(u32);

impl EntityId {
    /// Create a new EntityId from a raw u32 value
    pub const fn new(id: u32) -> Self {
        EntityId(id)
    }

    /// Get the raw u32 value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// The id as a slot index into sparse arrays
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle addressing one entity of one world
///
/// Equality is structural. The default handle is the "no entity" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Entity {
    world: WorldId,
    id: EntityId,
}

impl Entity {
    /// Create a handle from its parts
    pub const fn new(world: WorldId, id: EntityId) -> Self {
        Entity { world, id }
    }

    /// The world that issued this handle
    pub const fn world_id(&self) -> WorldId {
        self.world
    }

    /// The entity id inside its world
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Whether this is the null handle
    pub fn is_null(&self) -> bool {
        self.world.0 == 0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "Entity(null)")
        } else {
            write!(f, "Entity({}:{})", self.world.0, self.id.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_creation() {
        let entity = Entity::new(WorldId::new(2), EntityId::new(42));
        assert_eq!(entity.id().raw(), 42);
        assert_eq!(entity.world_id().raw(), 2);
        assert!(!entity.is_null());
    }

    #[test]
    fn test_default_entity_is_null() {
        let entity = Entity::default();
        assert!(entity.is_null());
        assert_eq!(entity.to_string(), "Entity(null)");
    }

    #[test]
    fn test_entity_equality() {
        let e1 = Entity::new(WorldId::new(1), EntityId::new(1));
        let e2 = Entity::new(WorldId::new(1), EntityId::new(1));
        let e3 = Entity::new(WorldId::new(2), EntityId::new(1));
        assert_eq!(e1, e2);
        assert_ne!(e1, e3);
    }
}
