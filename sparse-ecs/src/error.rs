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
//! Error types
//!
//! Every fallible operation of the store reports an [`EcsError`]. Capacity
//! exhaustion and the use of dead or foreign handles are configuration or
//! programmer errors: they are surfaced immediately and never retried.

use crate::ecs::{Entity, WorldId};

/// Errors raised by the world, its pools and the boundary helpers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EcsError {
    /// The world already holds its maximum number of live entities
    #[error("max number of entities reached ({max})")]
    MaxEntityCountReached {
        /// Configured world capacity
        max: usize,
    },

    /// Every world id is held by a live world
    #[error("max number of worlds reached ({max})")]
    MaxWorldCountReached {
        /// Number of distinct world ids
        max: usize,
    },

    /// A non-flag pool is full
    #[error("max number of components of type {component} reached ({max})")]
    MaxComponentCountReached {
        /// Component type name
        component: &'static str,
        /// Capacity of the pool
        max: usize,
    },

    /// The handle refers to an entity that has been disposed
    #[error("{0} is not alive")]
    EntityNotAlive(Entity),

    /// The handle is the null handle or belongs to another world
    #[error("{entity} does not belong to world {world}")]
    ForeignEntity {
        /// Offending handle
        entity: Entity,
        /// World the operation was issued on
        world: WorldId,
    },

    /// The entity does not hold the requested component
    #[error("{entity} has no component of type {component}")]
    ComponentNotFound {
        /// Entity looked up
        entity: Entity,
        /// Component type name
        component: &'static str,
    },

    /// The world ran out of component flag bits
    #[error("too many component types registered (max {max})")]
    TooManyComponentTypes {
        /// Number of distinct component types a world can track
        max: usize,
    },

    /// The pool for this type already exists with a different capacity
    #[error("max capacity for component type {component} already set to {current}")]
    CapacityAlreadySet {
        /// Component type name
        component: &'static str,
        /// Capacity the pool was created with
        current: usize,
    },

    /// No operations are registered under this type token
    #[error("unknown component type '{0}'")]
    UnknownComponentType(String),

    /// The type token or type is already registered
    #[error("component type '{0}' is already registered")]
    DuplicateComponentType(String),

    /// A type-erased payload did not hold the expected component type
    #[error("payload is not a value of component type {expected}")]
    PayloadTypeMismatch {
        /// Component type name the applier expected
        expected: &'static str,
    },

    /// A recorded command referenced an entity that was never created
    #[error("command target #{0} does not refer to a created entity")]
    UnresolvedCommandTarget(usize),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, EcsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EntityId;

    #[test]
    fn test_error_messages() {
        let err = EcsError::MaxComponentCountReached { component: "bool", max: 4 };
        assert_eq!(err.to_string(), "max number of components of type bool reached (4)");

        let entity = Entity::new(WorldId::new(1), EntityId::new(3));
        let err = EcsError::EntityNotAlive(entity);
        assert!(err.to_string().contains("not alive"));
    }
}
