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
//! Monomorphized operation tables
//!
//! [`ComponentOps`] captures the typed world operations of one component
//! type as plain function pointers. Code that only holds a type token or a
//! boxed payload (deferred commands, entity copies, codecs, world teardown)
//! dispatches through it without naming `T`.

use crate::ecs::{
    Component, ComponentPool, Entity, EntityId, ManagedResourceReleaseRequested, World,
};
use crate::error::{EcsError, Result};
use std::any::Any;

/// Type-erased component value
pub type ComponentPayload = Box<dyn Any + Send>;

/// Function table for one component type
#[derive(Clone, Copy)]
pub struct ComponentOps {
    pub(crate) name: &'static str,
    pub(crate) apply: fn(&mut World, Entity, ComponentPayload, bool) -> Result<()>,
    pub(crate) apply_same_as: fn(&mut World, Entity, Entity, bool) -> Result<()>,
    pub(crate) remove: fn(&mut World, Entity) -> Result<bool>,
    pub(crate) set_enabled: fn(&mut World, Entity, bool) -> Result<()>,
    pub(crate) notify_changed: fn(&mut World, Entity) -> Result<()>,
    pub(crate) set_max_capacity: fn(&mut World, usize) -> Result<usize>,
    pub(crate) release: fn(&World, EntityId),
    pub(crate) release_all: fn(&World),
}

impl ComponentOps {
    /// Table for `T`
    pub fn of<T: Component>() -> Self {
        ComponentOps {
            name: T::type_name(),
            apply: apply::<T>,
            apply_same_as: apply_same_as::<T>,
            remove: remove::<T>,
            set_enabled: set_enabled::<T>,
            notify_changed: notify_changed::<T>,
            set_max_capacity: set_max_capacity::<T>,
            release: release::<T>,
            release_all: release_all::<T>,
        }
    }

    /// Name of the component type
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl std::fmt::Debug for ComponentOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentOps").field("name", &self.name).finish()
    }
}

fn apply<T: Component>(
    world: &mut World,
    entity: Entity,
    payload: ComponentPayload,
    disabled: bool,
) -> Result<()> {
    let value = payload
        .downcast::<T>()
        .map_err(|_| EcsError::PayloadTypeMismatch {
            expected: T::type_name(),
        })?;

    if disabled {
        world.set_disabled(entity, *value)
    } else {
        world.set(entity, *value)
    }
}

fn apply_same_as<T: Component>(
    world: &mut World,
    entity: Entity,
    reference: Entity,
    disabled: bool,
) -> Result<()> {
    if disabled {
        world.set_same_as_disabled::<T>(entity, reference)
    } else {
        world.set_same_as::<T>(entity, reference)
    }
}

fn remove<T: Component>(world: &mut World, entity: Entity) -> Result<bool> {
    world.remove::<T>(entity)
}

fn set_enabled<T: Component>(world: &mut World, entity: Entity, enabled: bool) -> Result<()> {
    if enabled {
        world.enable_component::<T>(entity)
    } else {
        world.disable_component::<T>(entity)
    }
}

fn notify_changed<T: Component>(world: &mut World, entity: Entity) -> Result<()> {
    world.notify_changed::<T>(entity)
}

fn set_max_capacity<T: Component>(world: &mut World, max_capacity: usize) -> Result<usize> {
    world.set_max_capacity::<T>(max_capacity)
}

fn release<T: Component>(world: &World, entity_id: EntityId) {
    if !T::IS_MANAGED_RESOURCE {
        return;
    }

    if let Some(value) = world.pool::<T>().and_then(|pool| pool.get(entity_id)) {
        world.publish(&ManagedResourceReleaseRequested {
            value: value.clone(),
        });
    }
}

fn release_all<T: Component>(world: &World) {
    if !T::IS_MANAGED_RESOURCE {
        return;
    }

    let pool: &ComponentPool<T> = match world.pool::<T>() {
        Some(pool) => pool,
        None => return,
    };

    for (value, link) in pool.as_slice().iter().zip(pool.links()) {
        for _ in 0..link.reference_count {
            world.publish(&ManagedResourceReleaseRequested {
                value: value.clone(),
            });
        }
    }
}
