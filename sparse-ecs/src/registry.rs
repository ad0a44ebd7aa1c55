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
//! Component type registry for codecs
//!
//! Serialization lives outside the store. A codec walks a world with
//! [`World::read_component_types`] and [`World::read_components`], writes
//! whatever it wants, and on the way back needs to turn a stored type name
//! into typed world operations. The [`ComponentTypeRegistry`] provides that
//! mapping: every component type is registered once, at startup, under a
//! stable token chosen by the application.
//!
//! The registry is an ordinary value owned by the codec. Nothing is global.
//!
//! # Example
//!
//! ```
//! use sparse_ecs::ecs::World;
//! use sparse_ecs::registry::ComponentTypeRegistry;
//!
//! let mut registry = ComponentTypeRegistry::new();
//! registry.register::<u32>("score").unwrap();
//!
//! let mut world = World::new();
//! let entity = world.create_entity().unwrap();
//! registry.set_boxed(&mut world, "score", entity, Box::new(12u32)).unwrap();
//!
//! assert_eq!(*world.get::<u32>(entity).unwrap(), 12);
//! ```

use crate::ecs::{Component, ComponentOps, ComponentPayload, ComponentTypeInfo, Entity, World};
use crate::error::{EcsError, Result};
use std::any::TypeId;
use std::collections::HashMap;

/// Explicit mapping from type tokens to component operations
#[derive(Debug, Default)]
pub struct ComponentTypeRegistry {
    /// Registered types indexed by token
    types: HashMap<String, ComponentOps>,
    /// Reverse index used when writing
    tokens: HashMap<TypeId, String>,
}

impl ComponentTypeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `token`
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateComponentType`] when the token or the type is
    /// already registered.
    pub fn register<T: Component>(&mut self, token: impl Into<String>) -> Result<()> {
        let token = token.into();
        let type_id = TypeId::of::<T>();

        if self.types.contains_key(&token) {
            return Err(EcsError::DuplicateComponentType(token));
        }
        if self.tokens.contains_key(&type_id) {
            return Err(EcsError::DuplicateComponentType(T::type_name().to_string()));
        }

        self.types.insert(token.clone(), ComponentOps::of::<T>());
        self.tokens.insert(type_id, token);
        Ok(())
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Whether `token` is registered
    pub fn contains(&self, token: &str) -> bool {
        self.types.contains_key(token)
    }

    /// Token of a type, as reported by [`ComponentTypeInfo::type_id`]
    pub fn token_of(&self, type_id: TypeId) -> Option<&str> {
        self.tokens.get(&type_id).map(String::as_str)
    }

    /// Token of `T`
    pub fn token_of_type<T: Component>(&self) -> Option<&str> {
        self.token_of(TypeId::of::<T>())
    }

    /// Registered tokens, sorted
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens: Vec<&str> = self.types.keys().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens
    }

    /// Operation table registered under `token`
    pub fn ops(&self, token: &str) -> Result<ComponentOps> {
        self.types
            .get(token)
            .copied()
            .ok_or_else(|| EcsError::UnknownComponentType(token.to_string()))
    }

    /// Pair every pool of the world with its token
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownComponentType`] for a pool whose type was never
    /// registered.
    pub fn describe(&self, world: &World) -> Result<Vec<(String, ComponentTypeInfo)>> {
        let mut described = Vec::new();
        let mut missing = None;

        world.read_component_types(|info| match self.token_of(info.type_id) {
            Some(token) => described.push((token.to_string(), *info)),
            None => {
                missing.get_or_insert_with(|| info.name.to_string());
            }
        });

        match missing {
            Some(name) => Err(EcsError::UnknownComponentType(name)),
            None => Ok(described),
        }
    }

    /// Apply [`World::set_max_capacity`] for the type of `token`
    pub fn set_max_capacity(&self, world: &mut World, token: &str, max_capacity: usize) -> Result<usize> {
        (self.ops(token)?.set_max_capacity)(world, max_capacity)
    }

    /// Store a boxed value, which must be of the type of `token`
    pub fn set_boxed(
        &self,
        world: &mut World,
        token: &str,
        entity: Entity,
        payload: ComponentPayload,
    ) -> Result<()> {
        (self.ops(token)?.apply)(world, entity, payload, false)
    }

    /// [`set_boxed`](Self::set_boxed), leaving the component disabled
    pub fn set_boxed_disabled(
        &self,
        world: &mut World,
        token: &str,
        entity: Entity,
        payload: ComponentPayload,
    ) -> Result<()> {
        (self.ops(token)?.apply)(world, entity, payload, true)
    }

    /// Apply [`World::set_same_as`] for the type of `token`
    pub fn set_same_as(
        &self,
        world: &mut World,
        token: &str,
        entity: Entity,
        reference: Entity,
    ) -> Result<()> {
        (self.ops(token)?.apply_same_as)(world, entity, reference, false)
    }

    /// Apply [`World::set_same_as_disabled`] for the type of `token`
    pub fn set_same_as_disabled(
        &self,
        world: &mut World,
        token: &str,
        entity: Entity,
        reference: Entity,
    ) -> Result<()> {
        (self.ops(token)?.apply_same_as)(world, entity, reference, true)
    }

    /// Apply [`World::remove`] for the type of `token`
    pub fn remove(&self, world: &mut World, token: &str, entity: Entity) -> Result<bool> {
        (self.ops(token)?.remove)(world, entity)
    }
}
