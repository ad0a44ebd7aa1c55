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
//! World management
//!
//! The World is the central container for all ECS data. It issues entity
//! ids, enforces the entity and component capacities, owns one
//! [`ComponentPool`] per component type and hosts the [`MessageBus`] every
//! live query listens to.
//!
//! Every structural mutation follows the same order: the pool is updated,
//! the entity's [`ComponentFlags`] are updated, and only then is the
//! matching message published. Handlers therefore always observe the state
//! after the change.

use crate::config::WorldConfig;
use crate::ecs::ops::{ComponentOps, ComponentPayload};
use crate::ecs::pool::AnyPool;
use crate::ecs::{
    Component, ComponentAdded, ComponentChanged, ComponentEnabledStateChanged, ComponentFlag,
    ComponentFlags, ComponentPool, ComponentRemoved, ComponentTypeInfo, Entity, EntityCopyRequested,
    EntityCreated, EntityDisposed, EntityDisposing, EntityEnabledStateChanged, EntityId,
    EntityRuleBuilder, ManagedResourceAcquireRequested, ManagedResourceReleaseRequested,
    MessageBus, Subscription, WorldDisposed, WorldId, WorldView, MAX_COMPONENT_TYPES,
};
use crate::error::{EcsError, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, trace, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

static WORLD_IDS: Mutex<WorldIdPool> = Mutex::new(WorldIdPool::new(u16::MAX));

/// Allocator of world ids; id 0 is never issued
///
/// Ids of dropped worlds are reused, so at most `max` worlds are alive at
/// once.
#[derive(Debug)]
struct WorldIdPool {
    next: u16,
    max: u16,
    free: Vec<u16>,
}

impl WorldIdPool {
    const fn new(max: u16) -> Self {
        WorldIdPool {
            next: 1,
            max,
            free: Vec::new(),
        }
    }

    fn acquire(&mut self) -> Result<WorldId> {
        if let Some(id) = self.free.pop() {
            return Ok(WorldId::new(id));
        }
        if self.next == 0 || self.next > self.max {
            return Err(EcsError::MaxWorldCountReached {
                max: self.max as usize,
            });
        }

        let id = self.next;
        // Wraps to 0 once u16::MAX is handed out, which reads as exhausted
        self.next = self.next.wrapping_add(1);
        Ok(WorldId::new(id))
    }

    fn release(&mut self, id: WorldId) {
        self.free.push(id.raw());
    }
}

fn world_ids() -> std::sync::MutexGuard<'static, WorldIdPool> {
    WORLD_IDS.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, Default)]
struct EntityInfo {
    alive: bool,
    components: ComponentFlags,
}

struct ComponentEntry {
    flag: ComponentFlag,
    ops: ComponentOps,
    max_capacity: usize,
    pool: Option<Box<dyn AnyPool>>,
}

/// One component of an entity, as seen by a codec
#[derive(Clone, Copy)]
pub struct ComponentRef<'w> {
    /// Type of the component
    pub info: ComponentTypeInfo,
    /// Entity reported as the owner of the value; differs from the visited
    /// entity when the value is shared
    pub representative: Entity,
    /// The value, downcast with [`ComponentRef::downcast_ref`]
    pub value: &'w dyn Any,
    /// Whether the component is enabled on the visited entity
    pub enabled: bool,
}

impl<'w> ComponentRef<'w> {
    /// The value as a `T`, if that is its type
    pub fn downcast_ref<T: Component>(&self) -> Option<&'w T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for ComponentRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("component", &self.info.name)
            .field("representative", &self.representative)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// The main ECS world container
///
/// # Example
///
/// ```
/// use sparse_ecs::ecs::World;
///
/// let mut world = World::with_capacity(8);
/// let entity = world.create_entity().unwrap();
///
/// world.set(entity, 42u32).unwrap();
/// assert_eq!(*world.get::<u32>(entity).unwrap(), 42);
///
/// world.dispose(entity).unwrap();
/// assert!(!world.is_alive(entity));
/// ```
pub struct World {
    id: WorldId,
    max_capacity: usize,
    config: WorldConfig,
    next_entity_id: u32,
    free_ids: Vec<EntityId>,
    infos: Vec<EntityInfo>,
    entity_count: usize,
    components: Vec<ComponentEntry>,
    component_index: HashMap<TypeId, usize>,
    bus: MessageBus,
}

impl World {
    /// Create a world bounded only by the id range
    ///
    /// # Panics
    ///
    /// Panics when 65535 worlds are already alive, see
    /// [`try_with_config`](Self::try_with_config).
    pub fn new() -> Self {
        Self::with_config(WorldConfig::default())
    }

    /// Create a world holding at most `max_capacity` live entities
    ///
    /// # Panics
    ///
    /// Panics when 65535 worlds are already alive.
    pub fn with_capacity(max_capacity: usize) -> Self {
        Self::with_config(WorldConfig::new(max_capacity))
    }

    /// Create a world from a full configuration
    ///
    /// # Panics
    ///
    /// Panics when 65535 worlds are already alive.
    pub fn with_config(config: WorldConfig) -> Self {
        match Self::try_with_config(config) {
            Ok(world) => world,
            Err(err) => panic!("{}", err),
        }
    }

    /// Create a world from a full configuration
    ///
    /// World ids are 16 bits wide and recycled when a world is dropped.
    ///
    /// # Errors
    ///
    /// [`EcsError::MaxWorldCountReached`] when every id is taken by a live
    /// world.
    pub fn try_with_config(config: WorldConfig) -> Result<Self> {
        let id = world_ids().acquire()?;
        debug!(world = id.raw(), max_capacity = config.max_capacity, "world created");

        Ok(World {
            id,
            max_capacity: config.max_capacity,
            config,
            next_entity_id: 0,
            free_ids: Vec::new(),
            infos: Vec::new(),
            entity_count: 0,
            components: Vec::new(),
            component_index: HashMap::new(),
            bus: MessageBus::new(),
        })
    }

    /// Id of this world, carried by every entity it issues
    pub fn id(&self) -> WorldId {
        self.id
    }

    /// Maximum number of simultaneously live entities
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entity_count
    }

    /// The bus of this world
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    // --- entities ---------------------------------------------------------

    /// Create a new enabled entity
    ///
    /// # Errors
    ///
    /// [`EcsError::MaxEntityCountReached`] when the world is full.
    pub fn create_entity(&mut self) -> Result<Entity> {
        self.spawn(true)
    }

    /// Create a new entity that starts disabled
    pub fn create_disabled_entity(&mut self) -> Result<Entity> {
        self.spawn(false)
    }

    fn spawn(&mut self, enabled: bool) -> Result<Entity> {
        if self.entity_count >= self.max_capacity {
            warn!(world = self.id.raw(), max = self.max_capacity, "entity capacity reached");
            return Err(EcsError::MaxEntityCountReached {
                max: self.max_capacity,
            });
        }

        let id = match self.free_ids.pop() {
            Some(id) => id,
            None => {
                let id = EntityId::new(self.next_entity_id);
                self.next_entity_id += 1;
                id
            }
        };

        if id.index() >= self.infos.len() {
            self.infos.resize(id.index() + 1, EntityInfo::default());
        }

        let mut components = ComponentFlags::empty();
        components.set(ComponentFlag::IS_ENABLED, enabled);
        self.infos[id.index()] = EntityInfo {
            alive: true,
            components,
        };
        self.entity_count += 1;

        let entity = Entity::new(self.id, id);
        self.publish(&EntityCreated { entity });

        Ok(entity)
    }

    /// Check if an entity is alive in this world
    pub fn is_alive(&self, entity: Entity) -> bool {
        entity.world_id() == self.id
            && self
                .infos
                .get(entity.id().index())
                .map_or(false, |info| info.alive)
    }

    fn check(&self, entity: Entity) -> Result<()> {
        if entity.world_id() != self.id {
            return Err(EcsError::ForeignEntity {
                entity,
                world: self.id,
            });
        }

        if !self.is_alive(entity) {
            return Err(EcsError::EntityNotAlive(entity));
        }

        Ok(())
    }

    /// Dispose an entity and every component it holds
    ///
    /// Publishes [`EntityDisposing`] while the components are still
    /// readable, drops every component (releasing managed resources), then
    /// publishes [`EntityDisposed`]. The id is reused afterwards.
    pub fn dispose(&mut self, entity: Entity) -> Result<()> {
        self.check(entity)?;
        self.publish(&EntityDisposing { entity });

        let id = entity.id();
        for index in 0..self.components.len() {
            let held = self.components[index]
                .pool
                .as_ref()
                .map_or(false, |pool| pool.has(id));
            if !held {
                continue;
            }

            let release = self.components[index].ops.release;
            release(self, id);

            if let Some(pool) = self.components[index].pool.as_mut() {
                pool.remove(id);
            }
        }

        self.infos[id.index()] = EntityInfo::default();
        self.entity_count -= 1;
        self.publish(&EntityDisposed { entity });
        self.free_ids.push(id);

        trace!(world = self.id.raw(), entity = id.raw(), "entity disposed");
        Ok(())
    }

    /// Enable an entity so live queries consider it again
    pub fn enable(&mut self, entity: Entity) -> Result<()> {
        self.set_entity_enabled(entity, true)
    }

    /// Disable an entity; every live query drops it
    pub fn disable(&mut self, entity: Entity) -> Result<()> {
        self.set_entity_enabled(entity, false)
    }

    fn set_entity_enabled(&mut self, entity: Entity, enabled: bool) -> Result<()> {
        self.check(entity)?;

        let info = &mut self.infos[entity.id().index()];
        if info.components.set(ComponentFlag::IS_ENABLED, enabled) {
            let components = info.components;
            self.publish(&EntityEnabledStateChanged {
                entity,
                enabled,
                components,
            });
        }

        Ok(())
    }

    /// Whether the entity is alive and enabled
    pub fn is_enabled(&self, entity: Entity) -> bool {
        self.component_flags(entity)
            .contains(ComponentFlag::IS_ENABLED)
    }

    /// Enabled flags of the entity; empty for dead or foreign handles
    pub fn component_flags(&self, entity: Entity) -> ComponentFlags {
        if !self.is_alive(entity) {
            return ComponentFlags::empty();
        }
        self.infos[entity.id().index()].components
    }

    /// Iterate all live entities in id order
    pub fn alive_entities(&self) -> impl Iterator<Item = Entity> + '_ {
        let world = self.id;
        self.infos
            .iter()
            .enumerate()
            .filter(|(_, info)| info.alive)
            .map(move |(id, _)| Entity::new(world, EntityId::new(id as u32)))
    }

    /// Start describing a live query over this world's entities
    pub fn entities(&mut self) -> EntityRuleBuilder<'_> {
        EntityRuleBuilder::new(self)
    }

    // --- component registry ------------------------------------------------

    fn find_index<T: Component>(&self) -> Option<usize> {
        self.component_index.get(&TypeId::of::<T>()).copied()
    }

    fn type_index<T: Component>(&mut self) -> Result<usize> {
        let type_id = TypeId::of::<T>();
        if let Some(&index) = self.component_index.get(&type_id) {
            return Ok(index);
        }

        let index = self.components.len();
        if index >= MAX_COMPONENT_TYPES {
            return Err(EcsError::TooManyComponentTypes {
                max: MAX_COMPONENT_TYPES,
            });
        }

        let max_capacity = if T::IS_FLAG {
            1
        } else {
            self.config.component_capacity(type_id)
        };

        self.components.push(ComponentEntry {
            flag: ComponentFlag::for_type_index(index),
            ops: ComponentOps::of::<T>(),
            max_capacity,
            pool: None,
        });
        self.component_index.insert(type_id, index);

        Ok(index)
    }

    /// Flag bit assigned to `T` in this world, registering the type
    pub(crate) fn component_flag<T: Component>(&mut self) -> Result<ComponentFlag> {
        let index = self.type_index::<T>()?;
        Ok(self.components[index].flag)
    }

    fn pool_at<T: Component>(&mut self, index: usize) -> &mut ComponentPool<T> {
        let world_id = self.id;
        let world_max = self.max_capacity;
        let entry = &mut self.components[index];

        let pool = entry.pool.get_or_insert_with(|| {
            debug!(
                world = world_id.raw(),
                component = T::type_name(),
                max_capacity = entry.max_capacity,
                "component pool created"
            );
            Box::new(ComponentPool::<T>::new(world_max, entry.max_capacity))
        });

        match pool.as_any_mut().downcast_mut::<ComponentPool<T>>() {
            Some(pool) => pool,
            None => unreachable!("pool registered under the type id of another type"),
        }
    }

    /// Pool of `T`, if one was created
    pub fn pool<T: Component>(&self) -> Option<&ComponentPool<T>> {
        let index = self.find_index::<T>()?;
        self.components[index]
            .pool
            .as_ref()?
            .as_any()
            .downcast_ref::<ComponentPool<T>>()
    }

    /// Mutable pool of `T`, if one was created
    ///
    /// Only the world may reach the structural methods of its pools, which
    /// keeps flags and published messages in step with the slots. Callers
    /// edit values through [`components_mut`](Self::components_mut) and
    /// [`get_mut`](Self::get_mut).
    pub(crate) fn pool_mut<T: Component>(&mut self) -> Option<&mut ComponentPool<T>> {
        let index = self.find_index::<T>()?;
        self.components[index]
            .pool
            .as_mut()?
            .as_any_mut()
            .downcast_mut::<ComponentPool<T>>()
    }

    /// Dense values of `T`, without gaps
    pub fn components<T: Component>(&self) -> &[T] {
        match self.pool::<T>() {
            Some(pool) => pool.as_slice(),
            None => &[],
        }
    }

    /// Mutable dense values of `T`
    pub fn components_mut<T: Component>(&mut self) -> &mut [T] {
        match self.pool_mut::<T>() {
            Some(pool) => pool.as_mut_slice(),
            None => &mut [],
        }
    }

    /// Bound the number of distinct `T` values, creating the pool
    ///
    /// Returns the effective capacity: the requested value capped by the
    /// world capacity, or 1 for flag types.
    ///
    /// # Errors
    ///
    /// [`EcsError::CapacityAlreadySet`] when the pool already exists with a
    /// different capacity.
    pub fn set_max_capacity<T: Component>(&mut self, max_capacity: usize) -> Result<usize> {
        let index = self.type_index::<T>()?;
        if T::IS_FLAG {
            self.pool_at::<T>(index);
            return Ok(1);
        }

        let max_capacity = max_capacity.min(self.max_capacity);
        let entry = &mut self.components[index];
        if let Some(pool) = &entry.pool {
            let current = pool.type_info().max_capacity;
            if current != max_capacity {
                return Err(EcsError::CapacityAlreadySet {
                    component: T::type_name(),
                    current,
                });
            }
            return Ok(current);
        }

        entry.max_capacity = max_capacity;
        self.pool_at::<T>(index);
        Ok(max_capacity)
    }

    /// Capacity the pool of `T` has or will be created with
    pub fn max_component_capacity<T: Component>(&self) -> usize {
        if T::IS_FLAG {
            return 1;
        }

        match self.find_index::<T>() {
            Some(index) => self.components[index].max_capacity,
            None => self.config.component_capacity(TypeId::of::<T>()),
        }
    }

    // --- components ----------------------------------------------------------

    /// Set the entity's `T`, attaching it if absent
    ///
    /// Publishes [`ComponentAdded`] for a new component, or
    /// [`ComponentChanged`] when an enabled one is overwritten. Overwriting
    /// a disabled component keeps it disabled.
    ///
    /// # Errors
    ///
    /// Fails for dead or foreign handles and when the pool is full.
    pub fn set<T: Component>(&mut self, entity: Entity, component: T) -> Result<()> {
        self.store(entity, component, false)
    }

    /// Set the entity's `T` in the disabled state
    pub fn set_disabled<T: Component>(&mut self, entity: Entity, component: T) -> Result<()> {
        self.store(entity, component, true)
    }

    fn store<T: Component>(&mut self, entity: Entity, component: T, disabled: bool) -> Result<()> {
        self.check(entity)?;
        let index = self.type_index::<T>()?;
        let world_id = self.id;
        let id = entity.id();

        let pool = self.pool_at::<T>(index);
        let previous = if T::IS_MANAGED_RESOURCE {
            pool.get(id).cloned()
        } else {
            None
        };
        let acquired = if T::IS_MANAGED_RESOURCE {
            Some(component.clone())
        } else {
            None
        };
        // Every entity sharing the slot holds one reference to the value
        let references = pool.link(id).map_or(1, |link| link.reference_count);

        let is_new = match pool.set(id, component) {
            Ok(is_new) => is_new,
            Err(err) => {
                warn!(world = world_id.raw(), entity = id.raw(), %err, "component rejected");
                return Err(err);
            }
        };

        if let Some(value) = previous {
            for _ in 0..references {
                self.publish(&ManagedResourceReleaseRequested {
                    value: value.clone(),
                });
            }
        }
        if let Some(value) = acquired {
            for _ in 0..references {
                self.publish(&ManagedResourceAcquireRequested {
                    entity,
                    value: value.clone(),
                });
            }
        }

        self.after_store::<T>(entity, index, is_new, disabled);
        Ok(())
    }

    /// Make the entity share the `T` value of `reference`
    ///
    /// Both entities see every later change of the value. The entity's
    /// previous `T`, if any, is dropped first.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotFound`] when `reference` has no `T`.
    pub fn set_same_as<T: Component>(&mut self, entity: Entity, reference: Entity) -> Result<()> {
        self.store_same_as::<T>(entity, reference, false)
    }

    /// [`set_same_as`](Self::set_same_as), leaving the component disabled
    pub fn set_same_as_disabled<T: Component>(
        &mut self,
        entity: Entity,
        reference: Entity,
    ) -> Result<()> {
        self.store_same_as::<T>(entity, reference, true)
    }

    fn store_same_as<T: Component>(
        &mut self,
        entity: Entity,
        reference: Entity,
        disabled: bool,
    ) -> Result<()> {
        self.check(entity)?;
        self.check(reference)?;
        if !self.has::<T>(reference) {
            return Err(EcsError::ComponentNotFound {
                entity: reference,
                component: T::type_name(),
            });
        }

        let index = self.type_index::<T>()?;
        let (id, reference_id) = (entity.id(), reference.id());

        let pool = self.pool_at::<T>(index);
        if pool.shares_slot(id, reference_id) {
            if disabled {
                return self.disable_component::<T>(entity);
            }
            return Ok(());
        }

        let previous = if T::IS_MANAGED_RESOURCE {
            pool.get(id).cloned()
        } else {
            None
        };
        let is_new = pool.set_same_as(id, reference_id);
        let acquired = if T::IS_MANAGED_RESOURCE {
            pool.get(id).cloned()
        } else {
            None
        };

        if let Some(value) = previous {
            self.publish(&ManagedResourceReleaseRequested { value });
        }
        if let Some(value) = acquired {
            self.publish(&ManagedResourceAcquireRequested { entity, value });
        }

        self.after_store::<T>(entity, index, is_new, disabled);
        Ok(())
    }

    fn after_store<T: Component>(&mut self, entity: Entity, index: usize, is_new: bool, disabled: bool) {
        let flag = self.components[index].flag;
        let info = &mut self.infos[entity.id().index()];

        if is_new {
            if !disabled {
                info.components.set(flag, true);
                let components = info.components;
                self.publish(&ComponentAdded::<T>::new(entity, components));
            }
        } else if info.components.contains(flag) {
            if disabled {
                info.components.set(flag, false);
                let components = info.components;
                self.publish(&ComponentEnabledStateChanged::<T>::new(entity, false, components));
            } else {
                let components = info.components;
                self.publish(&ComponentChanged::<T>::new(entity, components));
            }
        }
    }

    /// Detach the entity's `T`, returning whether it had one
    ///
    /// [`ComponentRemoved`] is published only when the component was
    /// enabled.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Result<bool> {
        self.check(entity)?;
        if !self.has::<T>(entity) {
            return Ok(false);
        }

        let index = self.type_index::<T>()?;
        let id = entity.id();

        let release = self.components[index].ops.release;
        release(self, id);
        self.pool_at::<T>(index).remove(id);

        let flag = self.components[index].flag;
        let info = &mut self.infos[id.index()];
        if info.components.set(flag, false) {
            let components = info.components;
            self.publish(&ComponentRemoved::<T>::new(entity, components));
        }

        Ok(true)
    }

    /// Whether the entity holds a `T`, enabled or not
    pub fn has<T: Component>(&self, entity: Entity) -> bool {
        self.is_alive(entity)
            && self
                .pool::<T>()
                .map_or(false, |pool| pool.has(entity.id()))
    }

    /// The entity's `T`
    ///
    /// # Errors
    ///
    /// Fails for dead or foreign handles and when the entity has no `T`.
    pub fn get<T: Component>(&self, entity: Entity) -> Result<&T> {
        self.check(entity)?;
        self.try_get::<T>(entity)
            .ok_or(EcsError::ComponentNotFound {
                entity,
                component: T::type_name(),
            })
    }

    /// The entity's `T`, or `None` when absent or the handle is dead
    pub fn try_get<T: Component>(&self, entity: Entity) -> Option<&T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.pool::<T>()?.get(entity.id())
    }

    /// Mutable access to the entity's `T`
    ///
    /// The change is visible to every entity sharing the value. Call
    /// [`notify_changed`](Self::notify_changed) to let live queries know.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Result<&mut T> {
        self.check(entity)?;
        self.pool_mut::<T>()
            .and_then(|pool| pool.get_mut(entity.id()))
            .ok_or(EcsError::ComponentNotFound {
                entity,
                component: T::type_name(),
            })
    }

    fn require<T: Component>(&self, entity: Entity) -> Result<usize> {
        self.check(entity)?;
        match self.find_index::<T>() {
            Some(index) if self.has::<T>(entity) => Ok(index),
            _ => Err(EcsError::ComponentNotFound {
                entity,
                component: T::type_name(),
            }),
        }
    }

    /// Enable the entity's `T`
    pub fn enable_component<T: Component>(&mut self, entity: Entity) -> Result<()> {
        self.set_component_enabled::<T>(entity, true)
    }

    /// Disable the entity's `T`; live queries treat it as absent
    pub fn disable_component<T: Component>(&mut self, entity: Entity) -> Result<()> {
        self.set_component_enabled::<T>(entity, false)
    }

    fn set_component_enabled<T: Component>(&mut self, entity: Entity, enabled: bool) -> Result<()> {
        let index = self.require::<T>(entity)?;
        let flag = self.components[index].flag;

        let info = &mut self.infos[entity.id().index()];
        if info.components.set(flag, enabled) {
            let components = info.components;
            self.publish(&ComponentEnabledStateChanged::<T>::new(entity, enabled, components));
        }

        Ok(())
    }

    /// Whether the entity holds an enabled `T`
    pub fn is_component_enabled<T: Component>(&self, entity: Entity) -> bool {
        match self.find_index::<T>() {
            Some(index) => self
                .component_flags(entity)
                .contains(self.components[index].flag),
            None => false,
        }
    }

    /// Publish [`ComponentChanged`] for a value mutated in place
    ///
    /// Nothing is published while the component is disabled.
    pub fn notify_changed<T: Component>(&mut self, entity: Entity) -> Result<()> {
        let index = self.require::<T>(entity)?;
        let components = self.infos[entity.id().index()].components;
        if components.contains(self.components[index].flag) {
            self.publish(&ComponentChanged::<T>::new(entity, components));
        }
        Ok(())
    }

    // --- maintenance -------------------------------------------------------

    /// Advance the locality sort of every pool
    ///
    /// Pools are processed in parallel with the `parallel` feature. Clearing
    /// `should_continue` stops every pool at its next step. Returns whether
    /// every pool is fully sorted.
    pub fn optimize(&mut self, should_continue: &AtomicBool) -> bool {
        #[cfg(feature = "parallel")]
        let done = self
            .components
            .par_iter_mut()
            .filter_map(|entry| entry.pool.as_mut())
            .map(|pool| pool.optimize(should_continue))
            .reduce(|| true, |a, b| a && b);

        #[cfg(not(feature = "parallel"))]
        let done = self
            .components
            .iter_mut()
            .filter_map(|entry| entry.pool.as_mut())
            .fold(true, |done, pool| pool.optimize(should_continue) && done);

        debug!(world = self.id.raw(), done, "optimize pass finished");
        done
    }

    // --- messaging -----------------------------------------------------------

    /// Register a handler for messages of type `M` on this world's bus
    pub fn subscribe<M, F>(&self, handler: F) -> Subscription
    where
        M: 'static,
        F: Fn(&M, &WorldView<'_>) + 'static,
    {
        self.bus.subscribe(handler)
    }

    /// Publish a message to every handler of `M`
    pub fn publish<M: 'static>(&self, message: &M) {
        if self.config.log_events {
            trace!(
                world = self.id.raw(),
                message = std::any::type_name::<M>(),
                "publish"
            );
        }
        self.bus.publish(message, &WorldView::new(self));
    }

    // --- copies ---------------------------------------------------------------

    fn snapshot(&self, entity_id: EntityId) -> Vec<(ComponentOps, ComponentPayload, bool)> {
        let flags = self.infos[entity_id.index()].components;
        self.components
            .iter()
            .filter_map(|entry| {
                let payload = entry.pool.as_ref()?.clone_boxed(entity_id)?;
                Some((entry.ops, payload, flags.contains(entry.flag)))
            })
            .collect()
    }

    fn restore(
        target: &mut World,
        copy: Entity,
        parts: Vec<(ComponentOps, ComponentPayload, bool)>,
    ) -> Result<()> {
        for (ops, payload, enabled) in parts {
            (ops.apply)(target, copy, payload, !enabled)?;
        }
        Ok(())
    }

    /// Create a new entity in this world holding clones of every component
    ///
    /// Enabled states are preserved. Publishes [`EntityCopyRequested`].
    pub fn clone_entity(&mut self, entity: Entity) -> Result<Entity> {
        self.check(entity)?;

        let parts = self.snapshot(entity.id());
        let copy = self.spawn(self.is_enabled(entity))?;
        Self::restore(self, copy, parts)?;

        self.publish(&EntityCopyRequested { source: entity, copy });
        Ok(copy)
    }

    /// Create a copy of the entity inside `target`
    ///
    /// [`EntityCopyRequested`] is published on this world.
    pub fn copy_entity_to(&self, entity: Entity, target: &mut World) -> Result<Entity> {
        self.check(entity)?;

        let parts = self.snapshot(entity.id());
        let copy = target.spawn(self.is_enabled(entity))?;
        Self::restore(target, copy, parts)?;

        debug!(
            source_world = self.id.raw(),
            target_world = target.id.raw(),
            entity = entity.id().raw(),
            "entity copied"
        );
        self.publish(&EntityCopyRequested { source: entity, copy });
        Ok(copy)
    }

    // --- codec boundary ------------------------------------------------------

    /// Visit the type of every pool in registration order
    pub fn read_component_types<F>(&self, mut visit: F)
    where
        F: FnMut(&ComponentTypeInfo),
    {
        for pool in self.components.iter().filter_map(|entry| entry.pool.as_ref()) {
            visit(&pool.type_info());
        }
    }

    /// Visit every component of an entity without naming its type
    pub fn read_components<F>(&self, entity: Entity, mut visit: F) -> Result<()>
    where
        F: FnMut(ComponentRef<'_>),
    {
        self.check(entity)?;
        let flags = self.infos[entity.id().index()].components;

        for entry in &self.components {
            let pool = match &entry.pool {
                Some(pool) => pool,
                None => continue,
            };

            if let Some((representative, value)) = pool.read(entity.id()) {
                visit(ComponentRef {
                    info: pool.type_info(),
                    representative: Entity::new(self.id, representative),
                    value,
                    enabled: flags.contains(entry.flag),
                });
            }
        }

        Ok(())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("id", &self.id)
            .field("max_capacity", &self.max_capacity)
            .field("entity_count", &self.entity_count)
            .field("component_types", &self.components.len())
            .finish()
    }
}

impl Drop for World {
    fn drop(&mut self) {
        for entry in self.components.iter().filter(|entry| entry.pool.is_some()) {
            (entry.ops.release_all)(self);
        }

        self.publish(&WorldDisposed { world: self.id });
        world_ids().release(self.id);
        debug!(world = self.id.raw(), "world disposed");
    }
}
