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
//! Sparse-set component storage
//!
//! A [`ComponentPool`] stores every value of one component type in a dense
//! array with no gaps, next to a parallel array of [`ComponentLink`]s. A
//! sparse mapping translates an [`EntityId`] into a dense slot.
//!
//! # Memory Layout
//!
//! ```text
//! mapping:    [ 1, -, 0, 1, - ]      entity id -> slot (several ids may share one)
//! links:      [ {e2, 1}, {e0, 2} ]   representative entity, reference count
//! components: [ v2, v0 ]             contiguous values
//! ```
//!
//! Several entities may alias one slot. The slot keeps a reference count and
//! one *representative* entity, used whenever a single owner has to be
//! reported for a shared value. Removal compacts the dense arrays by moving
//! the last slot into the hole; the sparse mapping is rescanned only when
//! the moved slot is shared, because only then can more than one entry point
//! at it.
//!
//! [`ComponentPool::optimize`] incrementally selection-sorts the dense arrays
//! by representative id so that scans over several types touch entities in
//! the same order. It is resumable and checks a cancellation flag before
//! every step.

use crate::ecs::{Component, EntityId};
use crate::error::{EcsError, Result};
use std::any::{Any, TypeId};
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Sparse mapping sentinel
const ABSENT: u32 = u32::MAX;

/// Metadata stored next to every dense slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentLink {
    /// Entity reported as the owner of the slot
    pub entity_id: EntityId,
    /// Number of entities mapped onto the slot, always at least 1
    pub reference_count: u32,
}

impl ComponentLink {
    fn new(entity_id: EntityId) -> Self {
        ComponentLink {
            entity_id,
            reference_count: 1,
        }
    }
}

/// Dense storage for one component type
///
/// # Example
///
/// ```
/// use sparse_ecs::ecs::{ComponentPool, EntityId};
///
/// let mut pool = ComponentPool::<u32>::new(16, 16);
/// let a = EntityId::new(3);
/// let b = EntityId::new(7);
///
/// assert!(pool.set(a, 10).unwrap());
/// assert!(pool.set_same_as(b, a));
/// *pool.get_mut(b).unwrap() = 11;
///
/// assert_eq!(pool.get(a), Some(&11));
/// assert_eq!(pool.as_slice(), &[11]);
/// ```
pub struct ComponentPool<T: Component> {
    world_max_capacity: usize,
    max_capacity: usize,
    mapping: Vec<u32>,
    links: Vec<ComponentLink>,
    components: Vec<T>,
    /// Slots before this index are the smallest representatives, in order
    sorted_index: usize,
}

impl<T: Component> ComponentPool<T> {
    /// Create an empty pool
    ///
    /// The effective capacity is `min(world_max_capacity, max_capacity)`,
    /// except for flag types which always hold exactly one shared slot.
    pub fn new(world_max_capacity: usize, max_capacity: usize) -> Self {
        let max_capacity = if T::IS_FLAG {
            1
        } else {
            world_max_capacity.min(max_capacity)
        };

        ComponentPool {
            world_max_capacity,
            max_capacity,
            mapping: Vec::new(),
            links: Vec::new(),
            components: Vec::new(),
            sorted_index: 0,
        }
    }

    /// Maximum number of distinct slots
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Number of live slots
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether the pool holds no slot
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    #[inline]
    fn slot_of(&self, entity_id: EntityId) -> Option<usize> {
        match self.mapping.get(entity_id.index()) {
            Some(&slot) if slot != ABSENT => Some(slot as usize),
            _ => None,
        }
    }

    fn ensure_mapping(&mut self, entity_id: EntityId) {
        let index = entity_id.index();
        if index >= self.mapping.len() {
            let grown = (self.mapping.len() * 2).min(self.world_max_capacity);
            self.mapping.resize(grown.max(index + 1), ABSENT);
        }
    }

    /// Check if an entity has a slot in this pool
    #[inline]
    pub fn has(&self, entity_id: EntityId) -> bool {
        self.slot_of(entity_id).is_some()
    }

    /// Assign a value, returning `true` when the entity had no slot before
    ///
    /// An existing slot is overwritten in place, which every alias observes.
    /// A full flag pool aliases the newcomer onto its single slot instead of
    /// failing.
    ///
    /// # Errors
    ///
    /// [`EcsError::MaxComponentCountReached`] when a non-flag pool is full.
    pub fn set(&mut self, entity_id: EntityId, component: T) -> Result<bool> {
        if let Some(slot) = self.slot_of(entity_id) {
            self.components[slot] = component;
            return Ok(false);
        }

        if self.components.len() >= self.max_capacity {
            if T::IS_FLAG && !self.links.is_empty() {
                let reference = self.links[0].entity_id;
                return Ok(self.set_same_as(entity_id, reference));
            }

            return Err(EcsError::MaxComponentCountReached {
                component: T::type_name(),
                max: self.max_capacity,
            });
        }

        self.ensure_mapping(entity_id);

        // Keep only the part of the sorted prefix that stays below the newcomer
        if self.sorted_index > 0 && self.links[self.sorted_index - 1].entity_id > entity_id {
            self.sorted_index =
                self.links[..self.sorted_index].partition_point(|link| link.entity_id < entity_id);
        }

        let slot = self.components.len();
        self.components.push(component);
        self.links.push(ComponentLink::new(entity_id));
        self.mapping[entity_id.index()] = slot as u32;

        Ok(true)
    }

    /// Make `entity_id` share the slot held by `reference_id`
    ///
    /// Returns `true` when the entity had no slot before. An entity that
    /// aliased another slot is first removed from it; aliasing the slot it
    /// already shares is a no-op returning `false`.
    ///
    /// # Panics
    ///
    /// Panics if `reference_id` has no slot in this pool.
    pub fn set_same_as(&mut self, entity_id: EntityId, reference_id: EntityId) -> bool {
        let reference_slot = match self.slot_of(reference_id) {
            Some(slot) => slot,
            None => panic!(
                "entity {} has no component of type {} to share",
                reference_id,
                T::type_name()
            ),
        };

        self.ensure_mapping(entity_id);

        let mut is_new = true;
        if let Some(slot) = self.slot_of(entity_id) {
            if slot == reference_slot {
                return false;
            }

            self.remove(entity_id);
            is_new = false;
        }

        // Removal may have moved the reference slot
        let reference_slot = self.mapping[reference_id.index()] as usize;
        self.links[reference_slot].reference_count += 1;
        self.mapping[entity_id.index()] = reference_slot as u32;

        is_new
    }

    /// Drop the entity's reference, returning whether it had one
    ///
    /// When the last reference goes, the last dense slot is moved into the
    /// hole. When other references remain and the departing entity was the
    /// representative, another alias takes over.
    pub fn remove(&mut self, entity_id: EntityId) -> bool {
        let slot = match self.slot_of(entity_id) {
            Some(slot) => slot,
            None => return false,
        };

        self.mapping[entity_id.index()] = ABSENT;

        let link = &mut self.links[slot];
        link.reference_count -= 1;

        if link.reference_count == 0 {
            let last = self.components.len() - 1;
            self.components.swap_remove(slot);
            self.links.swap_remove(slot);

            if slot != last {
                let moved = self.links[slot];
                if moved.reference_count == 1 {
                    self.mapping[moved.entity_id.index()] = slot as u32;
                } else {
                    for mapped in self.mapping.iter_mut().filter(|m| **m == last as u32) {
                        *mapped = slot as u32;
                    }
                }

                self.sorted_index = self.sorted_index.min(slot);
            }

            self.sorted_index = self.sorted_index.min(self.components.len());
        } else if link.entity_id == entity_id {
            if let Some(other) = self.mapping.iter().position(|m| *m == slot as u32) {
                let representative = EntityId::new(other as u32);
                self.links[slot].entity_id = representative;

                // The new representative may sort below part of the prefix
                let bound = self.sorted_index.min(slot);
                self.sorted_index = self.links[..bound]
                    .partition_point(|link| link.entity_id < representative);
            }
        }

        true
    }

    /// Get a reference to the entity's value
    #[inline]
    pub fn get(&self, entity_id: EntityId) -> Option<&T> {
        self.slot_of(entity_id).map(|slot| &self.components[slot])
    }

    /// Get a mutable reference to the entity's value, shared by all aliases
    #[inline]
    pub fn get_mut(&mut self, entity_id: EntityId) -> Option<&mut T> {
        self.slot_of(entity_id).map(move |slot| &mut self.components[slot])
    }

    /// Link of the slot the entity maps to
    pub fn link(&self, entity_id: EntityId) -> Option<ComponentLink> {
        self.slot_of(entity_id).map(|slot| self.links[slot])
    }

    /// Representative entity of the slot the entity maps to
    pub fn representative(&self, entity_id: EntityId) -> Option<EntityId> {
        self.link(entity_id).map(|link| link.entity_id)
    }

    /// Whether both entities map onto the same slot
    pub fn shares_slot(&self, a: EntityId, b: EntityId) -> bool {
        match (self.slot_of(a), self.slot_of(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Dense view of all live values
    ///
    /// The order is the dense slot order; it changes on every structural
    /// mutation and on [`optimize`](Self::optimize).
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.components
    }

    /// Mutable dense view of all live values
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.components
    }

    /// Links, parallel to [`as_slice`](Self::as_slice)
    pub fn links(&self) -> &[ComponentLink] {
        &self.links
    }

    /// Representative entities in dense order
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.links.iter().map(|link| link.entity_id)
    }

    /// Whether the dense arrays are fully ordered by representative
    pub fn is_optimized(&self) -> bool {
        self.sorted_index + 1 >= self.components.len()
    }

    /// Continue sorting the dense arrays by representative id
    ///
    /// Each step selects the smallest remaining representative and swaps it
    /// into place, slot value and link together. `should_continue` is read
    /// before every step; clearing it from another thread stops the pass at
    /// a consistent state and the next call resumes where this one stopped.
    /// Returns whether the pool is fully sorted.
    pub fn optimize(&mut self, should_continue: &AtomicBool) -> bool {
        let len = self.components.len();

        while self.sorted_index + 1 < len && should_continue.load(Ordering::Acquire) {
            let start = self.sorted_index;
            let mut min_index = start;
            for i in start + 1..len {
                if self.links[i].entity_id < self.links[min_index].entity_id {
                    min_index = i;
                }
            }

            if min_index != start {
                self.swap_slots(start, min_index);
            }

            self.sorted_index += 1;
        }

        self.is_optimized()
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.components.swap(a, b);
        self.links.swap(a, b);

        let (link_a, link_b) = (self.links[a], self.links[b]);
        if link_a.reference_count > 1 || link_b.reference_count > 1 {
            let (a, b) = (a as u32, b as u32);
            for mapped in self.mapping.iter_mut() {
                if *mapped == a {
                    *mapped = b;
                } else if *mapped == b {
                    *mapped = a;
                }
            }
        } else {
            self.mapping[link_a.entity_id.index()] = a as u32;
            self.mapping[link_b.entity_id.index()] = b as u32;
        }
    }

    /// Parallel iterator over the dense values
    #[cfg(feature = "parallel")]
    pub fn par_iter(&self) -> rayon::slice::Iter<'_, T> {
        self.components.par_iter()
    }

    /// Parallel mutable iterator over the dense values
    #[cfg(feature = "parallel")]
    pub fn par_iter_mut(&mut self) -> rayon::slice::IterMut<'_, T> {
        self.components.par_iter_mut()
    }
}

/// Description of a registered component type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentTypeInfo {
    /// Runtime identity of the type
    pub type_id: TypeId,
    /// Readable name of the type
    pub name: &'static str,
    /// Current capacity of the pool
    pub max_capacity: usize,
    /// Zero-sized marker type
    pub is_flag: bool,
    /// Values describe external resources
    pub is_managed_resource: bool,
}

/// Type-erased pool seam used by the world
pub(crate) trait AnyPool: Send + Sync {
    fn type_info(&self) -> ComponentTypeInfo;

    fn has(&self, entity_id: EntityId) -> bool;

    fn remove(&mut self, entity_id: EntityId) -> bool;

    fn optimize(&mut self, should_continue: &AtomicBool) -> bool;

    /// Representative and value of the entity's slot
    fn read(&self, entity_id: EntityId) -> Option<(EntityId, &dyn Any)>;

    fn clone_boxed(&self, entity_id: EntityId) -> Option<Box<dyn Any + Send>>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> AnyPool for ComponentPool<T> {
    fn type_info(&self) -> ComponentTypeInfo {
        ComponentTypeInfo {
            type_id: TypeId::of::<T>(),
            name: T::type_name(),
            max_capacity: self.max_capacity,
            is_flag: T::IS_FLAG,
            is_managed_resource: T::IS_MANAGED_RESOURCE,
        }
    }

    fn has(&self, entity_id: EntityId) -> bool {
        ComponentPool::has(self, entity_id)
    }

    fn remove(&mut self, entity_id: EntityId) -> bool {
        ComponentPool::remove(self, entity_id)
    }

    fn optimize(&mut self, should_continue: &AtomicBool) -> bool {
        ComponentPool::optimize(self, should_continue)
    }

    fn read(&self, entity_id: EntityId) -> Option<(EntityId, &dyn Any)> {
        let slot = self.slot_of(entity_id)?;
        Some((self.links[slot].entity_id, &self.components[slot] as &dyn Any))
    }

    fn clone_boxed(&self, entity_id: EntityId) -> Option<Box<dyn Any + Send>> {
        self.get(entity_id)
            .map(|value| Box::new(value.clone()) as Box<dyn Any + Send>)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
