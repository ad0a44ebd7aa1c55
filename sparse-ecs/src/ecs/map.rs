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
//! Live entity maps keyed by a component value
//!
//! An [`EntityMap<K>`] is a live set that also indexes its members by the
//! current value of their `K` component. Each key resolves to at most one
//! entity. When two members hold equal keys the last one (re)inserted owns
//! the key and the previous holder leaves the map; its component is left
//! untouched. Removing the owner leaves the key unassigned.

use crate::ecs::set::{Reactor, SharedReactor};
use crate::ecs::{
    Component, ComponentChanged, ComponentFlags, Entity, EntityId, EntityRule, Subscription, World,
    WorldId, WorldView,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

pub(crate) fn key_hooks<K: Component>(world: &World, reactor: &SharedReactor) -> Vec<Subscription> {
    let changed = reactor.clone();
    vec![world.subscribe(move |m: &ComponentChanged<K>, view| {
        changed.borrow_mut().on_value_changed(view, m.entity)
    })]
}

pub(crate) struct MapReactor<K> {
    rule: EntityRule,
    edge_triggered: bool,
    key_by_entity: HashMap<EntityId, K>,
    entity_by_key: HashMap<K, Entity>,
}

impl<K: Component + Eq + Hash> MapReactor<K> {
    pub(crate) fn new(rule: EntityRule, edge_triggered: bool) -> Self {
        MapReactor {
            rule,
            edge_triggered,
            key_by_entity: HashMap::new(),
            entity_by_key: HashMap::new(),
        }
    }

    fn insert(&mut self, view: &WorldView<'_>, entity: Entity) {
        let key = match view.get::<K>(entity) {
            Some(key) => key.clone(),
            None => return,
        };

        if self.key_by_entity.get(&entity.id()) == Some(&key) {
            return;
        }
        self.remove(entity.id());

        if let Some(previous) = self.entity_by_key.insert(key.clone(), entity) {
            self.key_by_entity.remove(&previous.id());
        }
        self.key_by_entity.insert(entity.id(), key);
    }

    fn remove(&mut self, id: EntityId) {
        if let Some(key) = self.key_by_entity.remove(&id) {
            if self.entity_by_key.get(&key).map(Entity::id) == Some(id) {
                self.entity_by_key.remove(&key);
            }
        }
    }
}

impl<K: Component + Eq + Hash> Reactor for MapReactor<K> {
    fn on_state_changed(&mut self, view: &WorldView<'_>, entity: Entity, components: &ComponentFlags) {
        if !self.rule.is_match(view, entity, components) {
            self.remove(entity.id());
        } else if !self.edge_triggered {
            self.insert(view, entity);
        }
    }

    fn on_triggered(&mut self, view: &WorldView<'_>, entity: Entity, components: &ComponentFlags) {
        if self.rule.is_match(view, entity, components) {
            self.insert(view, entity);
        }
    }

    fn on_value_changed(&mut self, view: &WorldView<'_>, entity: Entity) {
        if self.key_by_entity.contains_key(&entity.id()) {
            self.insert(view, entity);
        } else if !self.edge_triggered && self.rule.is_match(view, entity, &view.components(entity)) {
            // A holder displaced by a colliding key comes back under its new key
            self.insert(view, entity);
        }
    }

    fn on_disposed(&mut self, entity: Entity) {
        self.remove(entity.id());
    }
}

/// Live map from a component value to the entity holding it
///
/// # Example
///
/// ```
/// use sparse_ecs::ecs::World;
///
/// let mut world = World::new();
/// let by_id = world.entities().as_map::<u32>().unwrap();
///
/// let entity = world.create_entity().unwrap();
/// world.set(entity, 7u32).unwrap();
/// assert_eq!(by_id.get(&7), Some(entity));
///
/// world.set(entity, 8u32).unwrap();
/// assert_eq!(by_id.get(&7), None);
/// assert_eq!(by_id.get(&8), Some(entity));
/// ```
pub struct EntityMap<K> {
    world: WorldId,
    state: Rc<RefCell<MapReactor<K>>>,
    _subscriptions: Vec<Subscription>,
}

impl<K: Component + Eq + Hash> EntityMap<K> {
    pub(crate) fn new(
        world: WorldId,
        state: Rc<RefCell<MapReactor<K>>>,
        subscriptions: Vec<Subscription>,
    ) -> Self {
        EntityMap {
            world,
            state,
            _subscriptions: subscriptions,
        }
    }

    /// World the map observes
    pub fn world_id(&self) -> WorldId {
        self.world
    }

    /// Number of mapped entities
    pub fn len(&self) -> usize {
        self.state.borrow().entity_by_key.len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether some entity currently owns `key`
    pub fn contains_key(&self, key: &K) -> bool {
        self.state.borrow().entity_by_key.contains_key(key)
    }

    /// Whether the entity is mapped
    pub fn contains_entity(&self, entity: Entity) -> bool {
        entity.world_id() == self.world && self.state.borrow().key_by_entity.contains_key(&entity.id())
    }

    /// Entity owning `key`
    pub fn get(&self, key: &K) -> Option<Entity> {
        self.state.borrow().entity_by_key.get(key).copied()
    }

    /// Key the entity is mapped under
    pub fn key_of(&self, entity: Entity) -> Option<K> {
        if entity.world_id() != self.world {
            return None;
        }
        self.state.borrow().key_by_entity.get(&entity.id()).cloned()
    }

    /// Copy the keys out, in no particular order
    pub fn keys(&self) -> Vec<K> {
        self.state.borrow().entity_by_key.keys().cloned().collect()
    }

    /// Copy the mapped entities out, in no particular order
    pub fn entities(&self) -> Vec<Entity> {
        self.state.borrow().entity_by_key.values().copied().collect()
    }

    /// Clear an edge-triggered map; steady maps are left untouched
    pub fn complete(&self) {
        let mut state = self.state.borrow_mut();
        if state.edge_triggered {
            state.key_by_entity.clear();
            state.entity_by_key.clear();
        }
    }
}

impl<K> fmt::Debug for EntityMap<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EntityMap")
            .field("world", &self.world)
            .field("key", &std::any::type_name::<K>())
            .field("len", &state.entity_by_key.len())
            .finish()
    }
}
