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
//! Live entity sets
//!
//! An [`EntitySet`] is the materialized result of an entity rule. It owns
//! its bus subscriptions and keeps its membership in sync as messages
//! arrive; dropping it unsubscribes.
//!
//! # Modes
//!
//! - **Steady**: membership is the current truth of the rule. Every state
//!   message re-evaluates the entity.
//! - **Edge-triggered**: built with one of the `when_*` rule methods. An
//!   entity joins only when a trigger message fires and the rule holds; it
//!   leaves when the rule stops holding, when it is disposed or disabled,
//!   or when [`EntitySet::complete`] clears the set.

use crate::ecs::{
    Component, ComponentAdded, ComponentChanged, ComponentEnabledStateChanged, ComponentFlags,
    ComponentRemoved, Entity, EntityCreated, EntityDisposed, EntityEnabledStateChanged, EntityId,
    EntityRule, Subscription, World, WorldId, WorldView,
};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;

/// Receiver of the messages a live query subscribes to
pub(crate) trait Reactor {
    /// The entity's state changed; re-evaluate membership
    fn on_state_changed(&mut self, view: &WorldView<'_>, entity: Entity, components: &ComponentFlags);

    /// A trigger of an edge-triggered query fired for the entity
    fn on_triggered(&mut self, view: &WorldView<'_>, entity: Entity, components: &ComponentFlags);

    /// The key component of a map changed value
    fn on_value_changed(&mut self, _view: &WorldView<'_>, _entity: Entity) {}

    /// The entity is gone
    fn on_disposed(&mut self, entity: Entity);
}

pub(crate) type SharedReactor = Rc<RefCell<dyn Reactor>>;

/// Subscribes a reactor to the messages of one component type
pub(crate) type SubscribeFn = fn(&World, &SharedReactor) -> Vec<Subscription>;

pub(crate) fn entity_hooks(world: &World, reactor: &SharedReactor) -> Vec<Subscription> {
    let created = reactor.clone();
    let toggled = reactor.clone();
    let disposed = reactor.clone();

    vec![
        world.subscribe(move |m: &EntityCreated, view| {
            let components = view.components(m.entity);
            created
                .borrow_mut()
                .on_state_changed(view, m.entity, &components)
        }),
        world.subscribe(move |m: &EntityEnabledStateChanged, view| {
            toggled
                .borrow_mut()
                .on_state_changed(view, m.entity, &m.components)
        }),
        world.subscribe(move |m: &EntityDisposed, _| disposed.borrow_mut().on_disposed(m.entity)),
    ]
}

pub(crate) fn state_hooks<T: Component>(world: &World, reactor: &SharedReactor) -> Vec<Subscription> {
    let added = reactor.clone();
    let removed = reactor.clone();
    let toggled = reactor.clone();

    vec![
        world.subscribe(move |m: &ComponentAdded<T>, view| {
            added.borrow_mut().on_state_changed(view, m.entity, &m.components)
        }),
        world.subscribe(move |m: &ComponentRemoved<T>, view| {
            removed
                .borrow_mut()
                .on_state_changed(view, m.entity, &m.components)
        }),
        world.subscribe(move |m: &ComponentEnabledStateChanged<T>, view| {
            toggled
                .borrow_mut()
                .on_state_changed(view, m.entity, &m.components)
        }),
    ]
}

pub(crate) fn changed_state_hooks<T: Component>(
    world: &World,
    reactor: &SharedReactor,
) -> Vec<Subscription> {
    let changed = reactor.clone();
    vec![world.subscribe(move |m: &ComponentChanged<T>, view| {
        changed
            .borrow_mut()
            .on_state_changed(view, m.entity, &m.components)
    })]
}

pub(crate) fn added_triggers<T: Component>(world: &World, reactor: &SharedReactor) -> Vec<Subscription> {
    let added = reactor.clone();
    let enabled = reactor.clone();

    vec![
        world.subscribe(move |m: &ComponentAdded<T>, view| {
            added.borrow_mut().on_triggered(view, m.entity, &m.components)
        }),
        world.subscribe(move |m: &ComponentEnabledStateChanged<T>, view| {
            if m.enabled {
                enabled
                    .borrow_mut()
                    .on_triggered(view, m.entity, &m.components)
            }
        }),
    ]
}

pub(crate) fn changed_triggers<T: Component>(
    world: &World,
    reactor: &SharedReactor,
) -> Vec<Subscription> {
    let changed = reactor.clone();
    vec![world.subscribe(move |m: &ComponentChanged<T>, view| {
        changed.borrow_mut().on_triggered(view, m.entity, &m.components)
    })]
}

pub(crate) fn removed_triggers<T: Component>(
    world: &World,
    reactor: &SharedReactor,
) -> Vec<Subscription> {
    let removed = reactor.clone();
    let disabled = reactor.clone();

    vec![
        world.subscribe(move |m: &ComponentRemoved<T>, view| {
            removed.borrow_mut().on_triggered(view, m.entity, &m.components)
        }),
        world.subscribe(move |m: &ComponentEnabledStateChanged<T>, view| {
            if !m.enabled {
                disabled
                    .borrow_mut()
                    .on_triggered(view, m.entity, &m.components)
            }
        }),
    ]
}

const ABSENT: u32 = u32::MAX;

/// Sparse list of entities with O(1) insert, remove and membership test
#[derive(Debug, Default)]
pub(crate) struct EntityIndex {
    mapping: Vec<u32>,
    entities: Vec<Entity>,
}

impl EntityIndex {
    pub(crate) fn contains(&self, id: EntityId) -> bool {
        self.mapping
            .get(id.index())
            .map_or(false, |&slot| slot != ABSENT)
    }

    pub(crate) fn insert(&mut self, entity: Entity) -> bool {
        let index = entity.id().index();
        if self.contains(entity.id()) {
            return false;
        }

        if index >= self.mapping.len() {
            let grown = (self.mapping.len() * 2).max(index + 1);
            self.mapping.resize(grown, ABSENT);
        }

        self.mapping[index] = self.entities.len() as u32;
        self.entities.push(entity);
        true
    }

    pub(crate) fn remove(&mut self, id: EntityId) -> bool {
        let slot = match self.mapping.get(id.index()) {
            Some(&slot) if slot != ABSENT => slot as usize,
            _ => return false,
        };

        self.mapping[id.index()] = ABSENT;
        self.entities.swap_remove(slot);
        if let Some(moved) = self.entities.get(slot) {
            self.mapping[moved.id().index()] = slot as u32;
        }
        true
    }

    pub(crate) fn clear(&mut self) {
        for entity in self.entities.drain(..) {
            self.mapping[entity.id().index()] = ABSENT;
        }
    }

    pub(crate) fn as_slice(&self) -> &[Entity] {
        &self.entities
    }

    pub(crate) fn len(&self) -> usize {
        self.entities.len()
    }
}

pub(crate) struct SetReactor {
    rule: EntityRule,
    edge_triggered: bool,
    members: EntityIndex,
}

impl SetReactor {
    pub(crate) fn new(rule: EntityRule, edge_triggered: bool) -> Self {
        SetReactor {
            rule,
            edge_triggered,
            members: EntityIndex::default(),
        }
    }
}

impl Reactor for SetReactor {
    fn on_state_changed(&mut self, view: &WorldView<'_>, entity: Entity, components: &ComponentFlags) {
        if !self.rule.is_match(view, entity, components) {
            self.members.remove(entity.id());
        } else if !self.edge_triggered {
            self.members.insert(entity);
        }
    }

    fn on_triggered(&mut self, view: &WorldView<'_>, entity: Entity, components: &ComponentFlags) {
        if self.rule.is_match(view, entity, components) {
            self.members.insert(entity);
        }
    }

    fn on_disposed(&mut self, entity: Entity) {
        self.members.remove(entity.id());
    }
}

/// Live set of the entities matching a rule
///
/// # Example
///
/// ```
/// use sparse_ecs::ecs::World;
///
/// let mut world = World::new();
/// let set = world.entities().with::<u32>().without::<bool>().as_set().unwrap();
///
/// let entity = world.create_entity().unwrap();
/// world.set(entity, 1u32).unwrap();
/// assert!(set.contains(entity));
///
/// world.set(entity, true).unwrap();
/// assert!(set.is_empty());
/// ```
pub struct EntitySet {
    world: WorldId,
    state: Rc<RefCell<SetReactor>>,
    _subscriptions: Vec<Subscription>,
}

impl EntitySet {
    pub(crate) fn new(
        world: WorldId,
        state: Rc<RefCell<SetReactor>>,
        subscriptions: Vec<Subscription>,
    ) -> Self {
        EntitySet {
            world,
            state,
            _subscriptions: subscriptions,
        }
    }

    /// World the set observes
    pub fn world_id(&self) -> WorldId {
        self.world
    }

    /// Whether the set was built with `when_*` triggers
    pub fn is_edge_triggered(&self) -> bool {
        self.state.borrow().edge_triggered
    }

    /// Number of member entities
    pub fn len(&self) -> usize {
        self.state.borrow().members.len()
    }

    /// Whether the set has no member
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the entity is a member
    pub fn contains(&self, entity: Entity) -> bool {
        entity.world_id() == self.world && self.state.borrow().members.contains(entity.id())
    }

    /// Borrow the members in set order
    ///
    /// # Panics
    ///
    /// The world must not be mutated while the guard is held; the set would
    /// panic when the next message reaches it. Use
    /// [`to_vec`](Self::to_vec) to iterate while mutating.
    pub fn entities(&self) -> Ref<'_, [Entity]> {
        Ref::map(self.state.borrow(), |state| state.members.as_slice())
    }

    /// Copy the members out
    pub fn to_vec(&self) -> Vec<Entity> {
        self.state.borrow().members.as_slice().to_vec()
    }

    /// Clear an edge-triggered set; steady sets are left untouched
    pub fn complete(&self) {
        let mut state = self.state.borrow_mut();
        if state.edge_triggered {
            state.members.clear();
        }
    }
}

impl fmt::Debug for EntitySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EntitySet")
            .field("world", &self.world)
            .field("edge_triggered", &state.edge_triggered)
            .field("len", &state.members.len())
            .finish()
    }
}
