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
//! Entity rules
//!
//! A rule is a normalized filter over an entity's [`ComponentFlags`]:
//!
//! ```text
//! enabled
//!   AND has every `with` component
//!   AND has no `without` component
//!   AND, for every `with_either` group, has at least one member
//!   AND, for every `without_either` group, lacks at least one member
//!   AND every per-type predicate accepts the current value
//! ```
//!
//! Only enabled components count: a disabled component is treated exactly
//! like an absent one. Rules are described with an [`EntityRuleBuilder`]
//! obtained from [`World::entities`] and materialized as a live
//! [`EntitySet`], a live [`EntityMap`] or a plain [`EntityPredicate`].

use crate::ecs::set::{
    added_triggers, changed_state_hooks, changed_triggers, entity_hooks, removed_triggers,
    state_hooks, SetReactor, SharedReactor, SubscribeFn,
};
use crate::ecs::map::{key_hooks, MapReactor};
use crate::ecs::{
    Component, ComponentFlag, ComponentFlags, Entity, EntityMap, EntitySet, Subscription, World,
    WorldId, WorldView,
};
use crate::error::{EcsError, Result};
use std::any::TypeId;
use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;
use tracing::debug;

type Predicate = Rc<dyn Fn(&WorldView<'_>, Entity) -> bool>;

/// Normalized filter evaluated against an entity's flags
#[derive(Clone)]
pub(crate) struct EntityRule {
    with: ComponentFlags,
    without: ComponentFlags,
    with_either: Vec<ComponentFlags>,
    without_either: Vec<ComponentFlags>,
    predicates: Vec<Predicate>,
}

impl Default for EntityRule {
    fn default() -> Self {
        EntityRule {
            with: ComponentFlags::empty().with(ComponentFlag::IS_ENABLED),
            without: ComponentFlags::empty(),
            with_either: Vec::new(),
            without_either: Vec::new(),
            predicates: Vec::new(),
        }
    }
}

impl EntityRule {
    pub(crate) fn is_match(
        &self,
        view: &WorldView<'_>,
        entity: Entity,
        components: &ComponentFlags,
    ) -> bool {
        components.contains_all(&self.with)
            && !components.intersects(&self.without)
            && self
                .with_either
                .iter()
                .all(|group| components.intersects(group))
            && self
                .without_either
                .iter()
                .all(|group| !components.contains_all(group))
            && self.predicates.iter().all(|predicate| predicate(view, entity))
    }
}

impl fmt::Debug for EntityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRule")
            .field("with", &self.with)
            .field("without", &self.without)
            .field("with_either", &self.with_either)
            .field("without_either", &self.without_either)
            .field("predicates", &self.predicates.len())
            .finish()
    }
}

/// Compile-time description of one component type for rule building
#[doc(hidden)]
#[derive(Clone, Copy)]
pub struct ComponentDescriptor {
    type_id: TypeId,
    register: fn(&mut World) -> Result<ComponentFlag>,
    state: SubscribeFn,
    changed_state: SubscribeFn,
    added: SubscribeFn,
    changed: SubscribeFn,
    removed: SubscribeFn,
}

impl ComponentDescriptor {
    fn of<T: Component>() -> Self {
        ComponentDescriptor {
            type_id: TypeId::of::<T>(),
            register: World::component_flag::<T>,
            state: state_hooks::<T>,
            changed_state: changed_state_hooks::<T>,
            added: added_triggers::<T>,
            changed: changed_triggers::<T>,
            removed: removed_triggers::<T>,
        }
    }

    fn hook(&self, kind: HookKind) -> SubscribeFn {
        match kind {
            HookKind::State => self.state,
            HookKind::ChangedState => self.changed_state,
            HookKind::Added => self.added,
            HookKind::Changed => self.changed,
            HookKind::Removed => self.removed,
        }
    }
}

/// A tuple of component types used by the `*_either` rule methods
pub trait ComponentGroup: 'static {
    #[doc(hidden)]
    fn descriptors() -> Vec<ComponentDescriptor>;
}

macro_rules! impl_component_group {
    ($($ty:ident),+) => {
        impl<$($ty: Component),+> ComponentGroup for ($($ty,)+) {
            fn descriptors() -> Vec<ComponentDescriptor> {
                vec![$(ComponentDescriptor::of::<$ty>()),+]
            }
        }
    };
}

impl_component_group!(A);
impl_component_group!(A, B);
impl_component_group!(A, B, C);
impl_component_group!(A, B, C, D);
impl_component_group!(A, B, C, D, E);
impl_component_group!(A, B, C, D, E, F);
impl_component_group!(A, B, C, D, E, F, G);
impl_component_group!(A, B, C, D, E, F, G, H);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookKind {
    State,
    ChangedState,
    Added,
    Changed,
    Removed,
}

#[derive(Clone, Copy)]
struct Hook {
    type_id: TypeId,
    kind: HookKind,
    subscribe: SubscribeFn,
}

/// Builder for a live query over one world
///
/// Filters compose with AND; each `*_either` call adds an independent
/// group. Any `when_*` method makes the result edge-triggered; several
/// triggers are alternatives.
///
/// # Example
///
/// ```
/// use sparse_ecs::ecs::World;
///
/// #[derive(Clone)]
/// struct Health(u32);
/// impl sparse_ecs::ecs::Component for Health {}
///
/// let mut world = World::new();
/// let wounded = world
///     .entities()
///     .with_predicate(|health: &Health| health.0 < 50)
///     .as_set()
///     .unwrap();
///
/// let entity = world.create_entity().unwrap();
/// world.set(entity, Health(100)).unwrap();
/// assert!(wounded.is_empty());
///
/// world.set(entity, Health(20)).unwrap();
/// assert!(wounded.contains(entity));
/// ```
pub struct EntityRuleBuilder<'w> {
    world: &'w mut World,
    rule: EntityRule,
    hooks: Vec<Hook>,
    edge_triggered: bool,
    error: Option<EcsError>,
}

impl<'w> EntityRuleBuilder<'w> {
    pub(crate) fn new(world: &'w mut World) -> Self {
        EntityRuleBuilder {
            world,
            rule: EntityRule::default(),
            hooks: Vec::new(),
            edge_triggered: false,
            error: None,
        }
    }

    fn register(&mut self, descriptor: &ComponentDescriptor) -> Option<ComponentFlag> {
        if self.error.is_some() {
            return None;
        }

        match (descriptor.register)(self.world) {
            Ok(flag) => Some(flag),
            Err(err) => {
                self.error = Some(err);
                None
            }
        }
    }

    fn hook(&mut self, descriptor: &ComponentDescriptor, kind: HookKind) {
        let known = self
            .hooks
            .iter()
            .any(|hook| hook.type_id == descriptor.type_id && hook.kind == kind);

        if !known {
            self.hooks.push(Hook {
                type_id: descriptor.type_id,
                kind,
                subscribe: descriptor.hook(kind),
            });
        }
    }

    fn group(&mut self, descriptors: &[ComponentDescriptor], kind: Option<HookKind>) -> ComponentFlags {
        let mut group = ComponentFlags::empty();
        for descriptor in descriptors {
            if let Some(flag) = self.register(descriptor) {
                group.set(flag, true);
                self.hook(descriptor, HookKind::State);
                if let Some(kind) = kind {
                    self.hook(descriptor, kind);
                }
            }
        }
        group
    }

    fn require(mut self, descriptor: ComponentDescriptor, trigger: Option<HookKind>) -> Self {
        if let Some(flag) = self.register(&descriptor) {
            self.rule.with.set(flag, true);
            self.hook(&descriptor, HookKind::State);
            if let Some(kind) = trigger {
                self.hook(&descriptor, kind);
                self.edge_triggered = true;
            }
        }
        self
    }

    fn exclude(mut self, descriptor: ComponentDescriptor, trigger: Option<HookKind>) -> Self {
        if let Some(flag) = self.register(&descriptor) {
            self.rule.without.set(flag, true);
            self.hook(&descriptor, HookKind::State);
            if let Some(kind) = trigger {
                self.hook(&descriptor, kind);
                self.edge_triggered = true;
            }
        }
        self
    }

    /// Require an enabled `T`
    pub fn with<T: Component>(self) -> Self {
        self.require(ComponentDescriptor::of::<T>(), None)
    }

    /// Require no enabled `T`
    pub fn without<T: Component>(self) -> Self {
        self.exclude(ComponentDescriptor::of::<T>(), None)
    }

    /// Require at least one enabled member of the group
    pub fn with_either<G: ComponentGroup>(mut self) -> Self {
        let group = self.group(&G::descriptors(), None);
        self.rule.with_either.push(group);
        self
    }

    /// Require at least one member of the group to be absent or disabled
    pub fn without_either<G: ComponentGroup>(mut self) -> Self {
        let group = self.group(&G::descriptors(), None);
        self.rule.without_either.push(group);
        self
    }

    /// Require an enabled `T` whose current value satisfies `predicate`
    ///
    /// The entity is re-evaluated whenever [`World::notify_changed`] or an
    /// overwrite reports a change of `T`.
    pub fn with_predicate<T, F>(mut self, predicate: F) -> Self
    where
        T: Component,
        F: Fn(&T) -> bool + 'static,
    {
        let descriptor = ComponentDescriptor::of::<T>();
        if let Some(flag) = self.register(&descriptor) {
            self.rule.with.set(flag, true);
            self.hook(&descriptor, HookKind::State);
            self.hook(&descriptor, HookKind::ChangedState);
            self.rule.predicates.push(Rc::new(move |view: &WorldView<'_>, entity: Entity| {
                view.get::<T>(entity).map_or(false, |value| predicate(value))
            }));
        }
        self
    }

    /// Collect entities when `T` is added or enabled
    pub fn when_added<T: Component>(self) -> Self {
        self.require(ComponentDescriptor::of::<T>(), Some(HookKind::Added))
    }

    /// Collect entities when their enabled `T` is reported changed
    pub fn when_changed<T: Component>(self) -> Self {
        self.require(ComponentDescriptor::of::<T>(), Some(HookKind::Changed))
    }

    /// Collect entities when `T` is removed or disabled
    pub fn when_removed<T: Component>(self) -> Self {
        self.exclude(ComponentDescriptor::of::<T>(), Some(HookKind::Removed))
    }

    /// [`when_added`](Self::when_added) for any member of the group
    pub fn when_added_either<G: ComponentGroup>(mut self) -> Self {
        let group = self.group(&G::descriptors(), Some(HookKind::Added));
        self.rule.with_either.push(group);
        self.edge_triggered = true;
        self
    }

    /// [`when_changed`](Self::when_changed) for any member of the group
    pub fn when_changed_either<G: ComponentGroup>(mut self) -> Self {
        let group = self.group(&G::descriptors(), Some(HookKind::Changed));
        self.rule.with_either.push(group);
        self.edge_triggered = true;
        self
    }

    /// [`when_removed`](Self::when_removed) for any member of the group
    pub fn when_removed_either<G: ComponentGroup>(mut self) -> Self {
        let group = self.group(&G::descriptors(), Some(HookKind::Removed));
        self.rule.without_either.push(group);
        self.edge_triggered = true;
        self
    }

    fn subscribe(world: &World, reactor: &SharedReactor, hooks: &[Hook]) -> Vec<Subscription> {
        let mut subscriptions = entity_hooks(world, reactor);
        for hook in hooks {
            subscriptions.extend((hook.subscribe)(world, reactor));
        }
        subscriptions
    }

    fn populate(world: &World, reactor: &SharedReactor) {
        let view = WorldView::new(world);
        let mut reactor = reactor.borrow_mut();
        for entity in world.alive_entities() {
            let components = world.component_flags(entity);
            reactor.on_state_changed(&view, entity, &components);
        }
    }

    /// Materialize the rule as a live [`EntitySet`]
    ///
    /// A steady set starts with every entity currently matching; an
    /// edge-triggered one starts empty.
    ///
    /// # Errors
    ///
    /// [`EcsError::TooManyComponentTypes`] if a type could not be registered.
    pub fn as_set(self) -> Result<EntitySet> {
        if let Some(err) = self.error {
            return Err(err);
        }

        let world: &World = self.world;
        let state = Rc::new(RefCell::new(SetReactor::new(self.rule, self.edge_triggered)));
        let reactor: SharedReactor = state.clone();

        let subscriptions = Self::subscribe(world, &reactor, &self.hooks);
        if !self.edge_triggered {
            Self::populate(world, &reactor);
        }

        debug!(
            world = world.id().raw(),
            edge_triggered = self.edge_triggered,
            subscriptions = subscriptions.len(),
            "entity set created"
        );
        Ok(EntitySet::new(world.id(), state, subscriptions))
    }

    /// Materialize the rule as a live [`EntityMap`] keyed by the value of `K`
    ///
    /// Requires an enabled `K`. The map re-keys an entity whenever a change
    /// of `K` is reported.
    pub fn as_map<K>(self) -> Result<EntityMap<K>>
    where
        K: Component + Eq + Hash,
    {
        let mut builder = self.with::<K>();
        if let Some(err) = builder.error.take() {
            return Err(err);
        }

        let world: &World = builder.world;
        let state = Rc::new(RefCell::new(MapReactor::<K>::new(
            builder.rule,
            builder.edge_triggered,
        )));
        let reactor: SharedReactor = state.clone();

        let mut subscriptions = Self::subscribe(world, &reactor, &builder.hooks);
        subscriptions.extend(key_hooks::<K>(world, &reactor));
        if !builder.edge_triggered {
            Self::populate(world, &reactor);
        }

        debug!(
            world = world.id().raw(),
            key = K::type_name(),
            edge_triggered = builder.edge_triggered,
            "entity map created"
        );
        Ok(EntityMap::new(world.id(), state, subscriptions))
    }

    /// Freeze the rule into a predicate evaluated on demand
    pub fn as_predicate(self) -> Result<EntityPredicate> {
        if let Some(err) = self.error {
            return Err(err);
        }

        Ok(EntityPredicate {
            world: self.world.id(),
            rule: self.rule,
        })
    }
}

/// A rule checked against a world on demand, without subscriptions
#[derive(Debug, Clone)]
pub struct EntityPredicate {
    world: WorldId,
    rule: EntityRule,
}

impl EntityPredicate {
    /// World the rule was built for
    pub fn world_id(&self) -> WorldId {
        self.world
    }

    /// Whether the entity currently satisfies the rule
    ///
    /// Dead entities and entities of other worlds never match.
    pub fn matches(&self, world: &World, entity: Entity) -> bool {
        if world.id() != self.world || !world.is_alive(entity) {
            return false;
        }

        let components = world.component_flags(entity);
        self.rule
            .is_match(&WorldView::new(world), entity, &components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rule_matches_enabled_entities() {
        let mut world = World::new();
        let a = world.create_entity().unwrap();
        let b = world.create_disabled_entity().unwrap();

        let predicate = world.entities().as_predicate().unwrap();
        assert!(predicate.matches(&world, a));
        assert!(!predicate.matches(&world, b));
    }

    #[test]
    fn test_rule_algebra() {
        let mut world = World::new();
        let predicate = world
            .entities()
            .with::<u8>()
            .without::<u16>()
            .with_either::<(u32, u64)>()
            .without_either::<(i8, i16)>()
            .as_predicate()
            .unwrap();

        let entity = world.create_entity().unwrap();
        world.set(entity, 0u8).unwrap();
        assert!(!predicate.matches(&world, entity));

        world.set(entity, 0u64).unwrap();
        assert!(predicate.matches(&world, entity));

        world.set(entity, 0i8).unwrap();
        assert!(predicate.matches(&world, entity));
        world.set(entity, 0i16).unwrap();
        assert!(!predicate.matches(&world, entity));
        world.disable_component::<i8>(entity).unwrap();
        assert!(predicate.matches(&world, entity));

        world.set(entity, 0u16).unwrap();
        assert!(!predicate.matches(&world, entity));
    }

    #[test]
    fn test_predicate_rejects_foreign_entities() {
        let mut world = World::new();
        let mut other = World::new();
        let predicate = world.entities().as_predicate().unwrap();
        let foreign = other.create_entity().unwrap();

        assert!(!predicate.matches(&other, foreign));
        assert!(!predicate.matches(&world, foreign));
        assert_eq!(predicate.world_id(), world.id());
    }

    #[test]
    fn test_hooks_are_deduplicated() {
        let mut world = World::new();
        let _set = world
            .entities()
            .with::<u8>()
            .with_either::<(u8, u16)>()
            .as_set()
            .unwrap();

        use crate::ecs::ComponentAdded;
        assert_eq!(world.bus().subscriber_count::<ComponentAdded<u8>>(), 1);
        assert_eq!(world.bus().subscriber_count::<ComponentAdded<u16>>(), 1);
    }
}
