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
//! Live entity set behaviour
//!
//! Steady and edge-triggered sets driven through the public world API.

use sparse_ecs::ecs::{Component, Entity, EntitySet, World};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
struct Health(i32);
impl Component for Health {}

#[derive(Debug, Clone, PartialEq)]
struct Speed(f32);
impl Component for Speed {}

#[derive(Debug, Clone)]
struct Poisoned;
impl Component for Poisoned {}

fn members(set: &EntitySet) -> BTreeSet<Entity> {
    set.to_vec().into_iter().collect()
}

fn of(entities: &[Entity]) -> BTreeSet<Entity> {
    entities.iter().copied().collect()
}

#[test]
fn test_bool_component_in_world_of_four() {
    let mut world = World::with_capacity(4);
    let entities: Vec<Entity> = (0..4).map(|_| world.create_entity().unwrap()).collect();
    assert!(world.create_entity().is_err());

    let set = world.entities().with::<bool>().as_set().unwrap();
    for entity in &entities {
        world.set(*entity, true).unwrap();
    }
    assert_eq!(members(&set), of(&entities));

    let others = [entities[0], entities[1], entities[3]];

    world.disable_component::<bool>(entities[2]).unwrap();
    assert_eq!(members(&set), of(&others));

    world.enable_component::<bool>(entities[2]).unwrap();
    assert_eq!(members(&set), of(&entities));

    world.remove::<bool>(entities[2]).unwrap();
    assert_eq!(members(&set), of(&others));

    world.enable(entities[2]).unwrap();
    assert_eq!(members(&set), of(&others));
}

#[test]
fn test_set_is_populated_from_existing_entities() {
    let mut world = World::new();
    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    let c = world.create_disabled_entity().unwrap();
    world.set(a, Health(1)).unwrap();
    world.set_disabled(b, Health(2)).unwrap();
    world.set(c, Health(3)).unwrap();

    let set = world.entities().with::<Health>().as_set().unwrap();
    assert_eq!(set.to_vec(), vec![a]);
}

#[test]
fn test_with_and_without() {
    let mut world = World::new();
    let set = world
        .entities()
        .with::<Health>()
        .without::<Poisoned>()
        .as_set()
        .unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, Health(10)).unwrap();
    assert!(set.contains(entity));

    world.set(entity, Poisoned).unwrap();
    assert!(!set.contains(entity));

    world.disable_component::<Poisoned>(entity).unwrap();
    assert!(set.contains(entity));

    world.enable_component::<Poisoned>(entity).unwrap();
    world.remove::<Poisoned>(entity).unwrap();
    assert!(set.contains(entity));
}

#[test]
fn test_empty_rule_tracks_all_enabled_entities() {
    let mut world = World::new();
    let set = world.entities().as_set().unwrap();

    let a = world.create_entity().unwrap();
    let b = world.create_disabled_entity().unwrap();
    assert_eq!(set.to_vec(), vec![a]);

    world.enable(b).unwrap();
    assert_eq!(set.len(), 2);

    world.dispose(a).unwrap();
    assert_eq!(set.to_vec(), vec![b]);
}

#[test]
fn test_either_groups_are_and_ed() {
    let mut world = World::new();
    let set = world
        .entities()
        .with_either::<(u8, u16)>()
        .with_either::<(u32, u64)>()
        .as_set()
        .unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, 1u8).unwrap();
    world.set(entity, 1u16).unwrap();
    assert!(!set.contains(entity));

    world.set(entity, 1u64).unwrap();
    assert!(set.contains(entity));

    world.remove::<u8>(entity).unwrap();
    assert!(set.contains(entity));
    world.disable_component::<u16>(entity).unwrap();
    assert!(!set.contains(entity));
}

#[test]
fn test_without_either_needs_one_member_missing() {
    let mut world = World::new();
    let set = world
        .entities()
        .with::<Health>()
        .without_either::<(u8, u16)>()
        .as_set()
        .unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, Health(1)).unwrap();
    world.set(entity, 1u8).unwrap();
    assert!(set.contains(entity));

    world.set(entity, 1u16).unwrap();
    assert!(!set.contains(entity));

    world.remove::<u8>(entity).unwrap();
    assert!(set.contains(entity));
}

#[test]
fn test_predicate_is_reevaluated_on_change() {
    let mut world = World::new();
    let low = world
        .entities()
        .with_predicate(|health: &Health| health.0 < 10)
        .as_set()
        .unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, Health(50)).unwrap();
    assert!(low.is_empty());

    world.get_mut::<Health>(entity).unwrap().0 = 5;
    assert!(low.is_empty());
    world.notify_changed::<Health>(entity).unwrap();
    assert!(low.contains(entity));

    world.set(entity, Health(20)).unwrap();
    assert!(low.is_empty());
}

#[test]
fn test_shared_value_mutation_reaches_all_aliases() {
    let mut world = World::new();
    let low = world
        .entities()
        .with_predicate(|health: &Health| health.0 < 10)
        .as_set()
        .unwrap();

    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    world.set(a, Health(5)).unwrap();
    world.set_same_as::<Health>(b, a).unwrap();
    assert_eq!(low.len(), 2);

    world.set(a, Health(50)).unwrap();
    assert_eq!(*world.get::<Health>(b).unwrap(), Health(50));

    // Only the entity the change was reported for is re-evaluated
    assert_eq!(low.to_vec(), vec![b]);
    world.notify_changed::<Health>(b).unwrap();
    assert!(low.is_empty());
}

#[test]
fn test_when_added_collects_until_completed() {
    let mut world = World::new();
    let added = world.entities().when_added::<Health>().as_set().unwrap();
    assert!(added.is_edge_triggered());

    let existing = world.create_entity().unwrap();
    world.set(existing, Health(1)).unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, Health(1)).unwrap();
    assert_eq!(members(&added), of(&[existing, entity]));

    added.complete();
    assert!(added.is_empty());

    // Overwrites, toggling the entity and unrelated changes do not re-add
    world.set(entity, Health(2)).unwrap();
    world.disable(entity).unwrap();
    world.enable(entity).unwrap();
    world.set(entity, Speed(1.0)).unwrap();
    assert!(added.is_empty());

    world.disable_component::<Health>(entity).unwrap();
    world.enable_component::<Health>(entity).unwrap();
    assert_eq!(added.to_vec(), vec![entity]);

    added.complete();
    world.remove::<Health>(entity).unwrap();
    world.set(entity, Health(3)).unwrap();
    assert_eq!(added.to_vec(), vec![entity]);
}

#[test]
fn test_when_added_ignores_pre_existing_state() {
    let mut world = World::new();
    let entity = world.create_entity().unwrap();
    world.set(entity, Health(1)).unwrap();

    let added = world.entities().when_added::<Health>().as_set().unwrap();
    assert!(added.is_empty());
}

#[test]
fn test_when_added_drops_entity_that_stops_matching() {
    let mut world = World::new();
    let added = world
        .entities()
        .when_added::<Health>()
        .without::<Poisoned>()
        .as_set()
        .unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, Health(1)).unwrap();
    assert!(added.contains(entity));

    world.set(entity, Poisoned).unwrap();
    assert!(added.is_empty());

    let other = world.create_entity().unwrap();
    world.set(other, Health(1)).unwrap();
    world.disable(other).unwrap();
    assert!(added.is_empty());
}

#[test]
fn test_when_changed_requires_presence() {
    let mut world = World::new();
    let changed = world.entities().when_changed::<Health>().as_set().unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, Health(1)).unwrap();
    assert!(changed.is_empty());

    world.set(entity, Health(2)).unwrap();
    assert!(changed.contains(entity));
    changed.complete();

    world.get_mut::<Health>(entity).unwrap().0 = 3;
    world.notify_changed::<Health>(entity).unwrap();
    assert!(changed.contains(entity));
    changed.complete();

    world.disable_component::<Health>(entity).unwrap();
    world.set(entity, Health(4)).unwrap();
    assert!(changed.is_empty());
}

#[test]
fn test_when_removed_tracks_removal_and_disabling() {
    let mut world = World::new();
    let removed = world.entities().when_removed::<Health>().as_set().unwrap();

    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    world.set(a, Health(1)).unwrap();
    world.set(b, Health(1)).unwrap();
    assert!(removed.is_empty());

    world.remove::<Health>(a).unwrap();
    world.disable_component::<Health>(b).unwrap();
    assert_eq!(members(&removed), of(&[a, b]));

    world.enable_component::<Health>(b).unwrap();
    assert_eq!(removed.to_vec(), vec![a]);

    world.dispose(a).unwrap();
    assert!(removed.is_empty());
}

#[test]
fn test_either_triggers() {
    let mut world = World::new();
    let added = world
        .entities()
        .when_added_either::<(Health, Speed)>()
        .as_set()
        .unwrap();
    let removed = world
        .entities()
        .when_removed_either::<(Health, Speed)>()
        .as_set()
        .unwrap();
    let changed = world
        .entities()
        .when_changed_either::<(Health, Speed)>()
        .as_set()
        .unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, Speed(1.0)).unwrap();
    assert!(added.contains(entity));
    assert!(changed.is_empty());

    world.set(entity, Speed(2.0)).unwrap();
    assert!(changed.contains(entity));

    world.remove::<Speed>(entity).unwrap();
    assert!(removed.contains(entity));
    assert!(added.is_empty());
}

#[test]
fn test_multiple_triggers_are_alternatives() {
    let mut world = World::new();
    let set = world
        .entities()
        .when_added::<Health>()
        .when_changed::<Speed>()
        .as_set()
        .unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, Speed(1.0)).unwrap();
    world.set(entity, Health(1)).unwrap();
    assert!(set.contains(entity));

    set.complete();
    world.set(entity, Speed(2.0)).unwrap();
    assert!(set.contains(entity));
}

#[test]
fn test_complete_leaves_steady_sets_alone() {
    let mut world = World::new();
    let set = world.entities().with::<Health>().as_set().unwrap();
    let entity = world.create_entity().unwrap();
    world.set(entity, Health(1)).unwrap();

    set.complete();
    assert!(set.contains(entity));
}

#[test]
fn test_sets_of_other_worlds_are_unaffected() {
    let mut world = World::new();
    let mut other = World::new();
    let set = world.entities().with::<Health>().as_set().unwrap();

    let foreign = other.create_entity().unwrap();
    other.set(foreign, Health(1)).unwrap();

    assert!(set.is_empty());
    assert!(!set.contains(foreign));
    assert_eq!(set.world_id(), world.id());
}

/// Deterministic sequence of operations, membership checked after each one
#[test]
fn test_membership_tracks_any_interleaving() {
    let mut world = World::with_capacity(16);
    let set = world
        .entities()
        .with::<Health>()
        .with::<Speed>()
        .as_set()
        .unwrap();
    let entities: Vec<Entity> = (0..8).map(|_| world.create_entity().unwrap()).collect();

    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    for step in 0..2_000 {
        let roll = next();
        let entity = entities[(roll % entities.len() as u64) as usize];

        match (roll >> 8) % 8 {
            0 => world.set(entity, Health(step)).unwrap(),
            1 => world.set(entity, Speed(step as f32)).unwrap(),
            2 => {
                world.remove::<Health>(entity).unwrap();
            }
            3 => {
                world.remove::<Speed>(entity).unwrap();
            }
            4 => {
                if world.has::<Health>(entity) {
                    world.disable_component::<Health>(entity).unwrap();
                }
            }
            5 => {
                if world.has::<Speed>(entity) {
                    world.enable_component::<Speed>(entity).unwrap();
                }
                if world.has::<Health>(entity) {
                    world.enable_component::<Health>(entity).unwrap();
                }
            }
            6 => world.disable(entity).unwrap(),
            _ => world.enable(entity).unwrap(),
        }

        let expected: BTreeSet<Entity> = entities
            .iter()
            .copied()
            .filter(|e| {
                world.is_enabled(*e)
                    && world.is_component_enabled::<Health>(*e)
                    && world.is_component_enabled::<Speed>(*e)
            })
            .collect();
        assert_eq!(members(&set), expected, "diverged at step {}", step);
    }
}
