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
//! Live entity map behaviour

use sparse_ecs::ecs::{Component, World};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Name(String);
impl Component for Name {}

#[derive(Debug, Clone)]
struct Hidden;
impl Component for Hidden {}

fn name(value: &str) -> Name {
    Name(value.to_string())
}

#[test]
fn test_key_collision_last_writer_wins() {
    let mut world = World::new();
    let map = world.entities().as_map::<Name>().unwrap();

    let first = world.create_entity().unwrap();
    let second = world.create_entity().unwrap();
    world.set(first, name("door")).unwrap();
    world.set(second, name("door")).unwrap();

    assert_eq!(map.get(&name("door")), Some(second));
    assert!(!map.contains_entity(first));
    assert_eq!(map.len(), 1);

    // The displaced holder does not come back when the winner leaves
    world.remove::<Name>(second).unwrap();
    assert_eq!(map.get(&name("door")), None);
    assert!(map.is_empty());
    assert_eq!(*world.get::<Name>(first).unwrap(), name("door"));
}

#[test]
fn test_displaced_holder_rejoins_on_next_change() {
    let mut world = World::new();
    let map = world.entities().as_map::<Name>().unwrap();

    let first = world.create_entity().unwrap();
    let second = world.create_entity().unwrap();
    world.set(first, name("door")).unwrap();
    world.set(second, name("door")).unwrap();

    world.set(first, name("window")).unwrap();
    assert_eq!(map.get(&name("window")), Some(first));
    assert_eq!(map.get(&name("door")), Some(second));
}

#[test]
fn test_rekey_keeps_other_keys() {
    let mut world = World::new();
    let map = world.entities().as_map::<Name>().unwrap();

    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    world.set(a, name("a")).unwrap();
    world.set(b, name("b")).unwrap();

    world.set(a, name("c")).unwrap();
    let mut keys = map.keys();
    keys.sort_by(|x, y| x.0.cmp(&y.0));
    assert_eq!(keys, vec![name("b"), name("c")]);
    assert_eq!(map.key_of(a), Some(name("c")));
}

#[test]
fn test_map_honours_rule_filters() {
    let mut world = World::new();
    let map = world
        .entities()
        .without::<Hidden>()
        .as_map::<Name>()
        .unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, name("lamp")).unwrap();
    assert!(map.contains_key(&name("lamp")));

    world.set(entity, Hidden).unwrap();
    assert!(map.is_empty());

    world.remove::<Hidden>(entity).unwrap();
    assert_eq!(map.get(&name("lamp")), Some(entity));

    world.disable(entity).unwrap();
    assert!(map.is_empty());
    world.enable(entity).unwrap();
    world.dispose(entity).unwrap();
    assert!(map.is_empty());
}

#[test]
fn test_edge_triggered_map() {
    let mut world = World::new();
    let map = world
        .entities()
        .when_added::<u8>()
        .as_map::<Name>()
        .unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, name("crate")).unwrap();
    assert!(map.is_empty());

    world.set(entity, 1u8).unwrap();
    assert_eq!(map.get(&name("crate")), Some(entity));

    map.complete();
    assert!(map.is_empty());

    world.set(entity, 2u8).unwrap();
    assert!(map.is_empty());
}

#[test]
fn test_shared_key_value() {
    let mut world = World::new();
    let map = world.entities().as_map::<Name>().unwrap();

    let a = world.create_entity().unwrap();
    let b = world.create_entity().unwrap();
    world.set(a, name("twin")).unwrap();
    world.set_same_as::<Name>(b, a).unwrap();

    assert_eq!(map.get(&name("twin")), Some(b));
    assert_eq!(map.len(), 1);
}
