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
//! Deferred edits recorded while iterating live sets

use sparse_ecs::command::{CommandTarget, EntityCommandRecorder};
use sparse_ecs::ecs::{Component, World};
use sparse_ecs::EcsError;

#[derive(Debug, Clone, PartialEq)]
struct Fuse(u32);
impl Component for Fuse {}

#[derive(Debug, Clone, PartialEq)]
struct Debris;
impl Component for Debris {}

#[test]
fn test_edits_recorded_during_iteration() {
    let mut world = World::new();
    let burning = world.entities().with::<Fuse>().as_set().unwrap();
    let debris = world.entities().with::<Debris>().as_set().unwrap();

    for fuse in [0, 3, 0, 5] {
        let entity = world.create_entity().unwrap();
        world.set(entity, Fuse(fuse)).unwrap();
    }

    let mut recorder = EntityCommandRecorder::new();
    for entity in burning.entities().iter() {
        if world.get::<Fuse>(*entity).unwrap().0 == 0 {
            recorder.dispose(*entity);
            let spawned = recorder.create_entity();
            recorder.set(spawned, Debris);
        }
    }
    assert_eq!(burning.len(), 4);

    let created = recorder.execute(&mut world).unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(burning.len(), 2);
    assert_eq!(debris.len(), 2);
    for entity in &created {
        assert!(debris.contains(*entity));
    }
}

#[test]
fn test_execution_stops_at_first_failure() {
    let mut world = World::new();
    let entity = world.create_entity().unwrap();
    let doomed = world.create_entity().unwrap();

    let mut recorder = EntityCommandRecorder::new();
    recorder.set(entity, Fuse(1));
    recorder.dispose(doomed);
    recorder.set(doomed, Fuse(2));
    recorder.set(entity, Fuse(3));

    assert_eq!(
        recorder.execute(&mut world),
        Err(EcsError::EntityNotAlive(doomed))
    );
    assert!(recorder.is_empty());
    assert_eq!(*world.get::<Fuse>(entity).unwrap(), Fuse(1));
    assert!(!world.is_alive(doomed));
}

#[test]
fn test_unresolved_target() {
    let mut world = World::new();
    let mut recorder = EntityCommandRecorder::new();
    recorder.set(CommandTarget::Created(3), Fuse(1));

    assert_eq!(
        recorder.execute(&mut world),
        Err(EcsError::UnresolvedCommandTarget(3))
    );
    assert_eq!(world.entity_count(), 0);
}

#[test]
fn test_component_state_commands() {
    let mut world = World::new();
    let lit = world.entities().with::<Fuse>().as_set().unwrap();
    let changed = world.entities().when_changed::<Fuse>().as_set().unwrap();

    let entity = world.create_entity().unwrap();
    world.set(entity, Fuse(1)).unwrap();

    let mut recorder = EntityCommandRecorder::new();
    recorder.disable_component::<Fuse>(entity);
    recorder.execute(&mut world).unwrap();
    assert!(lit.is_empty());

    recorder.enable_component::<Fuse>(entity);
    recorder.notify_changed::<Fuse>(entity);
    recorder.execute(&mut world).unwrap();
    assert!(lit.contains(entity));
    assert!(changed.contains(entity));

    recorder.disable(entity);
    recorder.execute(&mut world).unwrap();
    assert!(lit.is_empty());
    assert!(changed.is_empty());

    recorder.enable(entity);
    recorder.remove::<Fuse>(entity);
    recorder.execute(&mut world).unwrap();
    assert!(!world.has::<Fuse>(entity));
}

#[test]
fn test_shared_and_disabled_values() {
    let mut world = World::new();
    let reference = world.create_entity().unwrap();
    world.set(reference, Fuse(7)).unwrap();

    let mut recorder = EntityCommandRecorder::new();
    let a = recorder.create_entity();
    let b = recorder.create_entity();
    recorder.set_same_as::<Fuse>(a, reference);
    recorder.set_same_as_disabled::<Fuse>(b, reference);
    recorder.set_disabled(b, Debris);

    let created = recorder.execute(&mut world).unwrap();
    let (a, b) = (created[0], created[1]);

    assert_eq!(world.components::<Fuse>().len(), 1);
    assert_eq!(*world.get::<Fuse>(a).unwrap(), Fuse(7));
    assert!(world.is_component_enabled::<Fuse>(a));
    assert!(world.has::<Fuse>(b));
    assert!(!world.is_component_enabled::<Fuse>(b));
    assert!(!world.is_component_enabled::<Debris>(b));
}
