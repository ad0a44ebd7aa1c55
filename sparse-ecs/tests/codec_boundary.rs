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
//! Codec boundary tests
//!
//! A small line-based text format written with the world's read helpers and
//! read back through a [`ComponentTypeRegistry`]. Shared values are written
//! once and referenced by their representative.

use sparse_ecs::ecs::{Component, ComponentPayload, ComponentRef, Entity, World};
use sparse_ecs::{ComponentTypeRegistry, EcsError, Result};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
struct Label(String);
impl Component for Label {}

#[derive(Debug, Clone, PartialEq)]
struct Armor(u32);
impl Component for Armor {}

fn registry() -> ComponentTypeRegistry {
    let mut registry = ComponentTypeRegistry::new();
    registry.register::<Label>("label").unwrap();
    registry.register::<Armor>("armor").unwrap();
    registry
}

fn encode_value(component: &ComponentRef<'_>) -> String {
    if let Some(label) = component.downcast_ref::<Label>() {
        label.0.clone()
    } else if let Some(armor) = component.downcast_ref::<Armor>() {
        armor.0.to_string()
    } else {
        unreachable!("unregistered component {}", component.info.name)
    }
}

fn decode_value(token: &str, text: &str) -> ComponentPayload {
    match token {
        "label" => Box::new(Label(text.to_string())),
        "armor" => Box::new(Armor(text.parse().unwrap())),
        _ => unreachable!("unknown token {}", token),
    }
}

fn write(world: &World, registry: &ComponentTypeRegistry) -> Result<String> {
    let mut out = String::new();
    for (token, info) in registry.describe(world)? {
        out.push_str(&format!("capacity {} {}\n", token, info.max_capacity));
    }

    for entity in world.alive_entities() {
        let state = if world.is_enabled(entity) { "on" } else { "off" };
        out.push_str(&format!("entity {} {}\n", entity.id(), state));

        let mut lines = Vec::new();
        world.read_components(entity, |component| {
            let token = registry.token_of(component.info.type_id).unwrap_or("?");
            let state = if component.enabled { "on" } else { "off" };
            if component.representative == entity {
                lines.push(format!("  {} {} = {}", token, state, encode_value(&component)));
            } else {
                lines.push(format!(
                    "  {} {} -> {}",
                    token,
                    state,
                    component.representative.id()
                ));
            }
        })?;

        for line in lines {
            out.push_str(&line);
            out.push('\n');
        }
    }

    Ok(out)
}

fn read(text: &str, registry: &ComponentTypeRegistry) -> Result<World> {
    let mut world = World::new();
    let mut by_saved_id: HashMap<String, Entity> = HashMap::new();
    let mut pending_links = Vec::new();
    let mut current = None;

    for line in text.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["capacity", token, max] => {
                registry.set_max_capacity(&mut world, token, max.parse().unwrap())?;
            }
            ["entity", id, state] => {
                let entity = if *state == "on" {
                    world.create_entity()?
                } else {
                    world.create_disabled_entity()?
                };
                by_saved_id.insert(id.to_string(), entity);
                current = Some(entity);
            }
            [token, state, "=", value] => {
                let entity = current.unwrap();
                let payload = decode_value(token, value);
                if *state == "on" {
                    registry.set_boxed(&mut world, token, entity, payload)?;
                } else {
                    registry.set_boxed_disabled(&mut world, token, entity, payload)?;
                }
            }
            [token, state, "->", reference] => {
                // The representative may appear later in the file
                pending_links.push((
                    token.to_string(),
                    *state == "on",
                    current.unwrap(),
                    reference.to_string(),
                ));
            }
            _ => panic!("malformed line {:?}", line),
        }
    }

    for (token, enabled, entity, reference) in pending_links {
        let reference = by_saved_id[&reference];
        if enabled {
            registry.set_same_as(&mut world, &token, entity, reference)?;
        } else {
            registry.set_same_as_disabled(&mut world, &token, entity, reference)?;
        }
    }

    Ok(world)
}

#[test]
fn test_round_trip_preserves_state_and_sharing() {
    let registry = registry();
    let mut world = World::new();
    world.set_max_capacity::<Armor>(16).unwrap();

    let knight = world.create_entity().unwrap();
    let squire = world.create_entity().unwrap();
    let ghost = world.create_disabled_entity().unwrap();

    world.set(knight, Label("knight".to_string())).unwrap();
    world.set(knight, Armor(40)).unwrap();
    world.set(squire, Label("squire".to_string())).unwrap();
    world.set_same_as::<Armor>(squire, knight).unwrap();
    world.set_disabled(ghost, Armor(1)).unwrap();

    let text = write(&world, &registry).unwrap();
    let restored = read(&text, &registry).unwrap();

    assert_eq!(restored.entity_count(), 3);
    assert_eq!(restored.max_component_capacity::<Armor>(), 16);
    assert_eq!(restored.components::<Armor>().len(), 2);

    let entities: Vec<Entity> = restored.alive_entities().collect();
    let (knight, squire, ghost) = (entities[0], entities[1], entities[2]);

    assert_eq!(*restored.get::<Label>(knight).unwrap(), Label("knight".to_string()));
    assert_eq!(*restored.get::<Armor>(squire).unwrap(), Armor(40));
    assert!(restored.pool::<Armor>().unwrap().shares_slot(knight.id(), squire.id()));

    assert!(!restored.is_enabled(ghost));
    assert!(restored.has::<Armor>(ghost));
    assert!(!restored.is_component_enabled::<Armor>(ghost));

    // A second pass writes the same document
    assert_eq!(write(&restored, &registry).unwrap(), text);
}

#[test]
fn test_unregistered_pool_is_reported() {
    let registry = registry();
    let mut world = World::new();
    let entity = world.create_entity().unwrap();
    world.set(entity, 3u64).unwrap();

    assert!(matches!(
        write(&world, &registry),
        Err(EcsError::UnknownComponentType(_))
    ));
}

#[test]
fn test_read_components_rejects_dead_entities() {
    let mut world = World::new();
    let entity = world.create_entity().unwrap();
    world.dispose(entity).unwrap();

    let mut visited = 0;
    assert_eq!(
        world.read_components(entity, |_| visited += 1),
        Err(EcsError::EntityNotAlive(entity))
    );
    assert_eq!(visited, 0);
}
