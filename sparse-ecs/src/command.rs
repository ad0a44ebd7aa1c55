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
//! Deferred structural edits
//!
//! Live sets hand out their members while the world cannot be mutated. An
//! [`EntityCommandRecorder`] queues the structural changes decided during
//! such an iteration and applies them afterwards, in recording order.
//!
//! Commands are a closed enum. Component values are stored boxed next to the
//! [`ComponentOps`] table of their type, so execution needs no generic
//! parameter. Entities created by the recorder are addressed by their
//! creation index until execution resolves them.

use crate::ecs::{Component, ComponentOps, ComponentPayload, Entity, World};
use crate::error::{EcsError, Result};
use std::fmt;
use tracing::debug;

/// Entity addressed by a recorded command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandTarget {
    /// An entity that already exists
    Existing(Entity),
    /// The n-th entity created by the recorder
    Created(usize),
}

impl From<Entity> for CommandTarget {
    fn from(entity: Entity) -> Self {
        CommandTarget::Existing(entity)
    }
}

enum Command {
    CreateEntity {
        enabled: bool,
    },
    Dispose(CommandTarget),
    Enable(CommandTarget),
    Disable(CommandTarget),
    Set {
        target: CommandTarget,
        payload: ComponentPayload,
        ops: ComponentOps,
        disabled: bool,
    },
    SetSameAs {
        target: CommandTarget,
        reference: CommandTarget,
        ops: ComponentOps,
        disabled: bool,
    },
    Remove {
        target: CommandTarget,
        ops: ComponentOps,
    },
    EnableComponent {
        target: CommandTarget,
        ops: ComponentOps,
    },
    DisableComponent {
        target: CommandTarget,
        ops: ComponentOps,
    },
    NotifyChanged {
        target: CommandTarget,
        ops: ComponentOps,
    },
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::CreateEntity { enabled } => {
                f.debug_struct("CreateEntity").field("enabled", enabled).finish()
            }
            Command::Dispose(target) => f.debug_tuple("Dispose").field(target).finish(),
            Command::Enable(target) => f.debug_tuple("Enable").field(target).finish(),
            Command::Disable(target) => f.debug_tuple("Disable").field(target).finish(),
            Command::Set {
                target,
                ops,
                disabled,
                ..
            } => f
                .debug_struct("Set")
                .field("target", target)
                .field("component", &ops.name())
                .field("disabled", disabled)
                .finish(),
            Command::SetSameAs {
                target,
                reference,
                ops,
                disabled,
            } => f
                .debug_struct("SetSameAs")
                .field("target", target)
                .field("reference", reference)
                .field("component", &ops.name())
                .field("disabled", disabled)
                .finish(),
            Command::Remove { target, ops }
            | Command::EnableComponent { target, ops }
            | Command::DisableComponent { target, ops }
            | Command::NotifyChanged { target, ops } => f
                .debug_struct(self.kind())
                .field("target", target)
                .field("component", &ops.name())
                .finish(),
        }
    }
}

impl Command {
    fn kind(&self) -> &'static str {
        match self {
            Command::CreateEntity { .. } => "CreateEntity",
            Command::Dispose(_) => "Dispose",
            Command::Enable(_) => "Enable",
            Command::Disable(_) => "Disable",
            Command::Set { .. } => "Set",
            Command::SetSameAs { .. } => "SetSameAs",
            Command::Remove { .. } => "Remove",
            Command::EnableComponent { .. } => "EnableComponent",
            Command::DisableComponent { .. } => "DisableComponent",
            Command::NotifyChanged { .. } => "NotifyChanged",
        }
    }
}

/// Queue of structural edits applied to a world later
///
/// # Example
///
/// ```
/// use sparse_ecs::command::EntityCommandRecorder;
/// use sparse_ecs::ecs::World;
///
/// let mut world = World::new();
/// let set = world.entities().with::<u32>().as_set().unwrap();
/// let entity = world.create_entity().unwrap();
/// world.set(entity, 1u32).unwrap();
///
/// let mut recorder = EntityCommandRecorder::new();
/// for entity in set.entities().iter() {
///     recorder.remove::<u32>(*entity);
///     let spawned = recorder.create_entity();
///     recorder.set(spawned, 2u32);
/// }
///
/// recorder.execute(&mut world).unwrap();
/// assert_eq!(world.components::<u32>(), &[2]);
/// ```
#[derive(Debug, Default)]
pub struct EntityCommandRecorder {
    commands: Vec<Command>,
    created: usize,
}

impl EntityCommandRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty recorder with room for `capacity` commands
    pub fn with_capacity(capacity: usize) -> Self {
        EntityCommandRecorder {
            commands: Vec::with_capacity(capacity),
            created: 0,
        }
    }

    /// Number of queued commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether nothing is queued
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drop every queued command
    pub fn clear(&mut self) {
        self.commands.clear();
        self.created = 0;
    }

    fn spawn(&mut self, enabled: bool) -> CommandTarget {
        self.commands.push(Command::CreateEntity { enabled });
        let target = CommandTarget::Created(self.created);
        self.created += 1;
        target
    }

    /// Queue the creation of an entity
    pub fn create_entity(&mut self) -> CommandTarget {
        self.spawn(true)
    }

    /// Queue the creation of a disabled entity
    pub fn create_disabled_entity(&mut self) -> CommandTarget {
        self.spawn(false)
    }

    /// Queue the disposal of an entity
    pub fn dispose(&mut self, target: impl Into<CommandTarget>) {
        self.commands.push(Command::Dispose(target.into()));
    }

    /// Queue enabling an entity
    pub fn enable(&mut self, target: impl Into<CommandTarget>) {
        self.commands.push(Command::Enable(target.into()));
    }

    /// Queue disabling an entity
    pub fn disable(&mut self, target: impl Into<CommandTarget>) {
        self.commands.push(Command::Disable(target.into()));
    }

    /// Queue [`World::set`]
    pub fn set<T: Component>(&mut self, target: impl Into<CommandTarget>, component: T) {
        self.commands.push(Command::Set {
            target: target.into(),
            payload: Box::new(component),
            ops: ComponentOps::of::<T>(),
            disabled: false,
        });
    }

    /// Queue [`World::set_disabled`]
    pub fn set_disabled<T: Component>(&mut self, target: impl Into<CommandTarget>, component: T) {
        self.commands.push(Command::Set {
            target: target.into(),
            payload: Box::new(component),
            ops: ComponentOps::of::<T>(),
            disabled: true,
        });
    }

    /// Queue [`World::set_same_as`]
    pub fn set_same_as<T: Component>(
        &mut self,
        target: impl Into<CommandTarget>,
        reference: impl Into<CommandTarget>,
    ) {
        self.commands.push(Command::SetSameAs {
            target: target.into(),
            reference: reference.into(),
            ops: ComponentOps::of::<T>(),
            disabled: false,
        });
    }

    /// Queue [`World::set_same_as_disabled`]
    pub fn set_same_as_disabled<T: Component>(
        &mut self,
        target: impl Into<CommandTarget>,
        reference: impl Into<CommandTarget>,
    ) {
        self.commands.push(Command::SetSameAs {
            target: target.into(),
            reference: reference.into(),
            ops: ComponentOps::of::<T>(),
            disabled: true,
        });
    }

    /// Queue [`World::remove`]
    pub fn remove<T: Component>(&mut self, target: impl Into<CommandTarget>) {
        self.commands.push(Command::Remove {
            target: target.into(),
            ops: ComponentOps::of::<T>(),
        });
    }

    /// Queue [`World::enable_component`]
    pub fn enable_component<T: Component>(&mut self, target: impl Into<CommandTarget>) {
        self.commands.push(Command::EnableComponent {
            target: target.into(),
            ops: ComponentOps::of::<T>(),
        });
    }

    /// Queue [`World::disable_component`]
    pub fn disable_component<T: Component>(&mut self, target: impl Into<CommandTarget>) {
        self.commands.push(Command::DisableComponent {
            target: target.into(),
            ops: ComponentOps::of::<T>(),
        });
    }

    /// Queue [`World::notify_changed`]
    pub fn notify_changed<T: Component>(&mut self, target: impl Into<CommandTarget>) {
        self.commands.push(Command::NotifyChanged {
            target: target.into(),
            ops: ComponentOps::of::<T>(),
        });
    }

    /// Apply every queued command to `world`, in order, and empty the queue
    ///
    /// Returns the entities created by the recording, in creation order.
    /// Execution stops at the first failing command; commands already
    /// applied stay applied and the rest are discarded.
    pub fn execute(&mut self, world: &mut World) -> Result<Vec<Entity>> {
        let mut created = Vec::with_capacity(self.created);
        let count = self.commands.len();
        self.created = 0;

        for command in self.commands.drain(..) {
            let resolve = |target: CommandTarget, created: &[Entity]| match target {
                CommandTarget::Existing(entity) => Ok(entity),
                CommandTarget::Created(index) => created
                    .get(index)
                    .copied()
                    .ok_or(EcsError::UnresolvedCommandTarget(index)),
            };

            match command {
                Command::CreateEntity { enabled } => {
                    let entity = if enabled {
                        world.create_entity()?
                    } else {
                        world.create_disabled_entity()?
                    };
                    created.push(entity);
                }
                Command::Dispose(target) => world.dispose(resolve(target, &created)?)?,
                Command::Enable(target) => world.enable(resolve(target, &created)?)?,
                Command::Disable(target) => world.disable(resolve(target, &created)?)?,
                Command::Set {
                    target,
                    payload,
                    ops,
                    disabled,
                } => (ops.apply)(world, resolve(target, &created)?, payload, disabled)?,
                Command::SetSameAs {
                    target,
                    reference,
                    ops,
                    disabled,
                } => {
                    let entity = resolve(target, &created)?;
                    let reference = resolve(reference, &created)?;
                    (ops.apply_same_as)(world, entity, reference, disabled)?
                }
                Command::Remove { target, ops } => {
                    (ops.remove)(world, resolve(target, &created)?)?;
                }
                Command::EnableComponent { target, ops } => {
                    (ops.set_enabled)(world, resolve(target, &created)?, true)?
                }
                Command::DisableComponent { target, ops } => {
                    (ops.set_enabled)(world, resolve(target, &created)?, false)?
                }
                Command::NotifyChanged { target, ops } => {
                    (ops.notify_changed)(world, resolve(target, &created)?)?
                }
            }
        }

        debug!(
            world = world.id().raw(),
            commands = count,
            created = created.len(),
            "commands executed"
        );
        Ok(created)
    }
}
