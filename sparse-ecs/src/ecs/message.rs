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
//! Messages published by a world on its bus
//!
//! Component messages carry a snapshot of the entity's [`ComponentFlags`]
//! taken after the mutation, so a subscriber can evaluate a filter without
//! reading back into the world. Values are never copied into component
//! messages; read them through the [`WorldView`](crate::ecs::WorldView)
//! handed to the handler.

use crate::ecs::{ComponentFlags, Entity, WorldId};
use std::fmt;
use std::marker::PhantomData;

macro_rules! component_message {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub struct $name<T> {
            /// Entity whose component changed
            pub entity: Entity,
            /// Enabled components of the entity after the change
            pub components: ComponentFlags,
            _marker: PhantomData<fn() -> T>,
        }

        impl<T> $name<T> {
            /// Build the message
            pub fn new(entity: Entity, components: ComponentFlags) -> Self {
                $name {
                    entity,
                    components,
                    _marker: PhantomData,
                }
            }
        }

        impl<T> Clone for $name<T> {
            fn clone(&self) -> Self {
                *self
            }
        }

        impl<T> Copy for $name<T> {}

        impl<T> fmt::Debug for $name<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("component", &std::any::type_name::<T>())
                    .field("entity", &self.entity)
                    .field("components", &self.components)
                    .finish()
            }
        }
    };
}

component_message!(
    /// A component of type `T` was attached to an entity
    ComponentAdded
);

component_message!(
    /// A component of type `T` was detached from an entity
    ///
    /// Only published when the component was enabled at the time.
    ComponentRemoved
);

component_message!(
    /// The value of an enabled component was overwritten or explicitly
    /// flagged as changed
    ComponentChanged
);

/// A component of type `T` was enabled or disabled without being removed
pub struct ComponentEnabledStateChanged<T> {
    /// Entity whose component changed
    pub entity: Entity,
    /// New state of the component
    pub enabled: bool,
    /// Enabled components of the entity after the change
    pub components: ComponentFlags,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ComponentEnabledStateChanged<T> {
    /// Build the message
    pub fn new(entity: Entity, enabled: bool, components: ComponentFlags) -> Self {
        ComponentEnabledStateChanged {
            entity,
            enabled,
            components,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for ComponentEnabledStateChanged<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ComponentEnabledStateChanged<T> {}

impl<T> fmt::Debug for ComponentEnabledStateChanged<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentEnabledStateChanged")
            .field("component", &std::any::type_name::<T>())
            .field("entity", &self.entity)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// A new entity was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityCreated {
    /// The new entity
    pub entity: Entity,
}

/// The entity was enabled or disabled as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityEnabledStateChanged {
    /// Entity whose state changed
    pub entity: Entity,
    /// New state of the entity
    pub enabled: bool,
    /// Flags of the entity after the change
    pub components: ComponentFlags,
}

/// The entity is about to be disposed; its components are still readable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDisposing {
    /// Entity being disposed
    pub entity: Entity,
}

/// The entity was disposed and every component it held has been dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityDisposed {
    /// The disposed entity; its id may be reissued afterwards
    pub entity: Entity,
}

/// An entity was duplicated, possibly into another world
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityCopyRequested {
    /// Entity that was copied
    pub source: Entity,
    /// The new entity holding the copied components
    pub copy: Entity,
}

/// The world is being dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldDisposed {
    /// Id of the world going away
    pub world: WorldId,
}

/// An entity took a reference to a managed resource value
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedResourceAcquireRequested<T> {
    /// Entity now referencing the value
    pub entity: Entity,
    /// The resource description
    pub value: T,
}

/// A reference to a managed resource value was dropped
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedResourceReleaseRequested<T> {
    /// The resource description
    pub value: T,
}
