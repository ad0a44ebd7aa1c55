//! Entity Component System (ECS) core implementation
//!
//! This module provides the storage engine and its reactive layer:
//! - Entity identifiers and handles
//! - Sparse-set component pools with shared (aliased) values
//! - The world, owner of ids, pools and the message bus
//! - Live entity sets and maps kept in sync through the bus

mod bus;
mod component;
mod entity;
mod map;
mod message;
pub(crate) mod ops;
mod pool;
mod rule;
mod set;
mod world;

pub use bus::{MessageBus, Subscription, WorldView};
pub use component::{Component, ComponentFlag, ComponentFlags, MAX_COMPONENT_TYPES};
pub use entity::{Entity, EntityId, WorldId};
pub use map::EntityMap;
pub use message::{
    ComponentAdded, ComponentChanged, ComponentEnabledStateChanged, ComponentRemoved,
    EntityCopyRequested, EntityCreated, EntityDisposed, EntityDisposing, EntityEnabledStateChanged,
    ManagedResourceAcquireRequested, ManagedResourceReleaseRequested, WorldDisposed,
};
pub use ops::{ComponentOps, ComponentPayload};
pub use pool::{ComponentLink, ComponentPool, ComponentTypeInfo};
#[doc(hidden)]
pub use rule::ComponentDescriptor;
pub use rule::{ComponentGroup, EntityPredicate, EntityRuleBuilder};
pub use set::EntitySet;
pub use world::{ComponentRef, World};

pub(crate) use rule::EntityRule;
