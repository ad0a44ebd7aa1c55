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
//! # Sparse ECS
//!
//! An in-memory entity/component store with live, incrementally maintained
//! queries.
//!
//! ## Features
//!
//! - **Sparse-set storage**: one dense, gap-free array per component type
//!   with O(1) insert, remove and lookup
//! - **Shared values**: several entities may alias one stored value, with
//!   reference counting
//! - **Live queries**: entity sets and maps updated synchronously through a
//!   per-world message bus, in steady or edge-triggered mode
//! - **Locality sort**: an interruptible background pass orders each pool by
//!   entity id (parallel across pools with the `parallel` feature)
//! - **Deferred edits**: a command recorder for changes decided while
//!   iterating
//!
//! ## Example
//!
//! ```rust
//! use sparse_ecs::ecs::{Component, World};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Position(f32, f32);
//! impl Component for Position {}
//!
//! #[derive(Debug, Clone)]
//! struct Asleep;
//! impl Component for Asleep {}
//!
//! let mut world = World::new();
//! let awake = world
//!     .entities()
//!     .with::<Position>()
//!     .without::<Asleep>()
//!     .as_set()
//!     .unwrap();
//!
//! let entity = world.create_entity().unwrap();
//! world.set(entity, Position(0.0, 1.0)).unwrap();
//! assert!(awake.contains(entity));
//!
//! world.set(entity, Asleep).unwrap();
//! assert!(awake.is_empty());
//! ```

#![warn(missing_docs)]

/// Entity Component System implementation
pub mod ecs;

/// Deferred structural edits
pub mod command;

/// World configuration
pub mod config;

/// Error types
pub mod error;

/// Component type registry for codecs
pub mod registry;

pub use command::{CommandTarget, EntityCommandRecorder};
pub use config::WorldConfig;
pub use ecs::{Component, Entity, EntityMap, EntitySet, World};
pub use error::{EcsError, Result};
pub use registry::ComponentTypeRegistry;
