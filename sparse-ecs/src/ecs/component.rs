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
//! Component capability trait and per-entity component flags
//!
//! Components are plain data attached to entities. What a pool does with a
//! type is decided at compile time by the associated constants of
//! [`Component`]: zero-sized types are *flag* components that all holders
//! share, and *managed resource* types make the world publish acquire and
//! release messages so an external manager can refcount the handles they
//! describe.
//!
//! Each world gives every registered component type a bit in
//! [`ComponentFlags`]. Bit 0 marks the entity itself as enabled, so a single
//! `contains_all` test answers "is enabled and has every required component
//! enabled".

use std::fmt;

/// Trait that all components must implement
///
/// Keep components small and focused; they are stored contiguously per type.
///
/// # Example
///
/// ```
/// use sparse_ecs::ecs::Component;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct Health(u32);
///
/// impl Component for Health {}
///
/// #[derive(Debug, Clone)]
/// struct Frozen;
///
/// impl Component for Frozen {}
///
/// assert!(!Health::IS_FLAG);
/// assert!(Frozen::IS_FLAG);
/// ```
pub trait Component: Clone + Send + Sync + 'static {
    /// Zero-sized marker: every holder aliases one shared slot and the pool
    /// never runs out of capacity
    const IS_FLAG: bool = std::mem::size_of::<Self>() == 0;

    /// The value describes an external resource; the world publishes
    /// [`ManagedResourceAcquireRequested`](crate::ecs::ManagedResourceAcquireRequested)
    /// and [`ManagedResourceReleaseRequested`](crate::ecs::ManagedResourceReleaseRequested)
    /// for every reference taken or dropped
    const IS_MANAGED_RESOURCE: bool = false;

    /// Readable name used in errors and logs
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

macro_rules! impl_component {
    ($($ty:ty),* $(,)?) => {
        $(impl Component for $ty {})*
    };
}

impl_component!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, &'static str, ()
);

const FLAG_WORDS: usize = 4;

/// Number of component types a single world can track
pub const MAX_COMPONENT_TYPES: usize = FLAG_WORDS * 64 - 1;

/// Bit position inside [`ComponentFlags`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentFlag(u8);

impl ComponentFlag {
    /// The bit that marks the entity itself as enabled
    pub const IS_ENABLED: ComponentFlag = ComponentFlag(0);

    pub(crate) fn for_type_index(index: usize) -> Self {
        debug_assert!(index < MAX_COMPONENT_TYPES);
        ComponentFlag(index as u8 + 1)
    }

    /// Position of the bit
    pub fn bit(self) -> usize {
        self.0 as usize
    }
}

/// Fixed-size bitset of enabled components for one entity
///
/// `Copy` so messages can carry a snapshot of the entity's state by value.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentFlags([u64; FLAG_WORDS]);

impl ComponentFlags {
    /// The empty set
    pub const fn empty() -> Self {
        ComponentFlags([0; FLAG_WORDS])
    }

    /// Whether `flag` is set
    #[inline]
    pub fn contains(&self, flag: ComponentFlag) -> bool {
        let bit = flag.bit();
        self.0[bit / 64] & (1 << (bit % 64)) != 0
    }

    /// Set or clear `flag`, returning whether the bit changed
    #[inline]
    pub fn set(&mut self, flag: ComponentFlag, value: bool) -> bool {
        let bit = flag.bit();
        let word = &mut self.0[bit / 64];
        let mask = 1u64 << (bit % 64);
        let before = *word & mask != 0;
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
        before != value
    }

    /// Builder-style [`set`](Self::set)
    pub fn with(mut self, flag: ComponentFlag) -> Self {
        self.set(flag, true);
        self
    }

    /// Every bit of `other` is also set in `self`
    #[inline]
    pub fn contains_all(&self, other: &ComponentFlags) -> bool {
        self.0.iter().zip(other.0.iter()).all(|(a, b)| a & b == *b)
    }

    /// At least one bit of `other` is set in `self`
    #[inline]
    pub fn intersects(&self, other: &ComponentFlags) -> bool {
        self.0.iter().zip(other.0.iter()).any(|(a, b)| a & b != 0)
    }

    /// No bit is set
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|w| *w == 0)
    }

    /// Union of both sets
    pub fn union(&self, other: &ComponentFlags) -> Self {
        let mut words = self.0;
        for (w, o) in words.iter_mut().zip(other.0.iter()) {
            *w |= o;
        }
        ComponentFlags(words)
    }

    /// Iterate the set bits in ascending order
    pub fn iter(&self) -> impl Iterator<Item = ComponentFlag> + '_ {
        (0..FLAG_WORDS * 64)
            .filter(move |bit| self.0[bit / 64] & (1 << (bit % 64)) != 0)
            .map(|bit| ComponentFlag(bit as u8))
    }
}

impl fmt::Debug for ComponentFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(|flag| flag.bit())).finish()
    }
}
