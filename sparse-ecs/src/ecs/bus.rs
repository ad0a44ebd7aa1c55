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
//! Synchronous per-world publish/subscribe
//!
//! Every [`World`] owns one [`MessageBus`]. A channel exists per message
//! type; publishing runs each handler of that channel in subscription order
//! before returning. Handlers receive the message by reference together with
//! a read-only [`WorldView`].
//!
//! Subscribing to or unsubscribing from a channel while it is dispatching is
//! allowed. The change is queued and applied once the outermost dispatch of
//! that channel returns, so the handler list is never mutated mid-iteration.
//!
//! The bus is single-threaded (`Rc`/`RefCell`): one logical thread mutates a
//! world and drives its dispatch.

use crate::ecs::{Component, ComponentFlags, Entity, World, WorldId};
use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

type Handler<M> = Box<dyn Fn(&M, &WorldView<'_>)>;

enum PendingChange<M> {
    Subscribe(u64, Handler<M>),
    Unsubscribe(u64),
}

struct Channel<M> {
    handlers: RefCell<Vec<(u64, Handler<M>)>>,
    pending: RefCell<Vec<PendingChange<M>>>,
    depth: Cell<usize>,
    next_id: Cell<u64>,
}

impl<M: 'static> Channel<M> {
    fn new() -> Self {
        Channel {
            handlers: RefCell::new(Vec::new()),
            pending: RefCell::new(Vec::new()),
            depth: Cell::new(0),
            next_id: Cell::new(0),
        }
    }

    fn subscribe(&self, handler: Handler<M>) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        if self.depth.get() > 0 {
            self.pending
                .borrow_mut()
                .push(PendingChange::Subscribe(id, handler));
        } else {
            self.handlers.borrow_mut().push((id, handler));
        }

        id
    }

    fn dispatch(&self, message: &M, view: &WorldView<'_>) {
        self.depth.set(self.depth.get() + 1);
        let _guard = DispatchGuard { channel: self };

        let handlers = self.handlers.borrow();
        for (_, handler) in handlers.iter() {
            handler(message, view);
        }
    }

    fn apply_pending(&self) {
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        if pending.is_empty() {
            return;
        }

        let mut handlers = self.handlers.borrow_mut();
        for change in pending {
            match change {
                PendingChange::Subscribe(id, handler) => handlers.push((id, handler)),
                PendingChange::Unsubscribe(id) => handlers.retain(|(h, _)| *h != id),
            }
        }
    }

    fn len(&self) -> usize {
        self.handlers.borrow().len()
    }
}

/// Decrements the dispatch depth even if a handler panics
struct DispatchGuard<'c, M: 'static> {
    channel: &'c Channel<M>,
}

impl<M: 'static> Drop for DispatchGuard<'_, M> {
    fn drop(&mut self) {
        let depth = self.channel.depth.get() - 1;
        self.channel.depth.set(depth);
        if depth == 0 {
            self.channel.apply_pending();
        }
    }
}

trait Unsubscribe {
    fn unsubscribe(&self, id: u64);
}

impl<M: 'static> Unsubscribe for Channel<M> {
    fn unsubscribe(&self, id: u64) {
        if self.depth.get() > 0 {
            self.pending
                .borrow_mut()
                .push(PendingChange::Unsubscribe(id));
        } else {
            self.handlers.borrow_mut().retain(|(h, _)| *h != id);
        }
    }
}

/// Handle to a registered handler; unsubscribes when dropped
///
/// Dropping a subscription after its world is gone does nothing.
#[must_use = "the handler is unsubscribed as soon as the subscription is dropped"]
pub struct Subscription {
    channel: Weak<dyn Unsubscribe>,
    id: u64,
}

impl Subscription {
    /// Unsubscribe now
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(channel) = self.channel.upgrade() {
            channel.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &(self.channel.strong_count() > 0))
            .finish()
    }
}

/// Typed channels of one world
#[derive(Default)]
pub struct MessageBus {
    channels: RefCell<HashMap<TypeId, Rc<dyn Any>>>,
}

impl MessageBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    fn channel<M: 'static>(&self) -> Option<Rc<Channel<M>>> {
        let channel = self.channels.borrow().get(&TypeId::of::<M>()).cloned()?;
        channel.downcast::<Channel<M>>().ok()
    }

    fn channel_or_insert<M: 'static>(&self) -> Rc<Channel<M>> {
        if let Some(channel) = self.channel::<M>() {
            return channel;
        }

        let channel = Rc::new(Channel::<M>::new());
        self.channels
            .borrow_mut()
            .insert(TypeId::of::<M>(), channel.clone() as Rc<dyn Any>);
        channel
    }

    /// Register a handler for messages of type `M`
    pub fn subscribe<M, F>(&self, handler: F) -> Subscription
    where
        M: 'static,
        F: Fn(&M, &WorldView<'_>) + 'static,
    {
        let channel = self.channel_or_insert::<M>();
        let id = channel.subscribe(Box::new(handler));
        let weak: Weak<Channel<M>> = Rc::downgrade(&channel);

        Subscription {
            channel: weak,
            id,
        }
    }

    /// Run every handler of `M`, in subscription order
    pub fn publish<M: 'static>(&self, message: &M, view: &WorldView<'_>) {
        if let Some(channel) = self.channel::<M>() {
            channel.dispatch(message, view);
        }
    }

    /// Whether anything listens to `M`
    pub fn has_subscribers<M: 'static>(&self) -> bool {
        self.subscriber_count::<M>() > 0
    }

    /// Number of active handlers for `M`
    pub fn subscriber_count<M: 'static>(&self) -> usize {
        self.channel::<M>().map_or(0, |channel| channel.len())
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("channels", &self.channels.borrow().len())
            .finish()
    }
}

/// Read-only access to a world from inside a message handler
#[derive(Clone, Copy)]
pub struct WorldView<'w> {
    world: &'w World,
}

impl<'w> WorldView<'w> {
    pub(crate) fn new(world: &'w World) -> Self {
        WorldView { world }
    }

    /// Id of the publishing world
    pub fn world_id(&self) -> WorldId {
        self.world.id()
    }

    /// Current value of the entity's `T`, enabled or not
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&'w T> {
        self.world.try_get::<T>(entity)
    }

    /// Whether the entity is alive
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.world.is_alive(entity)
    }

    /// Whether the entity is alive and enabled
    pub fn is_enabled(&self, entity: Entity) -> bool {
        self.world.is_enabled(entity)
    }

    /// Current flags of the entity
    pub fn components(&self, entity: Entity) -> ComponentFlags {
        self.world.component_flags(entity)
    }
}

impl fmt::Debug for WorldView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldView")
            .field("world", &self.world.id())
            .finish()
    }
}
