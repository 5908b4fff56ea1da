//! # Event Dispatcher — Typed Publish/Subscribe
//!
//! Events let systems talk without knowing about each other. Any `'static`
//! type can be an event; it needs no registration and has no storage in the
//! registry, only handlers and a pending queue in the dispatcher.
//!
//! ```text
//! dispatcher.subscribe(|e: &AssetReloaded| ...)   → Subscription
//!
//! emit(ev)      deliver now, handlers in subscription order
//! enqueue(ev)   store; delivered by flush::<E>() / flush_all()
//! clear_queue() drop everything pending without delivering
//! ```
//!
//! Ordering: within one `emit`, handler N finishes before handler N+1 starts.
//! Within one flush, events of a type are delivered in enqueue order, and
//! `flush_all` visits event types in the order they were first seen.
//!
//! Handlers receive the event only; they cannot reach the dispatcher while
//! it is delivering. Code that needs to publish from inside a handler queues
//! the event somewhere and emits after the delivery returns. To ask whether
//! a type has handlers mid-delivery, hold a [`HandlerCounts`] taken
//! beforehand.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::reflect::{MetaRegistry, Reflect, ReflectError};

/// Identifies one handler registration. Pass it to
/// [`EventDispatcher::unsubscribe`] to remove the handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subscription {
    event: TypeId,
    id: u64,
}

impl Subscription {
    pub fn event_type(&self) -> TypeId {
        self.event
    }
}

type Handler<E> = Box<dyn FnMut(&E)>;

struct Channel<E> {
    handlers: Vec<(u64, Handler<E>)>,
    queue: Vec<E>,
}

impl<E> Channel<E> {
    fn new() -> Self {
        Self {
            handlers: Vec::new(),
            queue: Vec::new(),
        }
    }

    fn deliver(&mut self, event: &E) {
        for (_, handler) in self.handlers.iter_mut() {
            handler(event);
        }
    }
}

/// Type-erased view of a channel, so `flush_all` and `clear_queue` can walk
/// every event type.
trait ErasedChannel {
    fn flush(&mut self) -> usize;
    fn clear_queue(&mut self);
    fn queued(&self) -> usize;
    fn unsubscribe(&mut self, id: u64) -> bool;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn as_any(&self) -> &dyn Any;
}

impl<E: 'static> ErasedChannel for Channel<E> {
    fn flush(&mut self) -> usize {
        let pending = std::mem::take(&mut self.queue);
        for event in &pending {
            self.deliver(event);
        }
        pending.len()
    }

    fn clear_queue(&mut self) {
        self.queue.clear();
    }

    fn queued(&self) -> usize {
        self.queue.len()
    }

    fn unsubscribe(&mut self, id: u64) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handler count per event type, shared with the dispatcher that owns it.
///
/// Readable while the dispatcher is borrowed for a delivery.
#[derive(Debug, Clone, Default)]
pub struct HandlerCounts(Rc<RefCell<HashMap<TypeId, usize>>>);

impl HandlerCounts {
    pub fn count(&self, event: TypeId) -> usize {
        self.0.borrow().get(&event).copied().unwrap_or(0)
    }

    fn add(&self, event: TypeId) {
        *self.0.borrow_mut().entry(event).or_default() += 1;
    }

    fn sub(&self, event: TypeId) {
        if let Some(count) = self.0.borrow_mut().get_mut(&event) {
            *count = count.saturating_sub(1);
        }
    }
}

/// Publish/subscribe hub for every event type.
#[derive(Default)]
pub struct EventDispatcher {
    channels: HashMap<TypeId, Box<dyn ErasedChannel>>,
    /// First-seen order of event types, for `flush_all`.
    order: Vec<TypeId>,
    next_id: u64,
    counts: HandlerCounts,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel<E: 'static>(&self) -> Option<&Channel<E>> {
        self.channels
            .get(&TypeId::of::<E>())
            .and_then(|channel| channel.as_any().downcast_ref::<Channel<E>>())
    }

    fn channel_mut<E: 'static>(&mut self) -> &mut Channel<E> {
        let tid = TypeId::of::<E>();
        if !self.channels.contains_key(&tid) {
            self.order.push(tid);
        }
        self.channels
            .entry(tid)
            .or_insert_with(|| Box::new(Channel::<E>::new()))
            .as_any_mut()
            .downcast_mut::<Channel<E>>()
            .expect("channel keyed by its own TypeId")
    }

    /// Register a handler for `E`. Handlers run in subscription order.
    pub fn subscribe<E: 'static>(&mut self, handler: impl FnMut(&E) + 'static) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.channel_mut::<E>().handlers.push((id, Box::new(handler)));
        self.counts.add(TypeId::of::<E>());
        Subscription {
            event: TypeId::of::<E>(),
            id,
        }
    }

    /// Remove a handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let removed = self
            .channels
            .get_mut(&subscription.event)
            .is_some_and(|channel| channel.unsubscribe(subscription.id));
        if removed {
            self.counts.sub(subscription.event);
        }
        removed
    }

    /// A live, shared view of how many handlers each event type has.
    pub fn handler_counts(&self) -> HandlerCounts {
        self.counts.clone()
    }

    pub fn has_subscribers<E: 'static>(&self) -> bool {
        self.channel::<E>().is_some_and(|channel| !channel.handlers.is_empty())
    }

    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.channel::<E>().map_or(0, |channel| channel.handlers.len())
    }

    /// Deliver `event` to every handler now.
    pub fn emit<E: 'static>(&mut self, event: E) {
        self.channel_mut::<E>().deliver(&event);
    }

    /// Store `event` until the next flush.
    pub fn enqueue<E: 'static>(&mut self, event: E) {
        self.channel_mut::<E>().queue.push(event);
    }

    pub fn queued<E: 'static>(&self) -> usize {
        self.channel::<E>().map_or(0, |channel| channel.queue.len())
    }

    /// Total pending events across every type.
    pub fn queued_total(&self) -> usize {
        self.channels.values().map(|channel| channel.queued()).sum()
    }

    /// Deliver and clear every queued `E`. Returns how many were delivered.
    pub fn flush<E: 'static>(&mut self) -> usize {
        match self.channels.get_mut(&TypeId::of::<E>()) {
            Some(channel) => channel.flush(),
            None => 0,
        }
    }

    /// Flush every event type, in first-seen order.
    pub fn flush_all(&mut self) -> usize {
        let mut delivered = 0;
        for tid in &self.order {
            if let Some(channel) = self.channels.get_mut(tid) {
                delivered += channel.flush();
            }
        }
        delivered
    }

    /// Drop every pending event without delivering it.
    pub fn clear_queue(&mut self) {
        for channel in self.channels.values_mut() {
            channel.clear_queue();
        }
    }

    /// Drop pending events of one type.
    pub fn clear_queue_of<E: 'static>(&mut self) {
        if let Some(channel) = self.channels.get_mut(&TypeId::of::<E>()) {
            channel.clear_queue();
        }
    }
}

// ── Engine events ───────────────────────────────────────────────────────

/// A watched asset changed on disk and was picked up by the main thread.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetReloaded {
    pub name: String,
    pub path: String,
}

impl Reflect for AssetReloaded {
    const TYPE_NAME: &'static str = "AssetReloaded";
}

/// Register every engine event with the bridge.
pub fn register_engine_events(meta: &mut MetaRegistry) -> Result<(), ReflectError> {
    meta.register_event::<AssetReloaded>()
}
