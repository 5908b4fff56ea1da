//! The standard bridge operation set for an event type.
//!
//! All operations take `MetaTarget::Events(dispatcher)` except the JSON
//! conversions. `emit` and `enqueue` accept the event or a JSON payload.
//! `subscribe` takes a [`JsonHandler`] and returns a [`Subscription`]; the
//! handler sees each event serialized to JSON, which is how scripts observe
//! native events without per-type glue.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::event::{EventDispatcher, Subscription};

use super::any::MetaAny;
use super::registry::{MetaKind, MetaOps, MetaRegistry, MetaTarget, ReflectError, op};
use super::type_id::Reflect;

/// Handler shape accepted by the `subscribe` operation.
pub type JsonHandler = Box<dyn FnMut(&Value)>;

/// Everything a type needs to be reachable from scripts as an event.
pub trait ReflectEvent: Reflect + Clone + Serialize + DeserializeOwned {}

impl<T: Reflect + Clone + Serialize + DeserializeOwned> ReflectEvent for T {}

fn dispatcher(target: MetaTarget<'_>) -> Option<&mut EventDispatcher> {
    match target {
        MetaTarget::Events(events) => Some(events),
        _ => None,
    }
}

fn first_arg(args: Vec<MetaAny>) -> MetaAny {
    args.into_iter().next().unwrap_or_default()
}

/// The full event operation set for `T`.
pub fn event_ops<T: ReflectEvent>() -> MetaOps {
    MetaOps::new()
        .with(op::EMIT, |target, args| {
            let (Some(events), Some(event)) = (dispatcher(target), first_arg(args).into_payload::<T>()) else {
                return MetaAny::empty();
            };
            events.emit(event);
            MetaAny::new(true)
        })
        .with(op::ENQUEUE, |target, args| {
            let (Some(events), Some(event)) = (dispatcher(target), first_arg(args).into_payload::<T>()) else {
                return MetaAny::empty();
            };
            events.enqueue(event);
            MetaAny::new(true)
        })
        .with(op::HAS_HANDLERS, |target, _| {
            dispatcher(target).map_or_else(MetaAny::empty, |events| MetaAny::new(events.has_subscribers::<T>()))
        })
        .with(op::FLUSH, |target, _| {
            dispatcher(target).map_or_else(MetaAny::empty, |events| MetaAny::new(events.flush::<T>()))
        })
        .with(op::CLEAR_QUEUE, |target, _| match dispatcher(target) {
            Some(events) => {
                events.clear_queue_of::<T>();
                MetaAny::new(true)
            }
            None => MetaAny::empty(),
        })
        .with(op::SUBSCRIBE, |target, args| {
            let Some(events) = dispatcher(target) else {
                return MetaAny::empty();
            };
            let Ok(mut handler) = first_arg(args).take::<JsonHandler>() else {
                log::warn!("bridge: `{}` subscribe expects a JSON handler", T::TYPE_NAME);
                return MetaAny::empty();
            };
            let subscription = events.subscribe(move |event: &T| match serde_json::to_value(event) {
                Ok(json) => handler(&json),
                Err(err) => log::error!("bridge: cannot serialize `{}` for handler: {err}", T::TYPE_NAME),
            });
            MetaAny::new(subscription)
        })
        .with(op::UNSUBSCRIBE, |target, args| {
            match (dispatcher(target), first_arg(args).take::<Subscription>()) {
                (Some(events), Ok(subscription)) => MetaAny::new(events.unsubscribe(subscription)),
                _ => MetaAny::empty(),
            }
        })
        .with(op::TO_JSON, |_, args| {
            let Ok(event) = first_arg(args).take::<T>() else {
                return MetaAny::empty();
            };
            serde_json::to_value(&event).map_or_else(|_| MetaAny::empty(), MetaAny::new)
        })
        .with(op::FROM_JSON, |_, args| MetaAny::from_option(first_arg(args).into_payload::<T>()))
}

impl MetaRegistry {
    /// Register `T` with the standard event operation set.
    pub fn register_event<T: ReflectEvent>(&mut self) -> Result<(), ReflectError> {
        self.register::<T>(MetaKind::Event, event_ops::<T>())
    }
}
