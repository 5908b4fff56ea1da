//! The script-facing surfaces.
//!
//! ```lua
//! local e = Registry.createEntity("hero", "players")
//! e:add_component(Transform, { position = { 10, 20 } })
//!
//! Registry.getEntities(Transform):exclude(Sprite):forEach(function(entity)
//!     print(entity:name())
//! end)
//!
//! local sub = EventDispatcher.add_handler(function(ev) print(ev.name) end, AssetReloaded)
//! EventDispatcher.remove_handler(sub)
//! ```
//!
//! Everything here is generic over the bridge: no function names a concrete
//! component or event type.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use mlua::{
    AnyUserData, Function, Lua, MetaMethod, Table, UserData, UserDataMethods, UserDataRef, Value as LuaValue,
    Variadic,
};
use serde_json::Value;

use crate::ecs::{Entity, Registry, RuntimeView};
use crate::event::{EventDispatcher, HandlerCounts, Subscription};
use crate::reflect::{JsonHandler, MetaAny, MetaKind, MetaRegistry, MetaTarget, RuntimeTypeId, op};

use super::convert::{self, runtime_error};

/// Event work that arrived while the dispatcher was delivering.
pub(crate) enum Deferred {
    Emit(RuntimeTypeId, Value),
    Enqueue(RuntimeTypeId, Value),
    Unsubscribe(Subscription),
}

/// State every binding reaches through the Lua app data slot.
pub(crate) struct Shared {
    pub registry: Rc<RefCell<Registry>>,
    pub meta: Rc<MetaRegistry>,
    pub events: Rc<RefCell<EventDispatcher>>,
    /// Read when `events` is busy delivering.
    pub handler_counts: HandlerCounts,
    /// Handlers added from Lua and not yet removed.
    pub subscriptions: RefCell<Vec<Subscription>>,
    pub deferred: RefCell<Vec<Deferred>>,
}

pub(crate) fn shared(lua: &Lua) -> mlua::Result<Rc<Shared>> {
    lua.app_data_ref::<Rc<Shared>>()
        .map(|state| Rc::clone(&*state))
        .ok_or_else(|| runtime_error("script engine state is gone"))
}

impl Shared {
    fn registry_ref(&self) -> mlua::Result<Ref<'_, Registry>> {
        self.registry
            .try_borrow()
            .map_err(|_| runtime_error("registry is mutably borrowed by the host"))
    }

    fn registry_mut(&self) -> mlua::Result<RefMut<'_, Registry>> {
        self.registry
            .try_borrow_mut()
            .map_err(|_| runtime_error("registry is already borrowed by the host"))
    }

    fn entity_op(&self, entity: Entity, id: RuntimeTypeId, name: &str, args: Vec<MetaAny>) -> mlua::Result<MetaAny> {
        let mut registry = self.registry_mut()?;
        Ok(self.meta.invoke(id, name, MetaTarget::Entity(&mut registry, entity), args))
    }

    /// A typed bridge result as a script value; empty becomes `nil`.
    fn to_script(&self, lua: &Lua, id: RuntimeTypeId, value: MetaAny) -> mlua::Result<LuaValue> {
        if value.is_empty() {
            return Ok(LuaValue::Nil);
        }
        match self.meta.invoke(id, op::TO_JSON, MetaTarget::None, vec![value]).take::<Value>() {
            Ok(json) => convert::instance(lua, id, &json),
            Err(_) => Ok(LuaValue::Nil),
        }
    }

    fn apply(&self, events: &mut EventDispatcher, work: Deferred) -> bool {
        match work {
            Deferred::Emit(id, payload) => self
                .meta
                .invoke(id, op::EMIT, MetaTarget::Events(events), vec![MetaAny::new(payload)])
                .as_bool(),
            Deferred::Enqueue(id, payload) => self
                .meta
                .invoke(id, op::ENQUEUE, MetaTarget::Events(events), vec![MetaAny::new(payload)])
                .as_bool(),
            Deferred::Unsubscribe(subscription) => {
                self.subscriptions.borrow_mut().retain(|s| *s != subscription);
                events.unsubscribe(subscription)
            }
        }
    }

    /// Run event work now, or hold it until the next update when the
    /// dispatcher is in the middle of a delivery.
    fn dispatch(&self, work: Deferred) -> bool {
        match self.events.try_borrow_mut() {
            Ok(mut events) => self.apply(&mut events, work),
            Err(_) => {
                log::debug!("dispatcher busy, deferring script event work to the next update");
                self.deferred.borrow_mut().push(work);
                true
            }
        }
    }

    /// Replay deferred work. Returns how many deferred emits went out.
    pub fn apply_deferred(&self) -> usize {
        let pending = std::mem::take(&mut *self.deferred.borrow_mut());
        if pending.is_empty() {
            return 0;
        }
        let Ok(mut events) = self.events.try_borrow_mut() else {
            self.deferred.borrow_mut().splice(0..0, pending);
            return 0;
        };

        // Work deferred during this replay waits for the next one.
        let mut emitted = 0;
        for work in pending {
            let is_emit = matches!(work, Deferred::Emit(..));
            if self.apply(&mut events, work) && is_emit {
                emitted += 1;
            }
        }
        emitted
    }

    pub fn release_subscriptions(&self) -> usize {
        let subscriptions = std::mem::take(&mut *self.subscriptions.borrow_mut());
        match self.events.try_borrow_mut() {
            Ok(mut events) => subscriptions.into_iter().filter(|s| events.unsubscribe(*s)).count(),
            Err(_) => {
                log::warn!(
                    "cannot release {} script handlers while events are being delivered",
                    subscriptions.len()
                );
                0
            }
        }
    }
}

// ── Entity ──────────────────────────────────────────────────────────────

/// An entity handle as seen by scripts. Compares equal by handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LuaEntity(pub Entity);

impl UserData for LuaEntity {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_method(
            "add_component",
            |lua, this, (target, fields): (LuaValue, Option<LuaValue>)| {
                let shared = shared(lua)?;
                let (id, payload) = convert::typed_payload(lua, target, fields)?;
                let stored = shared.entity_op(this.0, id, op::ADD, vec![MetaAny::new(payload)])?;
                shared.to_script(lua, id, stored)
            },
        );

        methods.add_method("has_component", |lua, this, target: LuaValue| {
            let shared = shared(lua)?;
            let id = convert::require_type_id(&target)?;
            Ok(shared.entity_op(this.0, id, op::HAS, Vec::new())?.as_bool())
        });

        methods.add_method("get_component", |lua, this, target: LuaValue| {
            let shared = shared(lua)?;
            let id = convert::require_type_id(&target)?;
            let value = shared.entity_op(this.0, id, op::GET, Vec::new())?;
            shared.to_script(lua, id, value)
        });

        methods.add_method("remove_component", |lua, this, target: LuaValue| {
            let shared = shared(lua)?;
            let id = convert::require_type_id(&target)?;
            let removed = shared.entity_op(this.0, id, op::REMOVE, Vec::new())?;
            shared.to_script(lua, id, removed)
        });

        methods.add_method("name", |lua, this, ()| {
            let shared = shared(lua)?;
            let registry = shared.registry_ref()?;
            Ok(registry.name_of(this.0).map(str::to_string))
        });

        methods.add_method("group", |lua, this, ()| {
            let shared = shared(lua)?;
            let registry = shared.registry_ref()?;
            Ok(registry.group_of(this.0).map(str::to_string))
        });

        // Slot index; a destroyed entity's slot is reused with a higher
        // generation.
        methods.add_method("id", |_, this, ()| Ok(this.0.index()));

        methods.add_method("generation", |_, this, ()| Ok(this.0.generation()));

        methods.add_method("is_alive", |lua, this, ()| Ok(shared(lua)?.registry_ref()?.is_alive(this.0)));

        methods.add_method("kill", |lua, this, ()| {
            let shared = shared(lua)?;
            let destroyed = shared.registry_mut()?.destroy(this.0);
            Ok(destroyed)
        });

        methods.add_method("kill_recursive", |lua, this, ()| {
            let shared = shared(lua)?;
            let mut registry = shared.registry_mut()?;
            if !registry.is_alive(this.0) {
                return Ok(Vec::new());
            }
            Ok(registry.remove_and_destroy(this.0))
        });

        methods.add_method("add_child", |lua, this, child: UserDataRef<LuaEntity>| {
            let shared = shared(lua)?;
            let mut registry = shared.registry_mut()?;
            if !registry.is_alive(this.0) || !registry.is_alive(child.0) {
                return Ok(false);
            }
            Ok(registry.add_child(this.0, child.0))
        });

        methods.add_method("parent", |lua, this, ()| {
            let shared = shared(lua)?;
            let registry = shared.registry_ref()?;
            Ok(registry.parent(this.0).map(LuaEntity))
        });

        methods.add_method("children", |lua, this, ()| {
            let shared = shared(lua)?;
            let registry = shared.registry_ref()?;
            Ok(registry.children(this.0).into_iter().map(LuaEntity).collect::<Vec<_>>())
        });

        methods.add_method("duplicate", |lua, this, ()| {
            let shared = shared(lua)?;
            let mut registry = shared.registry_mut()?;
            if !registry.is_alive(this.0) {
                return Ok(None);
            }
            let parent = registry.parent(this.0);
            Ok(registry.duplicate_recursive(this.0, parent).map(LuaEntity))
        });

        methods.add_meta_method(MetaMethod::Eq, |_, this, other: UserDataRef<LuaEntity>| Ok(this.0 == other.0));
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(format!("Entity({})", this.0)));
    }
}

// ── View ────────────────────────────────────────────────────────────────

/// A runtime view built from descriptors.
pub struct LuaView(pub RuntimeView);

impl UserData for LuaView {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // Entities are snapshotted first; the callback may create or kill
        // entities, and ones that stop matching are skipped.
        methods.add_function("forEach", |lua, (ud, callback): (AnyUserData, Function)| {
            let view = ud.borrow::<LuaView>()?.0.clone();
            let shared = shared(lua)?;
            let entities = view.entities(&*shared.registry_ref()?);
            let mut visited = 0;
            for entity in entities {
                if !view.contains(&*shared.registry_ref()?, entity) {
                    continue;
                }
                callback.call::<()>(LuaEntity(entity))?;
                visited += 1;
            }
            Ok(visited)
        });

        methods.add_function("exclude", |lua, (ud, targets): (AnyUserData, Variadic<LuaValue>)| {
            let ids = resolve_all(&targets)?;
            let shared = shared(lua)?;
            shared.meta.exclude(&mut ud.borrow_mut::<LuaView>()?.0, &ids);
            Ok(ud)
        });

        methods.add_method("count", |lua, this, ()| {
            let shared = shared(lua)?;
            let registry = shared.registry_ref()?;
            Ok(this.0.count(&registry))
        });
    }
}

fn resolve_all(targets: &[LuaValue]) -> mlua::Result<Vec<RuntimeTypeId>> {
    targets.iter().map(convert::require_type_id).collect()
}

// ── Subscription ────────────────────────────────────────────────────────

/// Returned by `EventDispatcher.add_handler`; pass it to `remove_handler`.
#[derive(Debug, Clone, Copy)]
pub struct LuaSubscription(pub Subscription);

impl UserData for LuaSubscription {}

// ── Globals ─────────────────────────────────────────────────────────────

fn registry_table(lua: &Lua) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    table.set(
        "createEntity",
        lua.create_function(|lua, (name, group): (Option<String>, Option<String>)| {
            let shared = shared(lua)?;
            let entity = shared
                .registry_mut()?
                .create_entity(name.as_deref().unwrap_or(""), group.as_deref().unwrap_or(""));
            Ok(LuaEntity(entity))
        })?,
    )?;

    table.set(
        "getEntities",
        lua.create_function(|lua, targets: Variadic<LuaValue>| {
            let ids = resolve_all(&targets)?;
            Ok(LuaView(shared(lua)?.meta.build_view(&ids)))
        })?,
    )?;

    table.set(
        "findEntityByTag",
        lua.create_function(|lua, name: String| {
            Ok(shared(lua)?.registry_ref()?.find_by_name(&name).map(LuaEntity))
        })?,
    )?;

    table.set(
        "clear",
        lua.create_function(|lua, ()| {
            shared(lua)?.registry_mut()?.clear();
            Ok(())
        })?,
    )?;

    table.set(
        "entityCount",
        lua.create_function(|lua, ()| Ok(shared(lua)?.registry_ref()?.entity_count()))?,
    )?;

    Ok(table)
}

fn dispatcher_table(lua: &Lua) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    table.set(
        "add_handler",
        lua.create_function(|lua, (callback, target): (Function, LuaValue)| {
            let shared = shared(lua)?;
            let id = convert::require_type_id(&target)?;
            let name = shared.meta.type_name(id).unwrap_or("<unregistered>");

            let handler_lua = lua.clone();
            let handler: JsonHandler = Box::new(move |json: &Value| {
                let result = convert::instance(&handler_lua, id, json).and_then(|event| callback.call::<()>(event));
                if let Err(err) = result {
                    log::error!("script handler for `{name}` failed: {err}");
                }
            });

            let result = {
                let mut events = shared
                    .events
                    .try_borrow_mut()
                    .map_err(|_| runtime_error("cannot add a handler while events are being delivered"))?;
                shared
                    .meta
                    .invoke(id, op::SUBSCRIBE, MetaTarget::Events(&mut events), vec![MetaAny::new(handler)])
            };
            match result.take::<Subscription>() {
                Ok(subscription) => {
                    shared.subscriptions.borrow_mut().push(subscription);
                    Ok(Some(LuaSubscription(subscription)))
                }
                Err(_) => Ok(None),
            }
        })?,
    )?;

    table.set(
        "remove_handler",
        lua.create_function(|lua, subscription: UserDataRef<LuaSubscription>| {
            Ok(shared(lua)?.dispatch(Deferred::Unsubscribe(subscription.0)))
        })?,
    )?;

    table.set(
        "emit_event",
        lua.create_function(|lua, (target, fields): (LuaValue, Option<LuaValue>)| {
            let (id, payload) = convert::typed_payload(lua, target, fields)?;
            Ok(shared(lua)?.dispatch(Deferred::Emit(id, payload)))
        })?,
    )?;

    table.set(
        "enqueue_event",
        lua.create_function(|lua, (target, fields): (LuaValue, Option<LuaValue>)| {
            let (id, payload) = convert::typed_payload(lua, target, fields)?;
            Ok(shared(lua)?.dispatch(Deferred::Enqueue(id, payload)))
        })?,
    )?;

    table.set(
        "has_handlers",
        lua.create_function(|lua, target: LuaValue| {
            let id = convert::require_type_id(&target)?;
            let shared = shared(lua)?;
            if let Ok(mut events) = shared.events.try_borrow_mut() {
                return Ok(shared
                    .meta
                    .invoke(id, op::HAS_HANDLERS, MetaTarget::Events(&mut events), Vec::new())
                    .as_bool());
            }
            // Mid-delivery: answer from the shared counts.
            Ok(match shared.meta.get(id) {
                Some(ty) if ty.kind == MetaKind::Event => shared.handler_counts.count(ty.type_id) > 0,
                _ => false,
            })
        })?,
    )?;

    table.set(
        "update",
        lua.create_function(|lua, ()| {
            let shared = shared(lua)?;
            let mut delivered = shared.apply_deferred();
            match shared.events.try_borrow_mut() {
                Ok(mut events) => delivered += events.flush_all(),
                Err(_) => log::warn!("EventDispatcher.update() called from inside a handler; ignored"),
            }
            Ok(delivered)
        })?,
    )?;

    table.set(
        "clear_queue",
        lua.create_function(|lua, ()| {
            let shared = shared(lua)?;
            shared
                .deferred
                .borrow_mut()
                .retain(|work| !matches!(work, Deferred::Enqueue(..)));
            match shared.events.try_borrow_mut() {
                Ok(mut events) => events.clear_queue(),
                Err(_) => log::warn!("EventDispatcher.clear_queue() called from inside a handler; ignored"),
            }
            Ok(())
        })?,
    )?;

    Ok(table)
}

fn make_instance(lua: &Lua, id: RuntimeTypeId, fields: Option<LuaValue>) -> mlua::Result<LuaValue> {
    let shared = shared(lua)?;
    let payload = convert::payload_of(lua, fields.unwrap_or(LuaValue::Nil))?;
    let typed = shared
        .meta
        .invoke(id, op::FROM_JSON, MetaTarget::None, vec![MetaAny::new(payload)]);
    if typed.is_empty() {
        let name = shared.meta.type_name(id).unwrap_or("<unregistered>");
        return Err(runtime_error(format!("invalid fields for `{name}`")));
    }
    shared.to_script(lua, id, typed)
}

/// `Name.type_id()`, `Name.new{...}` and `Name{...}`.
fn descriptor_table(lua: &Lua, id: RuntimeTypeId, name: &'static str, kind: MetaKind) -> mlua::Result<Table> {
    let table = lua.create_table()?;
    table.set("type_id", lua.create_function(move |_, ()| Ok(id.value()))?)?;
    table.set("type_name", name)?;
    table.set(
        "kind",
        match kind {
            MetaKind::Component => "component",
            MetaKind::Event => "event",
        },
    )?;
    table.set(
        "new",
        lua.create_function(move |lua, fields: Option<LuaValue>| make_instance(lua, id, fields))?,
    )?;

    let callable = lua.create_table()?;
    callable.set(
        "__call",
        lua.create_function(move |lua, (_, fields): (LuaValue, Option<LuaValue>)| make_instance(lua, id, fields))?,
    )?;
    table.set_metatable(Some(callable));

    convert::remember_descriptor(lua, id, &table)?;
    Ok(table)
}

/// Publish `Registry`, `EventDispatcher` and one descriptor per bridge type.
pub(crate) fn install(lua: &Lua, meta: &MetaRegistry) -> mlua::Result<()> {
    let globals = lua.globals();
    globals.set("Registry", registry_table(lua)?)?;
    globals.set("EventDispatcher", dispatcher_table(lua)?)?;
    for ty in meta.types() {
        globals.set(ty.name, descriptor_table(lua, ty.id, ty.name, ty.kind)?)?;
    }
    Ok(())
}
