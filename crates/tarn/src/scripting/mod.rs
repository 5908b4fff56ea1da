//! # Lua Scripting
//!
//! A [`ScriptEngine`] owns one Lua state bound to a registry, a bridge and a
//! dispatcher. Scripts see:
//!
//! - `Registry`: `createEntity`, `getEntities`, `findEntityByTag`, `clear`
//! - entities: `add_component`, `get_component`, `has_component`,
//!   `remove_component`, `name`, `group`, `id`, `generation`, `kill`,
//!   `add_child`, ...
//! - views: `forEach`, `exclude`, `count`
//! - `EventDispatcher`: `add_handler`, `remove_handler`, `emit_event`,
//!   `enqueue_event`, `has_handlers`, `update`, `clear_queue`
//! - one descriptor table per bridge type, named after the type
//!
//! ## Handler lifetime
//!
//! `add_handler` returns a subscription; pass it to `remove_handler` when
//! the owning script object goes away. Dropping the engine removes every
//! handler it still has registered.
//!
//! ## Reentrancy
//!
//! Reads of the registry while the host holds it mutably fail with a Lua
//! error instead of panicking.
//!
//! The dispatcher is busy while it delivers. `has_handlers` still answers
//! from the dispatcher's shared handler counts. Emits, enqueues and handler
//! removals made from inside a handler are held and replayed by the next
//! [`apply_deferred`](ScriptEngine::apply_deferred), which
//! [`Core::update`](crate::core::Core::update) calls every frame.

pub mod bindings;
pub mod convert;

use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;

use mlua::{FromLuaMulti, Lua};

use crate::ecs::Registry;
use crate::event::EventDispatcher;
use crate::reflect::MetaRegistry;

use bindings::Shared;
pub use bindings::{LuaEntity, LuaSubscription, LuaView};

pub struct ScriptEngine {
    lua: Lua,
    shared: Rc<Shared>,
}

impl ScriptEngine {
    pub fn new(
        registry: Rc<RefCell<Registry>>,
        meta: Rc<MetaRegistry>,
        events: Rc<RefCell<EventDispatcher>>,
    ) -> mlua::Result<Self> {
        let handler_counts = events
            .try_borrow()
            .map_err(|_| convert::runtime_error("event dispatcher is borrowed during script engine startup"))?
            .handler_counts();
        let lua = Lua::new();
        let shared = Rc::new(Shared {
            registry,
            meta,
            events,
            handler_counts,
            subscriptions: RefCell::default(),
            deferred: RefCell::default(),
        });
        lua.set_app_data(Rc::clone(&shared));
        bindings::install(&lua, &shared.meta)?;

        log::info!("scripting ready: {} bridge types published", shared.meta.len());
        Ok(Self { lua, shared })
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Run a chunk of Lua source.
    pub fn exec(&self, source: &str) -> mlua::Result<()> {
        self.lua.load(source).exec()
    }

    /// Evaluate a Lua expression or chunk with a `return`.
    pub fn eval<R: FromLuaMulti>(&self, source: &str) -> mlua::Result<R> {
        self.lua.load(source).eval()
    }

    /// Load and run a script file.
    pub fn load_file(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        self.lua.load(&source).set_name(format!("@{}", path.display())).exec()?;
        log::info!("script loaded: {}", path.display());
        Ok(())
    }

    /// Replay event work deferred from inside handlers. Returns how many
    /// deferred emits were delivered.
    pub fn apply_deferred(&self) -> usize {
        self.shared.apply_deferred()
    }

    pub fn deferred_count(&self) -> usize {
        self.shared.deferred.borrow().len()
    }

    /// Handlers added from Lua and still registered.
    pub fn subscription_count(&self) -> usize {
        self.shared.subscriptions.borrow().len()
    }
}

impl Drop for ScriptEngine {
    fn drop(&mut self) {
        let released = self.shared.release_subscriptions();
        if released > 0 {
            log::debug!("script engine dropped, released {released} handlers");
        }
        self.lua.remove_app_data::<Rc<Shared>>();
    }
}
