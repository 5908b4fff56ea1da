//! # Core — Owned Engine State
//!
//! Everything that would otherwise be a process-wide singleton lives here:
//! the entity registry, the reflection bridge and the event dispatcher.
//! Two `Core`s never share state, so tests can build as many as they like.
//!
//! ```text
//! Core::new(config)
//!   ├─ MetaRegistry  engine components + events registered, validated
//!   ├─ Registry      AssetWatcher published as context (hot-reload)
//!   └─ EventDispatcher
//!
//! Core::update()  once per frame
//!   1. watcher dirty flags → AssetReloaded (queued)
//!   2. deferred script emits
//!   3. flush_all
//! ```
//!
//! The three parts sit behind `Rc` so the scripting layer can hold them too.
//! Borrows are short: nothing here keeps a `RefCell` borrowed while calling
//! user code, except the dispatcher during a flush.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use crate::components::register_engine_components;
use crate::config::CoreConfig;
use crate::ecs::Registry;
use crate::error::Result;
use crate::event::{EventDispatcher, register_engine_events};
use crate::reflect::MetaRegistry;

pub struct Core {
    registry: Rc<RefCell<Registry>>,
    meta: Rc<MetaRegistry>,
    events: Rc<RefCell<EventDispatcher>>,
    config: CoreConfig,
    #[cfg(feature = "scripting")]
    scripts: Option<crate::scripting::ScriptEngine>,
}

impl Core {
    /// Build a core with only the engine's own types on the bridge.
    pub fn new(config: CoreConfig) -> Result<Self> {
        Self::with_bridge(config, MetaRegistry::new())
    }

    /// Build a core around a bridge that already holds the game's types.
    /// Engine components and events are added to it.
    pub fn with_bridge(config: CoreConfig, mut meta: MetaRegistry) -> Result<Self> {
        register_engine_components(&mut meta)?;
        register_engine_events(&mut meta)?;
        if config.strict_bridge {
            meta.validate()?;
        }

        #[allow(unused_mut)]
        let mut registry = Registry::new();

        #[cfg(feature = "hot-reload")]
        if config.hot_reload {
            let mut watcher = crate::asset::AssetWatcher::new();
            for entry in &config.watch {
                if let Err(e) = watcher.watch(&entry.name, &entry.path) {
                    log::warn!("{e}");
                }
            }
            registry.add_context(watcher)?;
        }

        log::info!("core ready: {} bridge types", meta.len());
        Ok(Self {
            registry: Rc::new(RefCell::new(registry)),
            meta: Rc::new(meta),
            events: Rc::new(RefCell::new(EventDispatcher::new())),
            config,
            #[cfg(feature = "scripting")]
            scripts: None,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn registry(&self) -> Ref<'_, Registry> {
        self.registry.borrow()
    }

    pub fn registry_mut(&self) -> RefMut<'_, Registry> {
        self.registry.borrow_mut()
    }

    pub fn meta(&self) -> &MetaRegistry {
        &self.meta
    }

    pub fn events(&self) -> Ref<'_, EventDispatcher> {
        self.events.borrow()
    }

    pub fn events_mut(&self) -> RefMut<'_, EventDispatcher> {
        self.events.borrow_mut()
    }

    pub fn shared_registry(&self) -> Rc<RefCell<Registry>> {
        Rc::clone(&self.registry)
    }

    pub fn shared_meta(&self) -> Rc<MetaRegistry> {
        Rc::clone(&self.meta)
    }

    pub fn shared_events(&self) -> Rc<RefCell<EventDispatcher>> {
        Rc::clone(&self.events)
    }

    /// The script engine bound to this core, started on first use.
    #[cfg(feature = "scripting")]
    pub fn scripts(&mut self) -> Result<&crate::scripting::ScriptEngine> {
        let engine = match self.scripts.take() {
            Some(engine) => engine,
            None => crate::scripting::ScriptEngine::new(
                self.shared_registry(),
                self.shared_meta(),
                self.shared_events(),
            )?,
        };
        Ok(self.scripts.insert(engine))
    }

    /// Per-frame pass. Returns how many events were delivered.
    pub fn update(&mut self) -> usize {
        #[cfg(feature = "hot-reload")]
        crate::asset::process_asset_reloads(&self.registry.borrow(), &mut self.events.borrow_mut());

        #[allow(unused_mut)]
        let mut delivered = 0;
        #[cfg(feature = "scripting")]
        if let Some(scripts) = &self.scripts {
            delivered += scripts.apply_deferred();
        }

        if self.config.flush_events_on_update {
            delivered += self.events.borrow_mut().flush_all();
        }
        delivered
    }
}
