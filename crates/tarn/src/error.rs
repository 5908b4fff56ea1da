//! Crate-level error type.
//!
//! Each module reports its own error enum; [`Error`] gathers them so the
//! startup path can use `?` across module boundaries.

use crate::config::ConfigError;
use crate::ecs::ContextError;
use crate::reflect::ReflectError;
use crate::scene::SceneError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Reflect(#[from] ReflectError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[cfg(feature = "hot-reload")]
    #[error(transparent)]
    Asset(#[from] crate::asset::AssetError),

    #[cfg(feature = "scripting")]
    #[error("script error: {0}")]
    Script(#[from] mlua::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
