//! ## Crate layout
//! - `config`: TOML session configuration.
//! - `core`: keys, collections, lifecycle, dependency ordering and observability.
//!
//! The `prelude` module exposes the object-model vocabulary most callers need.

pub use sqlmeta_config as config;
pub use sqlmeta_core as core;

use std::path::Path;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use crate::core::{Error, Settings};

/// Load a TOML configuration file and build the session settings from it.
pub fn load_settings(path: impl AsRef<Path>) -> Result<Settings, Error> {
    let config = config::Config::load(path).map_err(|err| {
        Error::new(
            core::error::ErrorClass::Config,
            core::error::ErrorOrigin::Config,
            err.to_string(),
        )
    })?;

    Settings::from_config(&config)
}

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::{
        Settings,
        capability::{Alterable as _, Creatable as _, Droppable as _, Renamable as _},
        collection::{Collection, MemberDescriptor, Populator},
        dependency::{DependencyOrderer, DependencyWalker, OrderDirection, ScriptPlan},
        key::ObjectKey,
        kind::ObjectKind,
        lifecycle::{ObjectState, ScriptIntent},
        object::{PropertyValue, SqlObject},
        urn::Urn,
    };
}
