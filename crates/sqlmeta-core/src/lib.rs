//! Core framework for sqlmeta: object identity, collection storage, lazy
//! population, lifecycle gating and dependency ordering for SQL Server
//! management object models.

// public exports are one module level down
pub mod capability;
pub mod collection;
pub mod comparer;
pub mod dependency;
pub mod error;
pub mod key;
pub mod kind;
pub mod lifecycle;
pub mod memory;
pub mod object;
pub mod obs;
pub mod storage;
pub mod urn;

mod settings;

pub use error::Error;
pub use settings::Settings;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No collaborators, stores or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        capability::{Alterable, Creatable, Droppable, Renamable},
        collection::Collection,
        key::ObjectKey,
        kind::ObjectKind,
        lifecycle::{ObjectState, ScriptIntent},
        object::{PropertyValue, SqlObject},
        urn::Urn,
    };
}
