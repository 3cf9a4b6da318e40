//! Create / alter / drop / rename as small capability traits.
//!
//! Each capability is gated by the kind's [`Capabilities`] and by the
//! object's lifecycle state, sends exactly one [`ScriptRequest`] to the
//! [`ScriptExecutor`], and only moves state after the executor succeeds.

use crate::{
    collection::CollectionError,
    error::{BoxError, Error, ErrorClass, ErrorOrigin},
    key::ObjectKey,
    kind::{Capabilities, ObjectKind},
    lifecycle::ObjectState,
    object::{PropertyValue, SqlObject},
    storage::Keyed,
    urn::Urn,
};
use derive_more::Display;
use tracing::{debug, warn};

///
/// ScriptAction
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum ScriptAction {
    #[display("create")]
    Create,
    #[display("alter")]
    Alter,
    #[display("drop")]
    Drop,
    #[display("rename")]
    Rename,
}

impl ScriptAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Alter => "alter",
            Self::Drop => "drop",
            Self::Rename => "rename",
        }
    }

    const fn allowed_by(self, capabilities: Capabilities) -> bool {
        match self {
            Self::Create => capabilities.create,
            Self::Alter => capabilities.alter,
            Self::Drop => capabilities.drop,
            Self::Rename => capabilities.rename,
        }
    }
}

///
/// ScriptRequest
///
/// One statement batch to run against the store.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ScriptRequest {
    pub action: ScriptAction,
    pub kind: ObjectKind,
    pub urn: Urn,

    /// Full property set for create; changed properties for alter.
    pub changes: Vec<(String, PropertyValue)>,
    pub transactable: bool,
    pub new_name: Option<String>,
}

impl ScriptRequest {
    fn for_object(object: &SqlObject, action: ScriptAction) -> Self {
        Self {
            action,
            kind: object.kind(),
            urn: object.urn(),
            changes: Vec::new(),
            transactable: object.kind().is_transactable(),
            new_name: None,
        }
    }
}

///
/// ScriptExecutor
///
/// Runs scripts against the external store. Failures are surfaced to the
/// caller unchanged; this layer never retries.
///

pub trait ScriptExecutor {
    fn execute(&self, request: &ScriptRequest) -> Result<(), BoxError>;
}

///
/// Creatable
///

pub trait Creatable {
    /// Create an attached object and every descendant still being created.
    fn create(&mut self, executor: &dyn ScriptExecutor) -> Result<(), Error>;
}

///
/// Alterable
///

pub trait Alterable {
    /// Apply changed properties, create new children and drop children
    /// marked for drop.
    fn alter(&mut self, executor: &dyn ScriptExecutor) -> Result<(), Error>;
}

///
/// Droppable
///

pub trait Droppable {
    fn drop_object(&mut self, executor: &dyn ScriptExecutor) -> Result<(), Error>;
}

///
/// Renamable
///

pub trait Renamable {
    /// Rename a detached existing object. Collection members are renamed
    /// through `Collection::rename_member` so their storage stays ordered.
    fn rename(&mut self, new_name: &str, executor: &dyn ScriptExecutor) -> Result<(), Error>;
}

// ── Shared script assembly ───────────────────────

fn check_action(
    object: &SqlObject,
    action: ScriptAction,
    required: ObjectState,
) -> Result<(), Error> {
    object.ensure_live()?;

    if !action.allowed_by(object.kind().info().capabilities) {
        return Err(Error::new(
            ErrorClass::Unsupported,
            ErrorOrigin::Executor,
            format!("{} does not support {action}", object.kind()),
        ));
    }
    if object.state() != required {
        return Err(CollectionError::InvalidState {
            object: object.describe(),
            operation: action.as_str(),
            state: object.state(),
        }
        .into());
    }

    Ok(())
}

fn run(executor: &dyn ScriptExecutor, request: &ScriptRequest) -> Result<(), Error> {
    debug!(
        action = %request.action,
        kind = %request.kind,
        urn = %request.urn,
        changes = request.changes.len(),
        transactable = request.transactable,
        "executing script"
    );

    executor.execute(request).map_err(|err| {
        warn!(action = %request.action, urn = %request.urn, error = %err, "script failed");
        Error::external(
            ErrorOrigin::Executor,
            request.action.as_str(),
            request.urn.to_string(),
            err,
        )
    })
}

impl Creatable for SqlObject {
    fn create(&mut self, executor: &dyn ScriptExecutor) -> Result<(), Error> {
        check_action(self, ScriptAction::Create, ObjectState::Creating)?;

        let request = ScriptRequest {
            changes: self.properties().all(),
            ..ScriptRequest::for_object(self, ScriptAction::Create)
        };
        run(executor, &request)?;

        self.commit_created()
    }
}

impl Alterable for SqlObject {
    fn alter(&mut self, executor: &dyn ScriptExecutor) -> Result<(), Error> {
        check_action(self, ScriptAction::Alter, ObjectState::Existing)?;

        let request = ScriptRequest {
            changes: self.properties().changes(),
            ..ScriptRequest::for_object(self, ScriptAction::Alter)
        };
        run(executor, &request)?;

        self.properties_mut().commit();
        for child in self.child_collections_mut() {
            child.commit_members()?;
        }

        Ok(())
    }
}

impl Droppable for SqlObject {
    fn drop_object(&mut self, executor: &dyn ScriptExecutor) -> Result<(), Error> {
        // marked members drop the same way as live ones
        let required = match self.state() {
            ObjectState::ToBeDropped => ObjectState::ToBeDropped,
            _ => ObjectState::Existing,
        };
        check_action(self, ScriptAction::Drop, required)?;

        run(executor, &ScriptRequest::for_object(self, ScriptAction::Drop))?;
        self.mark_dropped();

        Ok(())
    }
}

impl Renamable for SqlObject {
    fn rename(&mut self, new_name: &str, executor: &dyn ScriptExecutor) -> Result<(), Error> {
        if self.parent().is_some() {
            return Err(Error::new(
                ErrorClass::State,
                ErrorOrigin::Executor,
                format!(
                    "{} is a collection member; rename it through its collection",
                    self.describe()
                ),
            ));
        }

        self.rename_in_place(new_name, executor)
    }
}

impl SqlObject {
    /// Key this object would have after renaming to `new_name`.
    pub(crate) fn renamed_key(&self, new_name: &str) -> Result<ObjectKey, Error> {
        let mut key = self.key().clone();
        key.set_writable(true);
        key.set_name(new_name)?;
        key.set_writable(false);
        key.validate(self.kind())?;

        Ok(key)
    }

    pub(crate) fn rename_in_place(
        &mut self,
        new_name: &str,
        executor: &dyn ScriptExecutor,
    ) -> Result<(), Error> {
        check_action(self, ScriptAction::Rename, ObjectState::Existing)?;
        let key = self.renamed_key(new_name)?;

        let request = ScriptRequest {
            new_name: Some(new_name.to_string()),
            ..ScriptRequest::for_object(self, ScriptAction::Rename)
        };
        run(executor, &request)?;
        self.replace_key(key);

        Ok(())
    }
}
