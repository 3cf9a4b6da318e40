//! Object lifecycle state machine.

use crate::error::{ErrorClass, ErrorOrigin};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// LifecycleError
///

#[derive(Debug, ThisError)]
#[remain::sorted]
pub enum LifecycleError {
    #[error("cannot {transition} {object}: state is {from}")]
    InvalidTransition {
        object: String,
        from: ObjectState,
        transition: Transition,
    },

    #[error("{object} is dropped")]
    ObjectDropped { object: String },
}

impl LifecycleError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        ErrorClass::State
    }

    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        ErrorOrigin::Lifecycle
    }
}

///
/// ObjectState
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, PartialEq, Serialize)]
pub enum ObjectState {
    /// Key not finalized, not attached to any collection.
    #[default]
    Pending,
    /// Attached, not yet confirmed by the store.
    Creating,
    Existing,
    /// Marked for removal on the next alter of the parent.
    ToBeDropped,
    Dropped,
}

impl ObjectState {
    /// Apply `transition`, returning the next state.
    /// `object` is only used to render errors.
    pub fn apply(self, transition: Transition, object: &str) -> Result<Self, LifecycleError> {
        if self == Self::Dropped {
            return Err(LifecycleError::ObjectDropped {
                object: object.to_string(),
            });
        }

        let next = match (transition, self) {
            (Transition::Attach, Self::Pending) => Self::Creating,
            (Transition::Commit, Self::Creating | Self::Existing) => Self::Existing,
            (Transition::Commit, Self::ToBeDropped) | (Transition::Drop, _) => Self::Dropped,
            (Transition::MarkForDrop, Self::Existing) => Self::ToBeDropped,
            (Transition::Restore, Self::ToBeDropped) => Self::Existing,
            (transition, from) => {
                return Err(LifecycleError::InvalidTransition {
                    object: object.to_string(),
                    from,
                    transition,
                });
            }
        };

        Ok(next)
    }

    #[must_use]
    pub const fn is_dropped(self) -> bool {
        matches!(self, Self::Dropped)
    }
}

///
/// Transition
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Transition {
    #[display("attach")]
    Attach,
    #[display("commit")]
    Commit,
    #[display("mark for drop")]
    MarkForDrop,
    #[display("restore")]
    Restore,
    #[display("drop")]
    Drop,
}

///
/// ScriptIntent
///
/// What the emitter has to do for an object, derived from its state and
/// whether it carries unsaved property changes.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum ScriptIntent {
    Create,
    Alter,
    Drop,
    Ignore,
}

impl ScriptIntent {
    #[must_use]
    pub const fn of(state: ObjectState, dirty: bool) -> Self {
        match state {
            ObjectState::Pending | ObjectState::Creating => Self::Create,
            ObjectState::Existing if dirty => Self::Alter,
            ObjectState::ToBeDropped => Self::Drop,
            ObjectState::Existing | ObjectState::Dropped => Self::Ignore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_every_state() {
        let s = ObjectState::Pending;
        let s = s.apply(Transition::Attach, "t").expect("pending attaches");
        assert_eq!(s, ObjectState::Creating);

        let s = s.apply(Transition::Commit, "t").expect("creating commits");
        assert_eq!(s, ObjectState::Existing);

        let s = s.apply(Transition::MarkForDrop, "t").expect("existing marks");
        assert_eq!(s, ObjectState::ToBeDropped);

        let s = s.apply(Transition::Restore, "t").expect("marked restores");
        assert_eq!(s, ObjectState::Existing);

        let s = s
            .apply(Transition::MarkForDrop, "t")
            .and_then(|s| s.apply(Transition::Commit, "t"))
            .expect("committing a marked object drops it");
        assert_eq!(s, ObjectState::Dropped);
    }

    #[test]
    fn drop_is_legal_from_every_live_state() {
        for state in [
            ObjectState::Pending,
            ObjectState::Creating,
            ObjectState::Existing,
            ObjectState::ToBeDropped,
        ] {
            assert_eq!(
                state.apply(Transition::Drop, "t").expect("drop should succeed"),
                ObjectState::Dropped,
                "from {state}"
            );
        }
    }

    #[test]
    fn dropped_is_terminal() {
        for transition in [
            Transition::Attach,
            Transition::Commit,
            Transition::MarkForDrop,
            Transition::Restore,
            Transition::Drop,
        ] {
            let err = ObjectState::Dropped
                .apply(transition, "[dbo].[t]")
                .expect_err("dropped objects accept no transition");

            assert!(matches!(err, LifecycleError::ObjectDropped { .. }));
            assert_eq!(err.to_string(), "[dbo].[t] is dropped");
        }
    }

    #[test]
    fn illegal_transitions_name_the_state() {
        let err = ObjectState::Pending
            .apply(Transition::MarkForDrop, "[t]")
            .expect_err("pending objects cannot be marked");

        assert_eq!(err.to_string(), "cannot mark for drop [t]: state is Pending");
        assert_eq!(err.class(), ErrorClass::State);
    }

    #[test]
    fn intent_follows_state_and_dirtiness() {
        assert_eq!(ScriptIntent::of(ObjectState::Creating, false), ScriptIntent::Create);
        assert_eq!(ScriptIntent::of(ObjectState::Existing, true), ScriptIntent::Alter);
        assert_eq!(ScriptIntent::of(ObjectState::Existing, false), ScriptIntent::Ignore);
        assert_eq!(ScriptIntent::of(ObjectState::ToBeDropped, true), ScriptIntent::Drop);
        assert_eq!(ScriptIntent::of(ObjectState::Dropped, true), ScriptIntent::Ignore);
    }
}
