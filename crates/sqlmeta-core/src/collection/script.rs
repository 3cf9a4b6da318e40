use super::Collection;
use crate::{
    capability::{Droppable, ScriptExecutor},
    error::Error,
    key::ObjectKey,
    kind::StorageKind,
    object::SqlObject,
    storage::{Storage, StorageError},
};
use tracing::debug;

impl Collection {
    fn index_of(&self, key: &ObjectKey) -> Result<usize, Error> {
        self.store.lookup(key).ok_or_else(|| {
            StorageError::NotFound {
                kind: self.kind,
                key: key.to_string(),
            }
            .into()
        })
    }

    /// Drop a member in the store, then remove it from the collection.
    pub fn drop_member(
        &mut self,
        key: &ObjectKey,
        executor: &dyn ScriptExecutor,
    ) -> Result<SqlObject, Error> {
        self.check_mutable("drop")?;
        self.ensure_populated()?;

        let index = self.index_of(key)?;
        self.member_at_mut(index)?.drop_object(executor)?;

        let dropped = self.store.remove_at(index)?;
        self.version += 1;
        debug!(kind = %self.kind, key = %key, "member dropped");

        Ok(dropped)
    }

    /// Rename a member in the store and move it to its new position.
    /// Ordinal members keep their position.
    pub fn rename_member(
        &mut self,
        key: &ObjectKey,
        new_name: &str,
        executor: &dyn ScriptExecutor,
    ) -> Result<&mut SqlObject, Error> {
        self.check_mutable("rename")?;
        self.ensure_populated()?;

        let index = self.index_of(key)?;
        let renamed = self.member_at_mut(index)?.renamed_key(new_name)?;
        if !self.accepts_duplicates()
            && self.store.lookup(&renamed).is_some_and(|other| other != index)
        {
            return Err(StorageError::DuplicateIdentity {
                kind: self.kind,
                key: renamed.to_string(),
            }
            .into());
        }

        let index = match self.store.storage_kind() {
            StorageKind::Ordinal => {
                self.member_at_mut(index)?.rename_in_place(new_name, executor)?;
                index
            }
            StorageKind::Sorted => {
                let mut member = self.store.remove_at(index)?;
                let renamed = member.rename_in_place(new_name, executor);

                // the member goes back either way: renamed, or untouched on failure
                let index = self.store.add(member)?;
                renamed?;
                index
            }
        };
        self.version += 1;
        debug!(kind = %self.kind, from = %key, to = new_name, "member renamed");

        self.member_at_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        capability::ScriptAction,
        collection::MemberDescriptor,
        key::ObjectKey,
        kind::ObjectKind,
        lifecycle::ObjectState,
        memory::{MemoryPopulator, RecordingExecutor},
        storage::Keyed,
        test_support::server,
    };
    use std::rc::Rc;

    fn logins(names: &[&str]) -> Rc<MemoryPopulator> {
        let populator = MemoryPopulator::default();
        for name in names {
            populator.insert(
                "Server[@Name='s1']",
                ObjectKind::Login,
                MemberDescriptor::new(ObjectKey::named(*name)),
            );
        }

        Rc::new(populator)
    }

    fn login_names(server: &mut crate::object::SqlObject) -> Vec<String> {
        server
            .collection_mut(ObjectKind::Login)
            .expect("logins")
            .iter()
            .expect("read should succeed")
            .map(|l| l.key().to_string())
            .collect()
    }

    #[test]
    fn rename_member_keeps_sorted_order() {
        let mut server = server("s1", Some(logins(&["b", "d"])));
        let executor = RecordingExecutor::default();

        let renamed = server
            .collection_mut(ObjectKind::Login)
            .expect("logins")
            .rename_member(&ObjectKey::named("d"), "a", &executor)
            .expect("rename should succeed");
        assert_eq!(renamed.key().name(), Some("a"));

        assert_eq!(login_names(&mut server), vec!["[a]", "[b]"]);
    }

    #[test]
    fn failed_rename_restores_the_member() {
        let mut server = server("s1", Some(logins(&["b", "d"])));
        let executor = RecordingExecutor::failing_on(ScriptAction::Rename);

        let err = server
            .collection_mut(ObjectKind::Login)
            .expect("logins")
            .rename_member(&ObjectKey::named("d"), "a", &executor)
            .expect_err("executor should fail");

        assert_eq!(err.class, crate::error::ErrorClass::External);
        assert_eq!(login_names(&mut server), vec!["[b]", "[d]"]);
    }

    #[test]
    fn rename_to_an_existing_name_is_rejected() {
        let mut server = server("s1", Some(logins(&["b", "d"])));
        let executor = RecordingExecutor::default();

        let err = server
            .collection_mut(ObjectKind::Login)
            .expect("logins")
            .rename_member(&ObjectKey::named("d"), "B", &executor)
            .expect_err("case-insensitive duplicate");

        assert_eq!(err.class, crate::error::ErrorClass::Identity);
        assert!(executor.requests().is_empty());
    }

    #[test]
    fn drop_member_removes_it_after_the_store_confirms() {
        let mut server = server("s1", Some(logins(&["b", "d"])));
        let executor = RecordingExecutor::default();

        let dropped = server
            .collection_mut(ObjectKind::Login)
            .expect("logins")
            .drop_member(&ObjectKey::named("b"), &executor)
            .expect("drop should succeed");

        assert_eq!(dropped.state(), ObjectState::Dropped);
        assert_eq!(login_names(&mut server), vec!["[d]"]);
        assert_eq!(executor.requests()[0].action, ScriptAction::Drop);
    }

    #[test]
    fn drop_member_of_unknown_key_is_not_found() {
        let mut server = server("s1", Some(logins(&["b"])));

        let err = server
            .collection_mut(ObjectKind::Login)
            .expect("logins")
            .drop_member(&ObjectKey::named("zzz"), &RecordingExecutor::default())
            .expect_err("unknown member");

        assert!(err.is_not_found());
    }
}
