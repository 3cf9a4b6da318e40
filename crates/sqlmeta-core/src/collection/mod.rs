//! Collection façade.
//!
//! A [`Collection`] owns one storage strategy and every member of one kind
//! under one parent. It is empty and unpopulated until first read, then
//! filled from its [`Populator`] in one blocking call. Mutations are gated by
//! the parent's lifecycle state, the collection lock, and each member's state.

mod populate;
mod script;

#[cfg(test)]
mod tests;

pub use populate::{MemberDescriptor, PopulateRequest, Populator};

use crate::{
    Settings,
    error::{Error, ErrorClass, ErrorOrigin},
    key::{KeyShape, ObjectKey},
    kind::{ObjectKind, StorageKind},
    lifecycle::{LifecycleError, ObjectState},
    object::{ObjectId, ParentRef, SqlObject},
    obs::sink::{self, MetricsEvent},
    storage::{AnyStore, Keyed, Numbered, Storage, StorageError},
    urn::UrnSegment,
};
use std::rc::Rc;
use thiserror::Error as ThisError;
use tracing::{debug, trace, warn};

///
/// CollectionError
///

#[derive(Debug, ThisError)]
#[remain::sorted]
pub enum CollectionError {
    #[error("{object} already belongs to the collection under {parent}")]
    AlreadyAttached { object: String, parent: String },

    #[error("{parent} cannot hold {kind} members")]
    ChildKindNotAllowed { parent: ObjectKind, kind: ObjectKind },

    #[error("{kind} collection under {parent} changed during enumeration")]
    ConcurrentModification { kind: ObjectKind, parent: String },

    #[error("cannot {operation} {object}: state is {state}")]
    InvalidState {
        object: String,
        operation: &'static str,
        state: ObjectState,
    },

    #[error("{kind} collection cannot hold {object}")]
    KindMismatch { kind: ObjectKind, object: String },

    #[error("{kind} collection under {parent} is locked: {reason}")]
    Locked {
        kind: ObjectKind,
        parent: String,
        reason: String,
    },

    #[error("{object} is not a member of the {kind} collection under {parent}")]
    NotAMember {
        kind: ObjectKind,
        object: String,
        parent: String,
    },
}

impl CollectionError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ChildKindNotAllowed { .. } | Self::KindMismatch { .. } => ErrorClass::Unsupported,
            Self::AlreadyAttached { .. }
            | Self::ConcurrentModification { .. }
            | Self::InvalidState { .. }
            | Self::Locked { .. }
            | Self::NotAMember { .. } => ErrorClass::State,
        }
    }

    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        ErrorOrigin::Collection
    }
}

///
/// RefreshSummary
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RefreshSummary {
    /// In-memory members still present in the source; identity preserved.
    pub kept: usize,
    pub added: usize,
    /// Members gone from the source, now `Dropped`.
    pub dropped: usize,
}

///
/// Collection
///

pub struct Collection {
    kind: ObjectKind,
    parent: ParentRef,
    parent_state: ObjectState,
    store: AnyStore<SqlObject>,
    populated: bool,
    lock_reason: Option<String>,
    source: Option<Rc<dyn Populator>>,
    settings: Rc<Settings>,

    // bumped on every membership change; cursors compare against it
    version: u64,
}

impl Collection {
    pub(crate) fn new(
        kind: ObjectKind,
        parent: ParentRef,
        parent_state: ObjectState,
        source: Option<Rc<dyn Populator>>,
        settings: Rc<Settings>,
    ) -> Self {
        Self {
            kind,
            parent,
            parent_state,
            store: Self::empty_store(kind, &settings),
            populated: false,
            lock_reason: None,
            source,
            settings,
            version: 0,
        }
    }

    fn empty_store(kind: ObjectKind, settings: &Settings) -> AnyStore<SqlObject> {
        AnyStore::for_kind(
            kind,
            settings.comparer(),
            settings.accepts_duplicate_names(kind),
        )
    }

    /// Refresh the parent handle; called by the owning object on every access.
    pub(crate) fn sync_parent(&mut self, parent: ParentRef, state: ObjectState) {
        self.parent_state = state;

        if self.parent != parent {
            for member in self.store.as_mut_slice() {
                member.set_parent(parent.clone());
            }
            self.parent = parent;
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    #[must_use]
    pub const fn parent(&self) -> &ParentRef {
        &self.parent
    }

    #[must_use]
    pub const fn is_populated(&self) -> bool {
        self.populated
    }

    #[must_use]
    pub const fn storage_kind(&self) -> StorageKind {
        self.store.storage_kind()
    }

    /// Members currently in memory, without triggering population.
    #[must_use]
    pub fn loaded(&self) -> &[SqlObject] {
        if self.parent_state.is_dropped() {
            &[]
        } else {
            self.store.as_slice()
        }
    }

    fn accepts_duplicates(&self) -> bool {
        self.settings.accepts_duplicate_names(self.kind)
    }

    // the member number is the key; positional inserts assign it
    fn numbered_by_position(&self) -> bool {
        let info = self.kind.info();
        info.renumbers && info.key_shape == KeyShape::Number
    }

    fn parent_label(&self) -> String {
        format!("{} {}", self.parent.kind, self.parent.urn)
    }

    // ── Population ───────────────────────────────

    // population needs an existing parent, a source, and a live session
    fn can_fetch(&self) -> bool {
        self.parent_state == ObjectState::Existing
            && !self.settings.is_design_mode()
            && self.source.is_some()
    }

    /// Populate on first use. A failed fetch leaves the collection unpopulated.
    pub fn ensure_populated(&mut self) -> Result<(), Error> {
        if self.populated {
            return Ok(());
        }

        if self.can_fetch() {
            let members = self.fetch(None, Vec::new())?;
            self.store = self.build_store(members)?;
            self.version += 1;
        }
        self.populated = true;

        Ok(())
    }

    fn fetch(
        &self,
        filter: Option<String>,
        extra_fields: Vec<String>,
    ) -> Result<Vec<MemberDescriptor>, Error> {
        let Some(source) = self.source.clone() else {
            return Ok(Vec::new());
        };
        let request = PopulateRequest {
            parent: self.parent.urn.clone(),
            kind: self.kind,
            filter,
            extra_fields,
        };

        debug!(kind = %self.kind, parent = %self.parent.urn, "populating collection");
        sink::record(MetricsEvent::PopulateStart { kind: self.kind });

        match source.populate(&request) {
            Ok(members) => {
                debug!(kind = %self.kind, members = members.len(), "populated collection");
                sink::record(MetricsEvent::PopulateFinish {
                    kind: self.kind,
                    members: members.len() as u64,
                });

                Ok(members)
            }
            Err(err) => {
                warn!(kind = %self.kind, parent = %self.parent.urn, error = %err, "population failed");
                sink::record(MetricsEvent::PopulateFailed { kind: self.kind });

                Err(Error::external(
                    ErrorOrigin::Populator,
                    "populate",
                    request.target(),
                    err,
                ))
            }
        }
    }

    fn build_store(&self, members: Vec<MemberDescriptor>) -> Result<AnyStore<SqlObject>, Error> {
        let mut store = Self::empty_store(self.kind, &self.settings);
        for descriptor in members {
            store.add(self.load_member(descriptor))?;
        }

        Ok(store)
    }

    fn load_member(&self, descriptor: MemberDescriptor) -> SqlObject {
        SqlObject::loaded(
            self.kind,
            descriptor,
            self.parent.clone(),
            self.source.clone(),
            self.settings.clone(),
        )
    }

    // reject a source member set that could not be stored
    fn check_descriptors(&self, members: &[MemberDescriptor]) -> Result<(), Error> {
        if let Some(null) = members.iter().find(|d| d.key.is_null()) {
            return Err(StorageError::NullKey {
                kind: self.kind,
                key: null.key.to_string(),
            }
            .into());
        }
        if self.accepts_duplicates() {
            return Ok(());
        }

        let comparer = self.settings.comparer();
        let mut keys: Vec<&ObjectKey> = members.iter().map(|d| &d.key).collect();
        keys.sort_by(|a, b| comparer.compare(a, b));

        match keys.windows(2).find(|pair| comparer.equals(pair[0], pair[1])) {
            Some(pair) => Err(StorageError::DuplicateIdentity {
                kind: self.kind,
                key: pair[1].to_string(),
            }
            .into()),
            None => Ok(()),
        }
    }

    /// Resynchronize membership with the source.
    ///
    /// Members still present keep their in-memory identity; with
    /// `refresh_children` they also reload their properties and refresh
    /// their populated child collections. Members gone from the source, and
    /// local members that were never created, end up `Dropped`.
    pub fn refresh(&mut self, refresh_children: bool) -> Result<RefreshSummary, Error> {
        if !self.populated {
            self.ensure_populated()?;

            return Ok(RefreshSummary {
                added: self.store.len(),
                ..RefreshSummary::default()
            });
        }
        if !self.can_fetch() {
            return Ok(RefreshSummary::default());
        }

        let fresh = self.fetch(None, Vec::new())?;
        self.check_descriptors(&fresh)?;

        let matches: Vec<Option<usize>> = fresh
            .iter()
            .map(|d| {
                self.store
                    .lookup(&d.key)
                    .filter(|&i| self.store.as_slice()[i].state() != ObjectState::Creating)
            })
            .collect();
        let mut previous: Vec<Option<SqlObject>> =
            self.store.drain().into_iter().map(Some).collect();

        let mut summary = RefreshSummary::default();
        let mut store = Self::empty_store(self.kind, &self.settings);
        for (descriptor, matched) in fresh.into_iter().zip(matches) {
            let member = match matched.and_then(|i| previous[i].take()) {
                Some(mut member) => {
                    if refresh_children {
                        member.replace_properties(descriptor.properties);
                    }
                    summary.kept += 1;
                    member
                }
                None => {
                    summary.added += 1;
                    self.load_member(descriptor)
                }
            };
            store.add(member)?;
        }

        for mut gone in previous.into_iter().flatten() {
            gone.mark_dropped();
            summary.dropped += 1;
        }

        self.store = store;
        self.version += 1;
        debug!(
            kind = %self.kind,
            parent = %self.parent.urn,
            kept = summary.kept,
            added = summary.added,
            dropped = summary.dropped,
            "refreshed collection"
        );

        if refresh_children {
            for member in self.store.as_mut_slice() {
                for child in member.child_collections_mut() {
                    if child.is_populated() {
                        child.refresh(true)?;
                    }
                }
            }
        }

        Ok(summary)
    }

    /// Discard every member, pending edits included, and repopulate with
    /// `filter` and `extra_fields`. No in-memory identity is preserved.
    pub fn clear_and_initialize(
        &mut self,
        filter: Option<&str>,
        extra_fields: &[&str],
    ) -> Result<(), Error> {
        self.discard_all();
        self.populated = false;

        if self.can_fetch() {
            let members = self.fetch(
                filter.map(ToString::to_string),
                extra_fields.iter().map(ToString::to_string).collect(),
            )?;
            self.store = self.build_store(members)?;
        }
        self.populated = true;

        Ok(())
    }

    /// Empty the collection without fetching and release the lock.
    /// The next read populates again.
    pub fn reset(&mut self) {
        self.discard_all();
        self.populated = false;
        self.lock_reason = None;
    }

    /// Drop every loaded member and empty the collection.
    pub fn clear(&mut self) -> Result<(), Error> {
        self.check_mutable("clear")?;
        self.ensure_populated()?;
        self.discard_all();

        Ok(())
    }

    /// Move every loaded member, and its descendants, to `Dropped`.
    pub fn mark_all_dropped(&mut self) {
        self.mark_members_dropped();
    }

    pub(crate) fn mark_members_dropped(&mut self) {
        for member in self.store.as_mut_slice() {
            member.mark_dropped();
        }
    }

    fn discard_all(&mut self) {
        for mut member in self.store.drain() {
            member.mark_dropped();
        }
        self.version += 1;
    }

    /// After a successful create/alter of the parent: members being created
    /// become `Existing`, members marked for drop become `Dropped` and leave.
    pub(crate) fn commit_members(&mut self) -> Result<(), Error> {
        let mut index = 0;
        let mut removed = false;

        while let Some(member) = self.store.get_at_mut(index) {
            match member.state() {
                ObjectState::Creating => {
                    member.commit_created()?;
                    index += 1;
                }
                ObjectState::ToBeDropped => {
                    member.mark_dropped();
                    self.store.remove_at(index)?;
                    removed = true;
                }
                ObjectState::Existing => {
                    for child in member.child_collections_mut() {
                        child.commit_members()?;
                    }
                    index += 1;
                }
                ObjectState::Pending | ObjectState::Dropped => index += 1,
            }
        }

        if removed {
            self.version += 1;
        }

        Ok(())
    }

    // ── Lock ─────────────────────────────────────

    /// Freeze membership; every mutation fails with `reason` until unlocked.
    pub fn lock(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(kind = %self.kind, parent = %self.parent.urn, reason = %reason, "collection locked");
        self.lock_reason = Some(reason);
    }

    pub fn unlock(&mut self) {
        if self.lock_reason.take().is_some() {
            debug!(kind = %self.kind, parent = %self.parent.urn, "collection unlocked");
        }
    }

    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.lock_reason.is_some()
    }

    #[must_use]
    pub fn lock_reason(&self) -> Option<&str> {
        self.lock_reason.as_deref()
    }

    // ── Guards ───────────────────────────────────

    fn check_mutable(&self, operation: &'static str) -> Result<(), Error> {
        let err: Error = if self.parent_state.is_dropped() {
            LifecycleError::ObjectDropped {
                object: self.parent_label(),
            }
            .into()
        } else if let Some(reason) = &self.lock_reason {
            CollectionError::Locked {
                kind: self.kind,
                parent: self.parent.urn.to_string(),
                reason: reason.clone(),
            }
            .into()
        } else {
            return Ok(());
        };

        warn!(kind = %self.kind, parent = %self.parent.urn, operation, error = %err, "collection mutation rejected");
        sink::record(MetricsEvent::MutationRejected { kind: self.kind });

        Err(err)
    }

    // every check a new member must pass; nothing is mutated before all succeed
    fn check_new_member(&mut self, object: &SqlObject, operation: &'static str) -> Result<(), Error> {
        self.check_mutable(operation)?;
        object.ensure_live()?;

        if object.kind() != self.kind {
            return Err(CollectionError::KindMismatch {
                kind: self.kind,
                object: object.describe(),
            }
            .into());
        }
        if let Some(parent) = object.parent() {
            return Err(CollectionError::AlreadyAttached {
                object: object.describe(),
                parent: parent.urn.to_string(),
            }
            .into());
        }
        if object.state() != ObjectState::Pending {
            return Err(CollectionError::InvalidState {
                object: object.describe(),
                operation,
                state: object.state(),
            }
            .into());
        }
        object.key().validate(self.kind)?;

        self.ensure_populated()
    }

    fn check_unique(&self, key: &ObjectKey) -> Result<(), Error> {
        if !self.accepts_duplicates() && self.store.contains(key) {
            return Err(StorageError::DuplicateIdentity {
                kind: self.kind,
                key: key.to_string(),
            }
            .into());
        }

        Ok(())
    }

    fn attach(&self, object: &mut SqlObject) -> Result<(), Error> {
        object.attach(self.parent.clone(), self.source.clone(), self.settings.clone())
    }

    fn member_at_mut(&mut self, index: usize) -> Result<&mut SqlObject, Error> {
        let len = self.store.len();

        self.store.get_at_mut(index).ok_or_else(|| {
            StorageError::OutOfRange {
                kind: self.kind,
                index,
                len,
            }
            .into()
        })
    }

    // ── Mutation ─────────────────────────────────

    /// Attach a pending object. Its key is validated and frozen and its
    /// state moves to `Creating`.
    pub fn add(&mut self, mut object: SqlObject) -> Result<&mut SqlObject, Error> {
        self.check_new_member(&object, "add")?;
        self.check_unique(object.key())?;
        self.attach(&mut object)?;

        let index = self.store.add(object)?;
        self.version += 1;
        trace!(kind = %self.kind, index, "member added");

        self.member_at_mut(index)
    }

    /// Insert at a position. Ordinal collections renumber the members after it.
    pub fn insert_at(&mut self, index: usize, mut object: SqlObject) -> Result<&mut SqlObject, Error> {
        self.check_new_member(&object, "insert")?;
        if !self.numbered_by_position() {
            self.check_unique(object.key())?;
        }
        let len = self.store.len();
        if index > len {
            return Err(StorageError::OutOfRange {
                kind: self.kind,
                index,
                len,
            }
            .into());
        }
        self.attach(&mut object)?;

        self.store.insert_at(index, object)?;
        self.version += 1;
        trace!(kind = %self.kind, index, "member inserted");

        self.member_at_mut(index)
    }

    pub fn insert_after(&mut self, anchor: &ObjectKey, object: SqlObject) -> Result<&mut SqlObject, Error> {
        self.ensure_populated()?;
        let index = self.store.anchor(anchor)? + 1;

        self.insert_at(index, object)
    }

    pub fn insert_before(&mut self, anchor: &ObjectKey, object: SqlObject) -> Result<&mut SqlObject, Error> {
        self.ensure_populated()?;
        let index = self.store.anchor(anchor)?;

        self.insert_at(index, object)
    }

    /// Remove a member that has not been created yet. Absent keys are a no-op.
    pub fn remove(&mut self, key: &ObjectKey) -> Result<Option<SqlObject>, Error> {
        self.check_mutable("remove")?;
        self.ensure_populated()?;

        match self.store.lookup(key) {
            Some(index) => self.remove_index(index).map(Some),
            None => Ok(None),
        }
    }

    /// Remove a specific member instance; fails if it is not a member.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<SqlObject, Error> {
        self.check_mutable("remove")?;
        self.ensure_populated()?;

        let index = self.position_of(id).ok_or_else(|| CollectionError::NotAMember {
            kind: self.kind,
            object: id.to_string(),
            parent: self.parent.urn.to_string(),
        })?;

        self.remove_index(index)
    }

    fn remove_index(&mut self, index: usize) -> Result<SqlObject, Error> {
        let member = self.member_at_mut(index)?;
        if member.state() != ObjectState::Creating {
            return Err(CollectionError::InvalidState {
                object: member.describe(),
                operation: "remove",
                state: member.state(),
            }
            .into());
        }

        let mut removed = self.store.remove_at(index)?;
        removed.detach();
        self.version += 1;
        trace!(kind = %self.kind, index, "member removed");

        Ok(removed)
    }

    fn position_of(&self, id: ObjectId) -> Option<usize> {
        self.store.iter().position(|member| member.id() == id)
    }

    // ── Read access (populates on first use) ─────

    pub fn get(&mut self, key: &ObjectKey) -> Result<Option<&SqlObject>, Error> {
        self.ensure_populated()?;
        if self.parent_state.is_dropped() {
            return Ok(None);
        }

        Ok(self.store.get(key))
    }

    pub fn get_mut(&mut self, key: &ObjectKey) -> Result<Option<&mut SqlObject>, Error> {
        self.ensure_populated()?;
        if self.parent_state.is_dropped() {
            return Ok(None);
        }

        Ok(self.store.get_mut(key))
    }

    pub fn get_at(&mut self, index: usize) -> Result<&SqlObject, Error> {
        self.ensure_populated()?;
        let members = self.loaded();

        members.get(index).ok_or_else(|| {
            StorageError::OutOfRange {
                kind: self.kind,
                index,
                len: members.len(),
            }
            .into()
        })
    }

    pub fn contains(&mut self, key: &ObjectKey) -> Result<bool, Error> {
        Ok(self.get(key)?.is_some())
    }

    pub fn len(&mut self) -> Result<usize, Error> {
        self.ensure_populated()?;

        Ok(self.loaded().len())
    }

    pub fn is_empty(&mut self) -> Result<bool, Error> {
        Ok(self.len()? == 0)
    }

    /// Every member, in storage order.
    pub fn iter(&mut self) -> Result<std::slice::Iter<'_, SqlObject>, Error> {
        self.ensure_populated()?;

        Ok(self.loaded().iter())
    }

    /// Index-based enumeration that fails if membership changes under it.
    pub fn cursor(&mut self) -> Result<Cursor, Error> {
        self.ensure_populated()?;

        Ok(Cursor {
            version: self.version,
            next: 0,
        })
    }

    /// Member whose numeric `ID` equals `id`.
    pub fn item_by_id(&mut self, id: i32) -> Result<Option<&SqlObject>, Error> {
        self.ensure_populated()?;

        Ok(self.loaded().iter().find(|member| member.ordinal_id() == Some(id)))
    }

    /// Build this collection's key type from a resolved path segment.
    pub fn key_from_segment(&self, segment: &UrnSegment) -> Result<ObjectKey, Error> {
        Ok(ObjectKey::from_segment(self.kind, segment)?)
    }

    pub fn get_by_segment(&mut self, segment: &UrnSegment) -> Result<Option<&SqlObject>, Error> {
        let key = self.key_from_segment(segment)?;

        self.get(&key)
    }
}

///
/// Cursor
///
/// Position in a collection captured at creation. Any membership change
/// after that makes the next step fail instead of skipping or repeating
/// members.
///

#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    version: u64,
    next: usize,
}

impl Cursor {
    pub fn next<'a>(&mut self, collection: &'a Collection) -> Result<Option<&'a SqlObject>, Error> {
        if collection.version != self.version {
            return Err(CollectionError::ConcurrentModification {
                kind: collection.kind,
                parent: collection.parent.urn.to_string(),
            }
            .into());
        }

        let member = collection.loaded().get(self.next);
        if member.is_some() {
            self.next += 1;
        }

        Ok(member)
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("kind", &self.kind)
            .field("parent", &self.parent.urn)
            .field("populated", &self.populated)
            .field("locked", &self.lock_reason)
            .field("members", &self.store.len())
            .finish_non_exhaustive()
    }
}
