//! Member objects of the metadata graph.
//!
//! A [`SqlObject`] owns its key, its property bag and its child collections.
//! Children point back at their parent through a [`ParentRef`], a plain
//! handle (id, kind, address) that is never used for ownership.

use crate::{
    Settings,
    collection::{Collection, CollectionError, MemberDescriptor, Populator},
    error::Error,
    key::{KeyShape, ObjectKey},
    kind::ObjectKind,
    lifecycle::{LifecycleError, ObjectState, ScriptIntent, Transition},
    storage::{Keyed, Numbered},
    urn::Urn,
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

/// Property holding the position-tracking id of ordinal members.
pub const ID_PROPERTY: &str = "ID";

///
/// ObjectId
/// Process-unique identity of one in-memory object instance.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[display("#{_0}")]
pub struct ObjectId(u64);

impl ObjectId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);

        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

///
/// ParentRef
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParentRef {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub urn: Urn,
}

///
/// PropertyValue
///

#[derive(Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum PropertyValue {
    #[display("null")]
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

///
/// PropertyBag
///
/// Property values plus the set of names changed since the last commit.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PropertyBag {
    values: BTreeMap<String, PropertyValue>,
    dirty: BTreeSet<String>,
}

impl PropertyBag {
    /// Bag loaded from the store; nothing is dirty.
    #[must_use]
    pub const fn loaded(values: BTreeMap<String, PropertyValue>) -> Self {
        Self {
            values,
            dirty: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        let name = name.into();
        self.values.insert(name.clone(), value.into());
        self.dirty.insert(name);
    }

    /// Set without marking the property changed.
    pub fn set_clean(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.values.insert(name.into(), value.into());
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Changed properties, in name order.
    #[must_use]
    pub fn changes(&self) -> Vec<(String, PropertyValue)> {
        self.dirty
            .iter()
            .filter_map(|name| self.values.get(name).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Every property, in name order.
    #[must_use]
    pub fn all(&self) -> Vec<(String, PropertyValue)> {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    pub fn commit(&mut self) {
        self.dirty.clear();
    }
}

///
/// SqlObject
///

pub struct SqlObject {
    id: ObjectId,
    kind: ObjectKind,
    key: ObjectKey,
    state: ObjectState,
    parent: Option<ParentRef>,
    properties: PropertyBag,
    children: BTreeMap<ObjectKind, Collection>,
    source: Option<Rc<dyn Populator>>,
    settings: Rc<Settings>,
}

impl SqlObject {
    /// A new, detached object being constructed.
    #[must_use]
    pub fn new(kind: ObjectKind, key: ObjectKey) -> Self {
        Self {
            id: ObjectId::next(),
            kind,
            key,
            state: ObjectState::Pending,
            parent: None,
            properties: PropertyBag::default(),
            children: BTreeMap::new(),
            source: None,
            settings: Rc::new(Settings::default()),
        }
    }

    /// An existing top-level object (typically the server) whose
    /// descendants populate from `source`.
    #[must_use]
    pub fn root(
        kind: ObjectKind,
        mut key: ObjectKey,
        source: Option<Rc<dyn Populator>>,
        settings: Rc<Settings>,
    ) -> Self {
        key.set_writable(false);

        Self {
            state: ObjectState::Existing,
            source,
            settings,
            ..Self::new(kind, key)
        }
    }

    /// Build a member loaded from the store.
    pub(crate) fn loaded(
        kind: ObjectKind,
        descriptor: MemberDescriptor,
        parent: ParentRef,
        source: Option<Rc<dyn Populator>>,
        settings: Rc<Settings>,
    ) -> Self {
        let MemberDescriptor {
            mut key,
            properties,
        } = descriptor;
        key.set_writable(false);

        Self {
            id: ObjectId::next(),
            kind,
            key,
            state: ObjectState::Existing,
            parent: Some(parent),
            properties: PropertyBag::loaded(properties),
            children: BTreeMap::new(),
            source,
            settings,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ObjectId {
        self.id
    }

    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    #[must_use]
    pub const fn state(&self) -> ObjectState {
        self.state
    }

    #[must_use]
    pub const fn parent(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    #[must_use]
    pub const fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable key access; edits fail once the object is attached.
    pub const fn key_mut(&mut self) -> &mut ObjectKey {
        &mut self.key
    }

    /// Address of this object in the graph.
    #[must_use]
    pub fn urn(&self) -> Urn {
        match &self.parent {
            Some(parent) => parent.urn.child_key(self.kind, &self.key),
            None => Urn::root(self.kind, &self.key),
        }
    }

    /// `Table [dbo].[t]`-style rendering used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} {}", self.kind, self.key)
    }

    #[must_use]
    pub fn as_parent(&self) -> ParentRef {
        ParentRef {
            id: self.id,
            kind: self.kind,
            urn: self.urn(),
        }
    }

    // ── Properties ───────────────────────────────

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    pub fn set_property(
        &mut self,
        name: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Result<(), Error> {
        self.ensure_live()?;
        self.properties.set(name, value);

        Ok(())
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.properties.is_dirty()
    }

    // ── Lifecycle ────────────────────────────────

    #[must_use]
    pub fn script_intent(&self) -> ScriptIntent {
        ScriptIntent::of(self.state, self.is_dirty())
    }

    /// Mark for removal on the next alter of the parent.
    pub fn mark_for_drop(&mut self) -> Result<(), Error> {
        self.transition(Transition::MarkForDrop)
    }

    /// Undo `mark_for_drop`.
    pub fn restore(&mut self) -> Result<(), Error> {
        self.transition(Transition::Restore)
    }

    pub(crate) fn transition(&mut self, transition: Transition) -> Result<(), Error> {
        self.state = self.state.apply(transition, &self.describe())?;

        Ok(())
    }

    pub(crate) fn ensure_live(&self) -> Result<(), LifecycleError> {
        if self.state.is_dropped() {
            Err(LifecycleError::ObjectDropped {
                object: self.describe(),
            })
        } else {
            Ok(())
        }
    }

    /// Drop this object and everything below it.
    pub(crate) fn mark_dropped(&mut self) {
        self.state = ObjectState::Dropped;
        for child in self.children.values_mut() {
            child.mark_members_dropped();
        }
    }

    /// Commit this object and every descendant still being created.
    pub(crate) fn commit_created(&mut self) -> Result<(), Error> {
        self.transition(Transition::Commit)?;
        self.properties.commit();

        for child in self.children.values_mut() {
            child.commit_members()?;
        }

        Ok(())
    }

    /// Attach to a collection: freeze the key and inherit its session.
    pub(crate) fn attach(
        &mut self,
        parent: ParentRef,
        source: Option<Rc<dyn Populator>>,
        settings: Rc<Settings>,
    ) -> Result<(), Error> {
        self.transition(Transition::Attach)?;
        self.key.set_writable(false);
        self.parent = Some(parent);
        self.source = source;
        self.settings = settings;

        Ok(())
    }

    /// Undo `attach` for a member removed before it was ever created.
    pub(crate) fn detach(&mut self) {
        self.state = ObjectState::Pending;
        self.key.set_writable(true);
        self.parent = None;
    }

    pub(crate) fn set_parent(&mut self, parent: ParentRef) {
        self.parent = Some(parent);
    }

    pub(crate) fn replace_key(&mut self, key: ObjectKey) {
        self.key = key;
    }

    pub(crate) fn replace_properties(&mut self, properties: BTreeMap<String, PropertyValue>) {
        self.properties = PropertyBag::loaded(properties);
    }

    pub(crate) const fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    // ── Children ─────────────────────────────────

    /// Child collection of `kind`, if it has been touched.
    #[must_use]
    pub fn collection(&self, kind: ObjectKind) -> Option<&Collection> {
        self.children.get(&kind)
    }

    /// Child collection of `kind`, created on first use. The collection
    /// stays unpopulated until it is first read.
    pub fn collection_mut(&mut self, kind: ObjectKind) -> Result<&mut Collection, Error> {
        if !self.kind.allows_child(kind) {
            return Err(CollectionError::ChildKindNotAllowed {
                parent: self.kind,
                kind,
            }
            .into());
        }

        let parent = self.as_parent();
        let state = self.state;
        let collection = self.children.entry(kind).or_insert_with(|| {
            Collection::new(kind, parent.clone(), state, self.source.clone(), self.settings.clone())
        });
        collection.sync_parent(parent, state);

        Ok(collection)
    }

    pub(crate) fn child_collections_mut(&mut self) -> impl Iterator<Item = &mut Collection> {
        self.children.values_mut()
    }
}

impl fmt::Debug for SqlObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlObject")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("state", &self.state)
            .field("dirty", &self.properties.is_dirty())
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl Keyed for SqlObject {
    fn key(&self) -> &ObjectKey {
        &self.key
    }
}

impl Numbered for SqlObject {
    fn ordinal_id(&self) -> Option<i32> {
        if self.key.shape() == KeyShape::Number {
            return self.key.number_value();
        }

        match self.properties.get(ID_PROPERTY) {
            Some(PropertyValue::Int(id)) => i32::try_from(*id).ok(),
            _ => None,
        }
    }

    fn set_ordinal_id(&mut self, id: i32) {
        if !self.key.renumber(id) {
            self.properties.set_clean(ID_PROPERTY, id);
        }
    }
}
