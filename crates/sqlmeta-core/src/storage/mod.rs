//! Collection storage strategies.
//!
//! Both strategies satisfy [`Storage`]; a collection picks one from its
//! kind's `StorageKind` and reaches it through [`AnyStore`].

mod ordinal;
mod sorted;

pub use ordinal::OrdinalStore;
pub use sorted::SortedStore;

use crate::{
    comparer::KeyComparer,
    error::{ErrorClass, ErrorOrigin},
    key::ObjectKey,
    kind::{ObjectKind, StorageKind},
};
use thiserror::Error as ThisError;

///
/// StorageError
///

#[derive(Debug, ThisError)]
#[remain::sorted]
pub enum StorageError {
    #[error("{kind} anchor {anchor} not found")]
    AnchorNotFound { kind: ObjectKind, anchor: String },

    #[error("{kind} {key} already exists")]
    DuplicateIdentity { kind: ObjectKind, key: String },

    #[error("{kind} {key} not found")]
    NotFound { kind: ObjectKind, key: String },

    #[error("cannot store {kind} with null key {key}")]
    NullKey { kind: ObjectKind, key: String },

    #[error("inserting {kind} {key} at position {index} would break key order")]
    OrderViolation {
        kind: ObjectKind,
        key: String,
        index: usize,
    },

    #[error("{kind} position {index} out of range (len {len})")]
    OutOfRange {
        kind: ObjectKind,
        index: usize,
        len: usize,
    },
}

impl StorageError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::AnchorNotFound { .. }
            | Self::DuplicateIdentity { .. }
            | Self::NullKey { .. }
            | Self::OrderViolation { .. } => ErrorClass::Identity,
            Self::NotFound { .. } | Self::OutOfRange { .. } => ErrorClass::NotFound,
        }
    }

    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        ErrorOrigin::Storage
    }
}

///
/// Keyed
///

pub trait Keyed {
    fn key(&self) -> &ObjectKey;
}

///
/// Numbered
/// Members whose numeric id tracks their position.
///

pub trait Numbered: Keyed {
    fn ordinal_id(&self) -> Option<i32>;

    fn set_ordinal_id(&mut self, id: i32);
}

///
/// Storage
///

pub trait Storage<T: Keyed> {
    fn kind(&self) -> ObjectKind;

    /// Position of the member with `key`.
    fn lookup(&self, key: &ObjectKey) -> Option<usize>;

    fn get_at(&self, index: usize) -> Option<&T>;

    fn get_at_mut(&mut self, index: usize) -> Option<&mut T>;

    /// Insert at the position the strategy dictates, returning that position.
    fn add(&mut self, item: T) -> Result<usize, StorageError>;

    fn insert_at(&mut self, index: usize, item: T) -> Result<(), StorageError>;

    fn remove_at(&mut self, index: usize) -> Result<T, StorageError>;

    /// Swap in `item` for the member with the same key.
    fn replace(&mut self, item: T) -> Result<T, StorageError>;

    /// Remove every member, returning them in storage order.
    fn drain(&mut self) -> Vec<T>;

    fn as_slice(&self) -> &[T];

    fn as_mut_slice(&mut self) -> &mut [T];

    // ── Provided ────────────────────────────────

    fn contains(&self, key: &ObjectKey) -> bool {
        self.lookup(key).is_some()
    }

    fn get(&self, key: &ObjectKey) -> Option<&T> {
        self.lookup(key).and_then(|index| self.get_at(index))
    }

    fn get_mut(&mut self, key: &ObjectKey) -> Option<&mut T> {
        let index = self.lookup(key)?;
        self.get_at_mut(index)
    }

    /// Remove the member with `key`; absent keys are not an error.
    fn remove(&mut self, key: &ObjectKey) -> Option<T> {
        let index = self.lookup(key)?;
        self.remove_at(index).ok()
    }

    fn insert_after(&mut self, anchor: &ObjectKey, item: T) -> Result<usize, StorageError> {
        let index = self.anchor(anchor)? + 1;
        self.insert_at(index, item)?;

        Ok(index)
    }

    fn insert_before(&mut self, anchor: &ObjectKey, item: T) -> Result<usize, StorageError> {
        let index = self.anchor(anchor)?;
        self.insert_at(index, item)?;

        Ok(index)
    }

    fn anchor(&self, anchor: &ObjectKey) -> Result<usize, StorageError> {
        self.lookup(anchor).ok_or_else(|| StorageError::AnchorNotFound {
            kind: self.kind(),
            anchor: anchor.to_string(),
        })
    }

    fn clear(&mut self) {
        self.drain();
    }

    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

///
/// AnyStore
///

#[derive(Clone, Debug)]
pub enum AnyStore<T> {
    Ordinal(OrdinalStore<T>),
    Sorted(SortedStore<T>),
}

impl<T: Numbered> AnyStore<T> {
    /// Build the strategy registered for `kind`.
    #[must_use]
    pub fn for_kind(kind: ObjectKind, comparer: KeyComparer, accept_duplicates: bool) -> Self {
        match kind.storage() {
            StorageKind::Sorted => {
                Self::Sorted(SortedStore::new(kind, comparer).accept_duplicates(accept_duplicates))
            }
            StorageKind::Ordinal => Self::Ordinal(
                OrdinalStore::new(kind, comparer)
                    .renumbering(kind.info().renumbers)
                    .accept_duplicates(accept_duplicates),
            ),
        }
    }

    #[must_use]
    pub const fn storage_kind(&self) -> StorageKind {
        match self {
            Self::Ordinal(_) => StorageKind::Ordinal,
            Self::Sorted(_) => StorageKind::Sorted,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $body:expr) => {
        match $self {
            AnyStore::Ordinal($store) => $body,
            AnyStore::Sorted($store) => $body,
        }
    };
}

impl<T: Numbered> Storage<T> for AnyStore<T> {
    fn kind(&self) -> ObjectKind {
        dispatch!(self, s => s.kind())
    }

    fn lookup(&self, key: &ObjectKey) -> Option<usize> {
        dispatch!(self, s => s.lookup(key))
    }

    fn get_at(&self, index: usize) -> Option<&T> {
        dispatch!(self, s => s.get_at(index))
    }

    fn get_at_mut(&mut self, index: usize) -> Option<&mut T> {
        dispatch!(self, s => s.get_at_mut(index))
    }

    fn add(&mut self, item: T) -> Result<usize, StorageError> {
        dispatch!(self, s => s.add(item))
    }

    fn insert_at(&mut self, index: usize, item: T) -> Result<(), StorageError> {
        dispatch!(self, s => s.insert_at(index, item))
    }

    fn remove_at(&mut self, index: usize) -> Result<T, StorageError> {
        dispatch!(self, s => s.remove_at(index))
    }

    fn replace(&mut self, item: T) -> Result<T, StorageError> {
        dispatch!(self, s => s.replace(item))
    }

    fn drain(&mut self) -> Vec<T> {
        dispatch!(self, s => s.drain())
    }

    fn as_slice(&self) -> &[T] {
        dispatch!(self, s => s.as_slice())
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        dispatch!(self, s => s.as_mut_slice())
    }
}
