use super::{Keyed, Storage, StorageError};
use crate::{comparer::KeyComparer, key::ObjectKey, kind::ObjectKind};
use std::cmp::Ordering;

///
/// SortedStore
///
/// Members kept in ascending key order under the collection's comparer.
/// Lookup is a binary search; iteration is always comparer order.
///

#[derive(Clone, Debug)]
pub struct SortedStore<T> {
    kind: ObjectKind,
    comparer: KeyComparer,
    accept_duplicates: bool,
    items: Vec<T>,
}

impl<T: Keyed> SortedStore<T> {
    #[must_use]
    pub const fn new(kind: ObjectKind, comparer: KeyComparer) -> Self {
        Self {
            kind,
            comparer,
            accept_duplicates: false,
            items: Vec::new(),
        }
    }

    /// Allow members whose keys compare equal; they keep insertion order.
    #[must_use]
    pub const fn accept_duplicates(mut self, accept: bool) -> Self {
        self.accept_duplicates = accept;
        self
    }

    // Locate a key in the sorted list.
    fn find_index(&self, key: &ObjectKey) -> Result<usize, usize> {
        self.items
            .binary_search_by(|candidate| self.comparer.compare(candidate.key(), key))
    }

    // first position whose key sorts strictly after `key`
    fn upper_bound(&self, key: &ObjectKey) -> usize {
        self.items
            .partition_point(|candidate| self.comparer.compare(candidate.key(), key) != Ordering::Greater)
    }

    fn check_insertable(&self, key: &ObjectKey) -> Result<(), StorageError> {
        if key.is_null() {
            return Err(StorageError::NullKey {
                kind: self.kind,
                key: key.to_string(),
            });
        }
        if !self.accept_duplicates && self.find_index(key).is_ok() {
            return Err(StorageError::DuplicateIdentity {
                kind: self.kind,
                key: key.to_string(),
            });
        }

        Ok(())
    }

    fn out_of_range(&self, index: usize) -> StorageError {
        StorageError::OutOfRange {
            kind: self.kind,
            index,
            len: self.items.len(),
        }
    }
}

impl<T: Keyed> Storage<T> for SortedStore<T> {
    fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn lookup(&self, key: &ObjectKey) -> Option<usize> {
        self.find_index(key).ok()
    }

    fn get_at(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    fn get_at_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    fn add(&mut self, item: T) -> Result<usize, StorageError> {
        self.check_insertable(item.key())?;

        let index = self.upper_bound(item.key());
        self.items.insert(index, item);

        Ok(index)
    }

    /// Positional insert is honored only where it agrees with key order.
    fn insert_at(&mut self, index: usize, item: T) -> Result<(), StorageError> {
        if index > self.items.len() {
            return Err(self.out_of_range(index));
        }
        self.check_insertable(item.key())?;

        let key = item.key();
        let after_prev = index == 0
            || self.comparer.compare(self.items[index - 1].key(), key) != Ordering::Greater;
        let before_next = self
            .items
            .get(index)
            .is_none_or(|next| self.comparer.compare(key, next.key()) != Ordering::Greater);

        if !(after_prev && before_next) {
            return Err(StorageError::OrderViolation {
                kind: self.kind,
                key: key.to_string(),
                index,
            });
        }

        self.items.insert(index, item);

        Ok(())
    }

    fn remove_at(&mut self, index: usize) -> Result<T, StorageError> {
        if index >= self.items.len() {
            return Err(self.out_of_range(index));
        }

        Ok(self.items.remove(index))
    }

    fn replace(&mut self, item: T) -> Result<T, StorageError> {
        match self.find_index(item.key()) {
            Ok(index) => Ok(std::mem::replace(&mut self.items[index], item)),
            Err(_) => Err(StorageError::NotFound {
                kind: self.kind,
                key: item.key().to_string(),
            }),
        }
    }

    fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    fn as_slice(&self) -> &[T] {
        &self.items
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }
}
