use super::{Numbered, Storage, StorageError};
use crate::{
    comparer::KeyComparer,
    key::ObjectKey,
    kind::ObjectKind,
    obs::sink::{self, MetricsEvent},
};
use tracing::trace;

///
/// OrdinalStore
///
/// Members kept in caller-determined positions. When renumbering is on,
/// positional inserts and removals keep the members' numeric ids
/// contiguous: later members shift by one so ids never gap or collide.
///

#[derive(Clone, Debug)]
pub struct OrdinalStore<T> {
    kind: ObjectKind,
    comparer: KeyComparer,
    renumbers: bool,
    accept_duplicates: bool,
    items: Vec<T>,
}

impl<T: Numbered> OrdinalStore<T> {
    #[must_use]
    pub const fn new(kind: ObjectKind, comparer: KeyComparer) -> Self {
        Self {
            kind,
            comparer,
            renumbers: true,
            accept_duplicates: false,
            items: Vec::new(),
        }
    }

    #[must_use]
    pub const fn renumbering(mut self, renumbers: bool) -> Self {
        self.renumbers = renumbers;
        self
    }

    #[must_use]
    pub const fn accept_duplicates(mut self, accept: bool) -> Self {
        self.accept_duplicates = accept;
        self
    }

    fn check_insertable(&self, key: &ObjectKey) -> Result<(), StorageError> {
        if key.is_null() {
            return Err(StorageError::NullKey {
                kind: self.kind,
                key: key.to_string(),
            });
        }
        if !self.accept_duplicates && self.lookup(key).is_some() {
            return Err(StorageError::DuplicateIdentity {
                kind: self.kind,
                key: key.to_string(),
            });
        }

        Ok(())
    }

    // id for a member placed at `index`: the displaced member's id, or one past its predecessor
    fn id_for(&self, index: usize) -> i32 {
        self.items
            .get(index)
            .and_then(|item| item.ordinal_id())
            .or_else(|| {
                index
                    .checked_sub(1)
                    .and_then(|prev| self.items[prev].ordinal_id())
                    .map(|id| id + 1)
            })
            .unwrap_or_else(|| i32::try_from(index + 1).unwrap_or(i32::MAX))
    }

    // shift the ids of members in `from..` by `delta`
    fn shift(&mut self, from: usize, delta: i32) {
        let shifted = self.renumber(from, delta);
        self.record_shift(from, delta, shifted);
    }

    fn record_shift(&self, from: usize, delta: i32, shifted: u64) {
        if shifted > 0 {
            trace!(kind = %self.kind, from, delta, shifted, "renumbered ordinal members");
            sink::record(MetricsEvent::Renumbered {
                kind: self.kind,
                shifted,
            });
        }
    }

    fn renumber(&mut self, from: usize, delta: i32) -> u64 {
        let mut shifted = 0u64;
        for item in &mut self.items[from..] {
            if let Some(id) = item.ordinal_id() {
                item.set_ordinal_id(id + delta);
                shifted += 1;
            }
        }

        shifted
    }
}

impl<T: Numbered> Storage<T> for OrdinalStore<T> {
    fn kind(&self) -> ObjectKind {
        self.kind
    }

    fn lookup(&self, key: &ObjectKey) -> Option<usize> {
        self.items
            .iter()
            .position(|item| self.comparer.equals(item.key(), key))
    }

    fn get_at(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    fn get_at_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    /// Append; an unnumbered member takes the next id when renumbering.
    fn add(&mut self, mut item: T) -> Result<usize, StorageError> {
        self.check_insertable(item.key())?;

        let index = self.items.len();
        if self.renumbers && item.ordinal_id().is_none() {
            item.set_ordinal_id(self.id_for(index));
        }
        self.items.push(item);

        Ok(index)
    }

    fn insert_at(&mut self, index: usize, mut item: T) -> Result<(), StorageError> {
        if index > self.items.len() {
            return Err(StorageError::OutOfRange {
                kind: self.kind,
                index,
                len: self.items.len(),
            });
        }
        if !self.renumbers {
            self.check_insertable(item.key())?;
            self.items.insert(index, item);

            return Ok(());
        }

        // a number-keyed member's identity is its new id; check it against
        // the shifted members
        item.set_ordinal_id(self.id_for(index));
        let shifted = self.renumber(index, 1);
        if let Err(err) = self.check_insertable(item.key()) {
            self.renumber(index, -1);
            return Err(err);
        }
        self.record_shift(index, 1, shifted);
        self.items.insert(index, item);

        Ok(())
    }

    fn remove_at(&mut self, index: usize) -> Result<T, StorageError> {
        if index >= self.items.len() {
            return Err(StorageError::OutOfRange {
                kind: self.kind,
                index,
                len: self.items.len(),
            });
        }

        let item = self.items.remove(index);
        if self.renumbers {
            self.shift(index, -1);
        }

        Ok(item)
    }

    fn replace(&mut self, item: T) -> Result<T, StorageError> {
        match self.lookup(item.key()) {
            Some(index) => Ok(std::mem::replace(&mut self.items[index], item)),
            None => Err(StorageError::NotFound {
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
