//! Collation-aware ordering of identity values.

use crate::key::{KeyFields, ObjectKey};
use sqlmeta_config::DEFAULT_COLLATION;
use std::cmp::Ordering;

///
/// CaseSensitivity
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CaseSensitivity {
    Insensitive,
    Sensitive,
}

///
/// StringComparer
///
/// Orders strings the way the owning scope's collation does.
/// Insensitive comparison folds case per character, so case variants of
/// one name are the same identity.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StringComparer {
    case: CaseSensitivity,
}

impl StringComparer {
    #[must_use]
    pub const fn new(case: CaseSensitivity) -> Self {
        Self { case }
    }

    /// Derive sensitivity from a collation name such as `Latin1_General_CS_AS`.
    #[must_use]
    pub fn from_collation(collation: &str) -> Self {
        let upper = collation.to_ascii_uppercase();
        let sensitive = upper.contains("_CS")
            || upper.ends_with("_BIN")
            || upper.ends_with("_BIN2")
            || upper.contains("_BIN_")
            || upper.contains("_BIN2_");

        Self::new(if sensitive {
            CaseSensitivity::Sensitive
        } else {
            CaseSensitivity::Insensitive
        })
    }

    #[must_use]
    pub const fn case(&self) -> CaseSensitivity {
        self.case
    }

    #[must_use]
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        match self.case {
            CaseSensitivity::Sensitive => a.cmp(b),
            CaseSensitivity::Insensitive => a
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(b.chars().flat_map(char::to_lowercase)),
        }
    }

    #[must_use]
    pub fn equals(&self, a: &str, b: &str) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

impl Default for StringComparer {
    fn default() -> Self {
        Self::from_collation(DEFAULT_COLLATION)
    }
}

///
/// KeyComparer
///
/// Field-by-field key ordering.
///
/// Tie-break order per shape:
/// - schema, then name
/// - name, then category id
/// - name, then id (a missing id sorts first)
/// - message id, then language
/// - ip, then mask, then subnet
/// - replica, then database
///
/// Keys of different shapes order by shape rank.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct KeyComparer {
    strings: StringComparer,
}

impl KeyComparer {
    #[must_use]
    pub const fn new(strings: StringComparer) -> Self {
        Self { strings }
    }

    #[must_use]
    pub const fn strings(&self) -> StringComparer {
        self.strings
    }

    #[must_use]
    pub fn compare(&self, a: &ObjectKey, b: &ObjectKey) -> Ordering {
        use KeyFields as F;

        match (a.fields(), b.fields()) {
            (F::Name { name: a }, F::Name { name: b }) => self.text(a, b),
            (
                F::SchemaName {
                    schema: sa,
                    name: na,
                },
                F::SchemaName {
                    schema: sb,
                    name: nb,
                },
            ) => self.text(sa, sb).then_with(|| self.text(na, nb)),
            (
                F::NameCategory {
                    name: na,
                    category_id: ca,
                },
                F::NameCategory {
                    name: nb,
                    category_id: cb,
                },
            ) => self.text(na, nb).then_with(|| ca.cmp(cb)),
            (F::NameId { name: na, id: ia }, F::NameId { name: nb, id: ib }) => {
                self.text(na, nb).then_with(|| ia.cmp(ib))
            }
            (
                F::MessageIdLanguage {
                    id: ia,
                    language: la,
                },
                F::MessageIdLanguage {
                    id: ib,
                    language: lb,
                },
            ) => ia.cmp(ib).then_with(|| self.text(la, lb)),
            (F::Number { number: a }, F::Number { number: b }) | (F::Id { id: a }, F::Id { id: b }) => {
                a.cmp(b)
            }
            (
                F::ListenerIp {
                    ip: ia,
                    mask: ma,
                    subnet: sa,
                },
                F::ListenerIp {
                    ip: ib,
                    mask: mb,
                    subnet: sb,
                },
            ) => self
                .text(ia, ib)
                .then_with(|| self.text(ma, mb))
                .then_with(|| self.text(sa, sb)),
            (
                F::ReplicaState {
                    replica: ra,
                    database: da,
                },
                F::ReplicaState {
                    replica: rb,
                    database: db,
                },
            ) => self.text(ra, rb).then_with(|| self.text(da, db)),
            (a, b) => a.shape().cmp(&b.shape()),
        }
    }

    #[must_use]
    pub fn equals(&self, a: &ObjectKey, b: &ObjectKey) -> bool {
        self.compare(a, b) == Ordering::Equal
    }

    // unset sorts before set
    fn text(&self, a: &Option<String>, b: &Option<String>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => self.strings.compare(a, b),
            (a, b) => a.is_some().cmp(&b.is_some()),
        }
    }
}
