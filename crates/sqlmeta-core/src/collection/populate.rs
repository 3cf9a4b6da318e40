use crate::{
    error::BoxError,
    key::ObjectKey,
    kind::ObjectKind,
    object::PropertyValue,
    urn::Urn,
};
use std::collections::BTreeMap;

///
/// Populator
///
/// External source of collection members. Called synchronously the first
/// time a collection is read, and again on refresh or re-initialization.
///

pub trait Populator {
    fn populate(&self, request: &PopulateRequest) -> Result<Vec<MemberDescriptor>, BoxError>;
}

///
/// PopulateRequest
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PopulateRequest {
    pub parent: Urn,
    pub kind: ObjectKind,

    /// Extra filter expression narrowing the member set.
    pub filter: Option<String>,

    /// Properties to load alongside the identity fields.
    pub extra_fields: Vec<String>,
}

impl PopulateRequest {
    /// Address of the member set, e.g. `Server[@Name='s']/Login` or
    /// `.../Login[@IsDisabled='1']` when filtered.
    #[must_use]
    pub fn target(&self) -> String {
        match &self.filter {
            Some(filter) => format!("{}/{}[{filter}]", self.parent, self.kind.type_name()),
            None => format!("{}/{}", self.parent, self.kind.type_name()),
        }
    }
}

///
/// MemberDescriptor
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemberDescriptor {
    pub key: ObjectKey,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl MemberDescriptor {
    #[must_use]
    pub const fn new(key: ObjectKey) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}
