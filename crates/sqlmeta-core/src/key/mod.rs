
use crate::{error::ErrorClass, error::ErrorOrigin, kind::ObjectKind, urn::UrnSegment};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use thiserror::Error as ThisError;

/// Category id used for jobs whose path does not name one.
pub const DEFAULT_CATEGORY_ID: i32 = -1;

///
/// KeyError
///

#[derive(Debug, ThisError)]
#[remain::sorted]
pub enum KeyError {
    #[error("invalid path attribute '{attribute}' = '{value}' for {kind}")]
    InvalidPathAttribute {
        kind: ObjectKind,
        attribute: &'static str,
        value: String,
    },

    #[error("missing identity field '{field}' for {kind} {key}")]
    MissingField {
        kind: ObjectKind,
        field: &'static str,
        key: String,
    },

    #[error("required identity attribute '{attribute}' missing from path segment '{segment}' for {kind}")]
    MissingPathAttribute {
        kind: ObjectKind,
        attribute: &'static str,
        segment: String,
    },

    #[error("key field '{field}' does not exist on {shape} keys")]
    NoSuchField { shape: KeyShape, field: &'static str },

    #[error("key {key} is read-only once attached to a collection")]
    ReadOnly { key: String },

    #[error("{kind} expects a {expected} key, got {found} key {key}")]
    ShapeMismatch {
        kind: ObjectKind,
        expected: KeyShape,
        found: KeyShape,
        key: String,
    },
}

impl KeyError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::ReadOnly { .. } => ErrorClass::State,
            Self::NoSuchField { .. } => ErrorClass::Unsupported,
            Self::InvalidPathAttribute { .. }
            | Self::MissingField { .. }
            | Self::MissingPathAttribute { .. }
            | Self::ShapeMismatch { .. } => ErrorClass::Identity,
        }
    }

    #[must_use]
    pub const fn origin(&self) -> ErrorOrigin {
        match self {
            Self::InvalidPathAttribute { .. } | Self::MissingPathAttribute { .. } => {
                ErrorOrigin::Path
            }
            _ => ErrorOrigin::Key,
        }
    }
}

///
/// KeyShape
///
/// The set of identity fields a kind is addressed by.
/// Variant order is the cross-shape ordering rank; do not reorder.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum KeyShape {
    Name,
    SchemaName,
    NameCategory,
    NameId,
    MessageIdLanguage,
    Number,
    Id,
    ListenerIp,
    ReplicaState,
}

impl KeyShape {
    /// Identity field names in filter-expression order.
    #[must_use]
    pub const fn field_names(self) -> &'static [&'static str] {
        match self {
            Self::Name => &["Name"],
            Self::SchemaName => &["Name", "Schema"],
            Self::NameCategory => &["Name", "CategoryID"],
            Self::NameId => &["Name", "ID"],
            Self::MessageIdLanguage => &["ID", "Language"],
            Self::Number => &["Number"],
            Self::Id => &["ID"],
            Self::ListenerIp => &["IPAddress", "SubnetMask", "SubnetIP"],
            Self::ReplicaState => &["AvailabilityReplicaServerName", "AvailabilityDatabaseName"],
        }
    }
}

///
/// KeyFields
///
/// `None` means "unset". Which fields are mandatory is decided per shape
/// in `ObjectKey::missing_field`.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum KeyFields {
    Name {
        name: Option<String>,
    },
    SchemaName {
        schema: Option<String>,
        name: Option<String>,
    },
    NameCategory {
        name: Option<String>,
        category_id: i32,
    },
    NameId {
        name: Option<String>,
        id: Option<i32>,
    },
    MessageIdLanguage {
        id: Option<i32>,
        language: Option<String>,
    },
    Number {
        number: Option<i32>,
    },
    Id {
        id: Option<i32>,
    },
    ListenerIp {
        ip: Option<String>,
        mask: Option<String>,
        subnet: Option<String>,
    },
    ReplicaState {
        replica: Option<String>,
        database: Option<String>,
    },
}

impl KeyFields {
    #[must_use]
    pub const fn shape(&self) -> KeyShape {
        match self {
            Self::Name { .. } => KeyShape::Name,
            Self::SchemaName { .. } => KeyShape::SchemaName,
            Self::NameCategory { .. } => KeyShape::NameCategory,
            Self::NameId { .. } => KeyShape::NameId,
            Self::MessageIdLanguage { .. } => KeyShape::MessageIdLanguage,
            Self::Number { .. } => KeyShape::Number,
            Self::Id { .. } => KeyShape::Id,
            Self::ListenerIp { .. } => KeyShape::ListenerIp,
            Self::ReplicaState { .. } => KeyShape::ReplicaState,
        }
    }

    fn unset(shape: KeyShape) -> Self {
        match shape {
            KeyShape::Name => Self::Name { name: None },
            KeyShape::SchemaName => Self::SchemaName {
                schema: None,
                name: None,
            },
            KeyShape::NameCategory => Self::NameCategory {
                name: None,
                category_id: DEFAULT_CATEGORY_ID,
            },
            KeyShape::NameId => Self::NameId { name: None, id: None },
            KeyShape::MessageIdLanguage => Self::MessageIdLanguage {
                id: None,
                language: None,
            },
            KeyShape::Number => Self::Number { number: None },
            KeyShape::Id => Self::Id { id: None },
            KeyShape::ListenerIp => Self::ListenerIp {
                ip: None,
                mask: None,
                subnet: None,
            },
            KeyShape::ReplicaState => Self::ReplicaState {
                replica: None,
                database: None,
            },
        }
    }

    // (field name, rendered value) pairs in field_names() order; unset fields are None
    fn values(&self) -> Vec<(&'static str, Option<FieldText<'_>>)> {
        fn text(v: &Option<String>) -> Option<FieldText<'_>> {
            v.as_deref().map(FieldText::Text)
        }
        let int = |v: Option<i32>| v.map(FieldText::Int);

        let names = self.shape().field_names();
        let values = match self {
            Self::Name { name } => vec![text(name)],
            Self::SchemaName { schema, name } => vec![text(name), text(schema)],
            Self::NameCategory { name, category_id } => {
                // the default category is not a store value
                let category = Some(*category_id).filter(|&id| id != DEFAULT_CATEGORY_ID);
                vec![text(name), int(category)]
            }
            Self::NameId { name, id } => vec![text(name), int(*id)],
            Self::MessageIdLanguage { id, language } => vec![int(*id), text(language)],
            Self::Number { number } => vec![int(*number)],
            Self::Id { id } => vec![int(*id)],
            Self::ListenerIp { ip, mask, subnet } => vec![text(ip), text(mask), text(subnet)],
            Self::ReplicaState { replica, database } => vec![text(replica), text(database)],
        };

        names.iter().copied().zip(values).collect()
    }
}

#[derive(Clone, Copy)]
enum FieldText<'a> {
    Text(&'a str),
    Int(i32),
}

///
/// ObjectKey
///
/// Composite identity of an object within its parent scope.
/// Keys start writable and are frozen when their object is attached.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ObjectKey {
    fields: KeyFields,
    writable: bool,
}

impl ObjectKey {
    #[must_use]
    pub const fn from_fields(fields: KeyFields) -> Self {
        Self {
            fields,
            writable: true,
        }
    }

    /// Key of the given shape with every field unset.
    #[must_use]
    pub fn unset(shape: KeyShape) -> Self {
        Self::from_fields(KeyFields::unset(shape))
    }

    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::from_fields(KeyFields::Name {
            name: Some(name.into()),
        })
    }

    #[must_use]
    pub fn schema_name(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self::from_fields(KeyFields::SchemaName {
            schema: Some(schema.into()),
            name: Some(name.into()),
        })
    }

    #[must_use]
    pub fn name_category(name: impl Into<String>, category_id: i32) -> Self {
        Self::from_fields(KeyFields::NameCategory {
            name: Some(name.into()),
            category_id,
        })
    }

    #[must_use]
    pub fn name_id(name: impl Into<String>, id: Option<i32>) -> Self {
        Self::from_fields(KeyFields::NameId {
            name: Some(name.into()),
            id,
        })
    }

    #[must_use]
    pub fn message(id: i32, language: impl Into<String>) -> Self {
        Self::from_fields(KeyFields::MessageIdLanguage {
            id: Some(id),
            language: Some(language.into()),
        })
    }

    #[must_use]
    pub const fn number(number: i32) -> Self {
        Self::from_fields(KeyFields::Number {
            number: Some(number),
        })
    }

    #[must_use]
    pub const fn id(id: i32) -> Self {
        Self::from_fields(KeyFields::Id { id: Some(id) })
    }

    #[must_use]
    pub fn listener_ip(
        ip: impl Into<String>,
        mask: Option<String>,
        subnet: Option<String>,
    ) -> Self {
        Self::from_fields(KeyFields::ListenerIp {
            ip: Some(ip.into()),
            mask,
            subnet,
        })
    }

    #[must_use]
    pub fn replica_state(replica: impl Into<String>, database: impl Into<String>) -> Self {
        Self::from_fields(KeyFields::ReplicaState {
            replica: Some(replica.into()),
            database: Some(database.into()),
        })
    }

    ///
    /// CreateKeyFromUrn
    ///
    /// Build the key for `kind` from a resolved path segment.
    /// Mandatory attributes must be present; optional ones fall back to their defaults.
    ///

    pub fn from_segment(kind: ObjectKind, segment: &UrnSegment) -> Result<Self, KeyError> {
        let required = |attribute: &'static str| {
            segment
                .attribute(attribute)
                .map(ToString::to_string)
                .ok_or_else(|| KeyError::MissingPathAttribute {
                    kind,
                    attribute,
                    segment: segment.to_string(),
                })
        };
        let optional = |attribute: &'static str| segment.attribute(attribute).map(ToString::to_string);
        let int = |attribute: &'static str, value: String| {
            value
                .trim()
                .parse::<i32>()
                .map_err(|_| KeyError::InvalidPathAttribute {
                    kind,
                    attribute,
                    value,
                })
        };

        let fields = match kind.key_shape() {
            KeyShape::Name => KeyFields::Name {
                name: Some(required("Name")?),
            },
            KeyShape::SchemaName => KeyFields::SchemaName {
                schema: Some(required("Schema")?),
                name: Some(required("Name")?),
            },
            KeyShape::NameCategory => KeyFields::NameCategory {
                name: Some(required("Name")?),
                category_id: optional("CategoryID")
                    .map(|v| int("CategoryID", v))
                    .transpose()?
                    .unwrap_or(DEFAULT_CATEGORY_ID),
            },
            KeyShape::NameId => KeyFields::NameId {
                name: Some(required("Name")?),
                id: optional("ID").map(|v| int("ID", v)).transpose()?,
            },
            KeyShape::MessageIdLanguage => KeyFields::MessageIdLanguage {
                id: Some(int("ID", required("ID")?)?),
                language: Some(required("Language")?),
            },
            KeyShape::Number => KeyFields::Number {
                number: Some(int("Number", required("Number")?)?),
            },
            KeyShape::Id => KeyFields::Id {
                id: Some(int("ID", required("ID")?)?),
            },
            KeyShape::ListenerIp => KeyFields::ListenerIp {
                ip: Some(required("IPAddress")?),
                mask: optional("SubnetMask"),
                subnet: optional("SubnetIP"),
            },
            KeyShape::ReplicaState => KeyFields::ReplicaState {
                replica: Some(required("AvailabilityReplicaServerName")?),
                database: Some(required("AvailabilityDatabaseName")?),
            },
        };

        Ok(Self::from_fields(fields))
    }

    #[must_use]
    pub const fn fields(&self) -> &KeyFields {
        &self.fields
    }

    #[must_use]
    pub const fn shape(&self) -> KeyShape {
        self.fields.shape()
    }

    #[must_use]
    pub const fn field_names(&self) -> &'static [&'static str] {
        self.shape().field_names()
    }

    #[must_use]
    pub const fn is_writable(&self) -> bool {
        self.writable
    }

    pub(crate) const fn set_writable(&mut self, writable: bool) {
        self.writable = writable;
    }

    /// True when any mandatory identity field is unset.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.missing_field().is_some()
    }

    /// Check the key against the identity rules of `kind`.
    pub fn validate(&self, kind: ObjectKind) -> Result<(), KeyError> {
        let expected = kind.key_shape();
        if self.shape() != expected {
            return Err(KeyError::ShapeMismatch {
                kind,
                expected,
                found: self.shape(),
                key: self.to_string(),
            });
        }

        if let Some(field) = self.missing_field() {
            return Err(KeyError::MissingField {
                kind,
                field,
                key: self.to_string(),
            });
        }

        if !kind.info().allows_empty_name && self.name().is_some_and(str::is_empty) {
            return Err(KeyError::MissingField {
                kind,
                field: "Name",
                key: self.to_string(),
            });
        }

        Ok(())
    }

    fn missing_field(&self) -> Option<&'static str> {
        match &self.fields {
            KeyFields::Name { name }
            | KeyFields::NameCategory { name, .. }
            | KeyFields::NameId { name, .. } => name.is_none().then_some("Name"),
            KeyFields::SchemaName { schema, name } => {
                if name.is_none() {
                    Some("Name")
                } else if schema.is_none() {
                    Some("Schema")
                } else {
                    None
                }
            }
            KeyFields::MessageIdLanguage { id, language } => {
                if id.is_none() {
                    Some("ID")
                } else if language.is_none() {
                    Some("Language")
                } else {
                    None
                }
            }
            KeyFields::Number { number } => number.is_none().then_some("Number"),
            KeyFields::Id { id } => id.is_none().then_some("ID"),
            KeyFields::ListenerIp { ip, .. } => ip.is_none().then_some("IPAddress"),
            KeyFields::ReplicaState { replica, database } => {
                if replica.is_none() {
                    Some("AvailabilityReplicaServerName")
                } else if database.is_none() {
                    Some("AvailabilityDatabaseName")
                } else {
                    None
                }
            }
        }
    }

    // ── Field access ─────────────────────────────

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.fields {
            KeyFields::Name { name }
            | KeyFields::SchemaName { name, .. }
            | KeyFields::NameCategory { name, .. }
            | KeyFields::NameId { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn schema(&self) -> Option<&str> {
        match &self.fields {
            KeyFields::SchemaName { schema, .. } => schema.as_deref(),
            _ => None,
        }
    }

    /// The numeric identity field (`Number` or `ID`), if the shape has one.
    #[must_use]
    pub const fn number_value(&self) -> Option<i32> {
        match &self.fields {
            KeyFields::Number { number } => *number,
            KeyFields::Id { id } | KeyFields::NameId { id, .. } | KeyFields::MessageIdLanguage { id, .. } => *id,
            _ => None,
        }
    }

    pub fn set_name(&mut self, value: impl Into<String>) -> Result<(), KeyError> {
        self.ensure_writable()?;
        let shape = self.shape();

        match &mut self.fields {
            KeyFields::Name { name }
            | KeyFields::SchemaName { name, .. }
            | KeyFields::NameCategory { name, .. }
            | KeyFields::NameId { name, .. } => {
                *name = Some(value.into());
                Ok(())
            }
            _ => Err(KeyError::NoSuchField {
                shape,
                field: "Name",
            }),
        }
    }

    pub fn set_schema(&mut self, value: impl Into<String>) -> Result<(), KeyError> {
        self.ensure_writable()?;
        let shape = self.shape();

        match &mut self.fields {
            KeyFields::SchemaName { schema, .. } => {
                *schema = Some(value.into());
                Ok(())
            }
            _ => Err(KeyError::NoSuchField {
                shape,
                field: "Schema",
            }),
        }
    }

    pub fn set_number(&mut self, value: i32) -> Result<(), KeyError> {
        self.ensure_writable()?;
        let shape = self.shape();

        match &mut self.fields {
            KeyFields::Number { number } => {
                *number = Some(value);
                Ok(())
            }
            _ => Err(KeyError::NoSuchField {
                shape,
                field: "Number",
            }),
        }
    }

    pub fn set_id(&mut self, value: i32) -> Result<(), KeyError> {
        self.ensure_writable()?;
        let shape = self.shape();

        match &mut self.fields {
            KeyFields::Id { id } | KeyFields::NameId { id, .. } | KeyFields::MessageIdLanguage { id, .. } => {
                *id = Some(value);
                Ok(())
            }
            _ => Err(KeyError::NoSuchField { shape, field: "ID" }),
        }
    }

    /// Internal renumbering path for ordinal stores; ignores the writable gate.
    pub(crate) const fn renumber(&mut self, value: i32) -> bool {
        match &mut self.fields {
            KeyFields::Number { number } => {
                *number = Some(value);
                true
            }
            _ => false,
        }
    }

    fn ensure_writable(&self) -> Result<(), KeyError> {
        if self.writable {
            Ok(())
        } else {
            Err(KeyError::ReadOnly {
                key: self.to_string(),
            })
        }
    }

    // ── Rendering ────────────────────────────────

    /// Store-query filter, e.g. `@Name='t' and @Schema='dbo'`. Unset fields are omitted.
    #[must_use]
    pub fn filter_expression(&self) -> String {
        let mut out = String::new();

        for (field, value) in self.fields.values() {
            let Some(value) = value else { continue };
            if !out.is_empty() {
                out.push_str(" and ");
            }

            let _ = match value {
                FieldText::Text(text) => write!(out, "@{field}='{}'", escape_literal(text)),
                FieldText::Int(n) => write!(out, "@{field}='{n}'"),
            };
        }

        out
    }

    /// Plain dotted name used in user-facing messages, e.g. `dbo.t`.
    #[must_use]
    pub fn exception_name(&self) -> String {
        self.display_parts()
            .into_iter()
            .map(|part| match part {
                Some(FieldText::Text(text)) => text.to_string(),
                Some(FieldText::Int(n)) => n.to_string(),
                None => String::new(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    // display order: schema before name, otherwise field order
    fn display_parts(&self) -> Vec<Option<FieldText<'_>>> {
        let mut parts: Vec<_> = match &self.fields {
            // category id is a filter-only field
            KeyFields::NameCategory { .. } | KeyFields::NameId { .. } => {
                self.fields.values().into_iter().take(1).collect()
            }
            _ => self.fields.values(),
        }
        .into_iter()
        .map(|(_, value)| value)
        .collect();

        if matches!(self.fields, KeyFields::SchemaName { .. }) {
            parts.reverse();
        }

        parts
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.display_parts().into_iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match part {
                Some(FieldText::Text(text)) => write!(f, "[{}]", escape_identifier(text))?,
                Some(FieldText::Int(n)) => write!(f, "{n}")?,
                None => f.write_str("<null>")?,
            }
        }

        Ok(())
    }
}

/// Escape a value for a single-quoted literal.
#[must_use]
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Escape a value for a bracketed identifier.
#[must_use]
pub fn escape_identifier(value: &str) -> String {
    value.replace(']', "]]")
}
