//! Object-kind registry.
//!
//! Every supported object kind is a variant of [`ObjectKind`]; everything the
//! framework needs to know about a kind (identity shape, storage strategy,
//! transactability, child kinds, capabilities) lives in one immutable
//! [`KindInfo`] table resolved by `match`, never by runtime name lookup.

use crate::key::KeyShape;
use derive_more::Display;
use serde::{Deserialize, Serialize};

///
/// ObjectKind
///

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[remain::sorted]
pub enum ObjectKind {
    ApplicationRole,
    AvailabilityGroup,
    AvailabilityGroupListener,
    Check,
    Column,
    ColumnEncryptionKey,
    ColumnEncryptionKeyValue,
    Credential,
    Database,
    DatabaseReplicaState,
    DatabaseRole,
    Endpoint,
    ExtendedProperty,
    ForeignKey,
    FullTextCatalog,
    FullTextIndex,
    FullTextStopList,
    Index,
    IndexedColumn,
    Job,
    JobSchedule,
    ListenerIpAddress,
    Login,
    MessageType,
    NumberedStoredProcedure,
    Parameter,
    PhysicalPartition,
    Schema,
    SearchPropertyList,
    SecurityPolicy,
    SecurityPredicate,
    Sequence,
    Server,
    Statistic,
    StatisticColumn,
    StoredProcedure,
    Synonym,
    Table,
    Trigger,
    User,
    UserDefinedFunction,
    UserDefinedMessage,
    UserDefinedTableType,
    View,
}

impl ObjectKind {
    const ALL: [Self; 44] = [
        Self::ApplicationRole,
        Self::AvailabilityGroup,
        Self::AvailabilityGroupListener,
        Self::Check,
        Self::Column,
        Self::ColumnEncryptionKey,
        Self::ColumnEncryptionKeyValue,
        Self::Credential,
        Self::Database,
        Self::DatabaseReplicaState,
        Self::DatabaseRole,
        Self::Endpoint,
        Self::ExtendedProperty,
        Self::ForeignKey,
        Self::FullTextCatalog,
        Self::FullTextIndex,
        Self::FullTextStopList,
        Self::Index,
        Self::IndexedColumn,
        Self::Job,
        Self::JobSchedule,
        Self::ListenerIpAddress,
        Self::Login,
        Self::MessageType,
        Self::NumberedStoredProcedure,
        Self::Parameter,
        Self::PhysicalPartition,
        Self::Schema,
        Self::SearchPropertyList,
        Self::SecurityPolicy,
        Self::SecurityPredicate,
        Self::Sequence,
        Self::Server,
        Self::Statistic,
        Self::StatisticColumn,
        Self::StoredProcedure,
        Self::Synonym,
        Self::Table,
        Self::Trigger,
        Self::User,
        Self::UserDefinedFunction,
        Self::UserDefinedMessage,
        Self::UserDefinedTableType,
        Self::View,
    ];

    /// Every registered kind, in declaration order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &Self::ALL
    }

    /// Resolve a URN type name (`"Table"`, `"Param"`, ...) to its kind.
    /// Type names compare exactly; the URN grammar is case-sensitive on types.
    #[must_use]
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.info().type_name == type_name)
    }

    #[must_use]
    pub const fn type_name(self) -> &'static str {
        self.info().type_name
    }

    #[must_use]
    pub const fn key_shape(self) -> KeyShape {
        self.info().key_shape
    }

    #[must_use]
    pub const fn storage(self) -> StorageKind {
        self.info().storage
    }

    /// Whether create/drop of this kind may run inside a user transaction.
    #[must_use]
    pub const fn is_transactable(self) -> bool {
        self.info().transactable
    }

    #[must_use]
    pub fn allows_child(self, child: Self) -> bool {
        self.info().children.contains(&child)
    }

    #[expect(clippy::too_many_lines)]
    #[must_use]
    pub const fn info(self) -> KindInfo {
        use KeyShape as K;
        use ObjectKind as O;

        match self {
            Self::Server => KindInfo::sorted("Server", K::Name)
                .caps(Capabilities::ALTER)
                .non_transactable()
                .children(&[
                    O::AvailabilityGroup,
                    O::Credential,
                    O::Database,
                    O::Endpoint,
                    O::Job,
                    O::Login,
                    O::UserDefinedMessage,
                ]),
            Self::Database => KindInfo::sorted("Database", K::Name)
                .non_transactable()
                .children(&[
                    O::ApplicationRole,
                    O::ColumnEncryptionKey,
                    O::DatabaseRole,
                    O::ExtendedProperty,
                    O::FullTextCatalog,
                    O::FullTextStopList,
                    O::MessageType,
                    O::Schema,
                    O::SearchPropertyList,
                    O::SecurityPolicy,
                    O::Sequence,
                    O::StoredProcedure,
                    O::Synonym,
                    O::Table,
                    O::User,
                    O::UserDefinedFunction,
                    O::UserDefinedTableType,
                    O::View,
                ]),
            Self::Login => KindInfo::sorted("Login", K::Name).non_transactable(),
            Self::Endpoint => KindInfo::sorted("Endpoint", K::Name).non_transactable(),
            Self::Credential => KindInfo::sorted("Credential", K::Name),
            Self::Schema => KindInfo::sorted("Schema", K::Name),
            Self::Table => KindInfo::sorted("Table", K::SchemaName).children(&[
                O::Check,
                O::Column,
                O::ExtendedProperty,
                O::ForeignKey,
                O::FullTextIndex,
                O::Index,
                O::PhysicalPartition,
                O::Statistic,
                O::Trigger,
            ]),
            Self::View => {
                KindInfo::sorted("View", K::SchemaName).children(&[
                    O::Column,
                    O::Index,
                    O::Statistic,
                    O::Trigger,
                ])
            }
            Self::Column => KindInfo::ordinal("Column", K::Name, true)
                .children(&[O::ExtendedProperty]),
            Self::Parameter => KindInfo::ordinal("Param", K::Name, true).empty_name(),
            Self::Index => KindInfo::sorted("Index", K::Name).children(&[
                O::IndexedColumn,
                O::PhysicalPartition,
            ]),
            Self::IndexedColumn => KindInfo::ordinal("IndexedColumn", K::Name, true)
                .caps(Capabilities::ALTER),
            Self::PhysicalPartition => KindInfo::ordinal("PhysicalPartition", K::Number, true)
                .caps(Capabilities::ALTER),
            Self::Statistic => {
                KindInfo::sorted("Statistic", K::Name).children(&[O::StatisticColumn])
            }
            Self::StatisticColumn => KindInfo::ordinal("StatisticColumn", K::Name, false)
                .caps(Capabilities::NONE),
            Self::ForeignKey => KindInfo::sorted("ForeignKey", K::Name),
            Self::Check => KindInfo::sorted("Check", K::Name),
            Self::Trigger => KindInfo::sorted("Trigger", K::Name),
            Self::StoredProcedure => KindInfo::sorted("StoredProcedure", K::SchemaName)
                .children(&[O::NumberedStoredProcedure, O::Parameter]),
            Self::NumberedStoredProcedure => {
                KindInfo::sorted("Numbered", K::Number).caps(Capabilities::CREATE_ALTER_DROP)
            }
            Self::UserDefinedFunction => KindInfo::sorted("UserDefinedFunction", K::SchemaName)
                .children(&[O::Column, O::Parameter]),
            Self::UserDefinedTableType => KindInfo::sorted("UserDefinedTableType", K::SchemaName)
                .caps(Capabilities::CREATE_ALTER_DROP)
                .children(&[O::Check, O::Column, O::Index]),
            Self::Synonym => KindInfo::sorted("Synonym", K::SchemaName),
            Self::Sequence => KindInfo::sorted("Sequence", K::SchemaName),
            Self::User => KindInfo::sorted("User", K::Name).non_transactable(),
            Self::DatabaseRole => KindInfo::sorted("Role", K::Name).non_transactable(),
            Self::ApplicationRole => {
                KindInfo::sorted("ApplicationRole", K::Name).non_transactable()
            }
            Self::FullTextCatalog => {
                KindInfo::sorted("FullTextCatalog", K::Name).non_transactable()
            }
            Self::FullTextStopList => {
                KindInfo::sorted("FullTextStopList", K::Name).non_transactable()
            }
            Self::SearchPropertyList => {
                KindInfo::sorted("SearchPropertyList", K::Name).non_transactable()
            }
            Self::FullTextIndex => KindInfo::sorted("FullTextIndex", K::Name)
                .empty_name()
                .non_transactable()
                .caps(Capabilities::CREATE_ALTER_DROP),
            Self::MessageType => KindInfo::sorted("MessageType", K::Name),
            Self::UserDefinedMessage => KindInfo::sorted("UserDefinedMessage", K::MessageIdLanguage)
                .caps(Capabilities::CREATE_ALTER_DROP),
            Self::Job => KindInfo::sorted("Job", K::NameCategory).children(&[O::JobSchedule]),
            Self::JobSchedule => KindInfo::sorted("Schedule", K::NameId),
            Self::AvailabilityGroup => KindInfo::sorted("AvailabilityGroup", K::Name)
                .caps(Capabilities::CREATE_ALTER_DROP)
                .children(&[O::AvailabilityGroupListener, O::DatabaseReplicaState]),
            Self::AvailabilityGroupListener => {
                KindInfo::sorted("AvailabilityGroupListener", K::Name)
                    .caps(Capabilities::CREATE_ALTER_DROP)
                    .children(&[O::ListenerIpAddress])
            }
            Self::ListenerIpAddress => {
                KindInfo::sorted("AvailabilityGroupListenerIPAddress", K::ListenerIp)
                    .caps(Capabilities::CREATE)
            }
            Self::DatabaseReplicaState => {
                KindInfo::sorted("DatabaseReplicaState", K::ReplicaState).caps(Capabilities::NONE)
            }
            Self::SecurityPolicy => KindInfo::sorted("SecurityPolicy", K::SchemaName)
                .children(&[O::SecurityPredicate]),
            Self::SecurityPredicate => {
                KindInfo::sorted("SecurityPredicate", K::Id).caps(Capabilities::CREATE_ALTER_DROP)
            }
            Self::ColumnEncryptionKey => KindInfo::sorted("ColumnEncryptionKey", K::Name)
                .caps(Capabilities::CREATE_ALTER_DROP)
                .children(&[O::ColumnEncryptionKeyValue]),
            Self::ColumnEncryptionKeyValue => {
                KindInfo::sorted("ColumnEncryptionKeyValue", K::Id).caps(Capabilities::CREATE)
            }
            Self::ExtendedProperty => KindInfo::sorted("ExtendedProperty", K::Name),
        }
    }
}

///
/// StorageKind
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum StorageKind {
    /// Members stay ordered by identity.
    Sorted,
    /// Members keep caller-determined positions.
    Ordinal,
}

///
/// Capabilities
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[expect(clippy::struct_excessive_bools)]
pub struct Capabilities {
    pub create: bool,
    pub alter: bool,
    pub drop: bool,
    pub rename: bool,
}

impl Capabilities {
    pub const NONE: Self = Self {
        create: false,
        alter: false,
        drop: false,
        rename: false,
    };
    pub const ALL: Self = Self {
        create: true,
        alter: true,
        drop: true,
        rename: true,
    };
    pub const ALTER: Self = Self {
        alter: true,
        ..Self::NONE
    };
    pub const CREATE: Self = Self {
        create: true,
        ..Self::NONE
    };
    pub const CREATE_ALTER_DROP: Self = Self {
        rename: false,
        ..Self::ALL
    };
}

///
/// KindInfo
///

#[derive(Clone, Copy, Debug)]
pub struct KindInfo {
    pub type_name: &'static str,
    pub key_shape: KeyShape,
    pub storage: StorageKind,

    /// Inserting at a position shifts the numeric id of later members.
    pub renumbers: bool,

    /// Kinds whose members may legitimately carry an empty name.
    pub allows_empty_name: bool,
    pub transactable: bool,
    pub capabilities: Capabilities,
    pub children: &'static [ObjectKind],
}

impl KindInfo {
    const fn sorted(type_name: &'static str, key_shape: KeyShape) -> Self {
        Self {
            type_name,
            key_shape,
            storage: StorageKind::Sorted,
            renumbers: false,
            allows_empty_name: false,
            transactable: true,
            capabilities: Capabilities::ALL,
            children: &[],
        }
    }

    const fn ordinal(type_name: &'static str, key_shape: KeyShape, renumbers: bool) -> Self {
        Self {
            storage: StorageKind::Ordinal,
            renumbers,
            ..Self::sorted(type_name, key_shape)
        }
    }

    const fn non_transactable(self) -> Self {
        Self {
            transactable: false,
            ..self
        }
    }

    const fn empty_name(self) -> Self {
        Self {
            allows_empty_name: true,
            ..self
        }
    }

    const fn caps(self, capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            ..self
        }
    }

    const fn children(self, children: &'static [ObjectKind]) -> Self {
        Self { children, ..self }
    }
}
