//! Collection behaviour through the public API, backed by the in-memory
//! populator.

use sqlmeta_core::{
    Error, Settings,
    collection::{CollectionError, MemberDescriptor},
    error::{ErrorClass, ErrorDetail},
    key::ObjectKey,
    kind::ObjectKind,
    memory::MemoryPopulator,
    object::{ID_PROPERTY, SqlObject},
    storage::{Keyed, Numbered, StorageError},
};
use std::rc::Rc;

const SERVER: &str = "Server[@Name='s1']";

fn server(populator: &Rc<MemoryPopulator>) -> SqlObject {
    SqlObject::root(
        ObjectKind::Server,
        ObjectKey::named("s1"),
        Some(populator.clone()),
        Rc::new(Settings::default()),
    )
}

fn login_names(server: &mut SqlObject) -> Vec<String> {
    server
        .collection_mut(ObjectKind::Login)
        .expect("servers hold logins")
        .iter()
        .expect("read should succeed")
        .map(|login| login.key().name().unwrap_or_default().to_string())
        .collect()
}

fn collection_error(err: &Error) -> Option<&CollectionError> {
    match &err.detail {
        Some(ErrorDetail::Collection(detail)) => Some(detail),
        _ => None,
    }
}

#[test]
fn sorted_members_enumerate_in_key_order() {
    let populator = Rc::new(MemoryPopulator::default());
    let mut server = server(&populator);

    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    for name in ["b", "a", "c"] {
        logins
            .add(SqlObject::new(ObjectKind::Login, ObjectKey::named(name)))
            .expect("add should succeed");
    }

    assert_eq!(login_names(&mut server), vec!["a", "b", "c"]);
}

#[test]
fn loaded_and_added_members_interleave() {
    let populator = Rc::new(MemoryPopulator::default());
    for name in ["delta", "Bravo"] {
        populator.insert(
            SERVER,
            ObjectKind::Login,
            MemberDescriptor::new(ObjectKey::named(name)),
        );
    }
    let mut server = server(&populator);

    server
        .collection_mut(ObjectKind::Login)
        .expect("logins")
        .add(SqlObject::new(ObjectKind::Login, ObjectKey::named("charlie")))
        .expect("add should succeed");

    assert_eq!(login_names(&mut server), vec!["Bravo", "charlie", "delta"]);
    assert_eq!(populator.calls(), 1);
}

#[test]
fn inserting_by_position_renumbers_ordinal_members() {
    let populator = Rc::new(MemoryPopulator::default());
    let mut table = SqlObject::root(
        ObjectKind::Table,
        ObjectKey::schema_name("dbo", "orders"),
        Some(populator.clone()),
        Rc::new(Settings::default()),
    );
    for (id, name) in [(1, "p"), (2, "q"), (3, "r")] {
        populator.insert(
            table.urn().as_str(),
            ObjectKind::Column,
            MemberDescriptor::new(ObjectKey::named(name)).with_property(ID_PROPERTY, id),
        );
    }

    let columns = table.collection_mut(ObjectKind::Column).expect("columns");
    columns
        .insert_at(1, SqlObject::new(ObjectKind::Column, ObjectKey::named("s")))
        .expect("insert should succeed");

    let ids: Vec<(i32, String)> = columns
        .iter()
        .expect("read should succeed")
        .map(|c| {
            (
                c.ordinal_id().unwrap_or_default(),
                c.key().name().unwrap_or_default().to_string(),
            )
        })
        .collect();
    assert_eq!(
        ids,
        vec![
            (1, "p".to_string()),
            (2, "s".to_string()),
            (3, "q".to_string()),
            (4, "r".to_string()),
        ]
    );
}

#[test]
fn duplicate_names_are_rejected_without_touching_the_store() {
    let populator = Rc::new(MemoryPopulator::default());
    let mut server = server(&populator);
    let databases = server.collection_mut(ObjectKind::Database).expect("databases");
    databases
        .add(SqlObject::new(ObjectKind::Database, ObjectKey::named("Orders")))
        .expect("first add should succeed");

    let err = databases
        .add(SqlObject::new(ObjectKind::Database, ObjectKey::named("orders")))
        .expect_err("names compare case-insensitively");

    assert_eq!(err.class, ErrorClass::Identity);
    assert!(matches!(
        err.detail,
        Some(ErrorDetail::Storage(StorageError::DuplicateIdentity { .. }))
    ));
    assert_eq!(databases.len().expect("read should succeed"), 1);
}

#[test]
fn locked_collections_report_their_reason() {
    let populator = Rc::new(MemoryPopulator::default());
    let mut server = server(&populator);
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    logins.lock("frozen");

    let err = logins
        .add(SqlObject::new(ObjectKind::Login, ObjectKey::named("a")))
        .expect_err("locked");

    assert!(err.is_state());
    assert!(matches!(
        collection_error(&err),
        Some(CollectionError::Locked { reason, .. }) if reason == "frozen"
    ));
    assert!(logins.is_empty().expect("read should succeed"));
}

#[test]
fn refresh_picks_up_store_changes() {
    let populator = Rc::new(MemoryPopulator::default());
    for name in ["a", "b"] {
        populator.insert(
            SERVER,
            ObjectKind::Login,
            MemberDescriptor::new(ObjectKey::named(name)),
        );
    }
    let mut server = server(&populator);
    assert_eq!(login_names(&mut server), vec!["a", "b"]);

    populator.remove(SERVER, ObjectKind::Login, &ObjectKey::named("a"));
    populator.insert(
        SERVER,
        ObjectKind::Login,
        MemberDescriptor::new(ObjectKey::named("c")),
    );
    let summary = server
        .collection_mut(ObjectKind::Login)
        .expect("logins")
        .refresh(false)
        .expect("refresh should succeed");

    assert_eq!((summary.kept, summary.added, summary.dropped), (1, 1, 1));
    assert_eq!(login_names(&mut server), vec!["b", "c"]);
}

#[test]
fn members_resolve_from_address_segments() {
    let populator = Rc::new(MemoryPopulator::default());
    populator.insert(
        SERVER,
        ObjectKind::Login,
        MemberDescriptor::new(ObjectKey::named("sa")),
    );
    let mut server = server(&populator);

    let segments = sqlmeta_core::urn::UrnParser::parse("Server[@Name='s1']/Login[@Name='SA']")
        .expect("address should parse");
    let login = server
        .collection_mut(ObjectKind::Login)
        .expect("logins")
        .get_by_segment(&segments[1])
        .expect("read should succeed")
        .expect("login should resolve");

    assert_eq!(login.urn().as_str(), "Server[@Name='s1']/Login[@Name='sa']");
}

#[test]
fn case_sensitive_sessions_keep_names_that_differ_in_case() {
    let populator = Rc::new(MemoryPopulator::default());
    let mut server = SqlObject::root(
        ObjectKind::Server,
        ObjectKey::named("s1"),
        Some(populator),
        Rc::new(Settings::with_collation("Latin1_General_CS_AS")),
    );
    let databases = server.collection_mut(ObjectKind::Database).expect("databases");

    for name in ["orders", "Orders"] {
        databases
            .add(SqlObject::new(ObjectKind::Database, ObjectKey::named(name)))
            .expect("names differ under a case-sensitive collation");
    }

    assert_eq!(databases.len().expect("read should succeed"), 2);
}
