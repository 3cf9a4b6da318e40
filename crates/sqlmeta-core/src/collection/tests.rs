use super::*;
use crate::{
    error::{ErrorDetail, ErrorOrigin},
    memory::MemoryPopulator,
    object::{ID_PROPERTY, PropertyValue},
    obs::{metrics_report, metrics_reset_all},
    test_support::{server, server_with},
};

const SERVER: &str = "Server[@Name='s1']";

fn login(name: &str) -> SqlObject {
    SqlObject::new(ObjectKind::Login, ObjectKey::named(name))
}

fn seeded(names: &[&str]) -> Rc<MemoryPopulator> {
    let populator = MemoryPopulator::default();
    for name in names {
        populator.insert(
            SERVER,
            ObjectKind::Login,
            MemberDescriptor::new(ObjectKey::named(*name)),
        );
    }

    Rc::new(populator)
}

fn names(collection: &mut Collection) -> Vec<String> {
    collection
        .iter()
        .expect("read should succeed")
        .map(|member| member.key().name().unwrap_or_default().to_string())
        .collect()
}

fn collection_error(err: &Error) -> Option<&CollectionError> {
    match &err.detail {
        Some(ErrorDetail::Collection(detail)) => Some(detail),
        _ => None,
    }
}

// ── Population ───────────────────────────────────

#[test]
fn collections_populate_once_on_first_read() {
    let populator = seeded(&["b", "a"]);
    let mut server = server("s1", Some(populator.clone()));

    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    assert!(!logins.is_populated());
    assert_eq!(populator.calls(), 0, "touching a collection does not fetch");

    assert_eq!(names(logins), vec!["a", "b"]);
    assert_eq!(logins.len().expect("read should succeed"), 2);
    assert_eq!(populator.calls(), 1);

    let request = &populator.requests()[0];
    assert_eq!(request.parent.as_str(), SERVER);
    assert_eq!(request.kind, ObjectKind::Login);
    assert_eq!(request.filter, None);
}

#[test]
fn design_mode_never_populates() {
    let populator = seeded(&["a"]);
    let mut server = server_with(
        "s1",
        Some(populator.clone()),
        Settings::default().design_mode(true),
    );

    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    assert!(logins.is_empty().expect("read should succeed"));
    assert!(logins.is_populated());
    assert_eq!(populator.calls(), 0);
}

#[test]
fn populator_failure_leaves_the_collection_unpopulated() {
    metrics_reset_all();
    let populator = seeded(&["a", "b"]);
    populator.set_failing(true);
    let mut server = server("s1", Some(populator.clone()));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    let err = logins.len().expect_err("populator should fail");
    assert_eq!(err.class, ErrorClass::External);
    assert_eq!(err.origin, ErrorOrigin::Populator);
    assert!(err.external_cause().is_some());
    assert!(err.message.contains("Server[@Name='s1']/Login"), "message: {}", err.message);
    assert!(!logins.is_populated());

    populator.set_failing(false);
    assert_eq!(logins.len().expect("retry should succeed"), 2);

    let report = metrics_report();
    assert_eq!(report.ops.populate_calls, 2);
    assert_eq!(report.ops.populate_failures, 1);
    assert_eq!(report.ops.members_loaded, 2);
}

#[test]
fn new_parents_start_with_empty_populated_children() {
    let populator = seeded(&[]);
    let mut server = server("s1", Some(populator.clone()));

    let db = server
        .collection_mut(ObjectKind::Database)
        .expect("databases")
        .add(SqlObject::new(ObjectKind::Database, ObjectKey::named("app")))
        .expect("add should succeed");
    let schemas = db.collection_mut(ObjectKind::Schema).expect("schemas");

    assert!(schemas.is_empty().expect("read should succeed"));
    assert_eq!(populator.calls(), 1, "only the database collection was fetched");
}

#[test]
fn child_collections_populate_under_their_parent_address() {
    let populator = Rc::new(MemoryPopulator::default());
    populator.insert(
        SERVER,
        ObjectKind::Database,
        MemberDescriptor::new(ObjectKey::named("app")),
    );
    populator.insert(
        "Server[@Name='s1']/Database[@Name='app']",
        ObjectKind::Schema,
        MemberDescriptor::new(ObjectKey::named("sales")),
    );
    let mut server = server("s1", Some(populator.clone()));

    let db = server
        .collection_mut(ObjectKind::Database)
        .expect("databases")
        .get_mut(&ObjectKey::named("APP"))
        .expect("read should succeed")
        .expect("lookups are case-insensitive by default");
    let schemas = db.collection_mut(ObjectKind::Schema).expect("schemas");

    let schema = schemas
        .get_at(0)
        .expect("schema should be loaded");
    assert_eq!(schema.key().name(), Some("sales"));
    assert_eq!(
        schema.urn().as_str(),
        "Server[@Name='s1']/Database[@Name='app']/Schema[@Name='sales']"
    );
    assert_eq!(schema.state(), ObjectState::Existing);
}

// ── Add ──────────────────────────────────────────

#[test]
fn add_attaches_and_freezes_the_key() {
    let mut server = server("s1", Some(seeded(&["a"])));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    let member = logins.add(login("b")).expect("add should succeed");
    assert_eq!(member.state(), ObjectState::Creating);
    assert!(!member.key().is_writable());
    assert_eq!(member.parent().map(|p| p.urn.as_str()), Some(SERVER));

    let err = member
        .key_mut()
        .set_name("c")
        .expect_err("attached keys are read-only");
    assert!(err.to_string().contains("read-only"), "message: {err}");

    assert_eq!(names(logins), vec!["a", "b"]);
}

#[test]
fn duplicate_add_fails_and_leaves_the_store_unchanged() {
    let mut server = server("s1", Some(seeded(&["Orders"])));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    let err = logins
        .add(login("ORDERS"))
        .expect_err("duplicate identity should be rejected");

    assert_eq!(err.class, ErrorClass::Identity);
    assert!(err.message.contains("Login [ORDERS]"), "message: {}", err.message);
    assert_eq!(logins.len().expect("read should succeed"), 1);
}

#[test]
fn accept_duplicate_names_allows_repeated_identities() {
    let settings = Settings::default().accept_duplicate_names(ObjectKind::Login);
    let mut server = server_with("s1", Some(seeded(&["a"])), settings);
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    logins.add(login("A")).expect("duplicates are accepted for this kind");

    assert_eq!(logins.len().expect("read should succeed"), 2);
}

#[test]
fn add_validates_the_key() {
    let mut server = server("s1", Some(seeded(&["a"])));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    let err = logins.add(login("")).expect_err("empty login name");

    assert_eq!(err.class, ErrorClass::Identity);
    assert_eq!(logins.len().expect("read should succeed"), 1);
}

#[test]
fn add_rejects_the_wrong_kind() {
    let mut server = server("s1", None);
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    let err = logins
        .add(SqlObject::new(ObjectKind::User, ObjectKey::named("u")))
        .expect_err("users do not belong in logins");

    assert_eq!(err.class, ErrorClass::Unsupported);
    assert!(matches!(
        collection_error(&err),
        Some(CollectionError::KindMismatch { .. })
    ));
}

#[test]
fn add_rejects_members_of_another_collection() {
    let mut other = server("s2", None);
    let parent = other.as_parent();
    let attached = SqlObject::loaded(
        ObjectKind::Login,
        MemberDescriptor::new(ObjectKey::named("x")),
        parent,
        None,
        Rc::new(Settings::default()),
    );

    let mut server = server("s1", None);
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    let err = logins.add(attached).expect_err("already attached");

    assert!(err.is_state());
    assert!(matches!(
        collection_error(&err),
        Some(CollectionError::AlreadyAttached { .. })
    ));
    assert!(other.collection_mut(ObjectKind::Login).is_ok());
}

#[test]
fn add_rejects_dropped_objects() {
    let mut server = server("s1", None);
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    let mut dropped = login("x");
    dropped.mark_dropped();

    let err = logins.add(dropped).expect_err("dropped objects cannot be added");

    assert!(err.is_state());
    assert!(logins.is_empty().expect("read should succeed"));
}

#[test]
fn locked_collections_reject_mutation_with_the_reason() {
    metrics_reset_all();
    let mut server = server("s1", Some(seeded(&["a"])));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    logins.lock("frozen");

    let err = logins.add(login("b")).expect_err("locked collection");
    assert!(err.is_state());
    assert!(err.message.contains("frozen"), "message: {}", err.message);
    assert!(matches!(
        collection_error(&err),
        Some(CollectionError::Locked { reason, .. }) if reason == "frozen"
    ));

    assert!(logins.remove(&ObjectKey::named("a")).is_err());
    assert!(logins.clear().is_err());
    assert_eq!(metrics_report().ops.mutations_rejected, 3);

    assert_eq!(logins.lock_reason(), Some("frozen"));
    logins.unlock();
    assert!(!logins.is_locked());
    logins.add(login("b")).expect("unlocked collection accepts members");
}

#[test]
fn dropped_parents_expose_no_members_and_reject_mutation() {
    let mut server = server("s1", Some(seeded(&["a"])));
    assert_eq!(
        server
            .collection_mut(ObjectKind::Login)
            .expect("logins")
            .len()
            .expect("read should succeed"),
        1
    );

    server.mark_dropped();
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    assert!(logins.is_empty().expect("read should succeed"));
    assert!(logins.get(&ObjectKey::named("a")).expect("read should succeed").is_none());
    let err = logins.add(login("b")).expect_err("parent is dropped");
    assert!(err.is_state());
}

// ── Remove ───────────────────────────────────────

#[test]
fn only_members_being_created_can_be_removed() {
    let mut server = server("s1", Some(seeded(&["a"])));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    logins.add(login("b")).expect("add should succeed");

    let err = logins
        .remove(&ObjectKey::named("a"))
        .expect_err("existing members are dropped, not removed");
    assert!(matches!(
        collection_error(&err),
        Some(CollectionError::InvalidState { .. })
    ));

    let removed = logins
        .remove(&ObjectKey::named("b"))
        .expect("remove should succeed")
        .expect("b was a member");
    assert_eq!(removed.state(), ObjectState::Pending);
    assert!(removed.parent().is_none());
    assert!(removed.key().is_writable());

    assert!(
        logins
            .remove(&ObjectKey::named("zzz"))
            .expect("absent keys are a no-op")
            .is_none()
    );
    assert_eq!(names(logins), vec!["a"]);
}

#[test]
fn remove_object_requires_membership() {
    let mut server = server("s1", Some(seeded(&["a"])));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    let id = logins.add(login("b")).expect("add should succeed").id();
    let stranger = login("b");

    let err = logins
        .remove_object(stranger.id())
        .expect_err("same key, different instance");
    assert!(matches!(
        collection_error(&err),
        Some(CollectionError::NotAMember { .. })
    ));

    let removed = logins.remove_object(id).expect("member instance");
    assert_eq!(removed.id(), id);
}

// ── Ordinal members ──────────────────────────────

fn table_with_columns(columns: &[&str]) -> (SqlObject, Rc<MemoryPopulator>) {
    let populator = Rc::new(MemoryPopulator::default());
    let table = SqlObject::root(
        ObjectKind::Table,
        ObjectKey::schema_name("dbo", "t"),
        Some(populator.clone()),
        Rc::new(Settings::default()),
    );
    for (i, name) in columns.iter().enumerate() {
        let id = i32::try_from(i + 1).expect("small test ids");
        populator.insert(
            table.urn().as_str(),
            ObjectKind::Column,
            MemberDescriptor::new(ObjectKey::named(*name)).with_property(ID_PROPERTY, id),
        );
    }

    (table, populator)
}

fn column_ids(collection: &mut Collection) -> Vec<(i32, String)> {
    collection
        .iter()
        .expect("read should succeed")
        .map(|c| {
            (
                c.ordinal_id().unwrap_or_default(),
                c.key().name().unwrap_or_default().to_string(),
            )
        })
        .collect()
}

#[test]
fn inserting_a_column_renumbers_later_columns() {
    let (mut table, _) = table_with_columns(&["p", "q", "r"]);
    let columns = table.collection_mut(ObjectKind::Column).expect("columns");
    assert_eq!(columns.storage_kind(), StorageKind::Ordinal);

    columns
        .insert_at(1, SqlObject::new(ObjectKind::Column, ObjectKey::named("s")))
        .expect("insert should succeed");

    assert_eq!(
        column_ids(columns),
        vec![
            (1, "p".to_string()),
            (2, "s".to_string()),
            (3, "q".to_string()),
            (4, "r".to_string()),
        ]
    );

    columns
        .remove(&ObjectKey::named("s"))
        .expect("remove should succeed");
    assert_eq!(
        column_ids(columns),
        vec![
            (1, "p".to_string()),
            (2, "q".to_string()),
            (3, "r".to_string()),
        ]
    );
}

#[test]
fn anchored_inserts_and_lookup_by_id() {
    let (mut table, _) = table_with_columns(&["p", "q"]);
    let columns = table.collection_mut(ObjectKind::Column).expect("columns");

    columns
        .insert_after(
            &ObjectKey::named("p"),
            SqlObject::new(ObjectKind::Column, ObjectKey::named("x")),
        )
        .expect("anchor exists");
    let err = columns
        .insert_before(
            &ObjectKey::named("missing"),
            SqlObject::new(ObjectKind::Column, ObjectKey::named("y")),
        )
        .expect_err("anchor does not exist");
    assert_eq!(err.class, ErrorClass::Identity);

    let second = columns
        .item_by_id(2)
        .expect("read should succeed")
        .expect("id 2 exists");
    assert_eq!(second.key().name(), Some("x"));
    assert!(columns.item_by_id(9).expect("read should succeed").is_none());
}

#[test]
fn insert_at_past_the_end_is_not_found() {
    let (mut table, _) = table_with_columns(&["p"]);
    let columns = table.collection_mut(ObjectKind::Column).expect("columns");

    let err = columns
        .insert_at(5, SqlObject::new(ObjectKind::Column, ObjectKey::named("x")))
        .expect_err("position out of range");

    assert!(err.is_not_found());
    assert_eq!(columns.len().expect("read should succeed"), 1);
}

#[test]
fn partition_insert_takes_the_displaced_number() {
    let populator = Rc::new(MemoryPopulator::default());
    let mut table = SqlObject::root(
        ObjectKind::Table,
        ObjectKey::schema_name("dbo", "t"),
        Some(populator.clone()),
        Rc::new(Settings::default()),
    );
    for number in 1..=3 {
        populator.insert(
            table.urn().as_str(),
            ObjectKind::PhysicalPartition,
            MemberDescriptor::new(ObjectKey::number(number)),
        );
    }
    let partitions = table
        .collection_mut(ObjectKind::PhysicalPartition)
        .expect("partitions");

    partitions
        .insert_at(1, SqlObject::new(ObjectKind::PhysicalPartition, ObjectKey::number(2)))
        .expect("later partitions shift up");

    let numbers: Vec<i32> = partitions
        .iter()
        .expect("read should succeed")
        .filter_map(|p| p.key().number_value())
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(
        partitions.get_at(1).expect("inserted member").state(),
        ObjectState::Creating
    );
}

// ── Enumeration ──────────────────────────────────

#[test]
fn cursors_fail_fast_on_concurrent_modification() {
    let mut server = server("s1", Some(seeded(&["a", "b"])));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    let mut cursor = logins.cursor().expect("cursor");
    let first = cursor
        .next(logins)
        .expect("unchanged collection")
        .map(|m| m.id());
    assert!(first.is_some());

    logins.add(login("c")).expect("add should succeed");

    let err = cursor.next(logins).expect_err("membership changed");
    assert!(matches!(
        collection_error(&err),
        Some(CollectionError::ConcurrentModification { .. })
    ));
}

#[test]
fn cursor_walks_every_member_once() {
    let mut server = server("s1", Some(seeded(&["a", "b"])));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    let mut cursor = logins.cursor().expect("cursor");
    let mut seen = Vec::new();
    while let Some(member) = cursor.next(logins).expect("unchanged collection") {
        seen.push(member.key().to_string());
    }

    assert_eq!(seen, vec!["[a]", "[b]"]);
}

#[test]
fn lookup_by_path_segment() {
    let mut server = server("s1", None);
    let db = server
        .collection_mut(ObjectKind::Database)
        .expect("databases")
        .add(SqlObject::new(ObjectKind::Database, ObjectKey::named("app")))
        .expect("add should succeed");
    let tables = db.collection_mut(ObjectKind::Table).expect("tables");
    tables
        .add(SqlObject::new(
            ObjectKind::Table,
            ObjectKey::schema_name("dbo", "orders"),
        ))
        .expect("add should succeed");

    let full = UrnSegment::new("Table")
        .with_attribute("Name", "orders")
        .with_attribute("Schema", "dbo");
    let found = tables
        .get_by_segment(&full)
        .expect("segment is complete")
        .expect("table is a member");
    assert_eq!(found.key().exception_name(), "dbo.orders");

    let partial = UrnSegment::new("Table").with_attribute("Name", "orders");
    let err = tables
        .key_from_segment(&partial)
        .expect_err("schema attribute is mandatory");
    assert_eq!(err.class, ErrorClass::Identity);
    assert_eq!(err.origin, ErrorOrigin::Path);
}

// ── Refresh and reinitialization ─────────────────

#[test]
fn refresh_keeps_identity_and_drops_vanished_members() {
    let populator = seeded(&["a", "b"]);
    let mut server = server("s1", Some(populator.clone()));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    let a_id = logins
        .get(&ObjectKey::named("a"))
        .expect("read should succeed")
        .expect("a is loaded")
        .id();
    logins.add(login("c")).expect("add should succeed");

    assert!(populator.remove(SERVER, ObjectKind::Login, &ObjectKey::named("b")));
    populator.insert(SERVER, ObjectKind::Login, MemberDescriptor::new(ObjectKey::named("d")));

    let summary = logins.refresh(false).expect("refresh should succeed");
    assert_eq!(
        summary,
        RefreshSummary {
            kept: 1,
            added: 1,
            dropped: 2,
        }
    );

    assert_eq!(names(logins), vec!["a", "d"]);
    let a = logins
        .get(&ObjectKey::named("a"))
        .expect("read should succeed")
        .expect("a is still loaded");
    assert_eq!(a.id(), a_id, "still-present members keep their instance");
}

#[test]
fn refresh_with_children_reloads_properties() {
    let populator = Rc::new(MemoryPopulator::default());
    populator.insert(
        SERVER,
        ObjectKind::Login,
        MemberDescriptor::new(ObjectKey::named("a")).with_property("IsDisabled", false),
    );
    let mut server = server("s1", Some(populator.clone()));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    logins
        .get_mut(&ObjectKey::named("a"))
        .expect("read should succeed")
        .expect("a is loaded")
        .set_property("IsDisabled", true)
        .expect("live members accept changes");

    populator.remove(SERVER, ObjectKind::Login, &ObjectKey::named("a"));
    populator.insert(
        SERVER,
        ObjectKind::Login,
        MemberDescriptor::new(ObjectKey::named("a")).with_property("DefaultDatabase", "tempdb"),
    );
    logins.refresh(true).expect("refresh should succeed");

    let a = logins
        .get(&ObjectKey::named("a"))
        .expect("read should succeed")
        .expect("a is loaded");
    assert!(!a.is_dirty(), "pending edits are replaced by the store's values");
    assert_eq!(a.property("DefaultDatabase"), Some(&PropertyValue::from("tempdb")));
    assert_eq!(a.property("IsDisabled"), None);
}

#[test]
fn failed_refresh_keeps_current_members() {
    let populator = seeded(&["a"]);
    let mut server = server("s1", Some(populator.clone()));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    logins.len().expect("read should succeed");

    populator.set_failing(true);
    let err = logins.refresh(false).expect_err("populator should fail");

    assert_eq!(err.class, ErrorClass::External);
    populator.set_failing(false);
    assert_eq!(names(logins), vec!["a"]);
}

#[test]
fn clear_and_initialize_refetches_with_filter() {
    let populator = seeded(&["a", "b"]);
    let mut server = server("s1", Some(populator.clone()));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    logins.add(login("c")).expect("add should succeed");

    logins
        .clear_and_initialize(Some("@Name='b'"), &["IsDisabled"])
        .expect("reinitialize should succeed");

    assert_eq!(names(logins), vec!["b"]);
    let request = populator.requests().pop().expect("a request was made");
    assert_eq!(request.filter.as_deref(), Some("@Name='b'"));
    assert_eq!(request.extra_fields, vec!["IsDisabled".to_string()]);
}

#[test]
fn reset_unlocks_and_repopulates_on_next_read() {
    let populator = seeded(&["a"]);
    let mut server = server("s1", Some(populator.clone()));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    logins.len().expect("read should succeed");
    logins.lock("frozen");

    logins.reset();

    assert!(!logins.is_locked());
    assert!(!logins.is_populated());
    assert_eq!(names(logins), vec!["a"]);
    assert_eq!(populator.calls(), 2);
}

#[test]
fn clear_drops_and_removes_every_member() {
    let populator = seeded(&["a", "b"]);
    let mut server = server("s1", Some(populator.clone()));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");

    logins.clear().expect("clear should succeed");

    assert!(logins.is_empty().expect("read should succeed"));
    assert_eq!(populator.calls(), 1, "cleared collections stay populated");
}

#[test]
fn mark_all_dropped_freezes_members() {
    let mut server = server("s1", Some(seeded(&["a"])));
    let logins = server.collection_mut(ObjectKind::Login).expect("logins");
    logins.len().expect("read should succeed");

    logins.mark_all_dropped();

    let a = logins
        .get_mut(&ObjectKey::named("a"))
        .expect("read should succeed")
        .expect("dropped members stay visible");
    assert_eq!(a.state(), ObjectState::Dropped);
    assert!(a.set_property("x", 1).is_err());
}
