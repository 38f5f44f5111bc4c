//! Integration tests for the store lifecycle and table administration using Testcontainers.

mod common;

use cmdb_store::connection::MIN_SERVER_VERSION;
use cmdb_store::{ConnectionManager, Context, Error, OpKind, StoreConfig};
use mongodb::bson::doc;

// =============================================================================
// Lifecycle
// =============================================================================

/// Test connecting, pinging and closing a store.
#[test]
fn test_connect_ping_close() {
    let config = common::config("conn_lifecycle");
    let store = ConnectionManager::connect(&config).unwrap();

    store.ping().unwrap();
    assert!(store.database_name().starts_with("conn_lifecycle_"));
    assert!(store.server_version().unwrap() >= MIN_SERVER_VERSION);

    store.close();
}

/// Test that a missing replica set name is rejected before dialing.
#[test]
fn test_connect_requires_rs_name() {
    let mut config = common::config("conn_no_rs");
    config.rs_name = String::new();

    let err = ConnectionManager::connect(&config).err().unwrap();
    assert!(matches!(err, Error::Config(_)), "{err}");
}

/// Test that a URI without a database is rejected.
#[test]
fn test_connect_requires_database() {
    let config = StoreConfig::new("mongodb://127.0.0.1:27017", "rs0");
    let err = ConnectionManager::connect(&config).err().unwrap();
    assert!(matches!(err, Error::Config(_)), "{err}");
}

/// Test that an unreachable server fails the connect.
#[test]
fn test_connect_unreachable() {
    let mut config = StoreConfig::new("mongodb://127.0.0.1:1/cmdb?directConnection=true", "rs0");
    config.connect_timeout_secs = 1;

    let err = ConnectionManager::connect(&config).err().unwrap();
    assert!(matches!(err, Error::ConnectFailed(_)), "{err}");
}

// =============================================================================
// Table administration
// =============================================================================

/// Test creating, listing, renaming and dropping tables.
#[test]
fn test_table_admin() {
    let store = common::store("conn_tables");
    let ctx = Context::new();

    assert!(!store.has_table(&ctx, "cc_SetBase").unwrap());
    store.create_table(&ctx, "cc_SetBase").unwrap();
    store.create_table(&ctx, "cc_ModuleBase").unwrap();
    assert!(store.has_table(&ctx, "cc_SetBase").unwrap());
    assert_eq!(store.list_tables(&ctx).unwrap(), vec!["cc_ModuleBase", "cc_SetBase"]);

    let err = store.create_table(&ctx, "cc_SetBase").unwrap_err();
    assert!(err.is_duplicated(), "{err}");

    store.rename_table(&ctx, "cc_ModuleBase", "cc_ModuleBase_old").unwrap();
    assert!(!store.has_table(&ctx, "cc_ModuleBase").unwrap());
    assert!(store.has_table(&ctx, "cc_ModuleBase_old").unwrap());

    store.drop_table(&ctx, "cc_ModuleBase_old").unwrap();
    assert_eq!(store.list_tables(&ctx).unwrap(), vec!["cc_SetBase"]);
}

/// Test that views are not reported as tables.
#[test]
fn test_views_are_not_tables() {
    let config = common::config("conn_views");
    let store = ConnectionManager::connect(&config).unwrap();
    let ctx = Context::new();

    store.create_table(&ctx, "cc_SetBase").unwrap();
    common::create_view(&config, store.database_name(), "cc_SetView", "cc_SetBase");

    assert!(!store.has_table(&ctx, "cc_SetView").unwrap());
    assert!(store.has_table(&ctx, "cc_SetBase").unwrap());
    let tables = store.list_tables(&ctx).unwrap();
    assert!(tables.contains(&"cc_SetBase".to_string()));
    assert!(!tables.contains(&"cc_SetView".to_string()));
}

/// Test that illegal table names never reach the server.
#[test]
fn test_invalid_table_names() {
    let store = common::store("conn_bad_names");
    let ctx = Context::new();

    for name in ["", "cc_$bad", "system.users"] {
        let err = store.create_table(&ctx, name).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "{name:?}: {err}");
    }
    store.create_table(&ctx, "cc_SetBase").unwrap();
    let err = store.rename_table(&ctx, "cc_SetBase", "cc_$bad").unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)), "{err}");
}

// =============================================================================
// Metrics
// =============================================================================

/// Test that every tracked call lands in the metrics snapshot.
#[test]
fn test_metrics_snapshot() {
    let store = common::store("conn_metrics");
    let mut ctx = Context::new();
    let table = store.table("cc_SetBase");

    table.insert_one(&mut ctx, &doc! { "bk_set_id": 1 }).unwrap();
    table.insert_one(&mut ctx, &doc! { "bk_set_id": 2 }).unwrap();
    assert_eq!(table.find(doc! {}).count(&mut ctx).unwrap(), 2);

    let snapshot = store.metrics().snapshot();
    let insert = snapshot
        .iter()
        .find(|entry| entry.table == "cc_SetBase" && entry.op == OpKind::Insert)
        .unwrap();
    assert_eq!(insert.calls, 2);
    assert_eq!(insert.errors, 0);

    let count = snapshot
        .iter()
        .find(|entry| entry.table == "cc_SetBase" && entry.op == OpKind::Count)
        .unwrap();
    assert_eq!(count.calls, 1);
}
