//! Integration tests for sessions, transactions and call limits using Testcontainers.

mod common;

use std::time::{Duration, Instant};

use cmdb_store::{CancellationToken, Context, Error, ReadPreferenceMode, TxnMode};
use mongodb::bson::{Document, doc};

// =============================================================================
// Commit & abort
// =============================================================================

/// Test that an auto transaction commits every write.
#[test]
fn test_transaction_commits() {
    let store = common::store("txn_commit");
    let mut ctx = Context::new();
    store.create_table(&ctx, "cc_SetBase").unwrap();
    store.create_table(&ctx, "cc_ModuleBase").unwrap();

    store
        .transaction(&mut ctx, |ctx| {
            assert!(ctx.in_transaction());
            store.table("cc_SetBase").insert_one(ctx, &doc! { "bk_set_id": 1 })?;
            store.table("cc_ModuleBase").insert_one(ctx, &doc! { "bk_module_id": 1 })?;
            // Reads inside the transaction see its own writes.
            let count = store.table("cc_SetBase").find(doc! {}).count(ctx)?;
            assert_eq!(count, 1);
            Ok(())
        })
        .unwrap();

    assert!(!ctx.in_transaction());
    assert_eq!(store.table("cc_SetBase").find(doc! {}).count(&mut ctx).unwrap(), 1);
    assert_eq!(store.table("cc_ModuleBase").find(doc! {}).count(&mut ctx).unwrap(), 1);
}

/// Test that an error inside an auto transaction discards its writes.
#[test]
fn test_transaction_aborts_on_error() {
    let store = common::store("txn_abort");
    let mut ctx = Context::new();
    store.create_table(&ctx, "cc_SetBase").unwrap();
    let table = store.table("cc_SetBase");

    let result: cmdb_store::Result<()> = store.transaction(&mut ctx, |ctx| {
        table.insert_one(ctx, &doc! { "bk_set_id": 1 })?;
        table.find(doc! { "bk_set_id": 2 }).one::<Document>(ctx)?;
        Ok(())
    });

    assert!(matches!(result, Err(Error::NotFound)));
    assert_eq!(table.find(doc! {}).count(&mut ctx).unwrap(), 0);
}

/// Test that a nested call joins the outer transaction instead of committing.
#[test]
fn test_nested_transaction_joins_outer() {
    let store = common::store("txn_nested");
    let mut ctx = Context::new();
    store.create_table(&ctx, "cc_SetBase").unwrap();
    let table = store.table("cc_SetBase");

    let result: cmdb_store::Result<()> = store.transaction(&mut ctx, |ctx| {
        store.transaction(ctx, |inner| {
            assert!(inner.in_transaction());
            table.insert_one(inner, &doc! { "bk_set_id": 1 })
        })?;
        // The inner call must not have committed.
        Err(Error::InvalidArgument("abort outer".into()))
    });

    assert!(result.is_err());
    assert_eq!(table.find(doc! {}).count(&mut ctx).unwrap(), 0);
}

/// Test that standalone mode runs without a session.
#[test]
fn test_standalone_mode_has_no_session() {
    let store = common::store("txn_standalone");
    let mut ctx = Context::new();
    let table = store.table("cc_SetBase");

    let result: cmdb_store::Result<()> = store.run_with_txn(&mut ctx, TxnMode::Standalone, |ctx| {
        assert!(!ctx.in_transaction());
        table.insert_one(ctx, &doc! { "bk_set_id": 1 })?;
        Err(Error::InvalidArgument("not rolled back".into()))
    });

    assert!(result.is_err());
    assert_eq!(table.find(doc! {}).count(&mut ctx).unwrap(), 1);
}

/// Test that the request id carries into the transaction context.
#[test]
fn test_transaction_keeps_request_id() {
    let store = common::store("txn_rid");
    let mut ctx = Context::with_request_id("rid-42");

    let rid = store.transaction(&mut ctx, |ctx| Ok(ctx.request_id().to_string())).unwrap();
    assert_eq!(rid, "rid-42");
}

// =============================================================================
// Limits & routing
// =============================================================================

/// Test that a cancelled context fails before reaching the server.
#[test]
fn test_cancelled_context() {
    let store = common::store("txn_cancel");
    let token = CancellationToken::new();
    let mut ctx = Context::new().cancellation(token.clone());

    token.cancel();
    let err = store.table("cc_SetBase").find(doc! {}).count(&mut ctx).unwrap_err();
    assert!(matches!(err, Error::Cancelled), "{err}");
}

/// Test that cancellation interrupts a call in flight.
#[test]
fn test_cancellation_interrupts_running_call() {
    let store = common::store("txn_cancel_inflight");
    let token = CancellationToken::new();
    let mut ctx = Context::new().cancellation(token.clone());
    let table = store.table("cc_SetBase");
    table.insert_one(&mut ctx, &doc! { "bk_set_id": 1 }).unwrap();

    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(200));
        token.cancel();
    });
    let started = Instant::now();
    let err = table
        .find(doc! { "$where": "sleep(3000) || true" })
        .all::<Document>(&mut ctx)
        .unwrap_err();
    canceller.join().unwrap();

    assert!(matches!(err, Error::Cancelled), "{err}");
    assert!(started.elapsed() < Duration::from_secs(3));
}

/// Test that an expired deadline turns into a timeout.
#[test]
fn test_deadline_exceeded() {
    let store = common::store("txn_deadline");
    let table = store.table("cc_SetBase");
    table.insert_one(&mut Context::new(), &doc! { "bk_set_id": 1 }).unwrap();

    let mut ctx = Context::new().timeout(Duration::from_millis(100));

    let err = table
        .find(doc! { "$where": "sleep(2000) || true" })
        .all::<Document>(&mut ctx)
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "{err}");
}

/// Test that routed reads work on a single member set.
#[test]
fn test_read_preference_outside_and_inside_transaction() {
    let store = common::store("txn_read_pref");
    let mut ctx = Context::new().read_preference(ReadPreferenceMode::PrimaryPreferred);
    let table = store.table("cc_SetBase");
    table.insert_one(&mut ctx, &doc! { "bk_set_id": 1 }).unwrap();

    assert_eq!(table.find(doc! {}).count(&mut ctx).unwrap(), 1);

    // Inside a transaction the hint is ignored and the read goes to the primary.
    let mut ctx = Context::new().read_preference(ReadPreferenceMode::Nearest);
    let docs = store
        .transaction(&mut ctx, |ctx| table.find(doc! {}).all::<Document>(ctx))
        .unwrap();
    assert_eq!(docs.len(), 1);
}
