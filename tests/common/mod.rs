//! Common test utilities and fixtures for integration tests using Testcontainers.
//!
//! A single MongoDB 7.0 replica set member is shared per test binary (Rust
//! compiles each `tests/*.rs` file as a separate binary). Transactions need a
//! replica set, so the container runs with `--replSet` and is initiated once.
//! Per-test isolation is achieved by giving every store its own database,
//! named with a short UUID suffix.
//!
//! The container runs on a dedicated background thread with its own tokio
//! runtime. The store under test is blocking and owns a runtime too, so tests
//! are plain `#[test]` functions.
//!
//! An `atexit` hook ensures the container is removed when the process exits.

#![allow(dead_code)]

pub mod fixtures;

use std::sync::OnceLock;
use std::time::Duration;

use cmdb_store::{ConnectionManager, StoreConfig};
use mongodb::bson::doc;
use mongodb::{Client, options::ClientOptions};
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::mongo::Mongo;

/// Connection info for the shared container.
struct SharedContainer {
    /// `mongodb://host:port`, no database and no options.
    address: String,
    rs_name: String,
}

static SHARED: OnceLock<SharedContainer> = OnceLock::new();

/// Docker container ID, stored globally so the `atexit` handler can remove it.
static CONTAINER_ID: OnceLock<String> = OnceLock::new();

unsafe extern "C" {
    fn atexit(f: extern "C" fn()) -> i32;
}

/// Called by the C runtime on process exit. Forcibly removes the shared container.
extern "C" fn remove_container() {
    if let Some(id) = CONTAINER_ID.get() {
        let _ = std::process::Command::new("docker")
            .args(["rm", "-f", id])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();
    }
}

/// Initialize the shared container (called once per test binary).
fn get_or_init_shared() -> &'static SharedContainer {
    SHARED.get_or_init(|| {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create container runtime");

            rt.block_on(async {
                let container = Mongo::repl_set()
                    .with_tag("7.0")
                    .start()
                    .await
                    .expect("Failed to start MongoDB container");

                // Store container ID for the atexit cleanup hook.
                let _ = CONTAINER_ID.set(container.id().to_string());
                unsafe {
                    atexit(remove_container);
                }

                let host = container.get_host().await.expect("Failed to get host");
                let port = container.get_host_port_ipv4(27017).await.expect("Failed to get port");
                let address = format!("mongodb://{}:{}", host, port);

                // Wait for the member to become primary and learn the set name.
                let opts = ClientOptions::parse(format!("{address}/?directConnection=true"))
                    .await
                    .expect("Failed to parse");
                let probe = Client::with_options(opts).expect("Failed to create probe client");
                let mut rs_name = None;
                for _ in 0..100 {
                    let hello = probe.database("admin").run_command(doc! { "hello": 1 }).await;
                    if let Ok(hello) = hello.as_ref() {
                        if hello.get_bool("isWritablePrimary").unwrap_or(false) {
                            rs_name = hello.get_str("setName").ok().map(str::to_string);
                            break;
                        }
                    }
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                drop(probe);

                let rs_name = rs_name.expect("Replica set never elected a primary");
                tx.send((address, rs_name)).expect("Failed to send connection info");

                // Park forever to keep the container alive until the process exits.
                std::future::pending::<()>().await;
            });
        });

        let (address, rs_name) = rx.recv().expect("Failed to receive connection info");
        SharedContainer { address, rs_name }
    })
}

/// Store configuration for a fresh database named `{name}_{uuid}`.
pub fn config(name: &str) -> StoreConfig {
    let shared = get_or_init_shared();
    let test_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
    let uri = format!("{}/{}_{}?directConnection=true", shared.address, name, test_id);
    StoreConfig::new(uri, shared.rs_name.clone())
}

/// Connected store on a fresh database.
pub fn store(name: &str) -> ConnectionManager {
    ConnectionManager::connect(&config(name)).expect("Failed to connect store")
}

/// Create a read-only view `view` over `source` in `database`, bypassing the
/// store, which has no view support.
pub fn create_view(config: &StoreConfig, database: &str, view: &str, source: &str) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to create runtime");
    rt.block_on(async {
        let client = Client::with_uri_str(&config.uri).await.expect("Failed to connect");
        client
            .database(database)
            .run_command(doc! { "create": view, "viewOn": source, "pipeline": [] })
            .await
            .expect("Failed to create view");
        client.shutdown().await;
    });
}
