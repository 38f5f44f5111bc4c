use std::path::PathBuf;

use anyhow::{Context as _, Result};
use serde::Serialize;

use cmdb_store::{ConnectionManager, Context, SchemaReport, StoreConfig};

#[derive(Serialize)]
struct TableSummary {
    name: String,
    indexes: Vec<String>,
}

#[derive(Serialize)]
struct Summary {
    database: String,
    server_version: String,
    reconciled: SchemaReport,
    tables: Vec<TableSummary>,
}

fn main() -> Result<()> {
    env_logger::init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => StoreConfig::load(&path)?,
        None => StoreConfig::from_env()?,
    };

    let store = ConnectionManager::connect(&config)
        .with_context(|| format!("Failed to connect to {}", config.redacted_uri()))?;
    let ctx = Context::new();

    let summary = (|| -> cmdb_store::Result<Summary> {
        let reconciled = store.reconcile_schema(&ctx)?;
        let mut tables = Vec::new();
        for name in store.list_tables(&ctx)? {
            let indexes = store.table(name.as_str()).indexes(&ctx)?;
            tables.push(TableSummary {
                indexes: indexes.into_iter().map(|index| index.name).collect(),
                name,
            });
        }
        Ok(Summary {
            database: store.database_name().to_string(),
            server_version: store.server_version()?.to_string(),
            reconciled,
            tables,
        })
    })();

    store.close();
    let summary = summary.context("Failed to reconcile schema")?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
