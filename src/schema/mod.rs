//! Declared collections and their startup reconciliation.

pub mod container;

use std::collections::HashSet;

use serde::Serialize;

use crate::connection::{ConnectionManager, Context};
use crate::error::Result;
use crate::models::Index;
use crate::models::tables::{TABLE_DEL_ARCHIVE, TABLE_ID_GENERATOR};

/// One declared collection.
#[derive(Clone, Debug, PartialEq)]
pub struct TableSchema {
    pub name: &'static str,
    pub indexes: Vec<Index>,
}

/// What a reconciliation pass had to create.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SchemaReport {
    pub created_tables: Vec<String>,
    /// `table.index` names.
    pub created_indexes: Vec<String>,
}

/// Every collection the store expects: its own system tables first.
pub fn declared_tables() -> Vec<TableSchema> {
    let mut tables = vec![
        TableSchema { name: TABLE_ID_GENERATOR, indexes: Vec::new() },
        TableSchema { name: TABLE_DEL_ARCHIVE, indexes: Vec::new() },
    ];
    tables.extend(
        container::container_tables()
            .into_iter()
            .map(|(name, indexes)| TableSchema { name, indexes }),
    );
    tables
}

impl ConnectionManager {
    /// Create declared collections and indexes that are missing. Indexes are
    /// matched by name; existing ones are never altered, and a declared index
    /// whose keys already exist under another name is not reported.
    pub fn reconcile_schema(&self, ctx: &Context<'_>) -> Result<SchemaReport> {
        let mut report = SchemaReport::default();
        let existing: HashSet<String> = self.list_tables(ctx)?.into_iter().collect();

        for schema in declared_tables() {
            if !existing.contains(schema.name) {
                match self.create_table(ctx, schema.name) {
                    Ok(()) => report.created_tables.push(schema.name.to_string()),
                    // Another instance created it first.
                    Err(err) if err.is_duplicated() => {}
                    Err(err) => return Err(err),
                }
            }

            if schema.indexes.is_empty() {
                continue;
            }
            let table = self.table(schema.name);
            let present: HashSet<String> =
                table.indexes(ctx)?.into_iter().map(|index| index.name).collect();
            for index in schema.indexes.iter().filter(|index| !present.contains(&index.name)) {
                if table.create_index(ctx, index)? {
                    report.created_indexes.push(format!("{}.{}", schema.name, index.name));
                }
            }
        }

        log::info!(
            "schema reconciled, created {} tables and {} indexes",
            report.created_tables.len(),
            report.created_indexes.len()
        );
        Ok(report)
    }
}
