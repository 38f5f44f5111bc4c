//! Collection administration.

use mongodb::bson::{Document, doc};

use crate::connection::manager::ConnectionManager;
use crate::connection::types::Context;
use crate::error::{Error, Result};
use crate::helpers::validate_table_name;

const COLLECTION_TYPE: &str = "collection";

impl ConnectionManager {
    /// Whether a collection called `name` exists. Views do not count.
    pub fn has_table(&self, ctx: &Context<'_>, name: &str) -> Result<bool> {
        let limits = ctx.limits();
        self.exec(&limits, "list collections", async {
            let names = self
                .database
                .list_collection_names()
                .filter(doc! { "name": name, "type": COLLECTION_TYPE })
                .await?;
            Ok(names.iter().any(|existing| existing == name))
        })
    }

    /// Every collection of the database, sorted by name. Views are skipped.
    pub fn list_tables(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let limits = ctx.limits();
        self.exec(&limits, "list collections", async {
            let mut names = self
                .database
                .list_collection_names()
                .filter(doc! { "type": COLLECTION_TYPE })
                .await?;
            names.sort_unstable();
            Ok(names)
        })
    }

    pub fn create_table(&self, ctx: &Context<'_>, name: &str) -> Result<()> {
        validate_table_name(name).map_err(Error::InvalidArgument)?;
        let limits = ctx.limits();
        self.exec(&limits, "create collection", async {
            self.database.create_collection(name).await?;
            Ok(())
        })
        .inspect_err(|err| {
            log::error!("create table {name} failed, err: {err}, rid: {}", limits.request_id)
        })
    }

    pub fn drop_table(&self, ctx: &Context<'_>, name: &str) -> Result<()> {
        let limits = ctx.limits();
        self.exec(&limits, "drop collection", async {
            self.database.collection::<Document>(name).drop().await?;
            Ok(())
        })
        .inspect_err(|err| {
            log::error!("drop table {name} failed, err: {err}, rid: {}", limits.request_id)
        })
    }

    /// Rename `from` to `to` within the database.
    pub fn rename_table(&self, ctx: &Context<'_>, from: &str, to: &str) -> Result<()> {
        validate_table_name(to).map_err(Error::InvalidArgument)?;
        let limits = ctx.limits();
        let database = self.database.name();
        self.exec(&limits, "rename collection", async {
            self.client
                .database("admin")
                .run_command(doc! {
                    "renameCollection": format!("{database}.{from}"),
                    "to": format!("{database}.{to}"),
                })
                .await?;
            Ok(())
        })
        .inspect_err(|err| {
            log::error!(
                "rename table {from} to {to} failed, err: {err}, rid: {}",
                limits.request_id
            )
        })
    }
}
